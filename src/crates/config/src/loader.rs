//! Where the server configuration comes from
//!
//! Precedence, highest first: `AUTHKEY_*` variables, the TOML file, defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::{ConfigError, Result, ServerConfiguration};

/// Variable naming an explicit configuration file
pub const CONFIG_FILE_VAR: &str = "AUTHKEY_CONFIG_FILE";

const SEARCH_PATHS: [&str; 3] = [
    "authkey-server.toml",
    "config/authkey-server.toml",
    "/etc/authkey/server.toml",
];

pub struct ConfigLoader;

impl ConfigLoader {
    /// Read, override and validate a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<ServerConfiguration> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_str(&content)
    }

    pub fn from_str(content: &str) -> Result<ServerConfiguration> {
        Self::finish(toml::from_str(content)?)
    }

    /// Defaults plus environment overrides
    pub fn from_env() -> Result<ServerConfiguration> {
        Self::finish(ServerConfiguration::default())
    }

    /// `AUTHKEY_CONFIG_FILE`, else the first search path that exists, else
    /// the environment alone
    pub fn load() -> Result<ServerConfiguration> {
        match Self::locate() {
            Some(path) => Self::from_file(path),
            None => Self::from_env(),
        }
    }

    /// Write the defaults out as TOML
    pub fn create_sample_config<P: AsRef<Path>>(path: P) -> Result<()> {
        fs::write(path, toml::to_string_pretty(&ServerConfiguration::default())?)?;
        Ok(())
    }

    fn locate() -> Option<PathBuf> {
        if let Ok(explicit) = env::var(CONFIG_FILE_VAR) {
            return Some(PathBuf::from(explicit));
        }
        SEARCH_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|candidate| candidate.is_file())
    }

    fn finish(mut config: ServerConfiguration) -> Result<ServerConfiguration> {
        if let Ok(level) = env::var("AUTHKEY_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(format) = env::var("AUTHKEY_LOG_FORMAT") {
            config.logging.format = format;
        }
        if let Some(attempts) = parse_env("AUTHKEY_MAX_DH_ATTEMPTS")? {
            config.handshake.max_dh_attempts = attempts;
        }
        if let Some(offload) = parse_env("AUTHKEY_OFFLOAD_DH")? {
            config.handshake.offload_dh_to_blocking_pool = offload;
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_env<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| ConfigError::Environment(format!("Invalid {name}: {e}"))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Every test touching process environment lives here so they never race
    #[test]
    fn test_env_override() {
        env::set_var("AUTHKEY_LOG_LEVEL", "debug");
        env::set_var("AUTHKEY_MAX_DH_ATTEMPTS", "16");
        env::set_var("AUTHKEY_OFFLOAD_DH", "false");

        let config = ConfigLoader::from_env().unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.handshake.max_dh_attempts, 16);
        assert!(!config.handshake.offload_dh_to_blocking_pool);

        env::set_var("AUTHKEY_MAX_DH_ATTEMPTS", "many");
        assert!(matches!(
            ConfigLoader::from_env(),
            Err(ConfigError::Environment(_))
        ));

        env::set_var("AUTHKEY_MAX_DH_ATTEMPTS", "0");
        assert!(matches!(
            ConfigLoader::from_env(),
            Err(ConfigError::InvalidValue { .. })
        ));

        env::set_var(CONFIG_FILE_VAR, "/nonexistent/authkey-server.toml");
        assert!(matches!(ConfigLoader::load(), Err(ConfigError::Io(_))));

        env::remove_var(CONFIG_FILE_VAR);
        env::remove_var("AUTHKEY_LOG_LEVEL");
        env::remove_var("AUTHKEY_MAX_DH_ATTEMPTS");
        env::remove_var("AUTHKEY_OFFLOAD_DH");
    }
}
