//! Logging configuration and setup
//!
//! Provides structured logging with configurable formats.

use crate::ServerError;
use authkey_config::ServerConfiguration;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialize logging system
pub fn init_logging(config: &ServerConfiguration) -> Result<(), ServerError> {
    let logging_config = &config.logging;

    let level = parse_log_level(&logging_config.level)?;

    // RUST_LOG wins over the configured level
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let builder = FmtSubscriber::builder().with_env_filter(env_filter);
    let result = match logging_config.format.to_lowercase().as_str() {
        "json" => tracing::subscriber::set_global_default(builder.json().finish()),
        "pretty" => tracing::subscriber::set_global_default(builder.pretty().finish()),
        "compact" => tracing::subscriber::set_global_default(builder.compact().finish()),
        _ => {
            return Err(ServerError::Logging(format!(
                "Unknown log format: {}",
                logging_config.format
            )));
        }
    };
    result.map_err(|e| ServerError::Logging(format!("Failed to set logger: {e}")))?;

    tracing::info!("Logging initialized with level: {}", level);
    Ok(())
}

/// Parse log level string
fn parse_log_level(level: &str) -> Result<Level, ServerError> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(ServerError::Logging(format!("Invalid log level: {level}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("DEBUG").unwrap(), Level::DEBUG);
        assert_eq!(parse_log_level("warn").unwrap(), Level::WARN);
        assert!(parse_log_level("verbose").is_err());
    }

    #[test]
    fn test_unknown_format_rejected_before_install() {
        let mut config = ServerConfiguration::default();
        config.logging.format = "xml".to_string();
        assert!(matches!(
            init_logging(&config),
            Err(ServerError::Logging(_))
        ));
    }
}
