#![no_main]
use authkey_protocol::wire::{Vector, WireFormat};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let size = Vector::<f64>::read_size(data, 0);
    if let Ok(vector) = Vector::<f64>::decode(data) {
        assert_eq!(size.ok(), vector.encoded_size());
    }
    let _ = Vector::<i64>::decode(data);
});
