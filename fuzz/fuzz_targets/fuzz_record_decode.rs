#![no_main]
use authkey_protocol::messages::{DhParamsResponse, PqInnerData, ReqDhParams};
use authkey_protocol::wire::WireFormat;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(inner) = PqInnerData::decode(data) {
        let encoded = inner.encode().unwrap();
        assert_eq!(PqInnerData::decode(&encoded).unwrap(), inner);
    }
    let _ = ReqDhParams::decode(data);
    let _ = DhParamsResponse::decode(data);
});
