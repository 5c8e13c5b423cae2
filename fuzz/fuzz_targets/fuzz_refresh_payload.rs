#![no_main]

use libfuzzer_sys::fuzz_target;
use strategos_client::protocol::RefreshPayload;

fuzz_target!(|data: &[u8]| {
    if let Ok(payload) = serde_json::from_slice::<RefreshPayload>(data) {
        let _ = payload.validate();
    }
});
