#![no_main]

use libfuzzer_sys::fuzz_target;
use strategos_client::protocol::{Envelope, ServerEvent};

fuzz_target!(|data: &[u8]| {
    // Raw frames go through the same two steps as the transport reader:
    // envelope first, then the typed event.
    let Ok(envelope) = serde_json::from_slice::<Envelope>(data) else {
        return;
    };
    if let Ok(event) = ServerEvent::from_envelope(&envelope) {
        let _ = event.game_id();
    }
});
