#![no_main]

use libfuzzer_sys::fuzz_target;
use wa_relay::relay::inbound_message;
use wa_relay::transport::{parse_bridge_line, SessionEvent};

const MAX_LINE_BYTES: usize = 16 * 1024;

fuzz_target!(|data: &[u8]| {
    let capped = &data[..data.len().min(MAX_LINE_BYTES)];
    let line = String::from_utf8_lossy(capped);
    if let Ok(Some(SessionEvent::Messages(upsert))) = parse_bridge_line(&line) {
        if let Some(inbound) = inbound_message(&upsert) {
            assert!(!inbound.text.is_empty());
            assert_ne!(inbound.sender, wa_relay::transport::STATUS_BROADCAST_JID);
        }
    }
});
