#![no_main]

use libfuzzer_sys::fuzz_target;
use wa_relay::status::{
    CloseReason, ConnectionStatus, Effect, LifecycleEvent, LinkState, LOGGED_OUT_STATUS_CODE,
};

fn decode_event(byte: u8) -> LifecycleEvent {
    match byte % 6 {
        0 => LifecycleEvent::Connecting,
        1 => LifecycleEvent::PairingCode(format!("2@{byte}")),
        2 => LifecycleEvent::PairingImageRendered(format!("data:{byte}")),
        3 => LifecycleEvent::Open,
        4 => LifecycleEvent::Closed(CloseReason::from_status(Some(u16::from(byte)), "fuzz")),
        _ => LifecycleEvent::Closed(CloseReason::from_status(Some(LOGGED_OUT_STATUS_CODE), "fuzz")),
    }
}

fuzz_target!(|data: &[u8]| {
    let mut state = LinkState::new();
    for &byte in data {
        let was_failed = state.status == ConnectionStatus::Failed;
        let event = decode_event(byte);
        let (next, effects) = state.transition(&event);
        if was_failed {
            assert_eq!(next, state);
            assert!(effects.is_empty());
        }
        if next.pairing_image.is_some() {
            assert_eq!(next.status, ConnectionStatus::AwaitingPairing);
        }
        if effects.contains(&Effect::Reconnect) {
            assert_eq!(next.status, ConnectionStatus::Connecting);
        }
        if effects.contains(&Effect::Halt) {
            assert_eq!(next.status, ConnectionStatus::Failed);
        }
        state = next;
    }
});
