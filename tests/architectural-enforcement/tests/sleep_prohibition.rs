//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Production code MUST NOT sleep. Worker threads park until
//! unparked, the coordinator awaits a notification, and periodic work runs
//! on `tokio::time::interval`.
//! **Exceptions**: test code

use architectural_enforcement::{report, scan_directory};

const SLEEP_PATTERNS: &[&str] = &["::sleep(", ".sleep(", "sleep_ms("];

#[test]
fn test_no_sleep_in_core() {
    let violations = scan_directory("calc/core/src", SLEEP_PATTERNS);
    report(
        &violations,
        "CRITICAL: Sleep calls found in the engine core!",
        &[
            "✅ Workers: std::thread::park / unpark",
            "✅ Coordinator: tokio::sync::Notify",
            "✅ Periodic tasks: tokio::time::interval",
        ],
    );
}

#[test]
fn test_no_sleep_in_tui() {
    let violations = scan_directory("tui/src", SLEEP_PATTERNS);
    report(
        &violations,
        "CRITICAL: Sleep calls found in the terminal surface!",
        &["✅ Input is polled by the engine's input pump on an interval"],
    );
}
