//! Integration Test: Lock-Free Handshake
//!
//! **Policy**: The engine core coordinates pause requests with atomics,
//! thread parking and async notification only. A blocking lock would let a
//! slow observer stall a computation mid-step, or the reverse.
//! **Exceptions**: test code

use std::fs;

use architectural_enforcement::{report, scan_directory, workspace_root};

#[test]
fn test_no_blocking_locks_in_core() {
    let violations = scan_directory(
        "calc/core/src",
        &["Mutex", "RwLock", "Condvar", "Barrier", "parking_lot"],
    );
    report(
        &violations,
        "CRITICAL: Blocking synchronization found in the engine core!",
        &[
            "✅ Request word and acknowledgements: atomics",
            "✅ Waking workers: Thread::unpark",
            "✅ Waking the coordinator: tokio::sync::Notify",
        ],
    );
}

#[test]
fn test_core_has_no_ui_dependencies() {
    let manifest = fs::read_to_string(workspace_root().join("calc/core/Cargo.toml"))
        .expect("calc/core/Cargo.toml is readable");

    for forbidden in ["ratatui", "crossterm"] {
        assert!(
            !manifest.contains(forbidden),
            "picalc-core must not depend on {forbidden}"
        );
    }
}
