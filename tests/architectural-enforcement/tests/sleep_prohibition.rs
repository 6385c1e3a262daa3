//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Production code MUST NOT call sleep methods. Connection tasks
//! wait on transport events and shutdown signals; nothing is retried on a
//! timer.
//! **Exceptions**: test code (`#[cfg(test)]` modules, `tests/` directories)

use architectural_enforcement::scan_production_code;

/// Test that production code does not contain sleep() calls
#[test]
fn test_no_sleep_in_production_code() {
    let violations =
        scan_production_code(|code| code.contains("::sleep(") || code.contains(".sleep("));

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Sleep calls found in production code!\n");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        eprintln!("\n✅ Wait on I/O instead:");
        eprintln!("  - tokio::select! over the event channel and the shutdown signal");
        eprintln!("  - tokio::time::timeout() around a future that does real work");

        panic!(
            "\nFound {} sleep violation(s) in production code.\nFix these before merging!",
            violations.len()
        );
    }
}
