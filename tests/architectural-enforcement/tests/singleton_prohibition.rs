//! Integration Test: Global Singleton Prohibition
//!
//! **Policy**: The connection manager and the session store are ordinary
//! values constructed by the caller. Production code MUST NOT keep mutable
//! state in statics.

use architectural_enforcement::scan_production_code;

const FORBIDDEN_STATIC_TYPES: &[&str] = &["Mutex<", "RwLock<", "OnceCell<", "OnceLock<", "Lazy<"];

fn is_global_singleton(code: &str) -> bool {
    let trimmed = code.trim_start();
    if trimmed.starts_with("static mut ") || trimmed.contains("lazy_static!") {
        return true;
    }

    let declares_static = trimmed.starts_with("static ")
        || trimmed.starts_with("pub static ")
        || trimmed.starts_with("pub(crate) static ");
    declares_static
        && FORBIDDEN_STATIC_TYPES
            .iter()
            .any(|ty| trimmed.contains(ty))
}

/// Test that production code declares no global mutable state
#[test]
fn test_no_global_singletons_in_production_code() {
    let violations = scan_production_code(is_global_singleton);

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Global mutable state found in production code!\n");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        eprintln!("\n✅ Construct the value and pass it to whoever needs it.");

        panic!(
            "\nFound {} global singleton(s) in production code.\nFix these before merging!",
            violations.len()
        );
    }
}

#[test]
fn test_detector_recognises_singletons() {
    assert!(is_global_singleton(
        "static REGISTRY: Lazy<Mutex<HashMap<String, u64>>> = Lazy::new(Default::default);"
    ));
    assert!(is_global_singleton("static mut COUNTER: u64 = 0;"));
    assert!(is_global_singleton("    pub static STORE: OnceLock<Store> = OnceLock::new();"));
    assert!(!is_global_singleton("pub const STREAM_DONE_SENTINEL: &str = \"[DONE]\";"));
    assert!(!is_global_singleton("let registry = Arc::new(Mutex::new(Registry::default()));"));
}
