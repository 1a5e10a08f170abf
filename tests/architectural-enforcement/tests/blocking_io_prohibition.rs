//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: Async code in the auditor core and CLI MUST NOT use blocking I/O.
//! **Required**: `tokio::fs`, `tokio::net` and `reqwest` async calls.

use architectural_enforcement::{scan_workspace, workspace_root, PRODUCTION_DIRS};

#[test]
fn test_production_dirs_exist() {
    let root = workspace_root();
    for dir in PRODUCTION_DIRS {
        assert!(root.join(dir).is_dir(), "missing source dir {dir}");
    }
}

#[test]
fn test_no_blocking_io_in_production_code() {
    let violations = scan_workspace(&workspace_root());

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Blocking I/O calls found in production code!\n");

        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }

        eprintln!("\n❌ FORBIDDEN in async code:");
        eprintln!("  - std::fs::*, std::net::*, std::process::Command");
        eprintln!("  - reqwest::blocking::*");
        eprintln!("  - std::io::stdin(), std::io::stdout()");
        eprintln!("\n✅ ACCEPTABLE blocking I/O:");
        eprintln!("  - Non-async functions (configuration loading before the runtime)");
        eprintln!("  - Test code");

        panic!(
            "\nFound {} blocking I/O violation(s) in production code.\nFix these before merging!",
            violations.len()
        );
    }
}
