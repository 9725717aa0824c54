//! Exit code conformance tests.
//!
//! Conventions used by the binary:
//! 0   - login succeeded
//! 1   - login failed (classifier rejected the final page state)
//! 2   - clap usage error
//! 78  - configuration error (EX_CONFIG from sysexits.h)

use std::path::PathBuf;
use std::process::Command;

/// Get the clawlogin binary path
fn binary_path() -> PathBuf {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string());

    let debug = PathBuf::from(&manifest_dir).join("target/debug/clawlogin");
    if debug.exists() {
        return debug;
    }

    PathBuf::from(&manifest_dir).join("target/release/clawlogin")
}

/// Run clawlogin with a scrubbed credential environment.
fn exit_code(args: &[&str]) -> i32 {
    let output = Command::new(binary_path())
        .args(args)
        .env_remove("GH_USERNAME")
        .env_remove("GH_PASSWORD")
        .env_remove("GH_2FA_SECRET")
        .env_remove("TG_BOT_TOKEN")
        .env_remove("TG_CHAT_ID")
        .env("CLAWLOGIN_CONFIG", "/nonexistent/config.toml")
        .output()
        .expect("Failed to execute clawlogin");

    output.status.code().unwrap_or(-1)
}

#[test]
#[ignore = "requires built binary"]
fn help_exits_zero() {
    assert_eq!(exit_code(&["--help"]), 0);
}

#[test]
#[ignore = "requires built binary"]
fn version_exits_zero() {
    assert_eq!(exit_code(&["--version"]), 0);
}

#[test]
#[ignore = "requires built binary"]
fn missing_credentials_exit_with_config_error() {
    // No credentials anywhere: the run must refuse before launching a
    // browser and report EX_CONFIG.
    assert_eq!(exit_code(&[]), 78);
}

#[test]
#[ignore = "requires built binary"]
fn unknown_flag_is_a_usage_error() {
    let code = exit_code(&["--definitely-not-a-flag"]);
    assert_ne!(code, 0, "unknown flag should fail");
    assert_eq!(code, 2, "clap reports usage errors as 2");
}
