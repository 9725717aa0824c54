//! TOTP code derivation for GitHub's app-based two-factor prompt.
//!
//! GitHub authenticator enrollment hands out a base32 seed; the prompt
//! accepts the standard SHA-1 / 6-digit / 30-second code for it.

use anyhow::{Context, Result};
use std::time::{SystemTime, UNIX_EPOCH};
use totp_rs::{Algorithm, Secret, TOTP};

/// Code parameters GitHub uses: SHA-1, 6 digits, 30 s step, ±1 step skew.
fn totp_for_seed(seed: &str) -> Result<TOTP> {
    let secret_bytes = Secret::Encoded(seed.trim().to_string())
        .to_bytes()
        .map_err(|e| anyhow::anyhow!("invalid TOTP seed encoding: {:?}", e))?;

    TOTP::new(Algorithm::SHA1, 6, 1, 30, secret_bytes, None, String::new())
        .map_err(|e| anyhow::anyhow!("failed to create TOTP: {:?}", e))
}

/// The six-digit code for the current wall-clock time.
pub fn current_code(seed: &str) -> Result<String> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system time error")?
        .as_secs();
    code_at(seed, now)
}

/// The six-digit code at an explicit unix time.
pub fn code_at(seed: &str, unix_time: u64) -> Result<String> {
    Ok(totp_for_seed(seed)?.generate(unix_time))
}
