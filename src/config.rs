//! Run configuration.
//!
//! Values come from three layers: an optional TOML file, environment
//! variables, and CLI flags (flags win; see `Cli::apply_overrides` in
//! the binary).  The orchestrator receives the merged `Config` and
//! never touches the environment itself.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

/// Console address the flow logs into.
pub const DEFAULT_TARGET_URL: &str = "https://ap-northeast-1.run.claw.cloud/";

/// Screenshot of the final page state, relative to the working directory.
pub const DEFAULT_SCREENSHOT_PATH: &str = "login_result.png";

/// Configuration problems the flow cannot proceed past.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing GitHub credentials: set GH_USERNAME and GH_PASSWORD (or --username / --password)")]
    MissingCredentials,
    #[error("invalid target URL `{0}`")]
    InvalidTargetUrl(String),
    #[error("two-factor prompt detected but GH_2FA_SECRET is not configured")]
    TotpSeedMissing,
}

/// Telegram reporting target.  Reporting is optional; with either field
/// absent the outcome is only printed locally.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token (from @BotFather).
    pub bot_token: Option<String>,
    /// Chat the outcome message is sent to.
    pub chat_id: Option<String>,
}

impl TelegramConfig {
    pub fn is_configured(&self) -> bool {
        self.bot_token.as_deref().is_some_and(|v| !v.is_empty())
            && self.chat_id.as_deref().is_some_and(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// GitHub account name.
    pub username: Option<String>,
    /// GitHub account password.
    pub password: Option<String>,
    /// Base32 TOTP seed for the account's 2FA enrollment, if any.
    pub totp_seed: Option<String>,
    /// Telegram reporting target.
    pub telegram: TelegramConfig,
    /// Console address to log into.
    pub target_url: String,
    /// Where the final-page screenshot lands.
    pub screenshot_path: PathBuf,
    /// Run the browser with a visible window.
    pub headed: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            totp_seed: None,
            telegram: TelegramConfig::default(),
            target_url: DEFAULT_TARGET_URL.to_string(),
            screenshot_path: PathBuf::from(DEFAULT_SCREENSHOT_PATH),
            headed: false,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults
    /// when the file does not exist.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = path.unwrap_or_else(default_config_path);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// The required credential pair, or the error naming what is missing.
    pub fn credentials(&self) -> Result<(&str, &str), ConfigError> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => Ok((user, pass)),
            _ => Err(ConfigError::MissingCredentials),
        }
    }

    /// Check the invariants the login flow cannot start without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.credentials()?;
        Url::parse(&self.target_url)
            .map_err(|_| ConfigError::InvalidTargetUrl(self.target_url.clone()))?;
        Ok(())
    }
}

fn default_config_path() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".clawlogin").join("config.toml")
}
