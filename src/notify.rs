//! Outcome reporting over the Telegram Bot API.
//!
//! One best-effort `sendMessage` POST per report, bounded by a client
//! timeout.  Transport problems are logged and swallowed so they can
//! never affect the login outcome.  No retries.

use crate::config::TelegramConfig;
use crate::theme as t;
use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Bound on the notification POST.
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome reporting seam.  The production implementation talks to
/// Telegram; tests record messages instead.
#[async_trait]
pub trait Notify: Send + Sync {
    /// Deliver one text message.  Errors are for `send_best_effort` to
    /// swallow.
    async fn send(&self, text: &str) -> Result<()>;

    /// Best-effort wrapper: failures are logged, never propagated.
    async fn send_best_effort(&self, text: &str) {
        if let Err(err) = self.send(text).await {
            eprintln!(
                "{}",
                t::icon_warn(&format!("notification not delivered: {err:#}"))
            );
        }
    }
}

/// Telegram Bot API notifier.
pub struct TelegramNotifier {
    bot_token: String,
    chat_id: String,
    http: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: String) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(SEND_TIMEOUT).build()?;
        Ok(Self {
            bot_token,
            chat_id,
            http,
        })
    }

    /// Build a notifier from config, or `None` when reporting is not
    /// set up.
    pub fn from_config(config: &TelegramConfig) -> Result<Option<Self>> {
        if !config.is_configured() {
            return Ok(None);
        }
        let bot_token = config.bot_token.clone().unwrap_or_default();
        let chat_id = config.chat_id.clone().unwrap_or_default();
        Ok(Some(Self::new(bot_token, chat_id)?))
    }

    fn api_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{}", self.bot_token, method)
    }
}

#[async_trait]
impl Notify for TelegramNotifier {
    async fn send(&self, text: &str) -> Result<()> {
        let resp = self
            .http
            .post(self.api_url("sendMessage"))
            .json(&serde_json::json!({
                "chat_id": self.chat_id,
                "text": text
            }))
            .send()
            .await?;

        if resp.status().is_success() {
            let data: serde_json::Value = resp.json().await?;
            if data["ok"].as_bool() == Some(true) {
                return Ok(());
            }
        }
        anyhow::bail!("Telegram send failed")
    }
}

/// Stand-in when `TG_BOT_TOKEN` / `TG_CHAT_ID` are absent: every report
/// is a logged skip.
pub struct DisabledNotifier;

#[async_trait]
impl Notify for DisabledNotifier {
    async fn send(&self, _text: &str) -> Result<()> {
        println!(
            "{}",
            t::icon_muted("TG_BOT_TOKEN / TG_CHAT_ID not set, skipping notification")
        );
        Ok(())
    }
}

/// Resolve the configured notifier, falling back to the disabled one.
pub fn from_config(config: &TelegramConfig) -> Result<Box<dyn Notify>> {
    Ok(match TelegramNotifier::from_config(config)? {
        Some(notifier) => Box::new(notifier),
        None => Box::new(DisabledNotifier),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_telegram_yields_none() {
        let notifier = TelegramNotifier::from_config(&TelegramConfig::default()).unwrap();
        assert!(notifier.is_none());
    }

    #[test]
    fn api_url_embeds_token_and_method() {
        let notifier = TelegramNotifier::new("123:abc".into(), "-100".into()).unwrap();
        assert_eq!(
            notifier.api_url("sendMessage"),
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
    }

    #[tokio::test]
    async fn disabled_notifier_swallows_everything() {
        DisabledNotifier.send_best_effort("ignored").await;
    }
}
