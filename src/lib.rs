pub mod browser;
pub mod config;
pub mod login;
pub mod notify;
pub mod theme;
pub mod totp;
pub mod wait;

// Re-export the orchestration types at crate root for convenience
pub use config::{Config, ConfigError};
pub use login::{LoginFlow, Outcome, PageDriver};
pub use notify::{Notify, TelegramNotifier};
