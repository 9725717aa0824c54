use anyhow::Result;
use clap::{ArgAction, Parser};
use clawlogin::browser::BrowserSession;
use clawlogin::config::Config;
use clawlogin::login::LoginFlow;
use clawlogin::notify;
use clawlogin::theme as t;
use std::path::PathBuf;

// ── CLI ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(
    name = "clawlogin",
    version,
    about = "Log into the ClawCloud Run console via GitHub, with TOTP 2FA and Telegram reporting"
)]
struct Cli {
    /// GitHub account name
    #[arg(long, value_name = "USER", env = "GH_USERNAME")]
    username: Option<String>,

    /// GitHub account password
    #[arg(long, value_name = "PASSWORD", env = "GH_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Base32 TOTP seed for the account's 2FA enrollment
    #[arg(long, value_name = "SEED", env = "GH_2FA_SECRET", hide_env_values = true)]
    totp_seed: Option<String>,

    /// Telegram bot token for outcome reporting
    #[arg(long, value_name = "TOKEN", env = "TG_BOT_TOKEN", hide_env_values = true)]
    tg_bot_token: Option<String>,

    /// Telegram chat the outcome message goes to
    #[arg(long, value_name = "CHAT", env = "TG_CHAT_ID")]
    tg_chat_id: Option<String>,

    /// Console address to log into
    #[arg(long, value_name = "URL")]
    target: Option<String>,

    /// Where to write the final-page screenshot
    #[arg(long, value_name = "PATH")]
    screenshot: Option<PathBuf>,

    /// Path to a config.toml file
    #[arg(short = 'c', long, value_name = "PATH", env = "CLAWLOGIN_CONFIG")]
    config: Option<PathBuf>,

    /// Run the browser with a visible window
    #[arg(long, action = ArgAction::SetTrue)]
    headed: bool,

    /// Disable coloured terminal output
    #[arg(long = "no-color", action = ArgAction::SetTrue, env = "NO_COLOR")]
    no_color: bool,
}

impl Cli {
    /// CLI flags and env values win over the config file.
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(username) = &self.username {
            config.username = Some(username.clone());
        }
        if let Some(password) = &self.password {
            config.password = Some(password.clone());
        }
        if let Some(totp_seed) = &self.totp_seed {
            config.totp_seed = Some(totp_seed.clone());
        }
        if let Some(bot_token) = &self.tg_bot_token {
            config.telegram.bot_token = Some(bot_token.clone());
        }
        if let Some(chat_id) = &self.tg_chat_id {
            config.telegram.chat_id = Some(chat_id.clone());
        }
        if let Some(target) = &self.target {
            config.target_url = target.clone();
        }
        if let Some(screenshot) = &self.screenshot {
            config.screenshot_path = screenshot.clone();
        }
        if self.headed {
            config.headed = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    t::init_color(cli.no_color);

    let mut config = Config::load(cli.config.clone())?;
    cli.apply_overrides(&mut config);

    let notifier = notify::from_config(&config.telegram)?;
    let flow = LoginFlow::new(&config, notifier.as_ref());

    let headed = config.headed;
    let outcome = flow
        .run(|| async move { BrowserSession::launch(headed).await?.open().await })
        .await?;

    let code = outcome.exit_code();
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
