//! Terminal theme & spinner helpers.
//!
//! Small truecolor palette for the login flow's step output.  Respects
//! the `NO_COLOR` env-var and the `--no-color` CLI flag.
//!
//! # Palette
//!
//! | Token   | Hex       | Usage                          |
//! |---------|-----------|--------------------------------|
//! | accent  | `#2D7FF9` | headings, labels               |
//! | info    | `#5BA8FF` | informational values           |
//! | success | `#2FBF71` | success states                 |
//! | warn    | `#FFB020` | warnings, tolerated failures   |
//! | error   | `#E23D2D` | errors, failures               |
//! | muted   | `#8B8F96` | de-emphasis, metadata          |

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

// ── Global color toggle ─────────────────────────────────────────────────────

static COLOR_DISABLED: AtomicBool = AtomicBool::new(false);

/// Call once at startup (after CLI parsing) to disable colour globally.
pub fn disable_color() {
    COLOR_DISABLED.store(true, Ordering::Relaxed);
    colored::control::set_override(false);
}

/// Initialise the colour system.  Checks `NO_COLOR` env-var and optional
/// `--no-color` flag.
pub fn init_color(no_color_flag: bool) {
    if no_color_flag
        || std::env::var("NO_COLOR")
            .map(|v| !v.is_empty())
            .unwrap_or(false)
    {
        disable_color();
    }
}

fn is_color() -> bool {
    !COLOR_DISABLED.load(Ordering::Relaxed)
}

// ── Palette ─────────────────────────────────────────────────────────────────

pub mod palette {
    pub const ACCENT: (u8, u8, u8) = (0x2D, 0x7F, 0xF9);
    pub const INFO: (u8, u8, u8) = (0x5B, 0xA8, 0xFF);
    pub const SUCCESS: (u8, u8, u8) = (0x2F, 0xBF, 0x71);
    pub const WARN: (u8, u8, u8) = (0xFF, 0xB0, 0x20);
    pub const ERROR: (u8, u8, u8) = (0xE2, 0x3D, 0x2D);
    pub const MUTED: (u8, u8, u8) = (0x8B, 0x8F, 0x96);
}

// ── Themed formatting helpers ───────────────────────────────────────────────
//
// Each function returns a `String` so callers can `println!("{}", warn("…"))`.

fn apply(text: &str, rgb: (u8, u8, u8)) -> String {
    if is_color() {
        text.truecolor(rgb.0, rgb.1, rgb.2).to_string()
    } else {
        text.to_string()
    }
}

fn apply_bold(text: &str, rgb: (u8, u8, u8)) -> String {
    if is_color() {
        text.truecolor(rgb.0, rgb.1, rgb.2).bold().to_string()
    } else {
        text.to_string()
    }
}

/// Primary accent (headings, labels).
pub fn accent(text: &str) -> String {
    apply(text, palette::ACCENT)
}

/// Informational values.
pub fn info(text: &str) -> String {
    apply(text, palette::INFO)
}

/// Success state.
pub fn success(text: &str) -> String {
    apply(text, palette::SUCCESS)
}

/// Warning / attention.
pub fn warn(text: &str) -> String {
    apply(text, palette::WARN)
}

/// Error / failure.
pub fn error(text: &str) -> String {
    apply(text, palette::ERROR)
}

/// De-emphasis / metadata.
pub fn muted(text: &str) -> String {
    apply(text, palette::MUTED)
}

/// Bold heading in accent colour.
pub fn heading(text: &str) -> String {
    apply_bold(text, palette::ACCENT)
}

// ── Composite icons ─────────────────────────────────────────────────────────

/// Green ✓
pub fn icon_ok(label: &str) -> String {
    format!("{} {}", success("✓"), label)
}

/// Red ✗
pub fn icon_fail(label: &str) -> String {
    format!("{} {}", error("✗"), label)
}

/// Yellow ⚠
pub fn icon_warn(label: &str) -> String {
    format!("{} {}", warn("⚠"), label)
}

/// Muted dot ·
pub fn icon_muted(label: &str) -> String {
    format!("{} {}", muted("·"), muted(label))
}

// ── Labelled key : value ────────────────────────────────────────────────────

/// Format "  Label : value" with the label dimmed and the value in info.
pub fn label_value(label: &str, value: &str) -> String {
    format!("  {} : {}", muted(label), info(value))
}

// ── Spinner helpers ─────────────────────────────────────────────────────────

const SPINNER_CHARS: &[&str] = &["◒", "◐", "◓", "◑"];

/// Create an indeterminate spinner with a message.
///
/// Returns a `ProgressBar` the caller should call `.finish_with_message()`
/// or `.finish_and_clear()` on when done.
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = if is_color() {
        ProgressStyle::with_template("{spinner:.blue}  {msg}")
            .unwrap()
            .tick_strings(SPINNER_CHARS)
    } else {
        ProgressStyle::with_template("{spinner}  {msg}")
            .unwrap()
            .tick_strings(SPINNER_CHARS)
    };
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Finish a spinner with a success icon + message.
pub fn spinner_ok(pb: &ProgressBar, message: &str) {
    pb.finish_with_message(icon_ok(message));
}

/// Finish a spinner with a failure icon + message.
pub fn spinner_fail(pb: &ProgressBar, message: &str) {
    pb.finish_with_message(icon_fail(message));
}

/// Finish a spinner with a warning icon + message.
pub fn spinner_warn(pb: &ProgressBar, message: &str) {
    pb.finish_with_message(icon_warn(message));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn icons_carry_label() {
        assert!(icon_ok("done").contains("done"));
        assert!(icon_fail("broken").contains("broken"));
        assert!(icon_warn("careful").contains("careful"));
    }

    #[test]
    fn label_value_joins_parts() {
        disable_color();
        assert_eq!(label_value("Target", "https://x"), "  Target : https://x");
    }
}
