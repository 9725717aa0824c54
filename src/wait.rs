//! Bounded condition waits.
//!
//! The flow never sleeps a fixed duration and hopes for the best: every
//! wait is a deadline loop that re-checks a page condition at a short
//! interval and gives up once the budget is spent.

use std::time::Duration;
use tokio::time::Instant;

/// Delay between condition checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);
/// Overall budget when the caller does not pick one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timing parameters for one wait.
#[derive(Debug, Clone, Copy)]
pub struct WaitConfig {
    /// Overall budget for the condition to hold.
    pub timeout: Duration,
    /// Delay between checks.
    pub poll_interval: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl WaitConfig {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }

    /// Default poll interval under the given budget.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    pub fn deadline(self) -> Deadline {
        Deadline::new(self)
    }
}

/// Poll driver for one wait.
///
/// The first `tick` fires immediately; later ones sleep `poll_interval`
/// (clamped to the remaining budget) and `tick` returns `false` once
/// the budget is spent.
///
/// ```ignore
/// let mut deadline = WaitConfig::with_timeout(Duration::from_secs(15)).deadline();
/// while deadline.tick().await {
///     if page.current_url().await?.contains("github.com") {
///         break;
///     }
/// }
/// ```
#[derive(Debug)]
pub struct Deadline {
    end: Instant,
    poll_interval: Duration,
    started: bool,
}

impl Deadline {
    pub fn new(cfg: WaitConfig) -> Self {
        Self {
            end: Instant::now() + cfg.timeout,
            poll_interval: cfg.poll_interval,
            started: false,
        }
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.end
    }

    /// Advance to the next check. `true` means "check the condition now".
    pub async fn tick(&mut self) -> bool {
        if !self.started {
            self.started = true;
            return true;
        }
        let now = Instant::now();
        if now >= self.end {
            return false;
        }
        let sleep_for = self.poll_interval.min(self.end - now);
        tokio::time::sleep(sleep_for).await;
        !self.expired()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn first_tick_is_immediate() {
        let mut deadline = WaitConfig::with_timeout(Duration::from_secs(1)).deadline();
        let before = Instant::now();
        assert!(deadline.tick().await);
        assert_eq!(Instant::now(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_stop_at_the_deadline() {
        let cfg = WaitConfig::new(Duration::from_secs(1), Duration::from_millis(250));
        let mut deadline = cfg.deadline();
        let mut ticks = 0;
        while deadline.tick().await {
            ticks += 1;
        }
        // t = 0ms, 250ms, 500ms, 750ms; the fifth check lands on the
        // deadline and is refused.
        assert_eq!(ticks, 4);
        assert!(deadline.expired());
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_is_clamped_to_the_budget() {
        let cfg = WaitConfig::new(Duration::from_millis(100), Duration::from_secs(60));
        let mut deadline = cfg.deadline();
        assert!(deadline.tick().await);
        let before = Instant::now();
        assert!(!deadline.tick().await);
        assert!(Instant::now() - before <= Duration::from_millis(100));
    }
}
