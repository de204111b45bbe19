#![forbid(unsafe_code)]

//! Reconnect backoff with jitter.
//!
//! Each consecutive failure doubles the base delay from `floor_ms` up to
//! `ceiling_ms`. The concrete wait is the base scaled by a uniform factor in
//! `[1 - jitter_ratio, 1 + jitter_ratio]`, then clamped back up to the floor,
//! so panes that drop together do not all reconnect in the same instant.
//!
//! ```
//! use paneterm_client::backoff::ReconnectBackoff;
//! use paneterm_client::config::BackoffConfig;
//! use rand::SeedableRng;
//! use rand::rngs::SmallRng;
//!
//! let mut rng = SmallRng::seed_from_u64(7);
//! let mut backoff = ReconnectBackoff::new(&BackoffConfig::default());
//! let first = backoff.schedule(0, &mut rng);
//! assert!((1_000..=1_200).contains(&first.delay_ms));
//! assert_eq!(backoff.base_ms(), 2_000);
//! ```

use rand::Rng;

use crate::config::BackoffConfig;

/// An armed reconnect countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffWindow {
    pub started_at_ms: u64,
    pub delay_ms: u64,
}

impl BackoffWindow {
    #[must_use]
    pub fn deadline_ms(&self) -> u64 {
        self.started_at_ms.saturating_add(self.delay_ms)
    }
}

/// Per-pane backoff state.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectBackoff {
    floor_ms: u64,
    ceiling_ms: u64,
    jitter_ratio: f64,
    base_ms: u64,
    failures: u32,
    window: Option<BackoffWindow>,
}

impl ReconnectBackoff {
    #[must_use]
    pub fn new(config: &BackoffConfig) -> Self {
        let floor_ms = config.floor_ms.max(1);
        Self {
            floor_ms,
            ceiling_ms: config.ceiling_ms.max(floor_ms),
            jitter_ratio: config.jitter_ratio.clamp(0.0, 0.99),
            base_ms: floor_ms,
            failures: 0,
            window: None,
        }
    }

    /// Base delay the next failure will use, before jitter.
    #[must_use]
    pub fn base_ms(&self) -> u64 {
        self.base_ms
    }

    /// Consecutive failures since the last reset.
    #[must_use]
    pub fn failures(&self) -> u32 {
        self.failures
    }

    #[must_use]
    pub fn window(&self) -> Option<BackoffWindow> {
        self.window
    }

    /// Back to the floor; called after a successful attach.
    pub fn reset(&mut self) {
        self.base_ms = self.floor_ms;
        self.failures = 0;
        self.window = None;
    }

    /// Forget the active countdown without touching the multiplier.
    pub fn clear_window(&mut self) {
        self.window = None;
    }

    /// Record a failure and arm a countdown starting at `now_ms`.
    pub fn schedule<R: Rng>(&mut self, now_ms: u64, rng: &mut R) -> BackoffWindow {
        let delay_ms = self.jittered(self.base_ms, rng);
        self.failures = self.failures.saturating_add(1);
        self.base_ms = self.base_ms.saturating_mul(2).min(self.ceiling_ms);
        let window = BackoffWindow {
            started_at_ms: now_ms,
            delay_ms,
        };
        self.window = Some(window);
        window
    }

    fn jittered<R: Rng>(&self, base_ms: u64, rng: &mut R) -> u64 {
        let factor = if self.jitter_ratio > 0.0 {
            rng.random_range(-self.jitter_ratio..=self.jitter_ratio)
        } else {
            0.0
        };
        let delay = (base_ms as f64 * (1.0 + factor)).round() as u64;
        delay.max(self.floor_ms)
    }
}
