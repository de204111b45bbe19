//! Reconnect countdown reporting.
//!
//! Read-only view over a pane's active backoff window, polled by the
//! controller while the pane waits to reconnect.

use serde::Serialize;

use crate::backoff::BackoffWindow;

/// Countdown state for status widgets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReconnectProgress {
    pub total_ms: u64,
    pub elapsed_ms: u64,
    pub remaining_ms: u64,
    /// Elapsed share of the window in `[0, 1]`.
    pub fraction: f64,
}

impl ReconnectProgress {
    /// Progress of `window` at `now_ms`. Clock skew before the start reads as 0.
    #[must_use]
    pub fn at(window: BackoffWindow, now_ms: u64) -> Self {
        let total_ms = window.delay_ms;
        let elapsed_ms = now_ms.saturating_sub(window.started_at_ms).min(total_ms);
        let remaining_ms = total_ms - elapsed_ms;
        let fraction = if total_ms == 0 {
            1.0
        } else {
            elapsed_ms as f64 / total_ms as f64
        };
        Self {
            total_ms,
            elapsed_ms,
            remaining_ms,
            fraction,
        }
    }

    /// Whole seconds left, rounded up, for "Reconnecting in Ns".
    #[must_use]
    pub fn remaining_secs(&self) -> u64 {
        self.remaining_ms.div_ceil(1_000)
    }

    #[must_use]
    pub fn status_text(&self) -> String {
        format!("Reconnecting in {}s", self.remaining_secs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(start: u64, delay: u64) -> BackoffWindow {
        BackoffWindow {
            started_at_ms: start,
            delay_ms: delay,
        }
    }

    #[test]
    fn midway() {
        let p = ReconnectProgress::at(window(1_000, 4_000), 2_000);
        assert_eq!(p.elapsed_ms, 1_000);
        assert_eq!(p.remaining_ms, 3_000);
        assert!((p.fraction - 0.25).abs() < f64::EPSILON);
        assert_eq!(p.status_text(), "Reconnecting in 3s");
    }

    #[test]
    fn clamps_past_deadline() {
        let p = ReconnectProgress::at(window(0, 1_000), 9_000);
        assert_eq!(p.remaining_ms, 0);
        assert_eq!(p.fraction, 1.0);
    }

    #[test]
    fn before_start_reads_zero() {
        let p = ReconnectProgress::at(window(5_000, 1_000), 4_000);
        assert_eq!(p.elapsed_ms, 0);
        assert_eq!(p.remaining_secs(), 1);
    }

    #[test]
    fn partial_seconds_round_up() {
        let p = ReconnectProgress::at(window(0, 1_500), 100);
        assert_eq!(p.remaining_secs(), 2);
    }
}
