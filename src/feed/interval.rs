//! Adaptive poll-interval controller.
//!
//! Multiplicative increase/decrease: a check that finds nothing new stretches
//! the interval by `backoff`, a check that finds new items shrinks it by the
//! same factor. Both are computed from the time actually elapsed since the
//! previous check and clamped to `[min_ms, max_ms]`.

/// Bounds and step of the controller
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    pub min_ms: i64,
    pub max_ms: i64,
    pub backoff: f64,
}

impl PollPolicy {
    pub const DEFAULT_MIN_MS: i64 = 60_000;
    pub const DEFAULT_MAX_MS: i64 = 600_000;
    pub const DEFAULT_BACKOFF: f64 = 1.3;

    /// Next interval given the time since the previous check and whether this
    /// check produced new items.
    pub fn next_interval(&self, elapsed_ms: i64, updated: bool) -> i64 {
        let elapsed = elapsed_ms as f64;
        let raw = if updated {
            elapsed / self.backoff
        } else {
            elapsed * self.backoff
        };
        self.clamp(raw)
    }

    /// Clamp into bounds; NaN and negative inputs land on `min_ms`
    pub fn clamp(&self, raw: f64) -> i64 {
        if raw.is_nan() || raw <= self.min_ms as f64 {
            return self.min_ms;
        }
        if raw >= self.max_ms as f64 {
            return self.max_ms;
        }
        raw.round() as i64
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            min_ms: Self::DEFAULT_MIN_MS,
            max_ms: Self::DEFAULT_MAX_MS,
            backoff: Self::DEFAULT_BACKOFF,
        }
    }
}
