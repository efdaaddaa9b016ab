//! Concrete backoff policies.

use std::time::Duration;

use super::BackoffPolicy;
use super::jitter::{JitterMode, scale};

/// Explicit sequence of delays.
///
/// Attempts past the end of the sequence reuse the last entry. An empty
/// sequence, or a negative attempt, yields a zero delay.
///
/// ```rust
/// use std::time::Duration;
/// use pgadmin_provisioner::backoff::{BackoffPolicy, SpecificBackoffPolicy};
///
/// let policy = SpecificBackoffPolicy::new(vec![Duration::from_secs(1), Duration::from_secs(8)]);
/// assert_eq!(policy.duration(0), Duration::from_secs(1));
/// assert_eq!(policy.duration(7), Duration::from_secs(8));
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpecificBackoffPolicy {
    /// Delays indexed by attempt.
    pub times: Vec<Duration>,
    /// Jitter applied to the selected delay.
    pub jitter: JitterMode,
}

impl SpecificBackoffPolicy {
    /// Policy without jitter.
    pub fn new(times: Vec<Duration>) -> Self {
        Self {
            times,
            jitter: JitterMode::None,
        }
    }

    /// Sets the jitter mode.
    pub fn with_jitter(mut self, jitter: JitterMode) -> Self {
        self.jitter = jitter;
        self
    }
}

impl BackoffPolicy for SpecificBackoffPolicy {
    fn duration(&self, attempt: i32) -> Duration {
        let Ok(index) = usize::try_from(attempt) else {
            return Duration::ZERO;
        };
        let selected = self
            .times
            .get(index)
            .or_else(|| self.times.last())
            .copied()
            .unwrap_or(Duration::ZERO);
        self.jitter.apply(selected)
    }
}

/// Exponentially growing delay: `base × ratio^attempt`.
///
/// Jitter is applied to the computed delay first and the result is then
/// clamped to [`maximum`](Self::maximum). A zero maximum means unbounded.
///
/// ```rust
/// use std::time::Duration;
/// use pgadmin_provisioner::backoff::{BackoffPolicy, ExponentialBackoffPolicy, JitterMode};
///
/// let policy = ExponentialBackoffPolicy {
///     base: Duration::from_millis(10),
///     ratio: 2.0,
///     maximum: Duration::ZERO,
///     jitter: JitterMode::None,
/// };
/// assert_eq!(policy.duration(3), Duration::from_millis(80));
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExponentialBackoffPolicy {
    /// Delay for attempt zero.
    pub base: Duration,
    /// Growth factor per attempt.
    pub ratio: f64,
    /// Upper bound applied after jitter; zero disables it.
    pub maximum: Duration,
    /// Jitter applied before the maximum clamp.
    pub jitter: JitterMode,
}

impl Default for ExponentialBackoffPolicy {
    /// 35ms base growing by 1.5× per attempt with small jitter, capped at 2s.
    fn default() -> Self {
        Self {
            base: Duration::from_millis(35),
            ratio: 1.5,
            maximum: Duration::from_secs(2),
            jitter: JitterMode::Small,
        }
    }
}

impl BackoffPolicy for ExponentialBackoffPolicy {
    fn duration(&self, attempt: i32) -> Duration {
        let factor = self.ratio.powi(attempt);
        let delay = if !factor.is_finite() {
            Duration::MAX
        } else if factor <= 0.0 {
            Duration::ZERO
        } else {
            scale(self.base, factor)
        };

        let jittered = self.jitter.apply(delay);
        if !self.maximum.is_zero() && jittered > self.maximum {
            return self.maximum;
        }
        jittered
    }
}
