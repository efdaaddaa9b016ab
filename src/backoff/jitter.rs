//! Jitter modes for retry delays.
//!
//! [`JitterMode`] randomizes a computed backoff delay so that several
//! runners retrying against the same pod do not hammer it in lockstep.
//!
//! - [`JitterMode::None`]: the delay is returned unchanged
//! - [`JitterMode::Full`]: uniform in `[0, t)`
//! - [`JitterMode::Centered`]: uniform in `[0.5t, 1.5t)`
//! - [`JitterMode::Small`]: uniform in `[0.75t, 1.25t)`
//!
//! Retry spacing is not security sensitive, so the random source is a
//! fast per-thread [`SmallRng`] seeded from entropy. Key material in
//! [`crate::crypto`] uses the OS generator instead.

use std::cell::RefCell;
use std::time::Duration;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

thread_local! {
    static JITTER_RNG: RefCell<SmallRng> = RefCell::new(SmallRng::from_entropy());
}

/// Randomization applied to a backoff delay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum JitterMode {
    /// Exact delay.
    #[default]
    None,
    /// Uniform in `[0, t)`.
    Full,
    /// Uniform in `[0.5t, 1.5t)`.
    Centered,
    /// Uniform in `[0.75t, 1.25t)`.
    Small,
}

impl JitterMode {
    /// Applies this jitter mode to `delay`.
    ///
    /// Results that would not fit in a [`Duration`] saturate to
    /// [`Duration::MAX`].
    pub fn apply(&self, delay: Duration) -> Duration {
        let (low, high) = match self {
            JitterMode::None => return delay,
            JitterMode::Full => (0.0, 1.0),
            JitterMode::Centered => (0.5, 1.5),
            JitterMode::Small => (0.75, 1.25),
        };
        if delay.is_zero() {
            return Duration::ZERO;
        }

        let factor = JITTER_RNG.with(|rng| rng.borrow_mut().gen_range(low..high));
        scale(delay, factor)
    }
}

/// Multiplies `delay` by a non-negative `factor`, saturating on overflow.
pub(crate) fn scale(delay: Duration, factor: f64) -> Duration {
    Duration::try_from_secs_f64(delay.as_secs_f64() * factor).unwrap_or(Duration::MAX)
}
