//! Retry delay policies for the pgAdmin query runner.
//!
//! A [`BackoffPolicy`] maps a zero-based attempt number to the delay the
//! caller should sleep before trying again. Two policies are provided:
//!
//! - [`ExponentialBackoffPolicy`]: `base × ratio^attempt`, jittered, then
//!   clamped to an optional maximum
//! - [`SpecificBackoffPolicy`]: an explicit list of delays, clamped to its
//!   last entry
//!
//! Both carry a [`JitterMode`].

mod jitter;
mod policy;

use std::time::Duration;

pub use jitter::JitterMode;
pub use policy::{ExponentialBackoffPolicy, SpecificBackoffPolicy};

/// Computes the delay before retry `attempt`.
pub trait BackoffPolicy: Send + Sync {
    /// Delay for the given zero-based attempt.
    fn duration(&self, attempt: i32) -> Duration;
}

impl<P: BackoffPolicy + ?Sized> BackoffPolicy for Box<P> {
    fn duration(&self, attempt: i32) -> Duration {
        (**self).duration(attempt)
    }
}
