//! Jitter strategies to prevent thundering herd
//!
//! When to use which strategy:
//! - `None`: deterministic retries for tests or tightly controlled workflows.
//! - `Full`: uniform in `[0, delay]`, good default to spread load.
//! - `Equal`: uniform in `[delay/2, delay]`, keeps a floor while adding randomness.
//! - `Bounded(range)`: adds a uniform offset in `[-range, +range]` in 100ms steps, floored at
//!   zero.
//!
//! [`DecorrelatedJitter`] is a delay handler of its own: it grows from the `previous_delay`
//! recorded in the retry state, so it needs no internal state.
//!
//! Notes:
//! - RNG: uses `rand`'s thread-local RNG by default; deterministic RNGs can be injected via
//!   `apply_with_rng` / `sample_with_rng`.
//! - Precision: `Full` and `Equal` work in nanoseconds; `Bounded` and decorrelated steps work
//!   in milliseconds. Conversions saturate to `u64::MAX` to avoid panics on very large
//!   durations.

use crate::backoff::BackoffError;
use crate::delay::Delay;
use crate::handler::{Args, Handler, HandlerError};
use crate::signature::Signature;
use crate::state;
use rand::{rng, Rng};
use std::time::Duration;

fn as_millis_saturated(duration: Duration) -> u64 {
    duration.as_millis().try_into().unwrap_or(u64::MAX)
}

fn as_nanos_saturated(duration: Duration) -> u64 {
    duration.as_nanos().try_into().unwrap_or(u64::MAX)
}

/// Jitter strategy for randomizing retry delays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Jitter {
    /// No jitter - use exact backoff delay
    #[default]
    None,
    /// Full jitter: random between 0 and delay
    Full,
    /// Equal jitter: random between delay/2 and delay
    Equal,
    /// Random offset of up to the given range in either direction
    Bounded(Duration),
}

impl Jitter {
    pub fn full() -> Self {
        Jitter::Full
    }

    pub fn equal() -> Self {
        Jitter::Equal
    }

    pub fn bounded(range: Duration) -> Self {
        Jitter::Bounded(range)
    }

    /// Apply jitter to a delay duration
    pub fn apply(&self, delay: Duration) -> Duration {
        self.apply_with_rng(delay, &mut rng())
    }

    /// Apply jitter with a custom RNG (for testing)
    pub fn apply_with_rng<R: Rng>(&self, delay: Duration, rng: &mut R) -> Duration {
        match self {
            Jitter::None => delay,
            Jitter::Full => {
                let nanos = as_nanos_saturated(delay);
                if nanos == 0 {
                    return Duration::ZERO;
                }
                Duration::from_nanos(rng.random_range(0..=nanos))
            }
            Jitter::Equal => {
                let nanos = as_nanos_saturated(delay);
                if nanos == 0 {
                    return Duration::ZERO;
                }
                let half = nanos - nanos / 2;
                Duration::from_nanos(rng.random_range(half..=nanos))
            }
            Jitter::Bounded(range) => {
                let steps = i64::try_from(as_millis_saturated(*range) / 100).unwrap_or(i64::MAX);
                if steps == 0 {
                    return delay;
                }
                let offset = i128::from(rng.random_range(-steps..=steps)) * 100_000_000;
                let jittered = (i128::from(as_nanos_saturated(delay)) + offset).max(0);
                Duration::from_nanos(u64::try_from(jittered).unwrap_or(u64::MAX))
            }
        }
    }
}

/// AWS-style decorrelated jitter: `min(max, uniform(base, previous_delay * 3))`.
///
/// The first retry, with no previous delay recorded, grows from `base`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecorrelatedJitter {
    base: Duration,
    max: Duration,
}

impl DecorrelatedJitter {
    pub fn new(base: Duration, max: Duration) -> Result<Self, BackoffError> {
        if base > max {
            return Err(BackoffError::MaxLessThanBase { base, max });
        }
        Ok(Self { base, max })
    }

    /// Next delay given the previous one.
    pub fn sample_with_rng<R: Rng>(&self, previous: Duration, rng: &mut R) -> Duration {
        let base_millis = as_millis_saturated(self.base);
        let max_millis = as_millis_saturated(self.max);
        let prev_millis =
            if previous.is_zero() { base_millis } else { as_millis_saturated(previous) };

        // upper bound grows from previous sleep, capped by max
        let upper = prev_millis.saturating_mul(3).min(max_millis);
        // lower bound keeps floor at base but never exceeds upper (handles tiny prev)
        let lower = base_millis.min(upper);

        Duration::from_millis(rng.random_range(lower..=upper))
    }
}

impl<E> Handler<E> for DecorrelatedJitter {
    type Output = Delay;

    fn signature(&self) -> Signature {
        Signature::named([state::PREVIOUS_DELAY])
    }

    fn handle(&self, _error: &E, args: &Args) -> Result<Delay, HandlerError> {
        let previous = args.get_or(state::PREVIOUS_DELAY, Delay::ZERO)?;
        let previous = previous.to_wait().unwrap_or(self.base);
        Ok(Delay::Duration(self.sample_with_rng(previous, &mut rng())))
    }
}
