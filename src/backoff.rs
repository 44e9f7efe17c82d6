//! Backoff delay handlers.
//!
//! [`Backoff`] computes its delay from the `attempt` state field: the attempt that just
//! failed. Attempt `1` (the first failure) yields the base delay. Strategies:
//! - constant: `base` every time,
//! - linear: `base * attempt`,
//! - exponential: `base * factor^(attempt - 1)`, factor 2 unless configured.
//!
//! Linear and exponential strategies accept a cap, and any strategy can add [`Jitter`].
//! Computations that would overflow saturate to [`MAX_BACKOFF`] (1 day).
//!
//! Example
//! ```rust
//! use std::time::Duration;
//! use encore::Backoff;
//!
//! let backoff = Backoff::exponential(Duration::from_millis(100))
//!     .with_max(Duration::from_secs(2))
//!     .unwrap();
//! assert_eq!(backoff.delay(0), Duration::from_millis(0)); // no failure yet
//! assert_eq!(backoff.delay(1), Duration::from_millis(100));
//! assert_eq!(backoff.delay(2), Duration::from_millis(200));
//! assert_eq!(backoff.delay(6), Duration::from_secs(2)); // capped
//! ```

use crate::delay::Delay;
use crate::handler::{Args, Handler, HandlerError};
use crate::jitter::Jitter;
use crate::signature::Signature;
use crate::state;
use std::time::Duration;

/// Maximum delay used when calculations overflow (1 day).
pub const MAX_BACKOFF: Duration = Duration::from_secs(24 * 60 * 60);

/// Errors returned by backoff configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackoffError {
    #[error("with_max is only valid for Linear or Exponential backoff")]
    ConstantDoesNotSupportMax,
    #[error("max must be greater than zero")]
    MaxMustBePositive,
    #[error("max ({max:?}) must be >= base ({base:?})")]
    MaxLessThanBase { base: Duration, max: Duration },
    #[error("with_factor is only valid for Exponential backoff")]
    FactorRequiresExponential,
    #[error("exponential factor must be at least 1 (got {0})")]
    InvalidFactor(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Strategy {
    Constant { delay: Duration },
    Linear { base: Duration, max: Option<Duration> },
    Exponential { base: Duration, factor: u32, max: Option<Duration> },
}

impl Strategy {
    fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        match self {
            Strategy::Constant { delay } => *delay,
            Strategy::Linear { base, max } => {
                let linear = base.checked_mul(attempt).unwrap_or(MAX_BACKOFF);
                let capped = max.map(|m| linear.min(m)).unwrap_or(linear);
                capped.min(MAX_BACKOFF)
            }
            Strategy::Exponential { base, factor, max } => {
                let multiplier = u128::from(*factor).saturating_pow(attempt - 1);
                let nanos = base.as_nanos().saturating_mul(multiplier);
                let exp_delay = Duration::from_nanos(nanos.min(MAX_BACKOFF.as_nanos()) as u64);
                let capped = max.map(|m| exp_delay.min(m)).unwrap_or(exp_delay);
                capped.min(MAX_BACKOFF)
            }
        }
    }
}

/// Backoff strategy usable as a delay handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    strategy: Strategy,
    jitter: Jitter,
}

impl Backoff {
    /// Create a constant backoff strategy
    pub fn constant(delay: Duration) -> Self {
        Self { strategy: Strategy::Constant { delay }, jitter: Jitter::None }
    }

    /// Create a linear backoff strategy
    pub fn linear(base: Duration) -> Self {
        Self { strategy: Strategy::Linear { base, max: None }, jitter: Jitter::None }
    }

    /// Create an exponential backoff strategy doubling on every failure
    pub fn exponential(base: Duration) -> Self {
        Self {
            strategy: Strategy::Exponential { base, factor: 2, max: None },
            jitter: Jitter::None,
        }
    }

    /// Set the growth factor of an exponential backoff.
    pub fn with_factor(mut self, factor: u32) -> Result<Self, BackoffError> {
        if factor == 0 {
            return Err(BackoffError::InvalidFactor(factor));
        }
        match &mut self.strategy {
            Strategy::Exponential { factor: existing, .. } => {
                *existing = factor;
                Ok(self)
            }
            _ => Err(BackoffError::FactorRequiresExponential),
        }
    }

    /// Set a maximum delay for the backoff (linear or exponential).
    /// Returns an error if called on `Constant`, if `max` is zero, or if `max < base`.
    pub fn with_max(mut self, max: Duration) -> Result<Self, BackoffError> {
        if max.is_zero() {
            return Err(BackoffError::MaxMustBePositive);
        }
        match &mut self.strategy {
            Strategy::Linear { base, max: existing }
            | Strategy::Exponential { base, max: existing, .. } => {
                if max < *base {
                    return Err(BackoffError::MaxLessThanBase { base: *base, max });
                }
                *existing = Some(max);
                Ok(self)
            }
            Strategy::Constant { .. } => Err(BackoffError::ConstantDoesNotSupportMax),
        }
    }

    /// Randomize every computed delay.
    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before the retry that follows failed attempt `attempt`, before jitter.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.strategy.delay(attempt)
    }
}

impl<E> Handler<E> for Backoff {
    type Output = Delay;

    fn signature(&self) -> Signature {
        Signature::named([state::ATTEMPT])
    }

    fn handle(&self, _error: &E, args: &Args) -> Result<Delay, HandlerError> {
        let attempt = args.attempt()?;
        Ok(Delay::Duration(self.jitter.apply(self.delay(attempt))))
    }
}
