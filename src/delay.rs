//! Delay values produced by delay handlers.
//!
//! A [`Delay`] is either a number of seconds (which may be fractional or negative) or a
//! [`Duration`]. The retry engine keeps the value a handler returned in
//! [`RetryState::previous_delay`](crate::RetryState::previous_delay) and converts it to a
//! wait with [`Delay::to_wait`]:
//! - negative seconds clamp to a zero wait,
//! - NaN, infinities and values too large for a `Duration` are contract violations.
//!
//! Example
//! ```rust
//! use encore::Delay;
//! use std::time::Duration;
//!
//! assert_eq!(Delay::secs(1.5).to_wait().unwrap(), Duration::from_millis(1500));
//! assert_eq!(Delay::secs(-3.0).to_wait().unwrap(), Duration::ZERO);
//! assert!(Delay::secs(f64::NAN).to_wait().is_err());
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// Raised when a delay cannot be turned into a wait.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DelayError {
    #[error("delay must be a finite number of seconds (got {0})")]
    NotFinite(f64),
    #[error("delay of {0} seconds does not fit in a duration")]
    OutOfRange(f64),
}

/// Time to wait before the next attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Delay {
    /// Seconds as a float; negative values clamp to zero when waited on.
    Seconds(f64),
    /// An exact duration.
    Duration(Duration),
}

impl Delay {
    /// No wait.
    pub const ZERO: Delay = Delay::Seconds(0.0);

    /// Delay of `secs` seconds.
    pub fn secs(secs: f64) -> Self {
        Delay::Seconds(secs)
    }

    /// Delay of `millis` milliseconds.
    pub fn millis(millis: u64) -> Self {
        Delay::Duration(Duration::from_millis(millis))
    }

    /// The delay in seconds, without clamping or validation.
    pub fn as_secs_f64(&self) -> f64 {
        match self {
            Delay::Seconds(secs) => *secs,
            Delay::Duration(d) => d.as_secs_f64(),
        }
    }

    /// Convert to the wait the engine performs.
    pub fn to_wait(&self) -> Result<Duration, DelayError> {
        match *self {
            Delay::Duration(d) => Ok(d),
            Delay::Seconds(secs) if !secs.is_finite() => Err(DelayError::NotFinite(secs)),
            Delay::Seconds(secs) if secs <= 0.0 => Ok(Duration::ZERO),
            Delay::Seconds(secs) => {
                Duration::try_from_secs_f64(secs).map_err(|_| DelayError::OutOfRange(secs))
            }
        }
    }
}

impl Default for Delay {
    fn default() -> Self {
        Delay::ZERO
    }
}

impl fmt::Display for Delay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delay::Seconds(secs) => write!(f, "{}s", secs),
            Delay::Duration(d) => write!(f, "{:?}", d),
        }
    }
}

impl From<Duration> for Delay {
    fn from(d: Duration) -> Self {
        Delay::Duration(d)
    }
}

impl From<f64> for Delay {
    fn from(secs: f64) -> Self {
        Delay::Seconds(secs)
    }
}

impl From<u32> for Delay {
    fn from(secs: u32) -> Self {
        Delay::Seconds(f64::from(secs))
    }
}

impl From<i32> for Delay {
    fn from(secs: i32) -> Self {
        Delay::Seconds(f64::from(secs))
    }
}

impl From<u64> for Delay {
    fn from(secs: u64) -> Self {
        Delay::Seconds(secs as f64)
    }
}

impl From<i64> for Delay {
    fn from(secs: i64) -> Self {
        Delay::Seconds(secs as f64)
    }
}

// Serialized delays are plain seconds; `RetryState` binds durations in their own form.
impl Serialize for Delay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_secs_f64())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DelayRepr {
    Seconds(f64),
    Duration(Duration),
}

impl<'de> Deserialize<'de> for Delay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match DelayRepr::deserialize(deserializer)? {
            DelayRepr::Seconds(secs) => Delay::Seconds(secs),
            DelayRepr::Duration(d) => Delay::Duration(d),
        })
    }
}
