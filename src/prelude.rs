//! Convenient re-exports for common encore types.
pub use crate::{
    backoff::{Backoff, BackoffError, MAX_BACKOFF},
    classify::{Classification, ErrorMatcher},
    config::RetryConfig,
    delay::Delay,
    error::RetryError,
    handler::{delay_fn, terminal_fn, Args, Disposition, Handler, HandlerError},
    jitter::{DecorrelatedJitter, Jitter},
    retry::{BuildError, RetryPolicy, RetryPolicyBuilder},
    sleeper::{InstantSleeper, Sleeper, TrackingSleeper},
    state::RetryState,
};
