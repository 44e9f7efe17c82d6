#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # encore
//!
//! Blocking retry orchestration for fallible operations.
//!
//! ## Features
//!
//! - **Tri-state classification**: every error is retryable, fatal, or left alone
//! - **Pluggable handlers** for the wait between attempts and for the final failure
//! - **Shared retry state** visible to the operation and, by name, to handlers
//! - **Backoff and jitter** delay handlers (constant, linear, exponential, decorrelated)
//! - **Serializable configuration** via `serde`
//!
//! ## Quick Start
//!
//! ```rust
//! use encore::{Backoff, ErrorMatcher, Jitter, RetryError, RetryPolicy, InstantSleeper};
//! use std::io;
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::builder()
//!     .max_attempts(4)
//!     .retry_on(ErrorMatcher::kinds(|e: &io::Error| e.kind(), [io::ErrorKind::TimedOut]))
//!     .fail_on(ErrorMatcher::kinds(|e: &io::Error| e.kind(), [io::ErrorKind::PermissionDenied]))
//!     .delay_handler(Backoff::exponential(Duration::from_millis(50)).with_jitter(Jitter::full()))
//!     .with_sleeper(InstantSleeper)
//!     .build()
//!     .unwrap();
//!
//! let mut calls = 0;
//! let result = policy.call(|| {
//!     calls += 1;
//!     if calls < 3 { Err(io::Error::from(io::ErrorKind::TimedOut)) } else { Ok("connected") }
//! });
//! assert_eq!(result.unwrap(), Some("connected"));
//!
//! let denied: Result<Option<()>, _> =
//!     policy.call(|| Err(io::Error::from(io::ErrorKind::PermissionDenied)));
//! assert!(matches!(denied, Err(RetryError::Fatal { attempt: 1, .. })));
//! ```

pub mod backoff;
pub mod classify;
pub mod config;
pub mod delay;
pub mod error;
pub mod handler;
pub mod jitter;
pub mod prelude;
pub mod retry;
pub mod signature;
pub mod sleeper;
pub mod state;

// Re-exports
pub use backoff::{Backoff, BackoffError, MAX_BACKOFF};
pub use classify::{classify, Classification, ErrorMatcher};
pub use config::{ConfigError, RetryConfig, DEFAULT_MAX_ATTEMPTS};
pub use delay::{Delay, DelayError};
pub use error::RetryError;
pub use handler::{
    delay_fn, invoke, terminal_fn, Args, ConstantDelay, DelayHandler, Disposition, Handler,
    HandlerError, HandlerFn, LinearDelay, Reraise, Suppress, TerminalHandler,
};
pub use jitter::{DecorrelatedJitter, Jitter};
pub use retry::{BuildError, RetryPolicy, RetryPolicyBuilder, Retrying};
pub use signature::{filter, inspect, Signature};
pub use sleeper::{InstantSleeper, Sleeper, ThreadSleeper, TrackingSleeper};
pub use state::{RetryState, StateError};
