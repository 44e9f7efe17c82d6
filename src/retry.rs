//! Retry policy implementation
//!
//! Blocking retry engine for fallible operations.
//!
//! Semantics:
//! - `max_attempts` counts total attempts (initial try + retries).
//! - Every error is classified once, fatal matcher first (see [`classify`]).
//! - Fatal errors, and retryable errors on the last attempt, run the terminal handler.
//! - Retryable errors before the last attempt run the delay handler, then wait.
//! - Unclassified errors are returned at once; no handler runs.
//! - Handlers receive the state fields their [`Signature`](crate::Signature) accepts.
//! - Sleeper controls how delays are applied (production uses `ThreadSleeper`; tests can
//!   inject `InstantSleeper`/`TrackingSleeper`).
//!
//! Invariants:
//! - Attempts never exceed `max_attempts`.
//! - The delay handler runs at most `max_attempts - 1` times; the terminal handler at most once.
//! - A fresh [`RetryState`] is built for every call.
//!
//! Example
//! ```rust
//! use encore::{RetryError, RetryPolicy, InstantSleeper};
//! use std::io;
//!
//! let policy = RetryPolicy::<io::Error>::builder()
//!     .max_attempts(3) // total attempts
//!     .base_delay(0.1)
//!     .with_sleeper(InstantSleeper)
//!     .build()
//!     .unwrap();
//!
//! let result = policy.call_with_state(|state| {
//!     if state.attempt() < 3 {
//!         Err(io::Error::from(io::ErrorKind::TimedOut))
//!     } else {
//!         Ok(state.attempt())
//!     }
//! });
//! assert_eq!(result.unwrap(), Some(3));
//!
//! let failed: Result<Option<()>, _> =
//!     policy.call(|| Err(io::Error::from(io::ErrorKind::TimedOut)));
//! assert!(matches!(failed, Err(RetryError::Exhausted { attempts: 3, .. })));
//! ```

use crate::classify::{classify, Classification, ErrorMatcher};
use crate::config::RetryConfig;
use crate::delay::Delay;
use crate::error::RetryError;
use crate::handler::{
    invoke, ConstantDelay, DelayHandler, Disposition, Handler, Reraise, TerminalHandler,
};
use crate::sleeper::{Sleeper, ThreadSleeper};
use crate::state::RetryState;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Errors produced while building a retry policy.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BuildError {
    #[error("max_attempts must be > 0 (got {0})")]
    InvalidMaxAttempts(u32),
    #[error("base_delay must be non-negative and fit in a duration (got {0} seconds)")]
    InvalidBaseDelay(f64),
    #[error("extra `{0}` collides with a built-in retry state field")]
    ReservedExtra(String),
}

/// Immutable retry policy: classification, attempt budget, handlers and sleeper.
pub struct RetryPolicy<E> {
    config: RetryConfig,
    retryable: ErrorMatcher<E>,
    fatal: ErrorMatcher<E>,
    delay_handler: DelayHandler<E>,
    terminal_handler: TerminalHandler<E>,
    sleeper: Arc<dyn Sleeper>,
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            retryable: self.retryable.clone(),
            fatal: self.fatal.clone(),
            delay_handler: self.delay_handler.clone(),
            terminal_handler: self.terminal_handler.clone(),
            sleeper: self.sleeper.clone(),
        }
    }
}

impl<E> fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("config", &self.config)
            .field("retryable", &self.retryable)
            .field("fatal", &self.fatal)
            .field("delay_handler", &"<handler>")
            .field("terminal_handler", &"<handler>")
            .field("sleeper", &self.sleeper)
            .finish()
    }
}

impl<E: 'static> RetryPolicy<E> {
    /// Construct a new builder with defaults.
    pub fn builder() -> RetryPolicyBuilder<E> {
        RetryPolicyBuilder::new()
    }

    /// Build a policy from configuration, keeping every behavioral default.
    pub fn from_config(config: RetryConfig) -> Result<Self, BuildError> {
        RetryPolicyBuilder::new().config(config).build()
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    /// Classify an error the way the engine will.
    pub fn classify(&self, error: &E) -> Classification {
        classify(error, &self.retryable, &self.fatal)
    }

    /// Run `operation` under this policy.
    ///
    /// Returns `Ok(Some(value))` on success and `Ok(None)` only when the terminal handler
    /// suppressed the final error and `raise_on_exhaustion` is off.
    pub fn call<T, F>(&self, mut operation: F) -> Result<Option<T>, RetryError<E>>
    where
        F: FnMut() -> Result<T, E>,
    {
        self.call_with_state(|_state| operation())
    }

    /// Run `operation` under this policy, handing it the session's retry state.
    pub fn call_with_state<T, F>(&self, mut operation: F) -> Result<Option<T>, RetryError<E>>
    where
        F: FnMut(&mut RetryState) -> Result<T, E>,
    {
        let max_attempts = self.config.max_attempts;
        let mut state = RetryState::new(&self.config);

        for attempt in 1..=max_attempts {
            state.begin_attempt(attempt);
            trace!(attempt, max_attempts, "attempt started");

            let error = match operation(&mut state) {
                Ok(value) => return Ok(Some(value)),
                Err(error) => error,
            };

            match self.classify(&error) {
                Classification::Fatal => return self.terminate(error, &state, true),
                Classification::Retryable if attempt == max_attempts => {
                    return self.terminate(error, &state, false);
                }
                Classification::Retryable => {
                    let delay = invoke(&error, &*self.delay_handler, &state)
                        .map_err(|source| RetryError::Handler { attempt, source })?;
                    let wait = delay
                        .to_wait()
                        .map_err(|source| RetryError::InvalidDelay { attempt, source })?;
                    state.record_delay(delay);
                    debug!(attempt, delay_secs = wait.as_secs_f64(), "retry scheduled");
                    self.sleeper.sleep(wait);
                }
                Classification::Unclassified => {
                    debug!(attempt, "unclassified error, not retrying");
                    return Err(RetryError::Unclassified { attempt, error });
                }
            }
        }

        // Unreachable: the last attempt either succeeds or returns through `terminate`, and
        // `build()` guarantees at least one attempt.
        debug_assert!(false, "retry loop should have returned; this indicates a logic bug");
        unreachable!()
    }

    fn terminate<T>(
        &self,
        error: E,
        state: &RetryState,
        fatal: bool,
    ) -> Result<Option<T>, RetryError<E>> {
        let attempt = state.attempt();
        let disposition = invoke(&error, &*self.terminal_handler, state)
            .map_err(|source| RetryError::Handler { attempt, source })?;
        debug!(attempt, fatal, ?disposition, "retry session failed");

        if disposition == Disposition::Raise || self.config.raise_on_exhaustion {
            return Err(if fatal {
                RetryError::Fatal { attempt, error }
            } else {
                RetryError::Exhausted { attempts: attempt, error }
            });
        }
        Ok(None)
    }

    /// Wrap an operation taking one argument; each attempt gets a clone of it.
    pub fn wrap<A, T, F>(
        &self,
        mut operation: F,
    ) -> Retrying<impl FnMut(A, &mut RetryState) -> Result<T, E>, E>
    where
        F: FnMut(A) -> Result<T, E>,
    {
        self.wrap_with_state(move |args: A, _state: &mut RetryState| operation(args))
    }

    /// Wrap an operation that also receives the session's retry state.
    pub fn wrap_with_state<A, T, F>(&self, operation: F) -> Retrying<F, E>
    where
        F: FnMut(A, &mut RetryState) -> Result<T, E>,
    {
        Retrying { policy: self.clone(), operation }
    }
}

/// An operation bound to a retry policy.
pub struct Retrying<F, E> {
    policy: RetryPolicy<E>,
    operation: F,
}

impl<F, E> fmt::Debug for Retrying<F, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retrying").field("policy", &self.policy).finish()
    }
}

impl<F, E: 'static> Retrying<F, E> {
    /// Run the wrapped operation with `args`, retrying under the policy.
    pub fn call<A, T>(&mut self, args: A) -> Result<Option<T>, RetryError<E>>
    where
        A: Clone,
        F: FnMut(A, &mut RetryState) -> Result<T, E>,
    {
        let Self { policy, operation } = self;
        policy.call_with_state(|state| operation(args.clone(), state))
    }

    pub fn policy(&self) -> &RetryPolicy<E> {
        &self.policy
    }
}

/// Builder for `RetryPolicy`.
pub struct RetryPolicyBuilder<E> {
    config: RetryConfig,
    retryable: ErrorMatcher<E>,
    fatal: ErrorMatcher<E>,
    delay_handler: DelayHandler<E>,
    terminal_handler: TerminalHandler<E>,
    sleeper: Arc<dyn Sleeper>,
}

impl<E: 'static> RetryPolicyBuilder<E> {
    /// Create a builder with the documented defaults: 3 attempts, no delay, every error
    /// retryable, none fatal, constant delay handler, re-raising terminal handler.
    pub fn new() -> Self {
        Self {
            config: RetryConfig::default(),
            retryable: ErrorMatcher::all(),
            fatal: ErrorMatcher::none(),
            delay_handler: Arc::new(ConstantDelay),
            terminal_handler: Arc::new(Reraise),
            sleeper: Arc::new(ThreadSleeper),
        }
    }

    /// Replace the data half of the policy wholesale.
    pub fn config(mut self, config: RetryConfig) -> Self {
        self.config = config;
        self
    }

    /// Set total attempts (initial + retries). Must be > 0.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    pub fn base_delay(mut self, delay: impl Into<Delay>) -> Self {
        self.config.base_delay = delay.into();
        self
    }

    /// Whether the engine surfaces the final error even if the terminal handler suppresses it.
    pub fn raise_on_exhaustion(mut self, raise: bool) -> Self {
        self.config.raise_on_exhaustion = raise;
        self
    }

    /// Add a named value exposed to handlers and the operation through the retry state.
    pub fn extra(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.extra.insert(name.into(), value.into());
        self
    }

    /// Errors eligible for retry.
    pub fn retry_on(mut self, matcher: ErrorMatcher<E>) -> Self {
        self.retryable = matcher;
        self
    }

    /// Predicate to decide if an error is retryable.
    pub fn retry_if<F>(self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.retry_on(ErrorMatcher::when(predicate))
    }

    /// Errors that skip the remaining attempts.
    pub fn fail_on(mut self, matcher: ErrorMatcher<E>) -> Self {
        self.fatal = matcher;
        self
    }

    pub fn fail_if<F>(self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.fail_on(ErrorMatcher::when(predicate))
    }

    pub fn delay_handler<H>(mut self, handler: H) -> Self
    where
        H: Handler<E, Output = Delay> + 'static,
    {
        self.delay_handler = Arc::new(handler);
        self
    }

    pub fn terminal_handler<H>(mut self, handler: H) -> Self
    where
        H: Handler<E, Output = Disposition> + 'static,
    {
        self.terminal_handler = Arc::new(handler);
        self
    }

    /// Provide a custom sleeper implementation.
    pub fn with_sleeper<S>(mut self, sleeper: S) -> Self
    where
        S: Sleeper + 'static,
    {
        self.sleeper = Arc::new(sleeper);
        self
    }

    /// Build the retry policy, validating inputs.
    pub fn build(self) -> Result<RetryPolicy<E>, BuildError> {
        self.config.validate()?;
        Ok(RetryPolicy {
            config: self.config,
            retryable: self.retryable,
            fatal: self.fatal,
            delay_handler: self.delay_handler,
            terminal_handler: self.terminal_handler,
            sleeper: self.sleeper,
        })
    }
}

impl<E: 'static> Default for RetryPolicyBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}
