//! Delay and terminal handlers.
//!
//! A handler is called with the error that triggered it and an [`Args`] view of the retry
//! state. What lands in `Args` depends on the handler's [`Signature`]:
//! - open signatures receive every field, extras included,
//! - named signatures receive only the fields they listed that the state actually has.
//!
//! Delay handlers produce a [`Delay`]; terminal handlers produce a [`Disposition`]. Either
//! may fail with a [`HandlerError`], which the engine surfaces without retrying.
//!
//! Example: a handler that scales the attempt number by a caller-supplied extra.
//! ```rust
//! use encore::{delay_fn, Delay, RetryPolicy, TrackingSleeper};
//! use std::io;
//!
//! let sleeper = TrackingSleeper::new();
//! let policy = RetryPolicy::<io::Error>::builder()
//!     .max_attempts(3)
//!     .extra("sleep_modifier", 2)
//!     .delay_handler(
//!         delay_fn(|_e: &io::Error, args| {
//!             let modifier: f64 = args.get_or("sleep_modifier", 1.0)?;
//!             Ok(Delay::secs(f64::from(args.attempt()?) * modifier))
//!         })
//!         .with_parameters(["attempt", "sleep_modifier"]),
//!     )
//!     .with_sleeper(sleeper.clone())
//!     .build()
//!     .unwrap();
//!
//! let _ = policy.call(|| Err::<(), _>(io::Error::from(io::ErrorKind::TimedOut)));
//! assert_eq!(sleeper.calls().len(), 2);
//! assert_eq!(sleeper.calls()[1].as_secs(), 4);
//! ```

use crate::delay::Delay;
use crate::signature::{filter, inspect, Signature};
use crate::state::{self, RetryState};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Errors raised by handlers, or while binding their parameters.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("handler parameter `{0}` is not bound")]
    Missing(String),
    #[error("handler parameter `{name}` has an unexpected type: {source}")]
    InvalidParameter {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{0}")]
    Message(String),
    #[error("{source}")]
    Custom {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl HandlerError {
    pub fn msg(message: impl Into<String>) -> Self {
        HandlerError::Message(message.into())
    }

    /// Wrap an arbitrary error raised inside a handler.
    pub fn custom<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        HandlerError::Custom { source: error.into() }
    }
}

/// What a terminal handler asks the engine to do with the final error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Surface the error to the caller.
    Raise,
    /// Swallow it; the call yields `Ok(None)` unless the policy raises on exhaustion.
    Suppress,
}

/// Fields bound for one handler invocation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Args {
    fields: Map<String, Value>,
}

impl Args {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Deserialize a bound field; unbound fields are an error.
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Result<T, HandlerError> {
        let value = self.fields.get(name).ok_or_else(|| HandlerError::Missing(name.to_string()))?;
        T::deserialize(value)
            .map_err(|source| HandlerError::InvalidParameter { name: name.to_string(), source })
    }

    /// Deserialize a bound field, falling back to `default` when it is not bound.
    pub fn get_or<T: DeserializeOwned>(&self, name: &str, default: T) -> Result<T, HandlerError> {
        if self.contains(name) {
            self.get_as(name)
        } else {
            Ok(default)
        }
    }

    pub fn attempt(&self) -> Result<u32, HandlerError> {
        self.get_as(state::ATTEMPT)
    }

    pub fn max_attempts(&self) -> Result<u32, HandlerError> {
        self.get_as(state::MAX_ATTEMPTS)
    }

    pub fn base_delay(&self) -> Result<Delay, HandlerError> {
        self.get_as(state::BASE_DELAY)
    }

    pub fn previous_delay(&self) -> Result<Delay, HandlerError> {
        self.get_as(state::PREVIOUS_DELAY)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }
}

/// A pluggable delay or terminal policy.
pub trait Handler<E>: Send + Sync {
    /// `Delay` for delay handlers, `Disposition` for terminal handlers.
    type Output;

    /// Fields this handler wants bound. Defaults to all of them.
    fn signature(&self) -> Signature {
        Signature::open()
    }

    fn handle(&self, error: &E, args: &Args) -> Result<Self::Output, HandlerError>;
}

/// Delay handler as held by a policy.
pub type DelayHandler<E> = Arc<dyn Handler<E, Output = Delay>>;

/// Terminal handler as held by a policy.
pub type TerminalHandler<E> = Arc<dyn Handler<E, Output = Disposition>>;

/// Call `handler` with the state fields its signature accepts.
pub fn invoke<E, H>(error: &E, handler: &H, state: &RetryState) -> Result<H::Output, HandlerError>
where
    H: Handler<E> + ?Sized,
{
    let signature = inspect::<E, H>(handler);
    let fields = if signature.accepts_open_keywords() {
        state.to_map()
    } else {
        filter(state, signature.parameters())
    };
    handler.handle(error, &Args::new(fields))
}

/// Handler backed by a closure.
pub struct HandlerFn<F, O> {
    f: F,
    signature: Signature,
    _output: PhantomData<fn() -> O>,
}

impl<F, O> HandlerFn<F, O> {
    fn new(f: F) -> Self {
        Self { f, signature: Signature::open(), _output: PhantomData }
    }

    /// Narrow the closure to the named state fields.
    pub fn with_parameters<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.signature = Signature::named(names);
        self
    }
}

impl<F: Clone, O> Clone for HandlerFn<F, O> {
    fn clone(&self) -> Self {
        Self { f: self.f.clone(), signature: self.signature.clone(), _output: PhantomData }
    }
}

impl<F, O> fmt::Debug for HandlerFn<F, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerFn").field("signature", &self.signature).finish()
    }
}

impl<E, F, O> Handler<E> for HandlerFn<F, O>
where
    F: Fn(&E, &Args) -> Result<O, HandlerError> + Send + Sync,
{
    type Output = O;

    fn signature(&self) -> Signature {
        self.signature.clone()
    }

    fn handle(&self, error: &E, args: &Args) -> Result<O, HandlerError> {
        (self.f)(error, args)
    }
}

/// Delay handler from a closure; receives every state field unless narrowed.
pub fn delay_fn<E, F>(f: F) -> HandlerFn<F, Delay>
where
    F: Fn(&E, &Args) -> Result<Delay, HandlerError> + Send + Sync,
{
    HandlerFn::new(f)
}

/// Terminal handler from a closure; receives every state field unless narrowed.
pub fn terminal_fn<E, F>(f: F) -> HandlerFn<F, Disposition>
where
    F: Fn(&E, &Args) -> Result<Disposition, HandlerError> + Send + Sync,
{
    HandlerFn::new(f)
}

/// Default delay handler: waits `base_delay` between every attempt.
///
/// Returns the base delay in the form it was configured, so a `Duration` base comes back as
/// `Delay::Duration`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConstantDelay;

impl<E> Handler<E> for ConstantDelay {
    type Output = Delay;

    fn signature(&self) -> Signature {
        Signature::named([state::BASE_DELAY])
    }

    fn handle(&self, _error: &E, args: &Args) -> Result<Delay, HandlerError> {
        args.get_or(state::BASE_DELAY, Delay::ZERO)
    }
}

/// Waits `attempt + base_delay` seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinearDelay;

impl<E> Handler<E> for LinearDelay {
    type Output = Delay;

    fn signature(&self) -> Signature {
        Signature::named([state::ATTEMPT, state::BASE_DELAY])
    }

    fn handle(&self, _error: &E, args: &Args) -> Result<Delay, HandlerError> {
        let attempt = args.attempt()?;
        let base = args.get_or(state::BASE_DELAY, Delay::ZERO)?;
        Ok(Delay::secs(f64::from(attempt) + base.as_secs_f64()))
    }
}

/// Default terminal handler: always raises.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reraise;

impl<E> Handler<E> for Reraise {
    type Output = Disposition;

    fn handle(&self, _error: &E, _args: &Args) -> Result<Disposition, HandlerError> {
        Ok(Disposition::Raise)
    }
}

/// Terminal handler that fails silently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Suppress;

impl<E> Handler<E> for Suppress {
    type Output = Disposition;

    fn signature(&self) -> Signature {
        Signature::named(std::iter::empty::<String>())
    }

    fn handle(&self, _error: &E, _args: &Args) -> Result<Disposition, HandlerError> {
        Ok(Disposition::Suppress)
    }
}
