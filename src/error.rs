//! Error type surfaced by a retry session
use crate::delay::DelayError;
use crate::handler::HandlerError;
use std::fmt;

/// How a retry session failed.
///
/// Variants carrying `error` hold the operation's own error, unmodified.
#[derive(Debug)]
pub enum RetryError<E> {
    /// A retryable error occurred on the last permitted attempt.
    Exhausted { attempts: u32, error: E },
    /// A fatal error ended the session early.
    Fatal { attempt: u32, error: E },
    /// The error matched neither the retryable nor the fatal matcher.
    Unclassified { attempt: u32, error: E },
    /// The delay handler returned a value that cannot be waited on.
    InvalidDelay { attempt: u32, source: DelayError },
    /// A delay or terminal handler failed.
    Handler { attempt: u32, source: HandlerError },
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted { attempts, error } => {
                write!(f, "retry exhausted after {} attempts; last error: {}", attempts, error)
            }
            Self::Fatal { attempt, error } => {
                write!(f, "fatal error on attempt {}: {}", attempt, error)
            }
            Self::Unclassified { attempt, error } => {
                write!(f, "unclassified error on attempt {}: {}", attempt, error)
            }
            Self::InvalidDelay { attempt, source } => {
                write!(f, "delay handler broke its contract after attempt {}: {}", attempt, source)
            }
            Self::Handler { attempt, source } => {
                write!(f, "handler failed after attempt {}: {}", attempt, source)
            }
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Exhausted { error, .. }
            | Self::Fatal { error, .. }
            | Self::Unclassified { error, .. } => Some(error),
            Self::InvalidDelay { source, .. } => Some(source),
            Self::Handler { source, .. } => Some(source),
        }
    }
}

impl<E> RetryError<E> {
    /// Attempt on which the session ended.
    pub fn attempt(&self) -> u32 {
        match self {
            Self::Exhausted { attempts: attempt, .. }
            | Self::Fatal { attempt, .. }
            | Self::Unclassified { attempt, .. }
            | Self::InvalidDelay { attempt, .. }
            | Self::Handler { attempt, .. } => *attempt,
        }
    }

    /// Check if every attempt was used up
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }

    pub fn is_unclassified(&self) -> bool {
        matches!(self, Self::Unclassified { .. })
    }

    /// Check if the delay handler returned an unusable delay
    pub fn is_invalid_delay(&self) -> bool {
        matches!(self, Self::InvalidDelay { .. })
    }

    pub fn is_handler(&self) -> bool {
        matches!(self, Self::Handler { .. })
    }

    /// Take the operation's error, if this variant carries one.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Exhausted { error, .. }
            | Self::Fatal { error, .. }
            | Self::Unclassified { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Borrow the operation's error, if this variant carries one.
    pub fn as_inner(&self) -> Option<&E> {
        match self {
            Self::Exhausted { error, .. }
            | Self::Fatal { error, .. }
            | Self::Unclassified { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn as_inner_mut(&mut self) -> Option<&mut E> {
        match self {
            Self::Exhausted { error, .. }
            | Self::Fatal { error, .. }
            | Self::Unclassified { error, .. } => Some(error),
            _ => None,
        }
    }

    /// The handler's error for `Handler` failures.
    pub fn handler_error(&self) -> Option<&HandlerError> {
        match self {
            Self::Handler { source, .. } => Some(source),
            _ => None,
        }
    }
}
