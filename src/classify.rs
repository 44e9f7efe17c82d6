//! Error classification.
//!
//! A policy holds two [`ErrorMatcher`]s: one for retryable errors and one for fatal errors.
//! Each raised error is classified once, fatal first, into a [`Classification`]:
//!
//! | fatal matches | retryable matches | result |
//! |---|---|---|
//! | yes | any | `Fatal` |
//! | no | yes | `Retryable` |
//! | no | no | `Unclassified` |
//!
//! Checking fatal first lets a caller retry a broad family of errors while carving out the
//! few that must fail fast.

use std::fmt;
use std::sync::Arc;

/// Outcome of classifying one raised error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Eligible for another attempt.
    Retryable,
    /// Skip the remaining attempts and go straight to terminal handling.
    Fatal,
    /// Not managed by the policy; surfaced as-is.
    Unclassified,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Classification::Retryable => "retryable",
            Classification::Fatal => "fatal",
            Classification::Unclassified => "unclassified",
        };
        f.write_str(label)
    }
}

type Predicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

enum MatcherKind<E> {
    All,
    Nothing,
    Predicate(Predicate<E>),
}

/// Selects a family of errors.
pub struct ErrorMatcher<E> {
    kind: MatcherKind<E>,
}

impl<E> Clone for ErrorMatcher<E> {
    fn clone(&self) -> Self {
        let kind = match &self.kind {
            MatcherKind::All => MatcherKind::All,
            MatcherKind::Nothing => MatcherKind::Nothing,
            MatcherKind::Predicate(p) => MatcherKind::Predicate(p.clone()),
        };
        Self { kind }
    }
}

impl<E> fmt::Debug for ErrorMatcher<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            MatcherKind::All => f.write_str("ErrorMatcher::All"),
            MatcherKind::Nothing => f.write_str("ErrorMatcher::Nothing"),
            MatcherKind::Predicate(_) => f.write_str("ErrorMatcher::Predicate(<predicate>)"),
        }
    }
}

impl<E: 'static> ErrorMatcher<E> {
    /// Matches every error.
    pub fn all() -> Self {
        Self { kind: MatcherKind::All }
    }

    /// Matches no error.
    pub fn none() -> Self {
        Self { kind: MatcherKind::Nothing }
    }

    /// Matches errors for which `predicate` returns true.
    pub fn when<F>(predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        Self { kind: MatcherKind::Predicate(Arc::new(predicate)) }
    }

    /// Matches errors whose kind, as reported by `kind_of`, is one of `kinds`.
    ///
    /// ```rust
    /// use encore::ErrorMatcher;
    /// use std::io;
    ///
    /// let transient = ErrorMatcher::kinds(
    ///     |e: &io::Error| e.kind(),
    ///     [io::ErrorKind::TimedOut, io::ErrorKind::Interrupted],
    /// );
    /// assert!(transient.matches(&io::Error::from(io::ErrorKind::TimedOut)));
    /// assert!(!transient.matches(&io::Error::from(io::ErrorKind::NotFound)));
    /// ```
    pub fn kinds<K, F, I>(kind_of: F, kinds: I) -> Self
    where
        K: PartialEq + Send + Sync + 'static,
        F: Fn(&E) -> K + Send + Sync + 'static,
        I: IntoIterator<Item = K>,
    {
        let kinds: Vec<K> = kinds.into_iter().collect();
        if kinds.is_empty() {
            return Self::none();
        }
        Self::when(move |e| kinds.contains(&kind_of(e)))
    }

    /// Matches errors selected by either matcher.
    pub fn or(self, other: ErrorMatcher<E>) -> Self {
        match (self.kind, other.kind) {
            (MatcherKind::All, _) | (_, MatcherKind::All) => Self::all(),
            (MatcherKind::Nothing, kind) | (kind, MatcherKind::Nothing) => Self { kind },
            (MatcherKind::Predicate(a), MatcherKind::Predicate(b)) => {
                Self::when(move |e| a(e) || b(e))
            }
        }
    }

    /// True when `error` belongs to this family.
    pub fn matches(&self, error: &E) -> bool {
        match &self.kind {
            MatcherKind::All => true,
            MatcherKind::Nothing => false,
            MatcherKind::Predicate(p) => p(error),
        }
    }
}

/// Classify `error`, giving fatal matches precedence over retryable ones.
pub fn classify<E: 'static>(
    error: &E,
    retryable: &ErrorMatcher<E>,
    fatal: &ErrorMatcher<E>,
) -> Classification {
    if fatal.matches(error) {
        Classification::Fatal
    } else if retryable.matches(error) {
        Classification::Retryable
    } else {
        Classification::Unclassified
    }
}
