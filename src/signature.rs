//! Handler signatures and parameter filtering.
//!
//! Handlers declare which retry state fields they accept. A [`Signature`] is either open
//! (the handler takes every field, including extras) or a closed set of names. The handler
//! invoker uses [`inspect`] to read the declaration and [`filter`] to narrow the state to it.

use crate::handler::Handler;
use crate::state::RetryState;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Parameters a handler accepts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Signature {
    parameters: BTreeSet<String>,
    open: bool,
}

impl Signature {
    /// Accept every state field.
    pub fn open() -> Self {
        Self { parameters: BTreeSet::new(), open: true }
    }

    /// Accept only the named fields.
    pub fn named<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { parameters: names.into_iter().map(Into::into).collect(), open: false }
    }

    /// Explicitly named parameters; empty for an open signature that named none.
    pub fn parameters(&self) -> &BTreeSet<String> {
        &self.parameters
    }

    /// True when the handler takes every field.
    pub fn accepts_open_keywords(&self) -> bool {
        self.open
    }

    /// True when a field called `name` would be bound.
    pub fn accepts(&self, name: &str) -> bool {
        self.open || self.parameters.contains(name)
    }
}

/// Report the signature `handler` declares.
pub fn inspect<E, H>(handler: &H) -> Signature
where
    H: Handler<E> + ?Sized,
{
    handler.signature()
}

/// The subset of `state` whose names are in `accepted`.
pub fn filter(state: &RetryState, accepted: &BTreeSet<String>) -> Map<String, Value> {
    accepted
        .iter()
        .filter_map(|name| state.get(name).map(|value| (name.clone(), value)))
        .collect()
}
