//! Per-session retry state.
//!
//! A fresh [`RetryState`] is built from the policy's [`RetryConfig`] at the start of every
//! call and dropped when the call returns. The engine owns `attempt` and `previous_delay`;
//! the wrapped operation receives `&mut RetryState` and may update caller-supplied extras.
//!
//! Built-in fields and extras share one by-name surface ([`RetryState::get`],
//! [`RetryState::to_map`]) so handlers read `"attempt"` and a custom `"sleep_modifier"` the
//! same way. Delays keep their form by name: seconds are numbers, durations are
//! `{ "secs", "nanos" }` objects, and both read back as the same [`Delay`].

use crate::config::RetryConfig;
use crate::delay::Delay;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Field name of the total attempt budget.
pub const MAX_ATTEMPTS: &str = "max_attempts";
/// Field name of the configured base delay.
pub const BASE_DELAY: &str = "base_delay";
/// Field name of the engine-level raise flag.
pub const RAISE_ON_EXHAUSTION: &str = "raise_on_exhaustion";
/// Field name of the current 1-based attempt.
pub const ATTEMPT: &str = "attempt";
/// Field name of the last delay returned by the delay handler.
pub const PREVIOUS_DELAY: &str = "previous_delay";

/// Names that extras may not use.
pub const RESERVED_FIELDS: [&str; 5] =
    [MAX_ATTEMPTS, BASE_DELAY, RAISE_ON_EXHAUSTION, ATTEMPT, PREVIOUS_DELAY];

fn delay_value(delay: Delay) -> Value {
    match delay {
        Delay::Seconds(secs) => Value::from(secs),
        Delay::Duration(d) => json!({ "secs": d.as_secs(), "nanos": d.subsec_nanos() }),
    }
}

/// True if `name` is one of the built-in state fields.
pub fn is_reserved(name: &str) -> bool {
    RESERVED_FIELDS.contains(&name)
}

/// Errors from by-name state access.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("`{0}` is a built-in retry state field and cannot be set as an extra")]
    Reserved(String),
    #[error("retry state has no field `{0}`")]
    Missing(String),
    #[error("retry state field `{name}` has an unexpected type: {source}")]
    InvalidType {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Mutable record threaded through one retry session.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryState {
    max_attempts: u32,
    base_delay: Delay,
    raise_on_exhaustion: bool,
    attempt: u32,
    previous_delay: Delay,
    extra: BTreeMap<String, Value>,
}

impl RetryState {
    /// State for a session that has not started its first attempt yet.
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: config.base_delay,
            raise_on_exhaustion: config.raise_on_exhaustion,
            attempt: 0,
            previous_delay: Delay::ZERO,
            extra: config.extra.clone(),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Delay {
        self.base_delay
    }

    pub fn raise_on_exhaustion(&self) -> bool {
        self.raise_on_exhaustion
    }

    /// Current attempt, 1-based. Zero before the first attempt starts.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Last delay returned by the delay handler, before clamping. Zero until a retry is
    /// scheduled.
    pub fn previous_delay(&self) -> Delay {
        self.previous_delay
    }

    /// True on the final permitted attempt.
    pub fn is_last_attempt(&self) -> bool {
        self.attempt >= self.max_attempts
    }

    /// Caller-supplied extras.
    pub fn extras(&self) -> &BTreeMap<String, Value> {
        &self.extra
    }

    /// Borrow one extra.
    pub fn extra(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }

    /// Insert or replace an extra, returning the previous value.
    pub fn set_extra(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Option<Value>, StateError> {
        let name = name.into();
        if is_reserved(&name) {
            return Err(StateError::Reserved(name));
        }
        Ok(self.extra.insert(name, value.into()))
    }

    /// Read any field, built-in or extra, by name.
    pub fn get(&self, name: &str) -> Option<Value> {
        match name {
            MAX_ATTEMPTS => Some(Value::from(self.max_attempts)),
            BASE_DELAY => Some(delay_value(self.base_delay)),
            RAISE_ON_EXHAUSTION => Some(Value::from(self.raise_on_exhaustion)),
            ATTEMPT => Some(Value::from(self.attempt)),
            PREVIOUS_DELAY => Some(delay_value(self.previous_delay)),
            other => self.extra.get(other).cloned(),
        }
    }

    /// Read any field by name and deserialize it.
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Result<T, StateError> {
        let value = self.get(name).ok_or_else(|| StateError::Missing(name.to_string()))?;
        serde_json::from_value(value)
            .map_err(|source| StateError::InvalidType { name: name.to_string(), source })
    }

    /// Names of every field, built-ins first.
    pub fn field_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = RESERVED_FIELDS.to_vec();
        names.extend(self.extra.keys().map(String::as_str));
        names
    }

    /// The whole state as a name to value mapping.
    pub fn to_map(&self) -> Map<String, Value> {
        self.field_names()
            .into_iter()
            .filter_map(|name| self.get(name).map(|value| (name.to_string(), value)))
            .collect()
    }

    pub(crate) fn begin_attempt(&mut self, attempt: u32) {
        debug_assert!(attempt >= self.attempt, "attempt must not decrease");
        debug_assert!(attempt <= self.max_attempts, "attempt must not exceed max_attempts");
        self.attempt = attempt;
    }

    pub(crate) fn record_delay(&mut self, delay: Delay) {
        self.previous_delay = delay;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn config() -> RetryConfig {
        let mut config = RetryConfig { max_attempts: 4, ..RetryConfig::default() };
        config.base_delay = Delay::secs(2.0);
        config.extra.insert("custom_value".into(), json!("foo"));
        config
    }

    #[test]
    fn new_state_copies_config() {
        let state = RetryState::new(&config());
        assert_eq!(state.max_attempts(), 4);
        assert_eq!(state.base_delay(), Delay::secs(2.0));
        assert!(state.raise_on_exhaustion());
        assert_eq!(state.attempt(), 0);
        assert_eq!(state.previous_delay(), Delay::ZERO);
        assert_eq!(state.extra("custom_value"), Some(&json!("foo")));
    }

    #[test]
    fn built_ins_and_extras_share_get() {
        let mut state = RetryState::new(&config());
        state.begin_attempt(2);
        assert_eq!(state.get(ATTEMPT), Some(json!(2)));
        assert_eq!(state.get(BASE_DELAY), Some(json!(2.0)));
        assert_eq!(state.get("custom_value"), Some(json!("foo")));
        assert_eq!(state.get("absent"), None);
        assert_eq!(state.get_as::<u32>(MAX_ATTEMPTS).unwrap(), 4);
        assert_eq!(state.get_as::<String>("custom_value").unwrap(), "foo");
    }

    #[test]
    fn get_as_reports_missing_and_mistyped() {
        let state = RetryState::new(&config());
        assert!(matches!(state.get_as::<u32>("nope"), Err(StateError::Missing(_))));
        assert!(matches!(
            state.get_as::<u32>("custom_value"),
            Err(StateError::InvalidType { .. })
        ));
    }

    #[test]
    fn set_extra_rejects_built_in_names() {
        let mut state = RetryState::new(&config());
        assert!(matches!(state.set_extra(ATTEMPT, 9), Err(StateError::Reserved(_))));
        let previous = state.set_extra("custom_value", "foo bar").unwrap();
        assert_eq!(previous, Some(json!("foo")));
        assert_eq!(state.get("custom_value"), Some(json!("foo bar")));
    }

    #[test]
    fn to_map_lists_every_field() {
        let mut state = RetryState::new(&config());
        state.begin_attempt(1);
        state.record_delay(Delay::from(Duration::from_millis(1500)));
        let map = state.to_map();
        assert_eq!(map.len(), 6);
        assert_eq!(map[PREVIOUS_DELAY], json!({ "secs": 1, "nanos": 500_000_000 }));
        assert_eq!(map[RAISE_ON_EXHAUSTION], json!(true));
        assert_eq!(map["custom_value"], json!("foo"));
    }

    #[test]
    fn delays_read_back_in_their_own_form() {
        let mut config = config();
        config.base_delay = Delay::millis(250);
        let mut state = RetryState::new(&config);
        assert_eq!(state.get_as::<Delay>(BASE_DELAY).unwrap(), Delay::millis(250));

        state.record_delay(Delay::secs(-0.5));
        assert_eq!(state.get(PREVIOUS_DELAY), Some(json!(-0.5)));
        assert_eq!(state.get_as::<Delay>(PREVIOUS_DELAY).unwrap(), Delay::secs(-0.5));
    }

    #[test]
    fn last_attempt_tracks_budget() {
        let mut state = RetryState::new(&config());
        state.begin_attempt(3);
        assert!(!state.is_last_attempt());
        state.begin_attempt(4);
        assert!(state.is_last_attempt());
    }
}
