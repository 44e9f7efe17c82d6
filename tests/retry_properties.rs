//! Invocation-count and outcome properties of the retry engine.
mod common;

use common::test_helpers::{counting_delay, counting_terminal, Counters, Fault, FaultKind};
use encore::{Delay, Disposition, ErrorMatcher, InstantSleeper, RetryError, RetryPolicy};
use std::cell::Cell;
use std::time::Duration;

fn always_retryable(n: u32, counters: &Counters) -> RetryPolicy<Fault> {
    RetryPolicy::builder()
        .max_attempts(n)
        .delay_handler(counting_delay(counters, Delay::ZERO))
        .terminal_handler(counting_terminal(counters, Disposition::Raise))
        .with_sleeper(InstantSleeper)
        .build()
        .expect("valid policy")
}

#[test]
fn exhaustion_counts_hold_for_any_budget() {
    for n in 1..=8 {
        let counters = Counters::default();
        let policy = always_retryable(n, &counters);

        let calls = Cell::new(0u32);
        let result = policy.call(|| {
            calls.set(calls.get() + 1);
            Err::<(), _>(Fault::Timeout)
        });

        assert_eq!(calls.get(), n, "operation calls for n={}", n);
        assert_eq!(counters.delays(), (n - 1) as usize, "delay calls for n={}", n);
        assert_eq!(counters.terminals(), 1, "terminal calls for n={}", n);
        assert!(matches!(result, Err(RetryError::Exhausted { attempts, .. }) if attempts == n));
    }
}

#[test]
fn three_attempts_constant_zero_delay() {
    let counters = Counters::default();
    let policy = always_retryable(3, &counters);

    let calls = Cell::new(0u32);
    let result = policy.call(|| {
        calls.set(calls.get() + 1);
        Err::<(), _>(Fault::Timeout)
    });

    assert_eq!(calls.get(), 3);
    assert_eq!(counters.delays(), 2);
    assert_eq!(counters.terminals(), 1);
    assert_eq!(result.unwrap_err().into_inner(), Some(Fault::Timeout));
}

#[test]
fn fatal_on_first_attempt_stops_at_once() {
    let counters = Counters::default();
    let policy = RetryPolicy::builder()
        .max_attempts(5)
        .fail_on(ErrorMatcher::kinds(Fault::kind, [FaultKind::Auth]))
        .delay_handler(counting_delay(&counters, Delay::ZERO))
        .terminal_handler(counting_terminal(&counters, Disposition::Raise))
        .with_sleeper(InstantSleeper)
        .build()
        .expect("valid policy");

    let calls = Cell::new(0u32);
    let result = policy.call(|| {
        calls.set(calls.get() + 1);
        Err::<(), _>(Fault::Auth)
    });

    assert_eq!(calls.get(), 1);
    assert_eq!(counters.delays(), 0);
    assert_eq!(counters.terminals(), 1);
    assert!(result.unwrap_err().is_fatal());
}

#[test]
fn unclassified_error_propagates_untouched() {
    let counters = Counters::default();
    let policy = RetryPolicy::builder()
        .retry_on(ErrorMatcher::kinds(Fault::kind, [FaultKind::Timeout]))
        .fail_on(ErrorMatcher::kinds(Fault::kind, [FaultKind::Auth]))
        .delay_handler(counting_delay(&counters, Delay::ZERO))
        .terminal_handler(counting_terminal(&counters, Disposition::Raise))
        .with_sleeper(InstantSleeper)
        .build()
        .expect("valid policy");

    let result = policy.call(|| Err::<(), _>(Fault::Corrupt("checksum".into())));

    assert_eq!(counters.delays(), 0);
    assert_eq!(counters.terminals(), 0);
    match result {
        Err(RetryError::Unclassified { attempt, error }) => {
            assert_eq!(attempt, 1);
            assert_eq!(error, Fault::Corrupt("checksum".into()));
        }
        other => panic!("expected unclassified error, got {:?}", other),
    }
}

#[test]
fn success_on_attempt_k_returns_value_and_attempt() {
    for k in 1..=5 {
        let policy = RetryPolicy::builder()
            .max_attempts(5)
            .with_sleeper(InstantSleeper)
            .build()
            .expect("valid policy");

        let result = policy.call_with_state(|state| {
            if state.attempt() < k {
                Err(Fault::Timeout)
            } else {
                Ok((state.attempt(), "payload"))
            }
        });

        assert_eq!(result.unwrap(), Some((k, "payload")));
    }
}

#[test]
fn identical_wraps_behave_identically() {
    let run = || {
        let counters = Counters::default();
        let policy = always_retryable(4, &counters);
        let script = [Fault::Timeout, Fault::Timeout, Fault::Auth, Fault::Timeout];
        let calls = Cell::new(0usize);
        let mut wrapped = policy.wrap(|input: u8| {
            let i = calls.get();
            calls.set(i + 1);
            match script.get(i) {
                Some(fault) => Err(fault.clone()),
                None => Ok(input),
            }
        });
        let outcome = format!("{:?}", wrapped.call(7));
        drop(wrapped);
        (calls.get(), counters.delays(), counters.terminals(), outcome)
    };

    assert_eq!(run(), run());
}

#[test]
fn negative_delay_waits_zero() {
    let sleeper = encore::TrackingSleeper::new();
    let policy = RetryPolicy::builder()
        .max_attempts(2)
        .delay_handler(encore::delay_fn(|_e: &Fault, _args| Ok(Delay::secs(-1.5))))
        .with_sleeper(sleeper.clone())
        .build()
        .expect("valid policy");

    let result = policy.call_with_state(|state| {
        if state.attempt() == 1 {
            Err(Fault::Timeout)
        } else {
            Ok(state.previous_delay())
        }
    });

    assert_eq!(sleeper.calls(), vec![Duration::ZERO]);
    assert_eq!(result.unwrap(), Some(Delay::secs(-1.5)));
}

#[test]
fn unusable_delay_is_a_contract_failure() {
    let calls = Cell::new(0u32);
    let policy = RetryPolicy::builder()
        .max_attempts(3)
        .delay_handler(encore::delay_fn(|_e: &Fault, _args| Ok(Delay::secs(f64::INFINITY))))
        .with_sleeper(InstantSleeper)
        .build()
        .expect("valid policy");

    let result = policy.call(|| {
        calls.set(calls.get() + 1);
        Err::<(), _>(Fault::Timeout)
    });

    assert_eq!(calls.get(), 1, "must not silently retry");
    assert!(result.unwrap_err().is_invalid_delay());
}

#[test]
fn policy_is_reusable_across_threads() {
    let policy = RetryPolicy::builder()
        .max_attempts(3)
        .with_sleeper(InstantSleeper)
        .build()
        .expect("valid policy");

    let handles: Vec<_> = (0..4)
        .map(|id| {
            let policy = policy.clone();
            std::thread::spawn(move || {
                policy.call_with_state(|state| {
                    if state.attempt() < 2 {
                        Err(Fault::Timeout)
                    } else {
                        Ok(id)
                    }
                })
            })
        })
        .collect();

    for (id, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().expect("thread panicked").unwrap(), Some(id));
    }
}
