mod common;

use common::test_helpers::Fault;
use encore::{Backoff, DecorrelatedJitter, Jitter, RetryPolicy, TrackingSleeper};
use std::time::Duration;

#[test]
fn exponential_backoff_drives_the_waits() {
    let sleeper = TrackingSleeper::new();
    let policy = RetryPolicy::builder()
        .max_attempts(5)
        .delay_handler(
            Backoff::exponential(Duration::from_millis(100))
                .with_max(Duration::from_millis(500))
                .expect("valid backoff"),
        )
        .with_sleeper(sleeper.clone())
        .build()
        .expect("valid policy");

    let result = policy.call(|| Err::<(), _>(Fault::Timeout));

    assert!(result.unwrap_err().is_exhausted());
    assert_eq!(
        sleeper.calls(),
        vec![
            Duration::from_millis(100),
            Duration::from_millis(200),
            Duration::from_millis(400),
            Duration::from_millis(500),
        ]
    );
}

#[test]
fn bounded_jitter_stays_near_backoff() {
    let sleeper = TrackingSleeper::new();
    let policy = RetryPolicy::builder()
        .max_attempts(6)
        .delay_handler(
            Backoff::constant(Duration::from_secs(2))
                .with_jitter(Jitter::bounded(Duration::from_millis(500))),
        )
        .with_sleeper(sleeper.clone())
        .build()
        .expect("valid policy");

    let _ = policy.call(|| Err::<(), _>(Fault::Timeout));

    let calls = sleeper.calls();
    assert_eq!(calls.len(), 5);
    for wait in calls {
        assert!(wait >= Duration::from_millis(1500) && wait <= Duration::from_millis(2500));
        assert_eq!(wait.as_millis() % 100, 0);
    }
}

#[test]
fn decorrelated_jitter_grows_from_previous_delay() {
    let sleeper = TrackingSleeper::new();
    let jitter = DecorrelatedJitter::new(Duration::from_millis(50), Duration::from_secs(1))
        .expect("valid bounds");
    let policy = RetryPolicy::builder()
        .max_attempts(8)
        .delay_handler(jitter)
        .with_sleeper(sleeper.clone())
        .build()
        .expect("valid policy");

    let mut previous = Vec::new();
    let _ = policy.call_with_state(|state| {
        previous.push(state.previous_delay().to_wait().expect("finite delay"));
        Err::<(), _>(Fault::Timeout)
    });

    let calls = sleeper.calls();
    assert_eq!(calls.len(), 7);
    assert_eq!(&previous[1..], &calls[..]);
    let mut last = Duration::from_millis(50);
    for wait in calls {
        assert!(wait >= Duration::from_millis(50));
        assert!(wait <= Duration::from_secs(1));
        assert!(wait <= last * 3);
        last = wait;
    }
}
