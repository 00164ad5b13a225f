use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::{Algorithm, RateConfig, SluiceError, SyncBucket};

fn bucket(capacity: f64, seconds: f64, algorithm: Algorithm) -> SyncBucket {
    SyncBucket::new(RateConfig::new(capacity, seconds).unwrap(), algorithm)
}

#[test]
fn acquire_rejects_amount_greater_than_capacity_without_waiting() {
    for algorithm in [
        Algorithm::LeakyBucket,
        Algorithm::TokenBucket,
        Algorithm::GcraLeakyBucket,
        Algorithm::GcraVirtualScheduling,
    ] {
        let bucket = bucket(2.0, 60.0, algorithm);

        let started = Instant::now();
        assert_eq!(
            bucket.acquire(3.0).unwrap_err(),
            SluiceError::AmountExceedsCapacity {
                amount: 3.0,
                capacity: 2.0
            }
        );
        assert!(started.elapsed() < Duration::from_millis(50), "{algorithm:?} suspended");
    }
}

#[test]
fn acquire_rejects_negative_amount_without_waiting() {
    let bucket = bucket(2.0, 60.0, Algorithm::TokenBucket);

    let started = Instant::now();
    assert_eq!(
        bucket.acquire(-1.0).unwrap_err(),
        SluiceError::NegativeAmount { amount: -1.0 }
    );
    assert!(started.elapsed() < Duration::from_millis(50));
}

#[test]
fn acquire_error_messages_match_the_api_contract() {
    let bucket = bucket(2.0, 1.0, Algorithm::LeakyBucket);

    assert_eq!(
        bucket.acquire(3.0).unwrap_err().to_string(),
        "cannot acquire more than the bucket's capacity: 2"
    );
    assert_eq!(
        bucket.acquire(-1.0).unwrap_err().to_string(),
        "cannot acquire less than 0 amount with amount: -1"
    );
}

#[test]
fn six_sequential_acquires_sleep_exactly_four_times() {
    // capacity 2 per 0.2 s: the first two are the burst, the remaining
    // four each wait one increment (0.1 s).
    for algorithm in [
        Algorithm::LeakyBucket,
        Algorithm::TokenBucket,
        Algorithm::GcraLeakyBucket,
        Algorithm::GcraVirtualScheduling,
    ] {
        let bucket = bucket(2.0, 0.2, algorithm);

        let mut slept = 0;
        for _ in 0..6 {
            let started = Instant::now();
            bucket.acquire(1.0).unwrap();
            let elapsed = started.elapsed();

            if elapsed >= Duration::from_millis(30) {
                slept += 1;
                assert!(
                    elapsed < Duration::from_millis(250),
                    "{algorithm:?} overslept: {elapsed:?}"
                );
            }
        }

        assert_eq!(slept, 4, "{algorithm:?}");
    }
}

#[test]
fn capacity_info_reports_the_exact_deficit() {
    let bucket = bucket(2.0, 0.2, Algorithm::TokenBucket);

    let info = bucket.capacity_info(3.0);
    assert!(!info.admitted);
    assert_eq!(info.deficit, 1.0);

    let info = bucket.capacity_info(2.0);
    assert!(info.admitted);
    assert_eq!(info.deficit, 0.0);

    let info = bucket.capacity_info(1.0);
    assert!(info.admitted);
    assert_eq!(info.deficit, -1.0);
}

#[test]
fn capacity_info_does_not_consume_capacity() {
    let bucket = bucket(2.0, 60.0, Algorithm::TokenBucket);

    for _ in 0..10 {
        assert!(bucket.capacity_info(2.0).admitted);
    }

    // Probing never committed anything: the full burst is still there.
    bucket.acquire(2.0).unwrap();
    assert!(!bucket.capacity_info(1.0).admitted);
}

#[test]
fn acquire_timeout_fails_when_the_wait_exceeds_the_deadline() {
    let bucket = bucket(1.0, 60.0, Algorithm::TokenBucket);
    bucket.acquire(1.0).unwrap();

    let started = Instant::now();
    let result = bucket.acquire_timeout(1.0, Duration::from_millis(50));
    let elapsed = started.elapsed();

    assert_eq!(
        result.unwrap_err(),
        SluiceError::AcquireTimeout {
            amount: 1.0,
            timeout: Duration::from_millis(50)
        }
    );
    // The deadline was honored: one bounded sleep, not the full minute.
    assert!(elapsed >= Duration::from_millis(50));
    assert!(elapsed < Duration::from_millis(500));
}

#[test]
fn acquire_timeout_succeeds_when_capacity_arrives_in_time() {
    let bucket = bucket(2.0, 0.2, Algorithm::LeakyBucket);
    bucket.acquire(2.0).unwrap();

    // One unit drains in 0.1 s, well inside the deadline.
    bucket
        .acquire_timeout(1.0, Duration::from_secs(2))
        .unwrap();
}

#[test]
fn timed_out_acquire_leaves_no_residual_state() {
    let bucket = bucket(2.0, 0.2, Algorithm::TokenBucket);
    bucket.acquire(2.0).unwrap();

    let _ = bucket.acquire_timeout(2.0, Duration::from_millis(10));

    // The timed-out caller committed nothing: a full refill later, the
    // whole burst is available again, not burst minus the failed amount.
    thread::sleep(Duration::from_millis(250));
    assert!(bucket.capacity_info(2.0).admitted);
}

#[test]
fn shutdown_fails_subsequent_acquires_fast() {
    let bucket = bucket(2.0, 0.2, Algorithm::LeakyBucket);
    bucket.acquire(1.0).unwrap();

    bucket.shutdown();

    assert_eq!(bucket.acquire(1.0).unwrap_err(), SluiceError::ShutDown);
    assert_eq!(
        bucket
            .acquire_timeout(1.0, Duration::from_secs(1))
            .unwrap_err(),
        SluiceError::ShutDown
    );
}

#[test]
fn throttled_runs_the_closure_after_admission() {
    let bucket = bucket(2.0, 0.2, Algorithm::TokenBucket);

    let value = bucket.throttled(|| 41 + 1).unwrap();
    assert_eq!(value, 42);
}

#[test]
fn concurrent_threads_are_serialized_by_the_bucket() {
    // capacity 1 per 0.1 s: three threads need at least two drain
    // periods between them.
    let bucket = Arc::new(bucket(1.0, 0.1, Algorithm::TokenBucket));
    let order: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));

    let started = Instant::now();
    let threads: Vec<_> = (0..3)
        .map(|i| {
            let bucket = bucket.clone();
            let order = order.clone();
            thread::spawn(move || {
                bucket.acquire(1.0).unwrap();
                order.lock().unwrap().push(i);
            })
        })
        .collect();

    for t in threads {
        t.join().expect("thread panicked");
    }

    assert!(started.elapsed() >= Duration::from_millis(150));
    assert_eq!(order.lock().unwrap().len(), 3);
}
