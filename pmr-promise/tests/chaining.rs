//! End-to-end promise behavior across real tokio tasks: settlement from a
//! spawned worker, chained continuations over task boundaries, and progress
//! observed through the read-only facade.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use pmr_promise::{Promise, PromiseError, Step};

/// A worker-shaped helper: hands out a thenable and settles the promise
/// from a spawned task after a short delay.
fn delayed_value(value: i64, delay: Duration) -> pmr_promise::Thenable<i64, String> {
    let promise = Promise::<i64, String>::new();
    let completer = promise.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = completer.resolve(value);
    });
    promise.thenable()
}

#[tokio::test]
async fn settled_observes_a_worker_resolution() {
    let view = delayed_value(5, Duration::from_millis(5));
    assert_eq!(view.settled().await, Ok(5));
}

#[tokio::test]
async fn wait_steps_chain_across_tasks() {
    let view = delayed_value(10, Duration::from_millis(2))
        .then(|v| Ok(Step::Wait(delayed_value(v + 10, Duration::from_millis(2)))))
        .then(|v| Ok(Step::Value(v + 1)));
    assert_eq!(view.settled().await, Ok(21));
}

#[tokio::test]
async fn rejection_reaches_a_late_subscriber() {
    let promise = Promise::<i64, String>::new();
    promise.reject("boom".to_string()).unwrap();

    // Subscribing after the fact still sees the stored error, one tick later.
    let view = promise.catch(|e| Err(format!("observed: {e}")));
    assert_eq!(view.settled().await, Err("observed: boom".to_string()));
}

#[tokio::test]
async fn progress_streams_through_the_thenable() {
    let promise = Promise::<(), String, u32>::new();
    let view = promise.thenable();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let done = view.then_with_progress(
        |()| Ok(Step::Value(())),
        |e| Err(e),
        move |v| sink.lock().unwrap().push(v),
    );

    let producer = promise.clone();
    tokio::spawn(async move {
        for v in 1..=3 {
            let _ = producer.progress(v);
        }
        let _ = producer.resolve(());
    });

    done.settled().await.unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    assert_eq!(promise.progress(4), Err(PromiseError::AlreadySettled));
}
