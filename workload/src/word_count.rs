//! Counts word occurrences: the mapper splits a line on whitespace and
//! emits one count per distinct word, the reducer sums counts per word.

use std::time::Duration;

use pmr_engine::{MapperFn, Mapping, ReduceFn};
use pmr_promise::Promise;
use rand::Rng;

use common::WorkerError;

/// A mapper worker counting the words of one line. When `latency` is set
/// the worker sleeps for a randomized slice of it first, standing in for
/// real I/O so pool scheduling effects show up.
pub fn mapper(latency: Option<Duration>) -> MapperFn<String, String, u64> {
    std::sync::Arc::new(move |line: String| {
        let promise = Promise::<Mapping<String, u64>, WorkerError>::new();
        let completer = promise.clone();
        tokio::spawn(async move {
            if let Some(latency) = latency {
                let jitter = rand::thread_rng().gen_range(0.5..1.5);
                tokio::time::sleep(latency.mul_f64(jitter)).await;
            }
            let mut counts = Mapping::new();
            for word in line.split_whitespace() {
                *counts.entry(word.to_string()).or_insert(0) += 1;
            }
            let _ = completer.resolve(counts);
        });
        promise.thenable()
    })
}

/// A reducer worker summing counts into the running total for a word.
pub fn reducer() -> ReduceFn<u64, u64> {
    std::sync::Arc::new(|accumulator, value| {
        let promise = Promise::<u64, WorkerError>::new();
        let completer = promise.clone();
        tokio::spawn(async move {
            let _ = completer.resolve(accumulator.unwrap_or(0) + value);
        });
        promise.thenable()
    })
}
