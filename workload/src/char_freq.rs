//! Counts character occurrences: the mapper emits one count per distinct
//! non-whitespace character of a line, keyed by the character itself; the
//! reducer is the same summation as word counting.

use std::time::Duration;

use pmr_engine::{MapperFn, Mapping, ReduceFn};
use pmr_promise::Promise;
use rand::Rng;

use common::WorkerError;

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
            for ch in line.chars().filter(|ch| !ch.is_whitespace()) {
                *counts.entry(ch.to_string()).or_insert(0) += 1;
            }
            let _ = completer.resolve(counts);
        });
        promise.thenable()
    })
}

pub fn reducer() -> ReduceFn<u64, u64> {
    super::word_count::reducer()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mapper_skips_whitespace() {
        let map = mapper(None);
        let counts = map("a ba b".to_string()).settled().await.unwrap();
        assert_eq!(counts["a"], 3);
        assert_eq!(counts["b"], 2);
        assert_eq!(counts.len(), 2);
    }
}
