//! End-to-end word count over a small corpus with two mappers and two
//! reducers, keys split by a fixed pivot word.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use common::WorkerError;
use pmr_engine::{run, JobConfig, MapperFn, Mapping, PartitionFn, ReduceFn, VecSource};
use pmr_promise::Promise;

fn word_count_mapper() -> MapperFn<String, String, u64> {
    Arc::new(|line: String| {
        let promise = Promise::<Mapping<String, u64>, WorkerError>::new();
        let completer = promise.clone();
        tokio::spawn(async move {
            // Staggered a little so several inputs are in flight at once.
            tokio::time::sleep(Duration::from_millis(5)).await;
            let mut counts = Mapping::new();
            for word in line.split_whitespace() {
                *counts.entry(word.to_string()).or_insert(0) += 1;
            }
            let _ = completer.resolve(counts);
        });
        promise.thenable()
    })
}

fn sum_reducer() -> ReduceFn<u64, u64> {
    Arc::new(|accumulator, value| {
        let promise = Promise::<u64, WorkerError>::new();
        let completer = promise.clone();
        tokio::spawn(async move {
            let _ = completer.resolve(accumulator.unwrap_or(0) + value);
        });
        promise.thenable()
    })
}

fn pivot_partition() -> PartitionFn<String> {
    Arc::new(|key, _| usize::from(key.as_str() >= "middle"))
}

#[tokio::test]
async fn counts_words_across_two_mappers_and_two_reducers() {
    let lines = [
        "you load sixteen tons",
        "what do you get",
        "a day older",
        "and deeper in debt",
        "and sixteen tons",
        "well thats quite something",
        "something feels fishy",
    ];
    let source = VecSource::new(lines.iter().map(|line| line.to_string()));

    let config = JobConfig::new(
        vec![word_count_mapper(), word_count_mapper()],
        vec![sum_reducer(), sum_reducer()],
        pivot_partition(),
        Box::new(source),
    );

    let table = run(config).settled().await.unwrap();

    let expected: HashMap<String, u64> = [
        ("something", 2),
        ("feels", 1),
        ("fishy", 1),
        ("well", 1),
        ("quite", 1),
        ("thats", 1),
        ("you", 2),
        ("load", 1),
        ("tons", 2),
        ("sixteen", 2),
        ("do", 1),
        ("get", 1),
        ("what", 1),
        ("a", 1),
        ("older", 1),
        ("day", 1),
        ("and", 2),
        ("debt", 1),
        ("in", 1),
        ("deeper", 1),
    ]
    .into_iter()
    .map(|(word, count)| (word.to_string(), count))
    .collect();

    assert_eq!(table, expected);
}

#[tokio::test]
async fn single_line_single_worker_job() {
    let source = VecSource::new(["well thats quite something".to_string()]);
    let config = JobConfig::new(
        vec![word_count_mapper()],
        vec![sum_reducer()],
        pivot_partition(),
        Box::new(source),
    );

    let table = run(config).settled().await.unwrap();
    assert_eq!(table.len(), 4);
    assert!(table.values().all(|&count| count == 1));
}
