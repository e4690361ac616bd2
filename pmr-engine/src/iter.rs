//! Cooperative, time-sliced iteration over in-memory collections.
//!
//! [`for_each_async`] walks a collection in batches, yielding the scheduler
//! between batches so long traversals never monopolize a worker thread. Each
//! visited element is also published as a progress event on the returned
//! promise. The derived helpers (`map_async`, `filter_async`, `group_async`,
//! `fold_async`, `reduce_async`) are thin layers over it.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use pmr_promise::{Promise, Step, Thenable};
use thiserror::Error;

/// Schedules one batch of work onto a later tick. The default spawns a
/// tokio task; tests substitute a recording ticker.
pub type Ticker = Arc<dyn Fn(Box<dyn FnOnce() + Send>) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IterError {
    #[error("cannot reduce an empty source without an initial value")]
    EmptyIterable,
}

/// Batching knobs for [`for_each_async`]. The default visits everything in
/// one tick.
#[derive(Clone, Default)]
pub struct IterOptions {
    /// At most this many elements per tick.
    pub max_per_tick: Option<usize>,
    /// Yield once a batch has been running this long, even if the element
    /// quota is not reached.
    pub max_tick_duration: Option<Duration>,
    pub ticker: Option<Ticker>,
}

fn spawn_ticker() -> Ticker {
    Arc::new(|tick| {
        tokio::spawn(async move { tick() });
    })
}

struct BatchState<T, I, F> {
    iter: I,
    callback: F,
    promise: Promise<(), IterError, T>,
    max_per_tick: usize,
    max_tick_duration: Option<Duration>,
    ticker: Ticker,
}

/// Visit every element of `items` with `callback`, a batch per tick.
///
/// Each element is delivered as a progress event after its callback runs;
/// the promise resolves with `()` once the iterator is drained. The first
/// batch already runs on a later tick, so subscribing to the returned
/// thenable never misses events.
pub fn for_each_async<T, I, F>(
    items: I,
    callback: F,
    options: IterOptions,
) -> Thenable<(), IterError, T>
where
    T: Clone + Send + 'static,
    I: IntoIterator<Item = T>,
    I::IntoIter: Send + 'static,
    F: FnMut(T) + Send + 'static,
{
    let promise = Promise::<(), IterError, T>::new();
    let view = promise.thenable();
    let ticker = options.ticker.unwrap_or_else(spawn_ticker);
    let state = BatchState {
        iter: items.into_iter(),
        callback,
        promise,
        max_per_tick: options.max_per_tick.unwrap_or(usize::MAX),
        max_tick_duration: options.max_tick_duration,
        ticker: Arc::clone(&ticker),
    };
    ticker(Box::new(move || run_batch(state)));
    view
}

fn run_batch<T, I, F>(mut state: BatchState<T, I, F>)
where
    T: Clone + Send + 'static,
    I: Iterator<Item = T> + Send + 'static,
    F: FnMut(T) + Send + 'static,
{
    let started = Instant::now();
    let mut visited = 0usize;
    loop {
        if visited >= state.max_per_tick {
            break;
        }
        if let Some(budget) = state.max_tick_duration {
            if visited > 0 && started.elapsed() >= budget {
                break;
            }
        }
        match state.iter.next() {
            Some(item) => {
                (state.callback)(item.clone());
                let _ = state.promise.progress(item);
                visited += 1;
            }
            None => {
                let _ = state.promise.resolve(());
                return;
            }
        }
    }
    let ticker = Arc::clone(&state.ticker);
    ticker(Box::new(move || run_batch(state)));
}

/// Transform every element, collecting the outputs in iteration order.
pub fn map_async<T, U, I, F>(
    items: I,
    mut transform: F,
    options: IterOptions,
) -> Thenable<Vec<U>, IterError, T>
where
    T: Clone + Send + 'static,
    U: Clone + Send + 'static,
    I: IntoIterator<Item = T>,
    I::IntoIter: Send + 'static,
    F: FnMut(T) -> U + Send + 'static,
{
    let sink = Arc::new(Mutex::new(Vec::new()));
    let out = Arc::clone(&sink);
    for_each_async(
        items,
        move |item| {
            let mapped = transform(item);
            if let Ok(mut sink) = sink.lock() {
                sink.push(mapped);
            }
        },
        options,
    )
    .then(move |()| {
        let collected = out.lock().map(|mut v| std::mem::take(&mut *v)).unwrap_or_default();
        Ok(Step::Value(collected))
    })
}

/// Keep the elements `keep` accepts, in iteration order.
pub fn filter_async<T, I, F>(
    items: I,
    mut keep: F,
    options: IterOptions,
) -> Thenable<Vec<T>, IterError, T>
where
    T: Clone + Send + 'static,
    I: IntoIterator<Item = T>,
    I::IntoIter: Send + 'static,
    F: FnMut(&T) -> bool + Send + 'static,
{
    let sink = Arc::new(Mutex::new(Vec::new()));
    let out = Arc::clone(&sink);
    for_each_async(
        items,
        move |item| {
            if keep(&item) {
                if let Ok(mut sink) = sink.lock() {
                    sink.push(item);
                }
            }
        },
        options,
    )
    .then(move |()| {
        let collected = out.lock().map(|mut v| std::mem::take(&mut *v)).unwrap_or_default();
        Ok(Step::Value(collected))
    })
}

/// Bucket elements by the key `key_of` assigns them.
pub fn group_async<T, K, I, F>(
    items: I,
    mut key_of: F,
    options: IterOptions,
) -> Thenable<HashMap<K, Vec<T>>, IterError, T>
where
    T: Clone + Send + 'static,
    K: Eq + Hash + Clone + Send + 'static,
    I: IntoIterator<Item = T>,
    I::IntoIter: Send + 'static,
    F: FnMut(&T) -> K + Send + 'static,
{
    let sink = Arc::new(Mutex::new(HashMap::<K, Vec<T>>::new()));
    let out = Arc::clone(&sink);
    for_each_async(
        items,
        move |item| {
            let key = key_of(&item);
            if let Ok(mut sink) = sink.lock() {
                sink.entry(key).or_default().push(item);
            }
        },
        options,
    )
    .then(move |()| {
        let collected = out.lock().map(|mut m| std::mem::take(&mut *m)).unwrap_or_default();
        Ok(Step::Value(collected))
    })
}

/// Fold the elements into `seed`. An empty source resolves with the seed
/// untouched.
pub fn fold_async<T, A, I, F>(
    items: I,
    seed: A,
    mut fold: F,
    options: IterOptions,
) -> Thenable<A, IterError, T>
where
    T: Clone + Send + 'static,
    A: Clone + Send + 'static,
    I: IntoIterator<Item = T>,
    I::IntoIter: Send + 'static,
    F: FnMut(A, T) -> A + Send + 'static,
{
    let accumulator = Arc::new(Mutex::new(Some(seed)));
    let out = Arc::clone(&accumulator);
    for_each_async(
        items,
        move |item| {
            if let Ok(mut slot) = accumulator.lock() {
                if let Some(acc) = slot.take() {
                    *slot = Some(fold(acc, item));
                }
            }
        },
        options,
    )
    .then(move |()| match out.lock().ok().and_then(|mut slot| slot.take()) {
        Some(acc) => Ok(Step::Value(acc)),
        // The seed was installed up front, so this arm is unreachable in
        // practice.
        None => Err(IterError::EmptyIterable),
    })
}

/// Fold the elements into the first one. An empty source rejects with
/// [`IterError::EmptyIterable`].
pub fn reduce_async<T, I, F>(
    items: I,
    mut fold: F,
    options: IterOptions,
) -> Thenable<T, IterError, T>
where
    T: Clone + Send + 'static,
    I: IntoIterator<Item = T>,
    I::IntoIter: Send + 'static,
    F: FnMut(T, T) -> T + Send + 'static,
{
    let accumulator = Arc::new(Mutex::new(None::<T>));
    let out = Arc::clone(&accumulator);
    for_each_async(
        items,
        move |item| {
            if let Ok(mut slot) = accumulator.lock() {
                *slot = Some(match slot.take() {
                    Some(acc) => fold(acc, item),
                    None => item,
                });
            }
        },
        options,
    )
    .then(move |()| match out.lock().ok().and_then(|mut slot| slot.take()) {
        Some(acc) => Ok(Step::Value(acc)),
        None => Err(IterError::EmptyIterable),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inline_ticker() -> (Ticker, Arc<Mutex<usize>>) {
        let ticks = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&ticks);
        let ticker: Ticker = Arc::new(move |tick| {
            *counter.lock().unwrap() += 1;
            tick();
        });
        (ticker, ticks)
    }

    #[tokio::test]
    async fn visits_everything_and_reports_progress() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let progressed = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        let view = for_each_async(
            vec![1u32, 2, 3],
            move |item| sink.lock().unwrap().push(item),
            IterOptions::default(),
        );
        let events = Arc::clone(&progressed);
        view.then_with_progress(
            |()| Ok(Step::Value(())),
            |e| Err(e),
            move |item| events.lock().unwrap().push(item),
        );
        view.settled().await.unwrap();

        assert_eq!(*seen.lock().unwrap(), [1, 2, 3]);
        assert_eq!(*progressed.lock().unwrap(), [1, 2, 3]);
    }

    #[tokio::test]
    async fn batches_by_element_quota() {
        let (ticker, ticks) = inline_ticker();
        let view = for_each_async(
            vec![1u32, 2, 3, 4, 5],
            |_| {},
            IterOptions {
                max_per_tick: Some(2),
                ticker: Some(ticker),
                ..IterOptions::default()
            },
        );
        view.settled().await.unwrap();
        // Batches of 2, 2, 1: the last batch also observes the iterator's
        // end, so no extra tick is scheduled after it.
        assert_eq!(*ticks.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn map_collects_in_order() {
        let view = map_async(vec![1u32, 2, 3], |v| v * 10, IterOptions::default());
        assert_eq!(view.settled().await.unwrap(), vec![10, 20, 30]);
    }

    #[tokio::test]
    async fn filter_keeps_matching_elements() {
        let view = filter_async(0u32..10, |v| v % 3 == 0, IterOptions::default());
        assert_eq!(view.settled().await.unwrap(), vec![0, 3, 6, 9]);
    }

    #[tokio::test]
    async fn group_buckets_by_key() {
        let words = vec!["and", "a", "debt", "day"].into_iter().map(String::from);
        let view = group_async(
            words,
            |word: &String| word.len(),
            IterOptions::default(),
        );
        let groups = view.settled().await.unwrap();
        assert_eq!(groups[&3], vec!["and".to_string(), "day".to_string()]);
        assert_eq!(groups[&1], vec!["a".to_string()]);
        assert_eq!(groups[&4], vec!["debt".to_string()]);
    }

    #[tokio::test]
    async fn fold_of_nothing_is_the_seed() {
        let view = fold_async(Vec::<u32>::new(), 7u32, |acc, v| acc + v, IterOptions::default());
        assert_eq!(view.settled().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn fold_accumulates() {
        let view = fold_async(vec![1u32, 2, 3], 0u32, |acc, v| acc + v, IterOptions::default());
        assert_eq!(view.settled().await.unwrap(), 6);
    }

    #[tokio::test]
    async fn reduce_of_nothing_rejects() {
        let view = reduce_async(Vec::<u32>::new(), |acc, v| acc + v, IterOptions::default());
        assert_eq!(view.settled().await, Err(IterError::EmptyIterable));
    }

    #[tokio::test]
    async fn reduce_seeds_with_the_first_element() {
        let view = reduce_async(vec![5u32, 1, 2], |acc, v| acc - v, IterOptions::default());
        assert_eq!(view.settled().await.unwrap(), 2);
    }
}
