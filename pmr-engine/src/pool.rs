use std::collections::HashMap;
use std::sync::Arc;

use pmr_promise::Thenable;

use common::WorkerError;

/// A mapper's output: intermediate key/value pairs.
pub type Mapping<K, V> = HashMap<K, V>;

/// An opaque asynchronous mapper worker: one input item in, a promise of a
/// key/value mapping out.
pub type MapperFn<I, K, V> = Arc<dyn Fn(I) -> Thenable<Mapping<K, V>, WorkerError> + Send + Sync>;

/// Fixed set of mapper workers with single-flight exclusivity: a worker is
/// removed from the idle set while its map task is in flight and returned
/// on completion, so it is never invoked concurrently with itself.
///
/// `idle + in-flight == total` holds at all times. [`release`] must be
/// called exactly once per successful [`acquire`], whether the dispatched
/// map resolved or rejected.
///
/// [`acquire`]: MapperPool::acquire
/// [`release`]: MapperPool::release
pub struct MapperPool<I, K, V> {
    idle: Vec<MapperFn<I, K, V>>,
    total: usize,
}

impl<I, K, V> MapperPool<I, K, V> {
    pub fn new(mappers: Vec<MapperFn<I, K, V>>) -> Self {
        let total = mappers.len();
        Self {
            idle: mappers,
            total,
        }
    }

    /// Remove and return one idle worker, most recently released first, or
    /// `None` if every worker is in flight.
    pub fn acquire(&mut self) -> Option<MapperFn<I, K, V>> {
        self.idle.pop()
    }

    /// Return a worker to the idle set.
    pub fn release(&mut self, mapper: MapperFn<I, K, V>) {
        debug_assert!(self.idle.len() < self.total);
        self.idle.push(mapper);
    }

    pub fn idle_count(&self) -> usize {
        self.idle.len()
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// True iff no map task is in flight.
    pub fn all_idle(&self) -> bool {
        self.idle.len() == self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmr_promise::Promise;

    fn noop_mapper() -> MapperFn<u32, String, u32> {
        Arc::new(|_| {
            let promise = Promise::new();
            let _ = promise.resolve(Mapping::new());
            promise.thenable()
        })
    }

    #[test]
    fn acquire_drains_and_release_refills() {
        let mut pool = MapperPool::new(vec![noop_mapper(), noop_mapper()]);
        assert_eq!(pool.total(), 2);
        assert!(pool.all_idle());

        let first = pool.acquire().unwrap();
        let second = pool.acquire().unwrap();
        assert!(pool.acquire().is_none());
        assert_eq!(pool.idle_count(), 0);
        assert!(!pool.all_idle());

        pool.release(first);
        pool.release(second);
        assert!(pool.all_idle());
        assert_eq!(pool.total(), 2);
    }

    #[test]
    fn acquire_returns_most_recently_released_worker() {
        let early = noop_mapper();
        let late = noop_mapper();
        let mut pool = MapperPool::new(vec![Arc::clone(&early), Arc::clone(&late)]);

        let taken = pool.acquire().unwrap();
        assert!(Arc::ptr_eq(&taken, &late));

        pool.release(taken);
        let taken = pool.acquire().unwrap();
        assert!(Arc::ptr_eq(&taken, &late));
        let taken = pool.acquire().unwrap();
        assert!(Arc::ptr_eq(&taken, &early));
    }
}
