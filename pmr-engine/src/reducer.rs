use std::sync::Arc;

use pmr_promise::Thenable;

use common::WorkerError;

/// An opaque asynchronous fold worker: existing accumulator (or `None` for
/// a key seen for the first time) plus one value in, a promise of the new
/// accumulator out.
pub type ReduceFn<A, V> = Arc<dyn Fn(Option<A>, V) -> Thenable<A, WorkerError> + Send + Sync>;

/// One fold invocation taken off a reducer node, self-contained so the
/// worker call happens outside any engine lock.
pub struct FoldTask<K, V, A> {
    pub key: K,
    accumulator: Option<A>,
    value: V,
    fold: ReduceFn<A, V>,
}

impl<K, V, A> FoldTask<K, V, A> {
    pub fn run(self) -> Thenable<A, WorkerError> {
        (self.fold)(self.accumulator, self.value)
    }
}

/// Per-partition sequential fold over a queue of pending (key, value)
/// pairs. Each node runs at most one fold at a time, so it is the
/// serialization point for every key routed to it.
///
/// The pending queue pops most-recently-pushed first (stack order). When
/// several distinct keys share one node, entries pushed earlier can
/// therefore be delayed arbitrarily behind later ones. The final
/// accumulated value per key is unaffected, but intermediate processing
/// order is last-in-first-out, not arrival order.
pub struct ReducerNode<K, V, A> {
    fold: ReduceFn<A, V>,
    pending: Vec<(K, V)>,
    busy: bool,
    current_key: Option<K>,
}

impl<K, V, A> ReducerNode<K, V, A>
where
    K: Clone,
{
    pub fn new(fold: ReduceFn<A, V>) -> Self {
        Self {
            fold,
            pending: Vec::new(),
            busy: false,
            current_key: None,
        }
    }

    /// Queue one (key, value) pair for folding.
    pub fn push(&mut self, key: K, value: V) {
        self.pending.push((key, value));
    }

    /// If the node is free and work is queued, pop the most recently pushed
    /// pair, mark the node busy and hand back the fold invocation for the
    /// caller to run. `lookup` supplies the key's current accumulator from
    /// the shared result table; absence is passed through as `None`.
    pub fn take_next(&mut self, lookup: impl FnOnce(&K) -> Option<A>) -> Option<FoldTask<K, V, A>> {
        if self.busy {
            return None;
        }
        let (key, value) = self.pending.pop()?;
        let accumulator = lookup(&key);
        self.current_key = Some(key.clone());
        self.busy = true;
        Some(FoldTask {
            key,
            accumulator,
            value,
            fold: Arc::clone(&self.fold),
        })
    }

    /// Record completion of the in-flight fold, freeing the node for the
    /// next [`take_next`](ReducerNode::take_next).
    pub fn complete_fold(&mut self) {
        self.busy = false;
        self.current_key = None;
    }

    pub fn current_key(&self) -> Option<&K> {
        self.current_key.as_ref()
    }

    /// True iff no fold is in flight and nothing is queued. This is the
    /// node's contribution to the job-wide quiescence check.
    pub fn is_idle(&self) -> bool {
        !self.busy && self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmr_promise::Promise;

    fn sum_fold() -> ReduceFn<u64, u64> {
        Arc::new(|accumulator, value| {
            let promise = Promise::new();
            let _ = promise.resolve(accumulator.unwrap_or(0) + value);
            promise.thenable()
        })
    }

    #[test]
    fn pops_most_recently_pushed_first() {
        let mut node = ReducerNode::new(sum_fold());
        node.push("a".to_string(), 1);
        node.push("b".to_string(), 2);
        node.push("c".to_string(), 3);

        let task = node.take_next(|_| None).unwrap();
        assert_eq!(task.key, "c");
        node.complete_fold();

        let task = node.take_next(|_| None).unwrap();
        assert_eq!(task.key, "b");
        node.complete_fold();

        let task = node.take_next(|_| None).unwrap();
        assert_eq!(task.key, "a");
    }

    #[test]
    fn busy_node_hands_out_no_work() {
        let mut node = ReducerNode::new(sum_fold());
        node.push("a".to_string(), 1);
        node.push("b".to_string(), 2);

        let first = node.take_next(|_| None).unwrap();
        assert_eq!(first.key, "b");
        assert_eq!(node.current_key(), Some(&"b".to_string()));
        assert!(node.take_next(|_| None).is_none());
        assert!(!node.is_idle());

        node.complete_fold();
        assert!(node.current_key().is_none());
        assert!(node.take_next(|_| None).is_some());
    }

    #[test]
    fn idle_only_when_free_and_drained() {
        let mut node = ReducerNode::new(sum_fold());
        assert!(node.is_idle());

        node.push("a".to_string(), 1);
        assert!(!node.is_idle());

        let _task = node.take_next(|_| None).unwrap();
        assert!(!node.is_idle());

        node.complete_fold();
        assert!(node.is_idle());
    }

    #[test]
    fn lookup_supplies_the_existing_accumulator() {
        let mut node = ReducerNode::new(sum_fold());
        node.push("a".to_string(), 5);

        let task = node.take_next(|key| (key == "a").then_some(37)).unwrap();
        assert_eq!(task.accumulator, Some(37));
    }

    #[tokio::test]
    async fn fold_task_runs_the_worker() {
        let mut node = ReducerNode::new(sum_fold());
        node.push("a".to_string(), 5);

        let task = node.take_next(|_| Some(10u64)).unwrap();
        assert_eq!(task.run().settled().await.unwrap(), 15);
    }
}
