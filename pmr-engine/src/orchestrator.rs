use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

use dashmap::DashMap;
use pmr_promise::{Promise, Step, Thenable};
use tracing::{debug, error, info, warn};

use common::WorkerError;

use crate::error::JobError;
use crate::pool::{MapperFn, MapperPool, Mapping};
use crate::reducer::{FoldTask, ReduceFn, ReducerNode};
use crate::source::{InputSource, SourceSignal};

/// Deterministic routing of an intermediate key to one of `reducer_count`
/// reducer nodes. Must return a value in `[0, reducer_count)`; a job whose
/// partition function returns an out-of-range index is rejected with
/// [`JobError::InvalidConfig`].
pub type PartitionFn<K> = Arc<dyn Fn(&K, usize) -> usize + Send + Sync>;

/// What to do when a mapper or reducer promise rejects. There is no retry
/// in either mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Log the rejection at error level and drop it. A rejected map loses
    /// that input's contribution; a rejected fold leaves its reducer node
    /// permanently busy, so the job can never quiesce. This mirrors the
    /// historical behavior of systems that attach no rejection handler at
    /// all, and is the default.
    #[default]
    Ignore,
    /// Reject the job promise with the first worker failure.
    Abort,
}

/// Everything a job needs. All fields are required; reducer index `i`
/// receives the keys for which `partition(key, reducers.len()) == i`.
pub struct JobConfig<I, K, V, A> {
    pub mappers: Vec<MapperFn<I, K, V>>,
    pub reducers: Vec<ReduceFn<A, V>>,
    pub partition: PartitionFn<K>,
    pub source: Box<dyn InputSource<Item = I>>,
    pub on_worker_failure: FailurePolicy,
}

impl<I, K, V, A> JobConfig<I, K, V, A> {
    pub fn new(
        mappers: Vec<MapperFn<I, K, V>>,
        reducers: Vec<ReduceFn<A, V>>,
        partition: PartitionFn<K>,
        source: Box<dyn InputSource<Item = I>>,
    ) -> Self {
        Self {
            mappers,
            reducers,
            partition,
            source,
            on_worker_failure: FailurePolicy::default(),
        }
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.on_worker_failure = policy;
        self
    }
}

/// Start a map-reduce job and hand back the job promise's read-only view.
///
/// Orchestration begins on the next scheduler tick, so the caller always
/// receives the thenable before any work is dispatched. The promise
/// resolves with the final key → accumulator table exactly once, at the
/// first observed quiescent state; it is rejected only under
/// [`FailurePolicy::Abort`]. There is no cancellation and no timeout: a
/// fold promise that never settles keeps the job pending forever.
pub fn run<I, K, V, A>(config: JobConfig<I, K, V, A>) -> Thenable<HashMap<K, A>, JobError>
where
    I: Clone + Send + 'static,
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + 'static,
    A: Clone + Send + Sync + 'static,
{
    if config.mappers.is_empty() || config.reducers.is_empty() {
        let job = Promise::new();
        let _ = job.reject(JobError::InvalidConfig(
            "a job needs at least one mapper and one reducer",
        ));
        return job.thenable();
    }

    let orchestrator = Arc::new(Orchestrator::new(config));
    let view = orchestrator.job.thenable();
    info!("starting map-reduce job");
    tokio::spawn(async move {
        orchestrator.pull_next();
    });
    view
}

/// Orchestrator-owned mutable state. Everything here is touched only under
/// the one job mutex, which serializes all state-changing callbacks while
/// worker computation proceeds in parallel outside it.
struct JobCore<I, K, V, A> {
    /// Inputs pulled but not yet mapped. Popped most-recently-queued first
    /// (stack order), like the reducer queues.
    pending_inputs: Vec<I>,
    exhausted: bool,
    done: bool,
    pool: MapperPool<I, K, V>,
    reducers: Vec<ReducerNode<K, V, A>>,
    partition: PartitionFn<K>,
    policy: FailurePolicy,
}

enum StepAction<M, I> {
    Finish,
    Dispatch(M, I),
    Wait,
}

struct Orchestrator<I, K, V, A> {
    core: Mutex<JobCore<I, K, V, A>>,
    source: Mutex<Box<dyn InputSource<Item = I>>>,
    /// Key → accumulated value. Written only by fold-completion callbacks.
    results: DashMap<K, A>,
    job: Promise<HashMap<K, A>, JobError>,
}

impl<I, K, V, A> Orchestrator<I, K, V, A>
where
    I: Clone + Send + 'static,
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + 'static,
    A: Clone + Send + Sync + 'static,
{
    fn new(config: JobConfig<I, K, V, A>) -> Self {
        let core = JobCore {
            pending_inputs: Vec::new(),
            exhausted: false,
            done: false,
            pool: MapperPool::new(config.mappers),
            reducers: config.reducers.into_iter().map(ReducerNode::new).collect(),
            partition: config.partition,
            policy: config.on_worker_failure,
        };
        Self {
            core: Mutex::new(core),
            source: Mutex::new(config.source),
            results: DashMap::new(),
            job: Promise::new(),
        }
    }

    fn lock_core(&self) -> MutexGuard<'_, JobCore<I, K, V, A>> {
        self.core.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Issue one pull. Pulls are strictly sequential: the next one is only
    /// issued once this pull's outcome has been observed.
    fn pull_next(self: &Arc<Self>) {
        {
            let core = self.lock_core();
            if core.exhausted || core.done {
                return;
            }
        }
        let pull = {
            let mut source = self
                .source
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            source.next()
        };
        let on_item = {
            let this = Arc::clone(self);
            move |item: I| {
                this.input_arrived(item);
                Ok(Step::Value(()))
            }
        };
        let on_end = {
            let this = Arc::clone(self);
            move |signal: SourceSignal| {
                this.input_ended(signal);
                Ok(Step::Value(()))
            }
        };
        pull.then_or_else(on_item, on_end);
    }

    fn input_arrived(self: &Arc<Self>, item: I) {
        {
            let mut core = self.lock_core();
            if core.done {
                return;
            }
            core.pending_inputs.push(item);
        }
        self.process_step();
        self.pull_next();
    }

    fn input_ended(self: &Arc<Self>, signal: SourceSignal) {
        match &signal {
            SourceSignal::EndOfInput => debug!("input source exhausted"),
            SourceSignal::Failed(err) => {
                warn!("input source failed; treating as end of input: {:#}", err)
            }
        }
        {
            let mut core = self.lock_core();
            core.exhausted = true;
        }
        self.process_step();
    }

    /// Re-evaluate the job after any state change: resolve on quiescence,
    /// otherwise dispatch at most one queued input. Dispatch is event
    /// driven; when no mapper is free the next state change retries.
    fn process_step(self: &Arc<Self>) {
        let action = {
            let mut core = self.lock_core();
            if core.done {
                return;
            }
            // The pending-input check is required here: another callback can
            // release the last busy mapper between its own critical section
            // and its follow-up re-evaluation, so "pool idle" alone does not
            // imply the queue has been drained.
            let quiescent = core.exhausted
                && core.pending_inputs.is_empty()
                && core.pool.all_idle()
                && core.reducers.iter().all(ReducerNode::is_idle);
            if quiescent {
                core.done = true;
                StepAction::Finish
            } else if core.pending_inputs.is_empty() {
                StepAction::Wait
            } else {
                match core.pool.acquire() {
                    Some(mapper) => match core.pending_inputs.pop() {
                        Some(input) => StepAction::Dispatch(mapper, input),
                        None => {
                            core.pool.release(mapper);
                            StepAction::Wait
                        }
                    },
                    None => StepAction::Wait,
                }
            }
        };
        match action {
            StepAction::Finish => {
                let table: HashMap<K, A> = self
                    .results
                    .iter()
                    .map(|entry| (entry.key().clone(), entry.value().clone()))
                    .collect();
                info!("job quiescent; resolving with {} keys", table.len());
                let _ = self.job.resolve(table);
            }
            StepAction::Dispatch(mapper, input) => self.dispatch_map(mapper, input),
            StepAction::Wait => {}
        }
    }

    fn dispatch_map(self: &Arc<Self>, mapper: MapperFn<I, K, V>, input: I) {
        debug!("dispatching one input to a mapper");
        let mapping = (mapper)(input);
        let on_mapping = {
            let this = Arc::clone(self);
            let mapper = Arc::clone(&mapper);
            move |mapping: Mapping<K, V>| {
                this.map_finished(mapper, mapping);
                Ok(Step::Value(()))
            }
        };
        let on_failure = {
            let this = Arc::clone(self);
            move |err: WorkerError| {
                this.map_failed(mapper, err);
                Ok(Step::Value(()))
            }
        };
        mapping.then_or_else(on_mapping, on_failure);
    }

    /// Mapper completion: the worker returns to the pool, every output pair
    /// is routed to its partition's reducer, idle reducers start folding,
    /// and the job is re-evaluated. All bookkeeping happens atomically
    /// under the job lock; only the fold invocations run outside it.
    fn map_finished(self: &Arc<Self>, mapper: MapperFn<I, K, V>, mapping: Mapping<K, V>) {
        let (folds, bad_partition) = {
            let mut core = self.lock_core();
            if core.done {
                return;
            }
            core.pool.release(mapper);
            let reducer_count = core.reducers.len();
            let mut folds: Vec<(usize, FoldTask<K, V, A>)> = Vec::new();
            let mut bad_partition = false;
            for (key, value) in mapping {
                let index = (core.partition)(&key, reducer_count);
                if index >= reducer_count {
                    error!(
                        "partition function returned reducer index {} with only {} reducers",
                        index, reducer_count
                    );
                    core.done = true;
                    bad_partition = true;
                    break;
                }
                let node = &mut core.reducers[index];
                node.push(key, value);
                if let Some(task) =
                    node.take_next(|k| self.results.get(k).map(|entry| entry.value().clone()))
                {
                    folds.push((index, task));
                }
            }
            (folds, bad_partition)
        };
        if bad_partition {
            let _ = self.job.reject(JobError::InvalidConfig(
                "partition function returned an out-of-range reducer index",
            ));
            return;
        }
        for (index, task) in folds {
            self.launch_fold(index, task);
        }
        self.process_step();
    }

    fn map_failed(self: &Arc<Self>, mapper: MapperFn<I, K, V>, err: WorkerError) {
        error!("mapper rejected; not retried: {:#}", err);
        let abort = {
            let mut core = self.lock_core();
            if core.done {
                return;
            }
            core.pool.release(mapper);
            match core.policy {
                FailurePolicy::Abort => {
                    core.done = true;
                    true
                }
                FailurePolicy::Ignore => false,
            }
        };
        if abort {
            let _ = self.job.reject(JobError::MapperFailed(err));
        } else {
            // That input's contribution is lost; the job carries on.
            self.process_step();
        }
    }

    fn launch_fold(self: &Arc<Self>, index: usize, task: FoldTask<K, V, A>) {
        let key = task.key.clone();
        let outcome = task.run();
        let on_accumulated = {
            let this = Arc::clone(self);
            move |accumulated: A| {
                this.fold_finished(index, key, accumulated);
                Ok(Step::Value(()))
            }
        };
        let on_failure = {
            let this = Arc::clone(self);
            move |err: WorkerError| {
                this.fold_failed(index, err);
                Ok(Step::Value(()))
            }
        };
        outcome.then_or_else(on_accumulated, on_failure);
    }

    /// Fold completion: store the new accumulator, free the node,
    /// re-evaluate the job, then drain the node's queue.
    fn fold_finished(self: &Arc<Self>, index: usize, key: K, accumulated: A) {
        self.results.insert(key, accumulated);
        {
            let mut core = self.lock_core();
            if core.done {
                return;
            }
            core.reducers[index].complete_fold();
        }
        self.process_step();
        let next = {
            let mut core = self.lock_core();
            if core.done {
                None
            } else {
                core.reducers[index]
                    .take_next(|k| self.results.get(k).map(|entry| entry.value().clone()))
            }
        };
        if let Some(task) = next {
            self.launch_fold(index, task);
        }
    }

    fn fold_failed(self: &Arc<Self>, index: usize, err: WorkerError) {
        error!(
            "reducer {} rejected; not retried, node stays busy: {:#}",
            index, err
        );
        let abort = {
            let mut core = self.lock_core();
            if core.done {
                return;
            }
            match core.policy {
                FailurePolicy::Abort => {
                    core.done = true;
                    true
                }
                // The node is deliberately left busy: the dropped fold means
                // the job can never quiesce, which keeps the data loss
                // impossible to mistake for success.
                FailurePolicy::Ignore => false,
            }
        };
        if abort {
            let _ = self.job.reject(JobError::ReducerFailed(err));
        }
    }
}
