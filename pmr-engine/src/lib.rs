//! An in-process map-reduce engine built on the promise primitive from
//! `pmr-promise`.
//!
//! A job pulls items from an [`InputSource`] one at a time, fans them out
//! across a fixed pool of asynchronous mapper workers, routes each mapper's
//! key/value output to one of several reducer nodes via a partition
//! function, and resolves a single job promise with the accumulated result
//! table once the whole system is quiescent: input exhausted, every mapper
//! idle, every reducer drained.
//!
//! Workers are opaque asynchronous functions returning a
//! [`Thenable`](pmr_promise::Thenable); the engine never spawns or manages
//! worker processes, and dispatched work is never cancelled, retried or
//! timed out.

mod error;
mod iter;
mod orchestrator;
mod pool;
mod reducer;
mod source;

pub use error::JobError;
pub use iter::{
    filter_async, fold_async, for_each_async, group_async, map_async, reduce_async, IterError,
    IterOptions, Ticker,
};
pub use orchestrator::{run, FailurePolicy, JobConfig, PartitionFn};
pub use pool::{MapperFn, MapperPool, Mapping};
pub use reducer::{FoldTask, ReduceFn, ReducerNode};
pub use source::{InputSource, Pull, SourceSignal, StreamSource, VecSource};
