//! Ready-made map-reduce applications over lines of text. Each workload
//! bundles a mapper constructor and a reducer constructor so binaries and
//! tests can assemble a job from a name.

use std::time::Duration;

use pmr_engine::{MapperFn, ReduceFn};

pub mod char_freq;
pub mod word_count;

/// A named application: factories for its mapper and reducer workers.
/// Calling a factory more than once yields independent workers for the
/// pool.
pub struct Workload {
    pub name: &'static str,
    mapper: fn(Option<Duration>) -> MapperFn<String, String, u64>,
    reducer: fn() -> ReduceFn<u64, u64>,
}

impl Workload {
    /// Look a workload up by name.
    pub fn try_named(name: &str) -> Option<Workload> {
        match name {
            "word-count" => Some(Workload {
                name: "word-count",
                mapper: word_count::mapper,
                reducer: word_count::reducer,
            }),
            "char-freq" => Some(Workload {
                name: "char-freq",
                mapper: char_freq::mapper,
                reducer: char_freq::reducer,
            }),
            _ => None,
        }
    }

    /// Build `count` mapper workers, each simulating `latency` of work per
    /// input when set.
    pub fn mappers(
        &self,
        count: usize,
        latency: Option<Duration>,
    ) -> Vec<MapperFn<String, String, u64>> {
        (0..count).map(|_| (self.mapper)(latency)).collect()
    }

    /// Build `count` reducer workers.
    pub fn reducers(&self, count: usize) -> Vec<ReduceFn<u64, u64>> {
        (0..count).map(|_| (self.reducer)()).collect()
    }
}
