use common::WorkerError;
use thiserror::Error;

/// Terminal failure of a map-reduce job.
///
/// Only produced under [`FailurePolicy::Abort`](crate::FailurePolicy) (or
/// for an unusable configuration); with the default policy a worker
/// rejection is logged and dropped and the job promise is never rejected.
#[derive(Debug, Clone, Error)]
pub enum JobError {
    #[error("mapper rejected: {0}")]
    MapperFailed(WorkerError),

    #[error("reducer rejected: {0}")]
    ReducerFailed(WorkerError),

    #[error("invalid job configuration: {0}")]
    InvalidConfig(&'static str),
}
