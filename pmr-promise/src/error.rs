use thiserror::Error;

/// Errors raised by invalid operations on a [`crate::Promise`].
///
/// These are reported synchronously to the caller attempting the invalid
/// operation; they never disturb the settlement already stored in the cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PromiseError {
    /// `resolve` or `reject` was called on a promise that is already
    /// settled. The original settlement stands.
    #[error("promise is already settled and cannot be completed again")]
    DoubleCompletion,

    /// `progress` was called on a promise that is already settled.
    #[error("promise is already settled and no longer accepts progress events")]
    AlreadySettled,
}
