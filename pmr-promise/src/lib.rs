//! A single-assignment asynchronous completion cell with chained
//! continuations, error propagation and incremental progress events.
//!
//! A [`Promise`] is settled at most once, by `resolve` or `reject`. Handlers
//! registered through the `then` family run in registration order when the
//! promise settles; each registration produces a continuation promise whose
//! outcome is derived from the handler's return value. Consumers that should
//! be able to observe but not complete a promise receive a [`Thenable`], a
//! read-only subscription facade over the same cell.
//!
//! Handlers attached to an already-settled promise are scheduled onto the
//! tokio runtime rather than run inline, so registration never re-enters the
//! caller. This crate therefore expects to run inside a tokio runtime.

mod error;
mod promise;
mod thenable;

pub use error::PromiseError;
pub use promise::{Promise, Step};
pub use thenable::Thenable;
