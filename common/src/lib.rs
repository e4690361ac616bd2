//! Shared pieces of the promise map-reduce workspace: the worker error
//! type that flows through rejection chains, and key hashing / partition
//! helpers used to route intermediate keys to reducer nodes.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

/////////////////////////////////////////////////////////////////////////////
// Worker errors
/////////////////////////////////////////////////////////////////////////////

/// Error value carried on the rejection channel of mapper and reducer
/// promises.
///
/// Rejections are delivered to every registered listener, so the value has
/// to be cheaply cloneable; wrapping [`anyhow::Error`] in an [`Arc`] keeps
/// the full context chain intact.
pub type WorkerError = Arc<anyhow::Error>;

/// Wrap any error into a [`WorkerError`].
pub fn worker_error<E: Into<anyhow::Error>>(err: E) -> WorkerError {
    Arc::new(err.into())
}

/////////////////////////////////////////////////////////////////////////////
// Key hashing and partitioning
/////////////////////////////////////////////////////////////////////////////

/// Hashes an intermediate key. Compute a reduce bucket for a given key
/// by calculating `ihash(key) % n_reduce`.
pub fn ihash<K: Hash>(key: &K) -> u32 {
    let mut hasher = fnv::FnvHasher::with_key(0);
    key.hash(&mut hasher);
    let value = hasher.finish() & 0x7fffffff;
    u32::try_from(value).unwrap_or(0)
}

/// Default partition function: deterministic routing of a key to one of
/// `n_reduce` buckets. Returns a value in `[0, n_reduce)`.
pub fn hash_partition<K: Hash>(key: &K, n_reduce: usize) -> usize {
    ihash(key) as usize % n_reduce.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_stays_in_range() {
        for n in 1..8usize {
            for word in ["you", "load", "sixteen", "tons", ""] {
                let bucket = hash_partition(&word, n);
                assert!(bucket < n, "bucket {bucket} out of range for n={n}");
            }
        }
    }

    #[test]
    fn partition_is_deterministic() {
        assert_eq!(hash_partition(&"debt", 4), hash_partition(&"debt", 4));
    }
}
