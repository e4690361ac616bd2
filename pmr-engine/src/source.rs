use std::collections::VecDeque;
use std::sync::Arc;

use pmr_promise::{Promise, Thenable};
use thiserror::Error;
use tokio_stream::{Stream, StreamExt};

use common::WorkerError;

/// Rejection channel of an input pull.
///
/// End-of-data and a genuine read failure travel on the same channel, but as
/// two distinct values so callers can tell them apart. The orchestrator
/// deliberately treats both as exhaustion; it logs a [`SourceSignal::Failed`]
/// so the ambiguity stays observable.
#[derive(Debug, Clone, Error)]
pub enum SourceSignal {
    #[error("no more input")]
    EndOfInput,

    #[error("input source failed: {0}")]
    Failed(WorkerError),
}

impl SourceSignal {
    pub fn failed<E: Into<anyhow::Error>>(err: E) -> Self {
        Self::Failed(common::worker_error(err))
    }
}

/// The outcome of one input pull.
pub type Pull<I> = Thenable<I, SourceSignal>;

/// A pull-based producer of input items.
///
/// The orchestrator issues pulls strictly sequentially: a new `next` call is
/// only made after the previous pull's outcome has been observed, so
/// implementations never see overlapping requests.
pub trait InputSource: Send {
    type Item: Clone + Send + 'static;

    fn next(&mut self) -> Pull<Self::Item>;
}

/// In-memory input source yielding items front to back.
pub struct VecSource<I> {
    items: VecDeque<I>,
}

impl<I> VecSource<I> {
    pub fn new(items: impl IntoIterator<Item = I>) -> Self {
        Self {
            items: items.into_iter().collect(),
        }
    }
}

impl<I> InputSource for VecSource<I>
where
    I: Clone + Send + 'static,
{
    type Item = I;

    fn next(&mut self) -> Pull<I> {
        let pull = Promise::<I, SourceSignal>::new();
        match self.items.pop_front() {
            Some(item) => {
                let _ = pull.resolve(item);
            }
            None => {
                let _ = pull.reject(SourceSignal::EndOfInput);
            }
        }
        pull.thenable()
    }
}

/// Adapter driving any [`tokio_stream::Stream`] as an input source. Each
/// pull polls one item from the stream on a spawned task.
pub struct StreamSource<S> {
    stream: Arc<tokio::sync::Mutex<S>>,
}

impl<S> StreamSource<S>
where
    S: Stream + Unpin + Send + 'static,
    S::Item: Clone + Send + 'static,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream: Arc::new(tokio::sync::Mutex::new(stream)),
        }
    }
}

impl<S> InputSource for StreamSource<S>
where
    S: Stream + Unpin + Send + 'static,
    S::Item: Clone + Send + 'static,
{
    type Item = S::Item;

    fn next(&mut self) -> Pull<S::Item> {
        let pull = Promise::<S::Item, SourceSignal>::new();
        let completer = pull.clone();
        let stream = Arc::clone(&self.stream);
        tokio::spawn(async move {
            let mut stream = stream.lock().await;
            match stream.next().await {
                Some(item) => {
                    let _ = completer.resolve(item);
                }
                None => {
                    let _ = completer.reject(SourceSignal::EndOfInput);
                }
            }
        });
        pull.thenable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn vec_source_yields_in_order_then_ends() {
        let mut source = VecSource::new(["a".to_string(), "b".to_string()]);
        assert_eq!(source.next().settled().await.unwrap(), "a");
        assert_eq!(source.next().settled().await.unwrap(), "b");
        assert!(matches!(
            source.next().settled().await,
            Err(SourceSignal::EndOfInput)
        ));
        // Exhaustion is stable.
        assert!(matches!(
            source.next().settled().await,
            Err(SourceSignal::EndOfInput)
        ));
    }

    #[tokio::test]
    async fn stream_source_drains_a_stream() {
        let mut source = StreamSource::new(tokio_stream::iter(vec![1u32, 2, 3]));
        let mut seen = Vec::new();
        loop {
            match source.next().settled().await {
                Ok(item) => seen.push(item),
                Err(SourceSignal::EndOfInput) => break,
                Err(other) => panic!("unexpected signal: {other}"),
            }
        }
        assert_eq!(seen, vec![1, 2, 3]);
    }
}
