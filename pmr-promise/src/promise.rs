use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::PromiseError;
use crate::thenable::Thenable;

/// Outcome of a `then` handler.
///
/// The continuation promise either takes the handler's plain return value,
/// or mirrors the eventual outcome of another promise the handler hands
/// back. The sum type makes the choice explicit at the call site instead of
/// inspecting the returned value at runtime.
pub enum Step<T, E, P = ()> {
    /// Resolve the continuation with this value immediately.
    Value(T),
    /// Chain the continuation to this promise's eventual outcome.
    Wait(Thenable<T, E, P>),
}

type ResolveFn<T> = Box<dyn FnOnce(T) + Send>;
type RejectFn<E> = Box<dyn FnOnce(E) + Send>;
type ProgressFn<P> = Arc<dyn Fn(P) + Send + Sync>;

/// One registered subscription: optional resolve / reject / progress
/// handlers. The resolve and reject closures own the continuation promise
/// and settle it from the handler's outcome.
struct Listener<T, E, P> {
    on_resolve: Option<ResolveFn<T>>,
    on_reject: Option<RejectFn<E>>,
    on_progress: Option<ProgressFn<P>>,
}

enum State<T, E, P> {
    /// Not yet settled; listeners in registration order.
    Pending(Vec<Listener<T, E, P>>),
    Resolved(T),
    Rejected(E),
}

/// Single-assignment asynchronous result cell.
///
/// `T` is the resolution value, `E` the rejection value and `P` the type of
/// intermediate progress events. All three are cloned per listener on
/// delivery, hence the `Clone` bounds.
///
/// Settlement is exactly-once and irreversible: after one successful
/// [`resolve`](Promise::resolve) or [`reject`](Promise::reject), any further
/// completion attempt fails with [`PromiseError::DoubleCompletion`] and the
/// stored outcome is unchanged.
pub struct Promise<T, E, P = ()> {
    inner: Arc<Mutex<State<T, E, P>>>,
}

impl<T, E, P> Clone for Promise<T, E, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, E, P> Default for Promise<T, E, P>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
    P: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E, P> Promise<T, E, P>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
    P: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(State::Pending(Vec::new()))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T, E, P>> {
        // A panicking handler poisons the lock but leaves the state
        // consistent; keep the cell usable.
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Settle the promise with `value` and deliver it to every registered
    /// resolve handler, in registration order.
    pub fn resolve(&self, value: T) -> Result<(), PromiseError> {
        let listeners = {
            let mut state = self.lock();
            let drained = match &mut *state {
                State::Pending(listeners) => std::mem::take(listeners),
                _ => return Err(PromiseError::DoubleCompletion),
            };
            *state = State::Resolved(value.clone());
            drained
        };
        for mut listener in listeners {
            if let Some(handler) = listener.on_resolve.take() {
                handler(value.clone());
            }
        }
        Ok(())
    }

    /// Settle the promise with `error` and deliver it to every registered
    /// reject handler, in registration order. A listener registered without
    /// a reject handler propagates the unchanged error to its continuation.
    pub fn reject(&self, error: E) -> Result<(), PromiseError> {
        let listeners = {
            let mut state = self.lock();
            let drained = match &mut *state {
                State::Pending(listeners) => std::mem::take(listeners),
                _ => return Err(PromiseError::DoubleCompletion),
            };
            *state = State::Rejected(error.clone());
            drained
        };
        for mut listener in listeners {
            if let Some(handler) = listener.on_reject.take() {
                handler(error.clone());
            }
        }
        Ok(())
    }

    /// Deliver an intermediate value to every registered progress handler,
    /// in registration order. Progress produces no continuation chaining.
    pub fn progress(&self, value: P) -> Result<(), PromiseError> {
        let handlers: Vec<ProgressFn<P>> = {
            let state = self.lock();
            match &*state {
                State::Pending(listeners) => listeners
                    .iter()
                    .filter_map(|listener| listener.on_progress.clone())
                    .collect(),
                _ => return Err(PromiseError::AlreadySettled),
            }
        };
        for handler in handlers {
            handler(value.clone());
        }
        Ok(())
    }

    /// Register a resolve handler. Rejection passes through to the
    /// continuation unchanged.
    pub fn then<U, FR>(&self, on_resolve: FR) -> Thenable<U, E, P>
    where
        U: Clone + Send + 'static,
        FR: FnOnce(T) -> Result<Step<U, E, P>, E> + Send + 'static,
    {
        self.register(Box::new(on_resolve), Box::new(Err), None)
    }

    /// Register resolve and reject handlers.
    pub fn then_or_else<U, FR, FE>(&self, on_resolve: FR, on_reject: FE) -> Thenable<U, E, P>
    where
        U: Clone + Send + 'static,
        FR: FnOnce(T) -> Result<Step<U, E, P>, E> + Send + 'static,
        FE: FnOnce(E) -> Result<Step<U, E, P>, E> + Send + 'static,
    {
        self.register(Box::new(on_resolve), Box::new(on_reject), None)
    }

    /// Register resolve, reject and progress handlers. The progress handler
    /// may fire any number of times before settlement; it never fires after.
    pub fn then_with_progress<U, FR, FE, FP>(
        &self,
        on_resolve: FR,
        on_reject: FE,
        on_progress: FP,
    ) -> Thenable<U, E, P>
    where
        U: Clone + Send + 'static,
        FR: FnOnce(T) -> Result<Step<U, E, P>, E> + Send + 'static,
        FE: FnOnce(E) -> Result<Step<U, E, P>, E> + Send + 'static,
        FP: Fn(P) + Send + Sync + 'static,
    {
        self.register(
            Box::new(on_resolve),
            Box::new(on_reject),
            Some(Arc::new(on_progress)),
        )
    }

    /// Register only a reject handler; resolution passes through unchanged.
    pub fn catch<FE>(&self, on_reject: FE) -> Thenable<T, E, P>
    where
        FE: FnOnce(E) -> Result<Step<T, E, P>, E> + Send + 'static,
    {
        self.register(
            Box::new(|value| Ok(Step::Value(value))),
            Box::new(on_reject),
            None,
        )
    }

    fn register<U>(
        &self,
        on_resolve: Box<dyn FnOnce(T) -> Result<Step<U, E, P>, E> + Send>,
        on_reject: Box<dyn FnOnce(E) -> Result<Step<U, E, P>, E> + Send>,
        on_progress: Option<ProgressFn<P>>,
    ) -> Thenable<U, E, P>
    where
        U: Clone + Send + 'static,
    {
        let continuation = Promise::<U, E, P>::new();
        {
            let mut state = self.lock();
            match &mut *state {
                State::Pending(listeners) => {
                    let cont = continuation.clone();
                    let resolve: ResolveFn<T> =
                        Box::new(move |value| settle_continuation(&cont, on_resolve(value)));
                    let cont = continuation.clone();
                    let reject: RejectFn<E> =
                        Box::new(move |error| settle_continuation(&cont, on_reject(error)));
                    listeners.push(Listener {
                        on_resolve: Some(resolve),
                        on_reject: Some(reject),
                        on_progress,
                    });
                }
                // Already settled: run the handler against the stored
                // outcome on a later scheduler tick, never inline.
                State::Resolved(value) => {
                    let value = value.clone();
                    let cont = continuation.clone();
                    tokio::spawn(async move {
                        settle_continuation(&cont, on_resolve(value));
                    });
                }
                State::Rejected(error) => {
                    let error = error.clone();
                    let cont = continuation.clone();
                    tokio::spawn(async move {
                        settle_continuation(&cont, on_reject(error));
                    });
                }
            }
        }
        continuation.thenable()
    }

    /// A read-only subscription facade sharing this promise's state but
    /// exposing no completion authority.
    pub fn thenable(&self) -> Thenable<T, E, P> {
        Thenable::new(self.clone())
    }

    pub fn is_settled(&self) -> bool {
        !matches!(&*self.lock(), State::Pending(_))
    }

    /// Await settlement. Bridges the callback world into async/await; used
    /// at the edges (tests, binaries) rather than inside the engine.
    ///
    /// If every handle to a pending promise is dropped the returned future
    /// stays pending forever, matching a promise that never settles.
    pub async fn settled(&self) -> Result<T, E> {
        let (tx, rx) = tokio::sync::oneshot::channel::<Result<T, E>>();
        let tx = Arc::new(Mutex::new(Some(tx)));
        let tx_err = Arc::clone(&tx);
        self.then_or_else(
            move |value: T| {
                if let Some(tx) = tx.lock().ok().and_then(|mut slot| slot.take()) {
                    let _ = tx.send(Ok(value));
                }
                Ok(Step::Value(()))
            },
            move |error: E| {
                if let Some(tx) = tx_err.lock().ok().and_then(|mut slot| slot.take()) {
                    let _ = tx.send(Err(error));
                }
                Ok(Step::Value(()))
            },
        );
        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => std::future::pending().await,
        }
    }
}

/// Drive a continuation promise from a handler's outcome: a plain value
/// resolves it, a `Step::Wait` chains it to the inner promise, and an error
/// rejects it. Continuations are settled exactly once by construction, so
/// the completion results are discarded.
fn settle_continuation<U, E, P>(continuation: &Promise<U, E, P>, outcome: Result<Step<U, E, P>, E>)
where
    U: Clone + Send + 'static,
    E: Clone + Send + 'static,
    P: Clone + Send + 'static,
{
    match outcome {
        Ok(Step::Value(value)) => {
            let _ = continuation.resolve(value);
        }
        Ok(Step::Wait(upstream)) => {
            let resolve_side = continuation.clone();
            let reject_side = continuation.clone();
            upstream.then_or_else(
                move |value| {
                    let _ = resolve_side.resolve(value);
                    Ok(Step::Value(()))
                },
                move |error| {
                    let _ = reject_side.reject(error);
                    Ok(Step::Value(()))
                },
            );
        }
        Err(error) => {
            let _ = continuation.reject(error);
        }
    }
}
