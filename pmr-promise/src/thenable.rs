use crate::promise::{Promise, Step};

/// Read-only subscription facade over a [`Promise`].
///
/// Shares state with the promise it came from but exposes only the `then`
/// family and [`settled`](Thenable::settled): holders can observe the
/// outcome and chain continuations, never complete the cell or emit
/// progress. Hand this out instead of the promise itself.
pub struct Thenable<T, E, P = ()> {
    promise: Promise<T, E, P>,
}

impl<T, E, P> Clone for Thenable<T, E, P> {
    fn clone(&self) -> Self {
        Self {
            promise: self.promise.clone(),
        }
    }
}

impl<T, E, P> Thenable<T, E, P>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
    P: Clone + Send + 'static,
{
    pub(crate) fn new(promise: Promise<T, E, P>) -> Self {
        Self { promise }
    }

    /// See [`Promise::then`].
    pub fn then<U, FR>(&self, on_resolve: FR) -> Thenable<U, E, P>
    where
        U: Clone + Send + 'static,
        FR: FnOnce(T) -> Result<Step<U, E, P>, E> + Send + 'static,
    {
        self.promise.then(on_resolve)
    }

    /// See [`Promise::then_or_else`].
    pub fn then_or_else<U, FR, FE>(&self, on_resolve: FR, on_reject: FE) -> Thenable<U, E, P>
    where
        U: Clone + Send + 'static,
        FR: FnOnce(T) -> Result<Step<U, E, P>, E> + Send + 'static,
        FE: FnOnce(E) -> Result<Step<U, E, P>, E> + Send + 'static,
    {
        self.promise.then_or_else(on_resolve, on_reject)
    }

    /// See [`Promise::then_with_progress`].
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
        self.promise
            .then_with_progress(on_resolve, on_reject, on_progress)
    }

    /// See [`Promise::catch`].
    pub fn catch<FE>(&self, on_reject: FE) -> Thenable<T, E, P>
    where
        FE: FnOnce(E) -> Result<Step<T, E, P>, E> + Send + 'static,
    {
        self.promise.catch(on_reject)
    }

    pub fn is_settled(&self) -> bool {
        self.promise.is_settled()
    }

    /// See [`Promise::settled`].
    pub async fn settled(&self) -> Result<T, E> {
        self.promise.settled().await
    }
}
