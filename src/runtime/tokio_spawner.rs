//! Tokio runtime spawner implementation.

use std::future::Future;

use crate::core::Spawn;

/// Tokio-based spawner that runs dispatch tasks on a tokio runtime.
///
/// The spawner only holds a [`Handle`](tokio::runtime::Handle); it never owns
/// the runtime, so clones moved into run tasks can be dropped anywhere.
#[derive(Clone)]
pub struct TokioSpawner {
    handle: tokio::runtime::Handle,
}

impl TokioSpawner {
    /// Spawn onto the runtime behind `handle`.
    #[must_use]
    pub const fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Spawn onto the runtime the caller is running in.
    ///
    /// # Errors
    ///
    /// Fails when called outside a tokio runtime.
    pub fn current() -> Result<Self, tokio::runtime::TryCurrentError> {
        tokio::runtime::Handle::try_current().map(Self::new)
    }

    /// Build a multi-threaded runtime with `worker_threads` workers and a
    /// spawner for it.
    ///
    /// The caller owns the returned runtime and must keep it alive for as long
    /// as runs are in progress, dropping it outside of async code.
    ///
    /// # Errors
    ///
    /// Returns the runtime builder's I/O error.
    pub fn with_worker_threads(
        worker_threads: usize,
    ) -> Result<(tokio::runtime::Runtime, Self), std::io::Error> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(worker_threads.max(1))
            .thread_name("dispatch-worker")
            .enable_all()
            .build()?;
        let spawner = Self::new(runtime.handle().clone());
        Ok((runtime, spawner))
    }

    /// Handle of the target runtime.
    #[must_use]
    pub const fn handle(&self) -> &tokio::runtime::Handle {
        &self.handle
    }
}

impl Spawn for TokioSpawner {
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handle.spawn(fut);
    }
}
