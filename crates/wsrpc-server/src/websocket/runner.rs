//! Cancellable background task scoped to a client.

use std::future::Future;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// A background task with start/stop/wait semantics.
///
/// The task receives a [`CancellationToken`] and must return once it is
/// cancelled; cancellation is cooperative.
pub struct Runner {
    token: CancellationToken,
    pending: Mutex<Option<BoxFuture<'static, ()>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Runner {
    /// Prepare a runner. The task does not run until [`Runner::start`].
    pub fn new<F, Fut>(task: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let future = task(token.clone());
        Self {
            token,
            pending: Mutex::new(Some(Box::pin(future))),
            handle: Mutex::new(None),
        }
    }

    /// Spawn the task. Later calls do nothing.
    pub fn start(&self) {
        let Some(future) = self.pending.lock().take() else {
            return;
        };
        *self.handle.lock() = Some(tokio::spawn(future));
    }

    /// Whether the task has been started and has not finished.
    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Whether cancellation has been requested.
    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Request cancellation and wait for the task to acknowledge by returning.
    ///
    /// A runner that was never started is discarded.
    pub async fn stop(&self) {
        self.token.cancel();
        drop(self.pending.lock().take());
        self.wait().await;
    }

    /// Wait for the task to return without cancelling it.
    pub async fn wait(&self) {
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                warn!(error = %err, "runner task failed");
            }
        }
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("running", &self.is_running())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
