//! Fixed worker pool draining a bounded queue of request contexts.

use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, join_all};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info_span, warn};

use crate::errors::QueueError;
use crate::rpc::Context;

/// Default number of workers.
pub const DEFAULT_WORKERS: usize = 32;

/// Default queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Default wait for workers during shutdown.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Function a worker runs for every dequeued context.
pub type DispatchFn = Arc<dyn Fn(Context) -> BoxFuture<'static, ()> + Send + Sync>;

/// Bounded FIFO of request contexts consumed by a fixed set of workers.
///
/// [`RequestQueue::push`] waits while the queue is full; that wait is the only
/// backpressure in the dispatch path. With more than one worker, contexts
/// pushed back to back may finish in any order.
pub struct RequestQueue {
    sender: Mutex<Option<mpsc::Sender<Context>>>,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<Context>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    size: usize,
    drain_timeout: Duration,
}

impl RequestQueue {
    /// Queue with `workers` workers and room for `capacity` contexts.
    ///
    /// Workers start with [`RequestQueue::consume`].
    pub fn new(workers: usize, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            sender: Mutex::new(Some(tx)),
            receiver: Arc::new(tokio::sync::Mutex::new(rx)),
            workers: Mutex::new(Vec::new()),
            size: workers.max(1),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }

    /// Limit how long [`RequestQueue::shutdown`] waits for workers.
    #[must_use]
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Spawn the workers, each running `dispatch` for the contexts it pulls.
    ///
    /// Calling it again while workers are running does nothing.
    pub fn consume(&self, dispatch: DispatchFn) {
        let mut workers = self.workers.lock();
        if !workers.is_empty() {
            return;
        }
        for worker in 0..self.size {
            let receiver = Arc::clone(&self.receiver);
            let dispatch = Arc::clone(&dispatch);
            workers.push(tokio::spawn(
                work(receiver, dispatch).instrument(info_span!("rpc_worker", worker)),
            ));
        }
        debug!(workers = self.size, "request queue started");
    }

    /// Enqueue `ctx`, waiting for room if the queue is full.
    pub async fn push(&self, ctx: Context) -> Result<(), QueueError> {
        let sender = self.sender.lock().clone().ok_or(QueueError::Closed)?;
        sender.send(ctx).await.map_err(|_| QueueError::Closed)
    }

    /// Number of workers.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether [`RequestQueue::shutdown`] has run.
    pub fn is_closed(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// Close the queue, let workers finish what is already queued, and join them.
    ///
    /// Workers still busy after the drain timeout are aborted along with
    /// whatever they had left.
    pub async fn shutdown(&self) {
        drop(self.sender.lock().take());
        let mut workers = std::mem::take(&mut *self.workers.lock());
        let drained = tokio::time::timeout(self.drain_timeout, join_all(workers.iter_mut())).await;
        match drained {
            Ok(results) => {
                for err in results.into_iter().filter_map(Result::err) {
                    debug!(error = %err, "rpc worker ended abnormally");
                }
            }
            Err(_) => {
                let busy = workers.iter().filter(|worker| !worker.is_finished()).count();
                warn!(busy, timeout = ?self.drain_timeout, "rpc workers did not drain, aborting");
                for worker in &workers {
                    worker.abort();
                }
            }
        }
    }
}

async fn work(receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<Context>>>, dispatch: DispatchFn) {
    loop {
        let next = receiver.lock().await.recv().await;
        let Some(ctx) = next else {
            break;
        };
        dispatch(ctx).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use assert_matches::assert_matches;
    use futures::FutureExt;
    use serde_json::json;
    use tokio::sync::Notify;

    use super::*;
    use crate::rpc::RpcRequest;
    use crate::test_support::{eventually, memory_client};
    use crate::websocket::EndpointOptions;

    fn context(id: i64) -> Context {
        let (client, _peer) = memory_client(EndpointOptions::default());
        Context::new(client, RpcRequest::new(id, "noop", json!([])))
    }

    #[tokio::test]
    async fn pushed_contexts_are_dispatched() {
        let queue = RequestQueue::new(4, 16);
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        queue.consume(Arc::new(move |ctx: Context| {
            let counter = Arc::clone(&counter);
            async move {
                let _ = counter.fetch_add(usize::try_from(ctx.id()).unwrap(), Ordering::SeqCst);
            }
            .boxed()
        }));

        for id in 1..=4 {
            queue.push(context(id)).await.unwrap();
        }
        assert!(eventually(|| seen.load(Ordering::SeqCst) == 10).await);
    }

    #[tokio::test]
    async fn push_waits_when_full() {
        let queue = RequestQueue::new(1, 1);
        let gate = Arc::new(Notify::new());
        let release = Arc::clone(&gate);
        queue.consume(Arc::new(move |_ctx: Context| {
            let release = Arc::clone(&release);
            async move { release.notified().await }.boxed()
        }));

        // One context occupies the worker, one fills the channel.
        queue.push(context(1)).await.unwrap();
        queue.push(context(2)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let blocked = tokio::time::timeout(Duration::from_millis(50), queue.push(context(3))).await;
        assert!(blocked.is_err());

        gate.notify_one();
        let unblocked = tokio::time::timeout(Duration::from_secs(5), queue.push(context(4))).await;
        assert!(unblocked.is_ok());
    }

    #[tokio::test]
    async fn shutdown_drains_and_rejects_new_pushes() {
        let queue = RequestQueue::new(2, 8);
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        queue.consume(Arc::new(move |_ctx: Context| {
            let counter = Arc::clone(&counter);
            async move {
                let _ = counter.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        }));
        for id in 0..5 {
            queue.push(context(id)).await.unwrap();
        }

        queue.shutdown().await;
        assert_eq!(seen.load(Ordering::SeqCst), 5);
        assert!(queue.is_closed());
        assert_matches!(queue.push(context(9)).await, Err(QueueError::Closed));
    }

    #[tokio::test]
    async fn shutdown_aborts_workers_stuck_past_drain_timeout() {
        let queue = RequestQueue::new(2, 8).with_drain_timeout(Duration::from_millis(50));
        let started = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&started);
        queue.consume(Arc::new(move |_ctx: Context| {
            let counter = Arc::clone(&counter);
            async move {
                let _ = counter.fetch_add(1, Ordering::SeqCst);
                futures::future::pending::<()>().await;
            }
            .boxed()
        }));
        queue.push(context(1)).await.unwrap();
        assert!(eventually(|| started.load(Ordering::SeqCst) == 1).await);

        let finished = tokio::time::timeout(Duration::from_secs(5), queue.shutdown()).await;
        assert!(finished.is_ok());
        assert!(queue.is_closed());
    }

    #[test]
    fn zero_workers_is_clamped() {
        let queue = RequestQueue::new(0, 0);
        assert_eq!(queue.size(), 1);
    }
}
