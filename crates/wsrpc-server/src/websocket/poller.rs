//! Readiness multiplexer over every attached client.
//!
//! One loop task waits on all registered clients at once through the runtime's
//! I/O reactor. When some of them have a frame pending, the loop resolves them
//! against the registry and hands the batch to the installed callback, which
//! runs on the loop itself. Clients still registered afterwards are re-armed.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span, trace};

use crate::errors::PollerError;
use crate::websocket::{Client, ClientId};

/// Batch callback invoked with the clients that have a frame pending.
pub type ReadyCallback = Arc<dyn Fn(Vec<Arc<Client>>) -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Clone)]
struct Registration {
    client: Arc<Client>,
    generation: u64,
    token: CancellationToken,
}

struct Shared {
    clients: Mutex<HashMap<ClientId, Registration>>,
    callback: RwLock<ReadyCallback>,
}

/// Readiness poller for the clients of one endpoint.
pub struct PollerPool {
    shared: Arc<Shared>,
    arm: mpsc::UnboundedSender<Registration>,
    generation: AtomicU64,
    shutdown: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PollerPool {
    /// Start the poll loop on the current runtime.
    pub fn new() -> Self {
        let (arm_tx, arm_rx) = mpsc::unbounded_channel();
        let noop: ReadyCallback = Arc::new(|_: Vec<Arc<Client>>| async {}.boxed());
        let shared = Arc::new(Shared {
            clients: Mutex::new(HashMap::new()),
            callback: RwLock::new(noop),
        });
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(
            poll_loop(Arc::clone(&shared), arm_rx, shutdown.clone())
                .instrument(info_span!("poller")),
        );
        Self {
            shared,
            arm: arm_tx,
            generation: AtomicU64::new(0),
            shutdown,
            task: Mutex::new(Some(task)),
        }
    }

    /// Install the batch callback, replacing the previous one.
    pub fn wait(&self, callback: ReadyCallback) {
        *self.shared.callback.write() = callback;
    }

    /// Start watching `client`.
    ///
    /// Fails if the client is already closed or the loop has stopped; the
    /// registry entry is rolled back in both cases.
    pub fn add(&self, client: Arc<Client>) -> Result<(), PollerError> {
        let id = client.id();
        if client.is_closed() {
            return Err(PollerError::ClientClosed(id));
        }
        let registration = Registration {
            client,
            generation: self.generation.fetch_add(1, Ordering::Relaxed),
            token: self.shutdown.child_token(),
        };
        if let Some(previous) = self.shared.clients.lock().insert(id, registration.clone()) {
            previous.token.cancel();
        }
        if self.arm.send(registration).is_err() {
            if let Some(entry) = self.shared.clients.lock().remove(&id) {
                entry.token.cancel();
            }
            return Err(PollerError::Stopped);
        }
        Ok(())
    }

    /// Stop watching `client`. Returns whether it was registered.
    pub fn remove(&self, client: &Client) -> bool {
        match self.shared.clients.lock().remove(&client.id()) {
            Some(registration) => {
                registration.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Whether `client` is registered.
    pub fn contains(&self, client: &Client) -> bool {
        self.shared.clients.lock().contains_key(&client.id())
    }

    /// Number of registered clients.
    pub fn count(&self) -> usize {
        self.shared.clients.lock().len()
    }

    /// Stop the loop and forget every client.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                debug!(error = %err, "poll loop ended abnormally");
            }
        }
        self.shared.clients.lock().clear();
    }
}

impl Default for PollerPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PollerPool {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Resolves with the registration's id and generation once its client has
/// something to read, or `None` if the registration was cancelled first.
async fn readiness(registration: Registration) -> Option<(ClientId, u64)> {
    tokio::select! {
        () = registration.token.cancelled() => None,
        () = registration.client.readable() => {
            Some((registration.client.id(), registration.generation))
        }
    }
}

async fn poll_loop(
    shared: Arc<Shared>,
    mut arm: mpsc::UnboundedReceiver<Registration>,
    shutdown: CancellationToken,
) {
    let mut pending = FuturesUnordered::new();

    loop {
        let first = tokio::select! {
            () = shutdown.cancelled() => break,
            Some(registration) = arm.recv() => {
                pending.push(readiness(registration));
                continue;
            }
            Some(ready) = pending.next(), if !pending.is_empty() => ready,
            else => break,
        };

        let mut ready: Vec<(ClientId, u64)> = first.into_iter().collect();
        while let Some(Some(next)) = pending.next().now_or_never() {
            ready.extend(next);
        }
        if ready.is_empty() {
            continue;
        }

        // Clients removed since they became ready are dropped from the batch.
        let batch: Vec<Arc<Client>> = {
            let clients = shared.clients.lock();
            ready
                .iter()
                .filter_map(|(id, generation)| {
                    clients
                        .get(id)
                        .filter(|r| r.generation == *generation)
                        .map(|r| Arc::clone(&r.client))
                })
                .collect()
        };
        if batch.is_empty() {
            continue;
        }
        trace!(ready = batch.len(), "clients ready");

        let callback = Arc::clone(&*shared.callback.read());
        callback(batch.clone()).await;

        let clients = shared.clients.lock();
        for client in &batch {
            if let Some(registration) = clients.get(&client.id()) {
                let armed = ready.iter().any(|(id, generation)| {
                    *id == client.id() && *generation == registration.generation
                });
                if armed && !registration.client.is_closed() {
                    pending.push(readiness(registration.clone()));
                }
            }
        }
    }

    debug!(watched = pending.len(), "poll loop stopped");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;

    use super::*;
    use crate::test_support::{eventually, memory_client};
    use crate::websocket::EndpointOptions;

    /// Callback that consumes one frame per ready client and records ids.
    fn recording_callback() -> (ReadyCallback, tokio::sync::mpsc::UnboundedReceiver<Vec<ClientId>>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let callback: ReadyCallback = Arc::new(move |clients: Vec<Arc<Client>>| {
            let tx = tx.clone();
            async move {
                let ids = clients.iter().map(|c| c.id()).collect();
                for client in &clients {
                    let _ = client.resume().await;
                }
                let _ = tx.send(ids);
            }
            .boxed()
        });
        (callback, rx)
    }

    async fn next_batch(
        rx: &mut tokio::sync::mpsc::UnboundedReceiver<Vec<ClientId>>,
    ) -> Option<Vec<ClientId>> {
        tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.ok().flatten()
    }

    #[tokio::test]
    async fn ready_client_is_delivered_to_callback() {
        let poller = PollerPool::new();
        let (callback, mut batches) = recording_callback();
        poller.wait(callback);

        let (client, peer) = memory_client(EndpointOptions::default());
        poller.add(Arc::clone(&client)).unwrap();
        assert_eq!(poller.count(), 1);

        peer.send_text("one");
        assert_eq!(next_batch(&mut batches).await, Some(vec![client.id()]));

        peer.send_text("two");
        assert_eq!(next_batch(&mut batches).await, Some(vec![client.id()]));
    }

    #[tokio::test]
    async fn idle_clients_are_not_reported() {
        let poller = PollerPool::new();
        let (callback, mut batches) = recording_callback();
        poller.wait(callback);

        let (idle, _idle_peer) = memory_client(EndpointOptions::default());
        let (busy, busy_peer) = memory_client(EndpointOptions::default());
        poller.add(Arc::clone(&idle)).unwrap();
        poller.add(Arc::clone(&busy)).unwrap();

        busy_peer.send_text("ping");
        let batch = next_batch(&mut batches).await.unwrap();
        assert_eq!(batch, vec![busy.id()]);
    }

    #[tokio::test]
    async fn removed_clients_are_never_reported() {
        let poller = PollerPool::new();
        let (callback, mut batches) = recording_callback();
        poller.wait(callback);

        let (client, peer) = memory_client(EndpointOptions::default());
        poller.add(Arc::clone(&client)).unwrap();
        assert!(poller.remove(&client));
        assert!(!poller.remove(&client));
        assert_eq!(poller.count(), 0);

        peer.send_text("ignored");
        let outcome = tokio::time::timeout(Duration::from_millis(100), batches.recv()).await;
        assert!(outcome.is_err());
    }

    #[tokio::test]
    async fn several_ready_clients_are_all_delivered() {
        let poller = PollerPool::new();
        let (callback, mut batches) = recording_callback();
        poller.wait(callback);

        let mut clients = Vec::new();
        for _ in 0..4 {
            let (client, peer) = memory_client(EndpointOptions::default());
            poller.add(Arc::clone(&client)).unwrap();
            clients.push((client, peer));
        }
        for (_, peer) in &clients {
            peer.send_text("go");
        }

        let mut seen = Vec::new();
        while seen.len() < clients.len() {
            seen.extend(next_batch(&mut batches).await.unwrap());
        }
        seen.sort();
        let mut expected: Vec<_> = clients.iter().map(|(c, _)| c.id()).collect();
        expected.sort();
        assert_eq!(seen, expected);
    }

    #[tokio::test]
    async fn closed_clients_are_rejected() {
        let poller = PollerPool::new();
        let (client, _peer) = memory_client(EndpointOptions::default());
        client.close().await;
        assert_matches!(poller.add(client), Err(PollerError::ClientClosed(_)));
        assert_eq!(poller.count(), 0);
    }

    #[tokio::test]
    async fn add_after_shutdown_rolls_back() {
        let poller = PollerPool::new();
        poller.shutdown().await;

        let (client, _peer) = memory_client(EndpointOptions::default());
        assert_matches!(poller.add(Arc::clone(&client)), Err(PollerError::Stopped));
        assert!(!poller.contains(&client));
    }

    #[tokio::test]
    async fn callback_can_remove_clients() {
        let poller = Arc::new(PollerPool::new());
        let weak = Arc::downgrade(&poller);
        let callback: ReadyCallback = Arc::new(move |clients: Vec<Arc<Client>>| {
            let weak = weak.clone();
            async move {
                for client in clients {
                    if client.resume().await.is_err() {
                        if let Some(poller) = weak.upgrade() {
                            let _ = poller.remove(&client);
                        }
                    }
                }
            }
            .boxed()
        });
        poller.wait(callback);

        let (client, peer) = memory_client(EndpointOptions::default());
        poller.add(Arc::clone(&client)).unwrap();
        peer.send_close();
        assert!(eventually(|| poller.count() == 0).await);
    }
}
