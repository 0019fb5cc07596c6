//! Actor owning the authoritative set of live clients.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{mpsc, oneshot};
use tracing::{Instrument, debug, info_span};

use crate::errors::ManagerError;
use crate::websocket::{Client, ClientId};

/// Capacity of the actor's inbound channel.
pub const MANAGER_CHANNEL_CAPACITY: usize = 1024;

enum Command {
    Register(Arc<Client>),
    Unregister(ClientId),
    Close(oneshot::Sender<()>),
}

/// Handle to the client registry actor.
///
/// All mutation is serialized through one task; the live count is published
/// through an atomic so admission checks never wait on the actor. Cloning the
/// handle is cheap.
#[derive(Clone, Debug)]
pub struct ClientManager {
    commands: mpsc::Sender<Command>,
    count: Arc<AtomicUsize>,
}

impl ClientManager {
    /// Spawn the actor on the current runtime.
    pub fn new() -> Self {
        Self::with_capacity(MANAGER_CHANNEL_CAPACITY)
    }

    /// Spawn the actor with a custom inbound channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let count = Arc::new(AtomicUsize::new(0));
        let _ = tokio::spawn(
            run(rx, Arc::clone(&count)).instrument(info_span!("client_manager")),
        );
        Self { commands: tx, count }
    }

    /// Add `client` to the live set.
    pub async fn register(&self, client: Arc<Client>) -> Result<(), ManagerError> {
        self.commands
            .send(Command::Register(client))
            .await
            .map_err(|_| ManagerError::Closed)
    }

    /// Remove `client` from the live set. Unknown clients are ignored.
    pub async fn unregister(&self, client: &Client) -> Result<(), ManagerError> {
        self.commands
            .send(Command::Unregister(client.id()))
            .await
            .map_err(|_| ManagerError::Closed)
    }

    /// Close every live client and stop the actor. Terminal.
    pub async fn close(&self) -> Result<(), ManagerError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.commands
            .send(Command::Close(ack_tx))
            .await
            .map_err(|_| ManagerError::Closed)?;
        ack_rx.await.map_err(|_| ManagerError::Closed)
    }

    /// Number of live clients.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Whether the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

impl Default for ClientManager {
    fn default() -> Self {
        Self::new()
    }
}

async fn run(mut commands: mpsc::Receiver<Command>, count: Arc<AtomicUsize>) {
    let mut clients: HashMap<ClientId, Arc<Client>> = HashMap::new();

    while let Some(command) = commands.recv().await {
        match command {
            Command::Register(client) => {
                let id = client.id();
                if clients.insert(id, client).is_none() {
                    let _ = count.fetch_add(1, Ordering::AcqRel);
                }
                debug!(client_id = %id, live = clients.len(), "client registered");
            }
            Command::Unregister(id) => {
                if clients.remove(&id).is_some() {
                    let _ = count.fetch_sub(1, Ordering::AcqRel);
                    debug!(client_id = %id, live = clients.len(), "client unregistered");
                }
            }
            Command::Close(ack) => {
                commands.close();
                debug!(live = clients.len(), "closing all clients");
                for (_, client) in clients.drain() {
                    client.close().await;
                }
                while let Ok(pending) = commands.try_recv() {
                    match pending {
                        Command::Register(client) => client.close().await,
                        Command::Unregister(_) => {}
                        Command::Close(other) => {
                            let _ = other.send(());
                        }
                    }
                }
                count.store(0, Ordering::Release);
                let _ = ack.send(());
                break;
            }
        }
    }
}
