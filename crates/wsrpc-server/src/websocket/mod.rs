//! Connection side of the engine: clients, their registry, the readiness
//! poller and the endpoint tying them together.

pub mod client;
pub mod endpoint;
pub mod manager;
pub mod metadata;
pub mod options;
pub mod poller;
pub mod runner;

pub use client::{Client, ClientId, FrameSink, FrameStream};
pub use endpoint::Endpoint;
pub use manager::ClientManager;
pub use metadata::Metadata;
pub use options::{ClientHook, DEFAULT_MAX_CLIENTS, EndpointOptions, MessageHook};
pub use poller::{PollerPool, ReadyCallback};
pub use runner::Runner;
