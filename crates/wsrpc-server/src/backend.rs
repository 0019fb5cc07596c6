//! Wire codec seam.

use serde_json::Value;

use crate::errors::CodecError;
use crate::rpc::{RpcRequest, RpcResponse};

/// Translates frames to requests and replies to frames.
pub trait Backend: Send + Sync {
    /// Decode one inbound frame.
    fn parse_request(&self, frame: &[u8]) -> Result<RpcRequest, CodecError>;

    /// Encode a reply.
    fn prepare_response(&self, response: &RpcResponse) -> Result<Vec<u8>, CodecError>;

    /// Encode a server-initiated notification.
    fn prepare_notification(&self, event: &str, payload: &Value) -> Result<Vec<u8>, CodecError>;
}

/// Backend that fails every call with [`CodecError::NotImplemented`].
///
/// Installed when no codec was configured so that incomplete wiring shows up
/// as errors instead of silently dropped traffic.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnimplementedBackend;

impl Backend for UnimplementedBackend {
    fn parse_request(&self, _frame: &[u8]) -> Result<RpcRequest, CodecError> {
        Err(CodecError::NotImplemented)
    }

    fn prepare_response(&self, _response: &RpcResponse) -> Result<Vec<u8>, CodecError> {
        Err(CodecError::NotImplemented)
    }

    fn prepare_notification(&self, _event: &str, _payload: &Value) -> Result<Vec<u8>, CodecError> {
        Err(CodecError::NotImplemented)
    }
}
