//! The JSON-RPC 2.0 codec.

use serde_json::Value;
use tracing::trace;
use wsrpc_server::errors::CodecError;
use wsrpc_server::{Backend, RpcRequest, RpcResponse};

use crate::codes::wire_code;
use crate::wire::{VERSION, WireError, WireErrorResponse, WireNotification, WireRequest, WireResult};

/// JSON-RPC 2.0 backend.
///
/// Only the first JSON value of a frame is read; trailing bytes are ignored.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonRpc;

impl Backend for JsonRpc {
    fn parse_request(&self, frame: &[u8]) -> Result<RpcRequest, CodecError> {
        let mut values = serde_json::Deserializer::from_slice(frame).into_iter::<WireRequest>();
        let wire = match values.next() {
            None => return Err(CodecError::UnexpectedEof),
            Some(Err(err)) if err.is_eof() => return Err(CodecError::UnexpectedEof),
            Some(Err(err)) => return Err(CodecError::Malformed(err)),
            Some(Ok(wire)) => wire,
        };
        trace!(id = wire.id, method = %wire.method, "parsed request");
        Ok(RpcRequest::new(wire.id, wire.method, wire.params))
    }

    fn prepare_response(&self, response: &RpcResponse) -> Result<Vec<u8>, CodecError> {
        let bytes = match &response.outcome {
            Ok(result) => serde_json::to_vec(&WireResult {
                jsonrpc: VERSION,
                id: response.id,
                result,
            })?,
            Err(err) => serde_json::to_vec(&WireErrorResponse {
                jsonrpc: VERSION,
                id: response.id,
                error: WireError {
                    code: wire_code(err.code),
                    message: &err.message,
                    data: err.data.as_ref(),
                },
            })?,
        };
        Ok(bytes)
    }

    fn prepare_notification(&self, event: &str, payload: &Value) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(&WireNotification {
            jsonrpc: VERSION,
            method: event,
            params: payload,
        })?)
    }
}
