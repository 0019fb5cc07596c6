//! Codec-independent request and response values.

use serde_json::Value;

use super::errors::RpcError;

/// A parsed call.
#[derive(Clone, Debug, PartialEq)]
pub struct RpcRequest {
    /// Correlation id echoed in the response.
    pub id: i64,
    /// Registered method name.
    pub method: String,
    /// Positional parameters, always a sequence after parsing.
    pub params: Vec<Value>,
}

impl RpcRequest {
    /// Build a request, normalizing `params` the way every codec must:
    /// an array is used as is, anything else becomes a one-element sequence.
    pub fn new(id: i64, method: impl Into<String>, params: Value) -> Self {
        Self {
            id,
            method: method.into(),
            params: normalize_params(params),
        }
    }
}

/// Turn a wire `params` value into a parameter sequence.
pub fn normalize_params(params: Value) -> Vec<Value> {
    match params {
        Value::Array(items) => items,
        other => vec![other],
    }
}

/// Reply to one [`RpcRequest`]: a result or an error, never both.
#[derive(Clone, Debug, PartialEq)]
pub struct RpcResponse {
    /// Id of the request being answered.
    pub id: i64,
    /// Handler outcome.
    pub outcome: Result<Value, RpcError>,
}

impl RpcResponse {
    /// Successful reply.
    pub fn result(id: i64, result: Value) -> Self {
        Self {
            id,
            outcome: Ok(result),
        }
    }

    /// Failed reply.
    pub fn error(id: i64, error: RpcError) -> Self {
        Self {
            id,
            outcome: Err(error),
        }
    }

    /// Whether the reply carries an error.
    pub fn is_error(&self) -> bool {
        self.outcome.is_err()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::rpc::ErrorCode;

    #[test]
    fn array_params_are_kept_in_order() {
        let req = RpcRequest::new(1, "sum", json!([1, "two", {"three": 3}]));
        assert_eq!(req.params, vec![json!(1), json!("two"), json!({"three": 3})]);
    }

    #[test]
    fn non_array_params_are_wrapped() {
        assert_eq!(normalize_params(json!("hi")), vec![json!("hi")]);
        assert_eq!(normalize_params(json!({"a": 1})), vec![json!({"a": 1})]);
        assert_eq!(normalize_params(Value::Null), vec![Value::Null]);
        assert_eq!(normalize_params(json!(7)), vec![json!(7)]);
    }

    #[test]
    fn empty_array_stays_empty() {
        assert!(normalize_params(json!([])).is_empty());
    }

    #[test]
    fn response_is_result_xor_error() {
        let ok = RpcResponse::result(3, json!("x"));
        assert!(!ok.is_error());
        let err = RpcResponse::error(3, RpcError::new(ErrorCode::NotFound));
        assert!(err.is_error());
        assert_eq!(err.id, 3);
    }
}
