//! RPC error taxonomy.
//!
//! Codes live on an internal scale grouped in bands of one thousand. Codecs
//! translate them to their own wire codes; see [`ErrorCode::ordinal`].

use serde_json::Value;

/// Internal RPC error code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The request is not a valid call object.
    InvalidRequest,
    /// No handler is registered for the method.
    NotFound,
    /// The parameters are unusable.
    InvalidParams,
    /// A parameter has the wrong value or type.
    InvalidArguments,
    /// Fewer parameters than the method needs.
    InsufficientArguments,
    /// The handler failed.
    InternalError,
    /// The server cannot process the call right now.
    ServerError,
    /// Application-defined code.
    Custom(i32),
}

impl ErrorCode {
    /// Numeric value on the internal scale.
    pub fn value(self) -> i32 {
        match self {
            Self::InvalidRequest => 1000,
            Self::NotFound => 2000,
            Self::InvalidParams => 3000,
            Self::InvalidArguments => 3001,
            Self::InsufficientArguments => 3002,
            Self::InternalError => 4000,
            Self::ServerError => 5000,
            Self::Custom(code) => code,
        }
    }

    /// Map a numeric value back onto a known code, or [`ErrorCode::Custom`].
    pub fn from_value(value: i32) -> Self {
        match value {
            1000 => Self::InvalidRequest,
            2000 => Self::NotFound,
            3000 => Self::InvalidParams,
            3001 => Self::InvalidArguments,
            3002 => Self::InsufficientArguments,
            4000 => Self::InternalError,
            5000 => Self::ServerError,
            other => Self::Custom(other),
        }
    }

    /// Zero-based band of the code: `1000..2000` is 0, `2000..3000` is 1 and so on.
    ///
    /// `None` for values below the first band.
    pub fn ordinal(self) -> Option<usize> {
        let value = self.value();
        if value < 1000 {
            return None;
        }
        usize::try_from(value / 1000 - 1).ok()
    }

    /// Default human-readable message.
    pub fn message(self) -> &'static str {
        match self {
            Self::InvalidRequest => "Invalid Request",
            Self::NotFound => "Method not found",
            Self::InvalidParams => "Invalid params",
            Self::InvalidArguments => "Invalid arguments",
            Self::InsufficientArguments => "Insufficient arguments",
            Self::InternalError | Self::Custom(_) => "Internal error",
            Self::ServerError => "Server error",
        }
    }
}

/// Error returned by method handlers and sent back to the peer.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("{message} ({})", .code.value())]
pub struct RpcError {
    /// Internal code.
    pub code: ErrorCode,
    /// Message sent on the wire.
    pub message: String,
    /// Optional structured detail.
    pub data: Option<Value>,
}

impl RpcError {
    /// Error with the code's default message.
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.message().to_string(),
            data: None,
        }
    }

    /// Replace the message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Attach structured detail.
    #[must_use]
    pub fn with_data(mut self, data: impl Into<Value>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Internal error whose detail is the display text of `err`.
    pub fn internal(err: impl std::fmt::Display) -> Self {
        Self::new(ErrorCode::InternalError).with_data(err.to_string())
    }

    /// Invalid params with an explanatory detail.
    pub fn invalid_params(detail: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParams).with_data(detail.into())
    }
}

impl From<anyhow::Error> for RpcError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(err)
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_params(err.to_string())
    }
}
