//! Standard JSON-RPC 2.0 error codes and the mapping from internal codes.

use wsrpc_server::ErrorCode;

/// Invalid JSON was received.
pub const PARSE_ERROR: i32 = -32700;
/// The JSON sent is not a valid request object.
pub const INVALID_REQUEST: i32 = -32600;
/// The method does not exist.
pub const METHOD_NOT_FOUND: i32 = -32601;
/// Invalid method parameters.
pub const INVALID_PARAMS: i32 = -32602;
/// Internal JSON-RPC error.
pub const INTERNAL_ERROR: i32 = -32603;
/// Implementation-defined server error.
pub const SERVER_ERROR: i32 = -32000;

/// Wire codes indexed by [`ErrorCode::ordinal`].
pub const STANDARD_CODES: [i32; 5] = [
    INVALID_REQUEST,
    METHOD_NOT_FOUND,
    INVALID_PARAMS,
    INTERNAL_ERROR,
    SERVER_ERROR,
];

/// Translate an internal code to its wire code.
///
/// The code's band selects the entry in [`STANDARD_CODES`]; anything outside
/// the table becomes [`INTERNAL_ERROR`].
pub fn wire_code(code: ErrorCode) -> i32 {
    code.ordinal()
        .and_then(|ordinal| STANDARD_CODES.get(ordinal).copied())
        .unwrap_or(INTERNAL_ERROR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_map_by_position() {
        assert_eq!(wire_code(ErrorCode::InvalidRequest), INVALID_REQUEST);
        assert_eq!(wire_code(ErrorCode::NotFound), METHOD_NOT_FOUND);
        assert_eq!(wire_code(ErrorCode::InvalidParams), INVALID_PARAMS);
        assert_eq!(wire_code(ErrorCode::InternalError), INTERNAL_ERROR);
        assert_eq!(wire_code(ErrorCode::ServerError), SERVER_ERROR);
    }

    #[test]
    fn argument_errors_share_the_params_band() {
        assert_eq!(wire_code(ErrorCode::InvalidArguments), INVALID_PARAMS);
        assert_eq!(wire_code(ErrorCode::InsufficientArguments), INVALID_PARAMS);
    }

    #[test]
    fn codes_outside_table_are_internal() {
        assert_eq!(wire_code(ErrorCode::Custom(6000)), INTERNAL_ERROR);
        assert_eq!(wire_code(ErrorCode::Custom(42)), INTERNAL_ERROR);
        assert_eq!(wire_code(ErrorCode::Custom(-1)), INTERNAL_ERROR);
    }
}
