//! JSON-RPC error taxonomy.

use thiserror::Error;

use fluxrpc_core::TransportError;

use crate::remote::RemoteFailure;

/// Errors in the `json_rpc::protocol_error` category.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProtocolError {
    /// Response is not JSON.
    #[error("not JSON")]
    NotJson = 1,

    /// Response JSON does not have the required fields.
    #[error("invalid or missing content")]
    InvalidContent = 2,

    /// The result object is empty.
    #[error("empty result")]
    EmptyResult = 3,

    /// The remote result was a success where the caller expected a failure.
    #[error("unexpected success")]
    UnexpectedSuccess = 4,

    /// Authentication failed.
    #[error("authentication failure")]
    AuthenticationFailure = 5,
}

impl ProtocolError {
    /// The category name protocol errors are reported under.
    pub const CATEGORY: &'static str = "json_rpc::protocol_error";

    /// Numeric code of this error within [`CATEGORY`](Self::CATEGORY).
    pub const fn code(self) -> i32 {
        self as i32
    }
}

/// Any failure a JSON-RPC call can surface.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum RpcError {
    /// The transport failed before a response arrived.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The response violated the JSON-RPC protocol.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The remote returned a well-formed failure object.
    #[error(transparent)]
    Remote(#[from] RemoteFailure),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_error_codes_are_stable() {
        assert_eq!(ProtocolError::NotJson.code(), 1);
        assert_eq!(ProtocolError::InvalidContent.code(), 2);
        assert_eq!(ProtocolError::EmptyResult.code(), 3);
        assert_eq!(ProtocolError::UnexpectedSuccess.code(), 4);
        assert_eq!(ProtocolError::AuthenticationFailure.code(), 5);
    }

    #[test]
    fn transport_errors_convert_into_rpc_errors() {
        let err: RpcError = TransportError::NotConnected.into();
        assert_eq!(err, RpcError::Transport(TransportError::NotConnected));
    }
}
