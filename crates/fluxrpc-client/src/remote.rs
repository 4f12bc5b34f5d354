//! Outcomes of a JSON-RPC call.

use serde_json::Value;

use crate::error::{ProtocolError, RpcError};

/// A failure reported by the remote endpoint: the JSON `"error"` object
/// plus an optional context string describing what the caller was doing.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteFailure {
    error: Value,
    context: Option<String>,
}

impl RemoteFailure {
    /// Wrap a remote `"error"` object.
    pub fn new(error: Value) -> Self {
        Self {
            error,
            context: None,
        }
    }

    /// Wrap a remote `"error"` object with caller context.
    pub fn with_context(error: Value, context: impl Into<String>) -> Self {
        Self {
            error,
            context: Some(context.into()),
        }
    }

    /// The remote `"error"` object.
    pub fn error(&self) -> &Value {
        &self.error
    }

    /// The caller context, if any.
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }
}

impl std::fmt::Display for RemoteFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[remote_failure [context {}] [error {}]]",
            self.context.as_deref().unwrap_or(""),
            self.error
        )
    }
}

impl std::error::Error for RemoteFailure {}

/// The outcome of a JSON-RPC call.
///
/// Exactly one of: the call failed in transit, the remote returned a
/// result, or the remote returned an error object.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteResult {
    /// The call failed before a well-formed response arrived.
    Transport(RpcError),
    /// The remote returned a result value.
    Value(Value),
    /// The remote returned an error object.
    Failure(RemoteFailure),
}

impl RemoteResult {
    /// Whether the call failed at the transport or protocol level.
    pub fn is_transport_error(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Whether the remote returned a result value.
    pub fn is_value(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    /// Whether the remote reported a failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// The result value, or whichever error stands in its place.
    pub fn get(&self) -> Result<&Value, RpcError> {
        match self {
            Self::Transport(err) => Err(err.clone()),
            Self::Value(value) => Ok(value),
            Self::Failure(failure) => Err(RpcError::Remote(failure.clone())),
        }
    }

    /// Consume the outcome, returning the result value.
    pub fn into_value(self) -> Result<Value, RpcError> {
        match self {
            Self::Transport(err) => Err(err),
            Self::Value(value) => Ok(value),
            Self::Failure(failure) => Err(RpcError::Remote(failure)),
        }
    }

    /// The remote failure; [`ProtocolError::UnexpectedSuccess`] if the call
    /// actually succeeded.
    pub fn failure(&self) -> Result<&RemoteFailure, RpcError> {
        match self {
            Self::Transport(err) => Err(err.clone()),
            Self::Value(_) => Err(RpcError::Protocol(ProtocolError::UnexpectedSuccess)),
            Self::Failure(failure) => Ok(failure),
        }
    }
}

impl Default for RemoteResult {
    fn default() -> Self {
        Self::Transport(RpcError::Protocol(ProtocolError::EmptyResult))
    }
}

impl std::fmt::Display for RemoteResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(err) => write!(f, "[remote_result {}]", err),
            Self::Value(value) => write!(f, "[remote_result [result {}]]", value),
            Self::Failure(failure) => write!(f, "[remote_result {}]", failure),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn exactly_one_variant_is_active() {
        let value = RemoteResult::Value(json!({"ok": true}));
        assert!(value.is_value());
        assert!(!value.is_failure());
        assert!(!value.is_transport_error());

        let failure = RemoteResult::Failure(RemoteFailure::new(json!({"code": -1})));
        assert!(failure.is_failure());
        assert!(!failure.is_value());
    }

    #[test]
    fn get_returns_the_value_or_the_error() {
        let value = RemoteResult::Value(json!(42));
        assert_eq!(value.get().unwrap(), &json!(42));

        let failure = RemoteResult::Failure(RemoteFailure::new(json!({"code": -1})));
        assert!(matches!(failure.get(), Err(RpcError::Remote(_))));

        let transport = RemoteResult::default();
        assert_eq!(
            transport.get(),
            Err(RpcError::Protocol(ProtocolError::EmptyResult))
        );
    }

    #[test]
    fn failure_on_a_value_is_unexpected_success() {
        let value = RemoteResult::Value(json!(1));
        assert_eq!(
            value.failure().err(),
            Some(RpcError::Protocol(ProtocolError::UnexpectedSuccess))
        );
    }

    #[test]
    fn remote_failure_display_format() {
        let failure = RemoteFailure::with_context(json!({"code": -32601}), "subscribing");
        assert_eq!(
            failure.to_string(),
            "[remote_failure [context subscribing] [error {\"code\":-32601}]]"
        );
    }
}
