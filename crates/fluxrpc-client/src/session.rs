//! The JSON-RPC session: correlation, auth gating, inbound dispatch.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::oneshot;

use fluxrpc_core::{TransportError, TransportResult};
use fluxrpc_websocket::{CloseReason, TlsWsConnector, WsConnector, WsSession};

use crate::error::{ProtocolError, RpcError};
use crate::remote::{RemoteFailure, RemoteResult};
use crate::request_map::{AddOutcome, RequestMap};

/// A JSON-RPC 2.0 client session over a supervised WebSocket.
///
/// The session correlates responses with their requests by id, delivers
/// server-initiated method calls to the `on_method` callback, and gates
/// `private/*` calls behind [`notify_authenticated`](Self::notify_authenticated).
pub struct JsonRpcSession<C: WsConnector = TlsWsConnector> {
    ws: WsSession<C>,
    requests: Arc<Mutex<RequestMap>>,
}

impl JsonRpcSession<TlsWsConnector> {
    /// A session that connects through the default TLS stack.
    pub fn new() -> Self {
        Self::with_connector(TlsWsConnector::new())
    }
}

impl Default for JsonRpcSession<TlsWsConnector> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: WsConnector> JsonRpcSession<C> {
    /// A session that connects through `connector`.
    pub fn with_connector(connector: C) -> Self {
        Self {
            ws: WsSession::new(connector),
            requests: Arc::new(Mutex::new(RequestMap::new())),
        }
    }

    /// This session's id, used in log messages.
    pub fn session_id(&self) -> &str {
        self.ws.session_id()
    }

    /// Deliver the connect request and wait until the session is up.
    pub async fn connect(&self, host: &str, port: u16, target: &str) -> TransportResult<()> {
        self.ws.connect(host, port, target).await
    }

    /// Run the session until a clean close or a fatal error.
    ///
    /// `on_method` receives every server-initiated call (frames carrying a
    /// `"method"` field). Whatever way the session ends, every in-flight
    /// and buffered call is completed before `run` returns.
    pub async fn run<F>(&self, on_method: F) -> TransportResult<()>
    where
        F: FnMut(String, Value) + Send,
    {
        let requests = Arc::clone(&self.requests);
        let session_id = self.ws.session_id().to_string();
        let mut on_method = on_method;
        let result = self
            .ws
            .run(
                move |text| dispatch_frame(&requests, &mut on_method, &session_id, &text),
                |_binary| {},
            )
            .await;

        // nothing can complete the survivors now; fail them all
        let err = result.clone().err().unwrap_or(TransportError::Aborted);
        self.requests
            .lock()
            .expect("request map mutex poisoned")
            .cancel(err);
        result
    }

    /// Request that the session close.
    pub fn close(&self, reason: CloseReason) {
        self.ws.close(reason);
    }

    /// Fail every in-flight and buffered call with `err`.
    pub fn cancel(&self, err: TransportError) {
        self.requests
            .lock()
            .expect("request map mutex poisoned")
            .cancel(err);
    }

    /// Issue a call and await its correlated outcome.
    ///
    /// Calls to `private/*` methods made before
    /// [`notify_authenticated`](Self::notify_authenticated) are buffered and
    /// sent, in call order, when the transition happens.
    pub async fn call(&self, method: &str, params: Value) -> RemoteResult {
        let (tx, rx) = oneshot::channel();
        let outcome = self
            .requests
            .lock()
            .expect("request map mutex poisoned")
            .add_request(method, params, tx);

        match outcome {
            AddOutcome::Send { id, frame } => {
                tracing::trace!("session {} call {} (id {})", self.session_id(), method, id);
                if let Err(err) = self.ws.send_text(frame) {
                    self.requests
                        .lock()
                        .expect("request map mutex poisoned")
                        .fail(id, RpcError::Transport(err));
                }
            }
            AddOutcome::Buffered => {
                tracing::debug!(
                    "session {} call {} waits for authentication",
                    self.session_id(),
                    method
                );
            }
            AddOutcome::Failed => {}
        }

        match rx.await {
            Ok(result) => result,
            Err(_) => RemoteResult::Transport(RpcError::Transport(TransportError::Aborted)),
        }
    }

    /// Mark the session authenticated and flush the buffered calls in FIFO
    /// order.
    pub fn notify_authenticated(&self) {
        let frames = self
            .requests
            .lock()
            .expect("request map mutex poisoned")
            .notify_authenticated();
        tracing::debug!(
            "session {} authenticated, flushing {} buffered calls",
            self.session_id(),
            frames.len()
        );
        for (id, frame) in frames {
            if let Err(err) = self.ws.send_text(frame) {
                self.requests
                    .lock()
                    .expect("request map mutex poisoned")
                    .fail(id, RpcError::Transport(err));
            }
        }
    }

    /// Number of requests currently awaiting a response.
    pub fn outstanding_calls(&self) -> usize {
        self.requests
            .lock()
            .expect("request map mutex poisoned")
            .outstanding_len()
    }
}

impl<C: WsConnector> std::fmt::Debug for JsonRpcSession<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonRpcSession")
            .field("session_id", &self.ws.session_id())
            .finish()
    }
}

/// Route one inbound text frame.
///
/// Frames with a `"method"` go to the method callback; frames with an
/// `"id"` complete the matching outstanding request with the `"result"`,
/// the `"error"`, or `InvalidContent` when neither is present. Everything
/// else is logged and dropped.
fn dispatch_frame(
    requests: &Arc<Mutex<RequestMap>>,
    on_method: &mut (impl FnMut(String, Value) + Send),
    session_id: &str,
    text: &str,
) {
    let frame: Value = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::error!("session {} frame is not JSON: {}", session_id, e);
            return;
        }
    };
    let Some(object) = frame.as_object() else {
        tracing::error!("session {} invalid frame: {}", session_id, text);
        return;
    };

    if let Some(method) = object.get("method").and_then(Value::as_str) {
        let params = object.get("params").cloned().unwrap_or(Value::Null);
        on_method(method.to_string(), params);
    } else if let Some(id) = object.get("id").and_then(Value::as_u64) {
        let outcome = if let Some(result) = object.get("result") {
            RemoteResult::Value(result.clone())
        } else if let Some(error) = object.get("error") {
            RemoteResult::Failure(RemoteFailure::new(error.clone()))
        } else {
            RemoteResult::Transport(RpcError::Protocol(ProtocolError::InvalidContent))
        };
        let delivered = requests
            .lock()
            .expect("request map mutex poisoned")
            .complete(id, outcome);
        if !delivered {
            tracing::debug!("session {} unmatched response: {}", session_id, text);
        }
    } else {
        tracing::error!("session {} invalid frame: {}", session_id, text);
    }
}
