//! Outstanding-request bookkeeping for a JSON-RPC session.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::oneshot;

use fluxrpc_core::{HandlerCell, TransportError};

use crate::error::RpcError;
use crate::protocol::JsonRpcRequest;
use crate::remote::RemoteResult;

/// Methods behind this prefix require authentication.
const PRIVATE_PREFIX: &str = "private/";

type CallHandler = HandlerCell<RemoteResult>;

/// A call buffered until authentication completes.
struct PendingCall {
    method: String,
    params: Value,
    handler: CallHandler,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AuthState {
    NotAuthenticated,
    Authenticated,
}

/// The result of registering a call.
#[derive(Debug)]
pub enum AddOutcome {
    /// The frame to put on the wire.
    Send {
        /// The id allocated to the call.
        id: u64,
        /// The serialized request frame.
        frame: String,
    },
    /// The call was buffered until authentication completes.
    Buffered,
    /// The call failed during registration; its handler has been completed.
    Failed,
}

/// Allocates request ids, tracks outstanding calls, buffers `private/*`
/// calls until authentication, and fans cancellation out to every pending
/// handler.
pub struct RequestMap {
    outstanding: HashMap<u64, CallHandler>,
    pending_auth: Vec<PendingCall>,
    current_id: u64,
    auth_state: AuthState,
}

impl RequestMap {
    /// Create an empty map. Ids start at 1.
    pub fn new() -> Self {
        Self {
            outstanding: HashMap::new(),
            pending_auth: Vec::new(),
            current_id: 0,
            auth_state: AuthState::NotAuthenticated,
        }
    }

    /// Register a call and build its request frame.
    ///
    /// Calls to `private/*` methods made before
    /// [`notify_authenticated`](Self::notify_authenticated) are buffered
    /// in FIFO order and nothing is sent.
    pub fn add_request(
        &mut self,
        method: &str,
        params: Value,
        tx: oneshot::Sender<RemoteResult>,
    ) -> AddOutcome {
        let mut handler = CallHandler::new();
        handler.set(tx, Vec::new());

        if self.auth_state != AuthState::Authenticated && method.starts_with(PRIVATE_PREFIX) {
            tracing::debug!("buffering {} until authentication", method);
            self.pending_auth.push(PendingCall {
                method: method.to_string(),
                params,
                handler,
            });
            return AddOutcome::Buffered;
        }

        let id = self.next_id();
        match serde_json::to_string(&JsonRpcRequest::new(id, method, params)) {
            Ok(frame) => {
                self.outstanding.insert(id, handler);
                AddOutcome::Send { id, frame }
            }
            Err(e) => {
                handler.post_completion(RemoteResult::Transport(RpcError::Transport(
                    TransportError::Send(e.to_string()),
                )));
                AddOutcome::Failed
            }
        }
    }

    /// Deliver `outcome` to the handler registered under `id`.
    ///
    /// Returns `false` if no such request is outstanding.
    pub fn complete(&mut self, id: u64, outcome: RemoteResult) -> bool {
        match self.outstanding.remove(&id) {
            Some(mut handler) => {
                handler.post_completion(outcome);
                true
            }
            None => false,
        }
    }

    /// Fail the request registered under `id` with `err`.
    pub fn fail(&mut self, id: u64, err: RpcError) -> bool {
        self.complete(id, RemoteResult::Transport(err))
    }

    /// Transition to authenticated and drain the buffer.
    ///
    /// Each buffered call gets a fresh id and its frame is returned, in the
    /// order the calls were made.
    pub fn notify_authenticated(&mut self) -> Vec<(u64, String)> {
        debug_assert_eq!(self.auth_state, AuthState::NotAuthenticated);
        self.auth_state = AuthState::Authenticated;

        let pending = std::mem::take(&mut self.pending_auth);
        let mut frames = Vec::with_capacity(pending.len());
        for call in pending {
            let PendingCall {
                method,
                params,
                mut handler,
            } = call;
            let id = self.next_id();
            match serde_json::to_string(&JsonRpcRequest::new(id, method, params)) {
                Ok(frame) => {
                    self.outstanding.insert(id, handler);
                    frames.push((id, frame));
                }
                Err(e) => {
                    handler.post_completion(RemoteResult::Transport(RpcError::Transport(
                        TransportError::Send(e.to_string()),
                    )));
                }
            }
        }
        frames
    }

    /// Fail every buffered and outstanding call with `err`.
    pub fn cancel(&mut self, err: TransportError) {
        let pending = std::mem::take(&mut self.pending_auth);
        for mut call in pending {
            call.handler.post_completion(RemoteResult::Transport(RpcError::Transport(
                err.clone(),
            )));
        }
        let outstanding = std::mem::take(&mut self.outstanding);
        for (_id, mut handler) in outstanding {
            handler.post_completion(RemoteResult::Transport(RpcError::Transport(err.clone())));
        }
    }

    /// Number of requests currently in flight.
    pub fn outstanding_len(&self) -> usize {
        self.outstanding.len()
    }

    /// Number of calls buffered behind authentication.
    pub fn pending_auth_len(&self) -> usize {
        self.pending_auth.len()
    }

    /// Whether the session has been marked authenticated.
    pub fn is_authenticated(&self) -> bool {
        self.auth_state == AuthState::Authenticated
    }

    fn next_id(&mut self) -> u64 {
        self.current_id += 1;
        self.current_id
    }
}

impl Default for RequestMap {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RequestMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestMap")
            .field("outstanding", &self.outstanding.len())
            .field("pending_auth", &self.pending_auth.len())
            .field("current_id", &self.current_id)
            .field("auth_state", &self.auth_state)
            .finish()
    }
}
