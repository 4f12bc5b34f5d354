//! # FluxRPC Client
//!
//! A JSON-RPC 2.0 client session over a supervised WebSocket connection.
//!
//! [`JsonRpcSession`] wraps a [`WsSession`](fluxrpc_websocket::WsSession):
//! outbound calls are assigned monotonically increasing ids and correlated
//! with their responses, server-initiated calls are routed to a method
//! callback, and `private/*` calls are buffered until the application
//! reports authentication. Every in-flight call is completed - with its
//! response or with the session's failure - before `run` returns.
//!
//! ```text
//! fluxrpc-client/
//! ├── protocol.rs     # JSON-RPC 2.0 wire types
//! ├── error.rs        # ProtocolError taxonomy, RpcError
//! ├── remote.rs       # RemoteResult / RemoteFailure
//! ├── request_map.rs  # id allocation, outstanding table, auth buffer
//! └── session.rs      # JsonRpcSession
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]

pub mod error;
pub mod protocol;
pub mod remote;
pub mod request_map;
pub mod session;

pub use error::{ProtocolError, RpcError};
pub use protocol::{JSONRPC_VERSION, JsonRpcRequest, JsonRpcVersion};
pub use remote::{RemoteFailure, RemoteResult};
pub use request_map::RequestMap;
pub use session::JsonRpcSession;

// Re-export the session surface for convenience
pub use fluxrpc_core::{TransportError, TransportResult};
pub use fluxrpc_websocket::{CloseReason, PlainWsConnector, TlsWsConnector, WsConnector};
