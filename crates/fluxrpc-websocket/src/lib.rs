//! # FluxRPC WebSocket
//!
//! The long-running WebSocket session at the heart of the FluxRPC stack.
//!
//! A [`WsSession`] supervises one connection: it waits for a connect
//! request, establishes the stream through its [`WsConnector`], then forks
//! a writer and a closer as sibling tasks while driving the reader itself,
//! joining all three on exit. Close requests are honoured in every phase.
//!
//! ```text
//! fluxrpc-websocket/
//! ├── types.rs      # ConnectRequest, CloseReason
//! ├── connector.rs  # WsConnector seam, TLS and plain implementations
//! └── session.rs    # WsSession supervisor, reader/writer/closer states
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]

pub mod connector;
pub mod session;
pub mod types;

pub use connector::{PlainWsConnector, TlsWsConnector, WsConnector};
pub use session::WsSession;
pub use types::{CloseReason, ConnectRequest, GOING_AWAY};

// Re-export core primitives for convenience
pub use fluxrpc_core::{TransportError, TransportResult};
