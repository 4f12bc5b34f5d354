//! # FluxRPC Net
//!
//! The four layered connect operations behind a FluxRPC session: DNS
//! resolve, TCP connect, TLS client handshake (with SNI), and the WebSocket
//! client upgrade.
//!
//! Each operation owns a [`CancelSignal`](fluxrpc_core::CancelSignal) and
//! derives child signals for the layers below it, so an external cancel is
//! delivered to whichever sub-operation is currently in flight. Every await
//! races the signal in a biased `select!`, which means a cancel posted
//! before the operation starts is observed deterministically and
//! cancellation can never race a completion.
//!
//! ```text
//! WsConnectOp
//! └── TlsConnectOp
//!     └── TcpConnectOp
//!         └── ResolveOp
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]

pub mod resolve;
pub mod tcp;
pub mod tls;
pub mod ws;

pub use resolve::ResolveOp;
pub use tcp::TcpConnectOp;
pub use tls::TlsConnectOp;
pub use ws::{WsConnectOp, WssStream};
