//! TCP connect over a resolved endpoint set.

use std::net::SocketAddr;

use tokio::net::TcpStream;

use fluxrpc_core::{CancelSignal, TransportError, TransportResult};

use crate::resolve::ResolveOp;

/// Resolve + connect as one cancellable operation.
///
/// Cancellation is forwarded to whichever step is in flight: the resolver
/// runs on a child signal, and the connect attempts race the signal
/// directly.
#[derive(Debug, Default)]
pub struct TcpConnectOp {
    cancel: CancelSignal,
}

impl TcpConnectOp {
    /// Create a standalone operation.
    pub fn new() -> Self {
        Self {
            cancel: CancelSignal::new(),
        }
    }

    /// Create an operation whose cancellation chains to `parent`.
    pub fn with_parent(parent: &CancelSignal) -> Self {
        Self {
            cancel: parent.child(),
        }
    }

    /// Cancel the connect, failing it with `err`.
    pub fn cancel(&self, err: TransportError) {
        self.cancel.cancel(err);
    }

    /// Resolve `host:port` and connect to the first reachable endpoint.
    ///
    /// Returns the connected stream together with the chosen endpoint.
    pub async fn run(&self, host: &str, port: u16) -> TransportResult<(TcpStream, SocketAddr)> {
        let resolve = ResolveOp::with_parent(&self.cancel);
        let addrs = resolve.run(host, port).await?;

        let mut last_error = None;
        for addr in addrs {
            tracing::trace!("connecting to {}", addr);
            let attempt = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err(self.cancel.reason()),
                result = TcpStream::connect(addr) => result,
            };
            match attempt {
                Ok(stream) => {
                    tracing::debug!("connected to {}", addr);
                    return Ok((stream, addr));
                }
                Err(e) => {
                    tracing::trace!("connect to {} failed: {}", addr, e);
                    last_error = Some(e);
                }
            }
        }

        Err(TransportError::Connect(
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no endpoints to try".to_string()),
        ))
    }
}
