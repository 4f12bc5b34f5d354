//! TLS client handshake layered over a TCP connect.

use tokio::net::TcpStream;
use tokio_native_tls::TlsStream;

use fluxrpc_core::{CancelSignal, TransportError, TransportResult};

use crate::tcp::TcpConnectOp;

/// TCP connect + TLS client handshake as one cancellable operation.
///
/// The connect host doubles as the SNI name presented during the
/// handshake. A cancel delivered while the handshake is pending drops the
/// in-flight exchange, closing the underlying socket.
#[derive(Debug, Default)]
pub struct TlsConnectOp {
    cancel: CancelSignal,
}

impl TlsConnectOp {
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

    /// Connect to `host:port` and complete a TLS client handshake.
    pub async fn run(&self, host: &str, port: u16) -> TransportResult<TlsStream<TcpStream>> {
        let lower = TcpConnectOp::with_parent(&self.cancel);
        let (stream, endpoint) = lower.run(host, port).await?;

        let connector =
            native_tls::TlsConnector::new().map_err(|e| TransportError::Tls(e.to_string()))?;
        let connector = tokio_native_tls::TlsConnector::from(connector);

        tracing::trace!("starting TLS handshake with {} ({})", host, endpoint);
        let stream = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(self.cancel.reason()),
            result = connector.connect(host, stream) => {
                result.map_err(|e| TransportError::Tls(e.to_string()))?
            }
        };
        tracing::debug!("TLS session established with {}", host);
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio::time::sleep;

    #[tokio::test]
    async fn immediate_cancel_aborts_the_whole_chain() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let op = TlsConnectOp::new();
        op.cancel(TransportError::ConnectionAborted);

        let result = op.run("127.0.0.1", port).await;
        assert!(matches!(result, Err(TransportError::ConnectionAborted)));
    }

    #[tokio::test]
    async fn cancel_reaches_a_pending_handshake() {
        // a listener that accepts and then stays silent keeps the
        // handshake pending until the cancel arrives
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            sleep(Duration::from_secs(60)).await;
        });

        let op = Arc::new(TlsConnectOp::new());
        let run = tokio::spawn({
            let op = Arc::clone(&op);
            async move { op.run("127.0.0.1", port).await }
        });

        sleep(Duration::from_millis(100)).await;
        assert!(!run.is_finished());

        op.cancel(TransportError::Aborted);
        assert!(matches!(run.await.unwrap(), Err(TransportError::Aborted)));
    }
}
