//! WebSocket client upgrade layered over a TLS connect.

use tokio::net::TcpStream;
use tokio_native_tls::TlsStream;
use tokio_tungstenite::WebSocketStream;

use fluxrpc_core::{CancelSignal, TransportError, TransportResult};

use crate::tls::TlsConnectOp;

/// The encrypted stream produced by a successful [`WsConnectOp`].
pub type WssStream = WebSocketStream<TlsStream<TcpStream>>;

/// TCP + TLS connect + WebSocket client upgrade as one cancellable
/// operation.
#[derive(Debug, Default)]
pub struct WsConnectOp {
    cancel: CancelSignal,
}

impl WsConnectOp {
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

    /// Connect to `host:port`, complete the TLS handshake, and upgrade the
    /// stream with a `GET <target>` WebSocket handshake.
    pub async fn run(&self, host: &str, port: u16, target: &str) -> TransportResult<WssStream> {
        let lower = TlsConnectOp::with_parent(&self.cancel);
        let tls = lower.run(host, port).await?;

        let url = format!("wss://{host}:{port}{target}");
        tracing::trace!("websocket handshake: {}", url);
        let (stream, response) = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(self.cancel.reason()),
            result = tokio_tungstenite::client_async(url, tls) => {
                result.map_err(|e| TransportError::Handshake(e.to_string()))?
            }
        };
        tracing::debug!("websocket established (status {})", response.status());
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn immediate_cancel_aborts_the_whole_chain() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let op = WsConnectOp::new();
        op.cancel(TransportError::ConnectionAborted);

        let result = op.run("127.0.0.1", port, "/ws").await;
        assert!(matches!(result, Err(TransportError::ConnectionAborted)));
    }
}
