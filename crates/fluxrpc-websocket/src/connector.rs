//! The connect seam between the session supervisor and the byte transport.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_native_tls::TlsStream;
use tokio_tungstenite::WebSocketStream;

use fluxrpc_core::{CancelSignal, TransportError, TransportResult};
use fluxrpc_net::{TcpConnectOp, WsConnectOp};

use crate::types::ConnectRequest;

/// Establishes the WebSocket stream a session runs over.
///
/// The session supervisor is generic over this seam so that the byte layer
/// below the WebSocket framing (TLS, plain TCP, or something else entirely)
/// is the connector's business. `cancel` chains the session's close
/// handling into the connect: the implementation must observe it at every
/// suspension point, normally by building its connect operations with
/// [`CancelSignal::child`].
#[async_trait]
pub trait WsConnector: Send + 'static {
    /// The byte stream carrying the WebSocket framing.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Connect and upgrade to a WebSocket stream.
    async fn connect(
        &mut self,
        request: &ConnectRequest,
        cancel: &CancelSignal,
    ) -> TransportResult<WebSocketStream<Self::Stream>>;
}

/// Connects `wss://` endpoints through the full resolve / TCP / TLS /
/// upgrade chain. The default connector.
#[derive(Debug, Default)]
pub struct TlsWsConnector;

impl TlsWsConnector {
    /// Create the connector.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl WsConnector for TlsWsConnector {
    type Stream = TlsStream<TcpStream>;

    async fn connect(
        &mut self,
        request: &ConnectRequest,
        cancel: &CancelSignal,
    ) -> TransportResult<WebSocketStream<Self::Stream>> {
        let op = WsConnectOp::with_parent(cancel);
        op.run(&request.host, request.port, &request.target).await
    }
}

/// Connects plain `ws://` endpoints; used for unencrypted servers and
/// loopback testing.
#[derive(Debug, Default)]
pub struct PlainWsConnector;

impl PlainWsConnector {
    /// Create the connector.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl WsConnector for PlainWsConnector {
    type Stream = TcpStream;

    async fn connect(
        &mut self,
        request: &ConnectRequest,
        cancel: &CancelSignal,
    ) -> TransportResult<WebSocketStream<Self::Stream>> {
        let op = TcpConnectOp::with_parent(cancel);
        let (stream, _endpoint) = op.run(&request.host, request.port).await?;

        let url = format!(
            "ws://{}:{}{}",
            request.host, request.port, request.target
        );
        tracing::trace!("websocket handshake: {}", url);
        let (stream, _response) = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(cancel.reason()),
            result = tokio_tungstenite::client_async(url, stream) => {
                result.map_err(|e| TransportError::Handshake(e.to_string()))?
            }
        };
        Ok(stream)
    }
}
