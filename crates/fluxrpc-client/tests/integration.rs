use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::Message;

use fluxrpc_client::{
    JsonRpcSession, PlainWsConnector, ProtocolError, RemoteResult, RpcError, TransportError,
};
use fluxrpc_websocket::CloseReason;

/// A loopback JSON-RPC server. Every received frame is forwarded to the
/// returned channel; replies depend on the method called.
async fn spawn_rpc_server() -> (u16, mpsc::UnboundedReceiver<Value>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let seen_tx = seen_tx.clone();
            tokio::spawn(async move {
                let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                while let Some(Ok(msg)) = ws.next().await {
                    let Message::Text(text) = msg else { continue };
                    let frame: Value = serde_json::from_str(text.as_str()).unwrap();
                    seen_tx.send(frame.clone()).ok();

                    let id = frame["id"].clone();
                    let reply = match frame["method"].as_str() {
                        Some("public/test") => {
                            json!({"jsonrpc":"2.0","id":id,"result":{"ok":true}})
                        }
                        Some("public/fail") => {
                            json!({"jsonrpc":"2.0","id":id,"error":{"code":-32601,"message":"no"}})
                        }
                        Some("public/bad") => json!({"jsonrpc":"2.0","id":id}),
                        Some("public/announce") => {
                            let notification = json!({
                                "jsonrpc":"2.0","method":"announce","params":{"n":1}
                            });
                            if ws
                                .send(Message::Text(notification.to_string().into()))
                                .await
                                .is_err()
                            {
                                break;
                            }
                            json!({"jsonrpc":"2.0","id":id,"result":null})
                        }
                        Some("public/hang") => {
                            ws.close(None).await.ok();
                            break;
                        }
                        Some(m) if m.starts_with("private/") => {
                            json!({"jsonrpc":"2.0","id":id,"result":"private-ok"})
                        }
                        _ => json!({"jsonrpc":"2.0","id":id,"error":{"code":-32601,"message":"unknown"}}),
                    };
                    if ws
                        .send(Message::Text(reply.to_string().into()))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
            });
        }
    });

    (port, seen_rx)
}

struct Client {
    session: Arc<JsonRpcSession<PlainWsConnector>>,
    run: JoinHandle<Result<(), TransportError>>,
    methods: mpsc::UnboundedReceiver<(String, Value)>,
}

async fn connect_client(port: u16) -> Client {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let session = Arc::new(JsonRpcSession::with_connector(PlainWsConnector::new()));
    let (method_tx, methods) = mpsc::unbounded_channel();
    let run = tokio::spawn({
        let session = Arc::clone(&session);
        async move {
            session
                .run(move |method, params| {
                    method_tx.send((method, params)).ok();
                })
                .await
        }
    });
    session.connect("127.0.0.1", port, "/").await.unwrap();
    Client {
        session,
        run,
        methods,
    }
}

#[tokio::test]
async fn call_round_trip() {
    let (port, mut seen) = spawn_rpc_server().await;
    let client = connect_client(port).await;

    let result = client.session.call("public/test", json!({})).await;
    assert_eq!(result, RemoteResult::Value(json!({"ok": true})));
    assert_eq!(client.session.outstanding_calls(), 0);

    let frame = seen.recv().await.unwrap();
    assert_eq!(frame["jsonrpc"], "2.0");
    assert_eq!(frame["id"], 1);
    assert_eq!(frame["method"], "public/test");

    client.session.close(CloseReason::default());
    assert!(client.run.await.unwrap().is_ok());
}

#[tokio::test]
async fn remote_error_surfaces_as_a_failure() {
    let (port, _seen) = spawn_rpc_server().await;
    let client = connect_client(port).await;

    let result = client.session.call("public/fail", json!({})).await;
    assert!(result.is_failure());
    let failure = result.failure().unwrap();
    assert_eq!(failure.error()["code"], -32601);
    assert_eq!(failure.error()["message"], "no");

    client.session.close(CloseReason::default());
    assert!(client.run.await.unwrap().is_ok());
}

#[tokio::test]
async fn response_without_result_or_error_is_invalid_content() {
    let (port, _seen) = spawn_rpc_server().await;
    let client = connect_client(port).await;

    let result = client.session.call("public/bad", json!({})).await;
    assert_eq!(
        result,
        RemoteResult::Transport(RpcError::Protocol(ProtocolError::InvalidContent))
    );

    client.session.close(CloseReason::default());
    assert!(client.run.await.unwrap().is_ok());
}

#[tokio::test]
async fn private_calls_wait_for_authentication() {
    let (port, mut seen) = spawn_rpc_server().await;
    let client = connect_client(port).await;

    let call = tokio::spawn({
        let session = Arc::clone(&client.session);
        async move { session.call("private/buy", json!({})).await }
    });
    sleep(Duration::from_millis(100)).await;

    // nothing reaches the wire before the transition
    assert!(seen.try_recv().is_err());
    assert!(!call.is_finished());

    client.session.notify_authenticated();
    let frame = seen.recv().await.unwrap();
    assert_eq!(frame["id"], 1);
    assert_eq!(frame["method"], "private/buy");

    assert_eq!(
        call.await.unwrap(),
        RemoteResult::Value(json!("private-ok"))
    );

    client.session.close(CloseReason::default());
    assert!(client.run.await.unwrap().is_ok());
}

#[tokio::test]
async fn server_notifications_reach_the_method_callback() {
    let (port, _seen) = spawn_rpc_server().await;
    let mut client = connect_client(port).await;

    let result = client.session.call("public/announce", json!({})).await;
    assert_eq!(result, RemoteResult::Value(Value::Null));

    let (method, params) = client.methods.recv().await.unwrap();
    assert_eq!(method, "announce");
    assert_eq!(params, json!({"n": 1}));

    client.session.close(CloseReason::default());
    assert!(client.run.await.unwrap().is_ok());
}

#[tokio::test]
async fn teardown_fails_every_outstanding_call() {
    let (port, _seen) = spawn_rpc_server().await;
    let client = connect_client(port).await;

    // the server closes without replying; the session teardown must
    // complete the call anyway
    let result = client.session.call("public/hang", json!({})).await;
    assert_eq!(
        result,
        RemoteResult::Transport(RpcError::Transport(TransportError::Aborted))
    );
    assert_eq!(client.session.outstanding_calls(), 0);
    assert!(client.run.await.unwrap().is_ok());
}
