//! The WebSocket session supervisor.
//!
//! [`WsSession::run`] drives one session from the first connect request to
//! teardown. It moves through three phases: waiting for a connect request,
//! establishing the stream, and supervising the active session, where the
//! writer and closer run as sibling tasks and the reader is driven inline.
//! A close request is honoured in every phase; the installed close hook is
//! swapped at each phase boundary so the request always cancels whatever is
//! currently in flight.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::{self, Message};
use uuid::Uuid;

use fluxrpc_core::{
    AsyncEvent, AsyncQueue, CancelSignal, JoinLatch1, JoinLatch2, QueueHandle, TransportError,
    TransportResult, WorkTracker,
};

use crate::connector::WsConnector;
use crate::types::{CloseReason, ConnectRequest};

type CloseHook = Box<dyn Fn(CloseReason) + Send + Sync>;

/// Marker event: the writer task has exited.
struct WriterDone;
/// Marker event: the closer task has exited.
struct CloserDone;

type WriteSink<S> = Arc<tokio::sync::Mutex<SplitSink<WebSocketStream<S>, Message>>>;

/// A long-running WebSocket client session.
///
/// The session is driven by [`run`](Self::run); [`connect`](Self::connect),
/// [`send_text`](Self::send_text) and [`close`](Self::close) may be called
/// from any task while the supervisor is running.
pub struct WsSession<C: WsConnector> {
    connector: Mutex<Option<C>>,
    shared: Arc<SessionShared>,
}

struct SessionShared {
    session_id: String,
    connect_latch: JoinLatch1<ConnectRequest>,
    connected: AsyncEvent,
    on_close: Mutex<Option<CloseHook>>,
    send_hook: Mutex<Option<QueueHandle<String>>>,
    close_request: Mutex<Option<CloseReason>>,
    work: WorkTracker,
}

impl SessionShared {
    fn install_close_hook(&self, hook: impl Fn(CloseReason) + Send + Sync + 'static) {
        *self.on_close.lock().expect("close hook mutex poisoned") = Some(Box::new(hook));
    }

    fn clear_close_hook(&self) {
        self.on_close.lock().expect("close hook mutex poisoned").take();
    }

    /// Record a close request. Only the first request wins.
    fn record_close(&self, reason: CloseReason) -> bool {
        let mut slot = self.close_request.lock().expect("close request mutex poisoned");
        if slot.is_none() {
            *slot = Some(reason);
            true
        } else {
            false
        }
    }

    fn close_requested(&self) -> bool {
        self.close_request
            .lock()
            .expect("close request mutex poisoned")
            .is_some()
    }
}

impl<C: WsConnector> WsSession<C> {
    /// Create a session that will connect through `connector`.
    pub fn new(connector: C) -> Self {
        Self {
            connector: Mutex::new(Some(connector)),
            shared: Arc::new(SessionShared {
                session_id: Uuid::new_v4().to_string(),
                connect_latch: JoinLatch1::new(),
                connected: AsyncEvent::new(),
                on_close: Mutex::new(None),
                send_hook: Mutex::new(None),
                close_request: Mutex::new(None),
                work: WorkTracker::new(),
            }),
        }
    }

    /// This session's id, used in log messages.
    pub fn session_id(&self) -> &str {
        &self.shared.session_id
    }

    /// Deliver the connect request and wait until the session is up.
    ///
    /// Fails with the session error if the supervisor gives up before the
    /// stream is established. May be called at most once per session.
    pub async fn connect(&self, host: &str, port: u16, target: &str) -> TransportResult<()> {
        let shared = &self.shared;
        tracing::trace!(
            "session {} connect requested: {}:{}{}",
            shared.session_id,
            host,
            port,
            target
        );
        shared.connect_latch.set::<0>(ConnectRequest {
            host: host.to_string(),
            port,
            target: target.to_string(),
        });
        shared
            .connected
            .wait_guarded(vec![shared.work.guard()])
            .await?;
        tracing::trace!("session {} connect complete", shared.session_id);
        Ok(())
    }

    /// Queue a text frame for sending.
    ///
    /// Usable only while the session is connected: fails with
    /// [`TransportError::NotConnected`] before the supervisor signals
    /// connected and after the writer has exited. Frames are written in
    /// call order.
    pub fn send_text(&self, text: String) -> TransportResult<()> {
        let hook = self.shared.send_hook.lock().expect("send hook mutex poisoned");
        match hook.as_ref() {
            Some(queue) => {
                queue.push(text);
                Ok(())
            }
            None => Err(TransportError::NotConnected),
        }
    }

    /// Request that the session close.
    ///
    /// In the connect phases this aborts the pending operation and
    /// [`run`](Self::run) returns cleanly; in the active phase it starts an
    /// orderly close handshake. Only the first request takes effect.
    pub fn close(&self, reason: CloseReason) {
        tracing::trace!("session {} close requested: {}", self.shared.session_id, reason);
        let hook = self.shared.on_close.lock().expect("close hook mutex poisoned");
        if let Some(hook) = hook.as_ref() {
            hook(reason);
        } else {
            // the supervisor is not running yet; it honours the recorded
            // request as soon as it starts
            self.shared.record_close(reason);
        }
    }

    /// Run the session until a clean close or a fatal error.
    ///
    /// `on_text` and `on_binary` are called for each arriving data frame;
    /// both are dropped before `run` returns. Returning `Ok` means a clean
    /// close was exchanged or the peer closed first.
    pub async fn run<OnText, OnBinary>(
        &self,
        on_text: OnText,
        on_binary: OnBinary,
    ) -> TransportResult<()>
    where
        OnText: FnMut(String) + Send,
        OnBinary: FnMut(Bytes) + Send,
    {
        let _work = self.shared.work.guard();
        let result = self.run_phases(on_text, on_binary).await;
        self.shared.clear_close_hook();
        match result {
            Ok(()) => {
                tracing::debug!("session {} finished", self.shared.session_id);
                Ok(())
            }
            Err(err) => {
                self.shared.connected.cancel(err.clone());
                if self.shared.close_requested() {
                    tracing::debug!("session {} closed by request", self.shared.session_id);
                    Ok(())
                } else {
                    tracing::debug!("session {} failed: {}", self.shared.session_id, err);
                    Err(err)
                }
            }
        }
    }

    async fn run_phases(
        &self,
        mut on_text: impl FnMut(String) + Send,
        mut on_binary: impl FnMut(Bytes) + Send,
    ) -> TransportResult<()> {
        let shared = &self.shared;

        //
        // phase 1: wait for a connect request
        //

        shared.install_close_hook({
            let shared = Arc::clone(shared);
            move |reason| {
                if shared.record_close(reason) {
                    shared
                        .connect_latch
                        .cancel(TransportError::ConnectionAborted);
                }
            }
        });
        if shared.close_requested() {
            return Err(TransportError::ConnectionAborted);
        }
        shared
            .connect_latch
            .wait_guarded(vec![shared.work.guard()])
            .await?;
        if shared.close_requested() {
            return Err(TransportError::ConnectionAborted);
        }
        let request = shared
            .connect_latch
            .take::<0>()
            .ok_or(TransportError::Aborted)?;

        //
        // phase 2: establish the stream
        //

        tracing::debug!(
            "session {} connecting {}:{}{}",
            shared.session_id,
            request.host,
            request.port,
            request.target
        );
        let cancel = CancelSignal::new();
        shared.install_close_hook({
            let shared = Arc::clone(shared);
            let cancel = cancel.clone();
            move |reason| {
                if shared.record_close(reason) {
                    cancel.cancel(TransportError::ConnectionAborted);
                }
            }
        });
        let mut connector = self
            .connector
            .lock()
            .expect("connector mutex poisoned")
            .take()
            .ok_or(TransportError::NotConnected)?;
        let stream = connector.connect(&request, &cancel).await?;
        tracing::debug!("session {} connection up", shared.session_id);

        //
        // phase 3: fork writer and closer, drive the reader
        //

        let (sink, stream) = stream.split();
        let sink: WriteSink<C::Stream> = Arc::new(tokio::sync::Mutex::new(sink));
        let join = JoinLatch2::<WriterDone, CloserDone>::new();
        let close_latch = JoinLatch1::<CloseReason>::new();

        let tx_queue = AsyncQueue::<String>::new();
        let queue_handle = tx_queue.handle();
        *shared.send_hook.lock().expect("send hook mutex poisoned") = Some(tx_queue.handle());

        tokio::spawn(writer_task(
            Arc::clone(shared),
            tx_queue,
            Arc::clone(&sink),
            join.clone(),
        ));
        tokio::spawn(closer_task(
            Arc::clone(shared),
            close_latch.clone(),
            Arc::clone(&sink),
            join.clone(),
        ));

        // the writer and closer are live; clients may send now
        shared.connected.set();
        tracing::debug!("session {} connected", shared.session_id);

        let pending = shared
            .close_request
            .lock()
            .expect("close request mutex poisoned")
            .clone();
        if let Some(reason) = pending {
            close_latch.set::<0>(reason);
            queue_handle.stop();
        } else {
            shared.install_close_hook({
                let shared = Arc::clone(shared);
                let close_latch = close_latch.clone();
                let queue_handle = queue_handle.clone();
                move |reason| {
                    if shared.record_close(reason.clone()) {
                        close_latch.set::<0>(reason);
                        queue_handle.stop();
                    }
                }
            });
        }

        let read_result =
            read_loop(stream, &mut on_text, &mut on_binary, &shared.session_id).await;
        match &read_result {
            Ok(()) => {
                // peer closed or the close handshake completed; release any
                // sibling still parked on its latch or queue
                queue_handle.stop();
                close_latch.cancel(TransportError::Closed);
            }
            Err(err) => {
                tracing::debug!("session {} read failed: {}", shared.session_id, err);
                queue_handle.stop();
                close_latch.cancel(err.clone());
            }
        }

        // join the forked siblings before tearing down
        join.wait_guarded(vec![shared.work.guard()]).await?;
        read_result
    }
}

impl<C: WsConnector> std::fmt::Debug for WsSession<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsSession")
            .field("session_id", &self.shared.session_id)
            .finish()
    }
}

/// The writer sub-state: owns the send queue, forwards frames to the sink.
///
/// Exits when the queue is stopped or a write fails; clears the session's
/// send hook on every exit path.
async fn writer_task<S>(
    shared: Arc<SessionShared>,
    mut queue: AsyncQueue<String>,
    sink: WriteSink<S>,
    join: JoinLatch2<WriterDone, CloserDone>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let _work = shared.work.guard();
    let result = write_loop(&mut queue, &sink, &shared.session_id).await;
    *shared.send_hook.lock().expect("send hook mutex poisoned") = None;
    match result {
        Ok(()) => tracing::trace!("session {} writer exit", shared.session_id),
        Err(err) => tracing::debug!("session {} writer exit: {}", shared.session_id, err),
    }
    join.set::<0>(WriterDone);
}

async fn write_loop<S>(
    queue: &mut AsyncQueue<String>,
    sink: &WriteSink<S>,
    session_id: &str,
) -> TransportResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    loop {
        let frame = match queue.pop().await {
            Ok(frame) => frame,
            Err(TransportError::Aborted) => return Ok(()),
            Err(err) => return Err(err),
        };
        tracing::trace!("session {} sending {} bytes", session_id, frame.len());
        sink.lock()
            .await
            .send(Message::Text(frame.into()))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))?;
    }
}

/// The closer sub-state: waits for a close reason, then performs the
/// shutdown send. Cancelling its latch releases it without sending.
async fn closer_task<S>(
    shared: Arc<SessionShared>,
    close_latch: JoinLatch1<CloseReason>,
    sink: WriteSink<S>,
    join: JoinLatch2<WriterDone, CloserDone>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let _work = shared.work.guard();
    match close_loop(&close_latch, &sink, &shared.session_id).await {
        Ok(()) => tracing::trace!("session {} closer exit", shared.session_id),
        Err(err) => tracing::trace!("session {} closer exit: {}", shared.session_id, err),
    }
    join.set::<1>(CloserDone);
}

async fn close_loop<S>(
    close_latch: &JoinLatch1<CloseReason>,
    sink: &WriteSink<S>,
    session_id: &str,
) -> TransportResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    close_latch.wait().await?;
    let reason = close_latch.take::<0>().ok_or(TransportError::Aborted)?;
    tracing::debug!("session {} closing: {}", session_id, reason);
    sink.lock()
        .await
        .send(Message::Close(Some(reason.into_frame())))
        .await
        .map_err(|e| TransportError::Send(e.to_string()))?;
    Ok(())
}

/// The reader sub-state: delivers data frames until the stream ends.
///
/// A close frame, end of stream, or a closed-connection error is normal
/// termination; every other error propagates to the supervisor.
async fn read_loop<S>(
    mut stream: SplitStream<WebSocketStream<S>>,
    on_text: &mut (impl FnMut(String) + Send),
    on_binary: &mut (impl FnMut(Bytes) + Send),
    session_id: &str,
) -> TransportResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => on_text(text.to_string()),
            Ok(Message::Binary(data)) => on_binary(data),
            Ok(Message::Close(frame)) => {
                tracing::debug!("session {} peer close: {:?}", session_id, frame);
                return Ok(());
            }
            // control and raw frames are not surfaced
            Ok(_) => {}
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                return Ok(());
            }
            Err(e) => return Err(TransportError::Receive(e.to_string())),
        }
    }
    Ok(())
}
