//! Game connection: transport abstraction plus the session that owns it
//!
//! A [`NetworkSession`] spawns one background task that owns the transport.
//! Outbound messages reach the task through an unbounded channel so the
//! frame loop never blocks; inbound frames come back as [`SessionEvent`]s
//! that the frame loop drains once per frame.

use crate::error::ClientError;
use futures::future::{BoxFuture, FutureExt, Shared};
use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::ClientMessage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream};

const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Bidirectional text transport to the game service.
pub trait Transport: Send + 'static {
    fn send(&mut self, text: String) -> BoxFuture<'_, Result<(), ClientError>>;
    /// `None` once the peer closed the connection.
    fn recv(&mut self) -> BoxFuture<'_, Option<Result<String, ClientError>>>;
    fn close(&mut self) -> BoxFuture<'_, Result<(), ClientError>>;
}

/// Removes the `Bearer ` scheme so the token fits in a subprotocol name.
pub fn clear_token(token: &str) -> String {
    token.replace("Bearer ", "").trim().to_string()
}

pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsTransport {
    /// Opens a websocket to `url`, authenticating through the
    /// `token_<credential>` subprotocol.
    pub async fn connect(url: &str, token: &str, insecure_tls: bool) -> Result<Self, ClientError> {
        let mut request = url.into_client_request()?;
        let protocol = format!("token_{}", clear_token(token));
        let header = HeaderValue::from_str(&protocol)
            .map_err(|e| ClientError::Credential(e.to_string()))?;
        request
            .headers_mut()
            .insert("Sec-WebSocket-Protocol", header);

        let connector = if insecure_tls {
            let tls = native_tls::TlsConnector::builder()
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true)
                .build()
                .map_err(|e| ClientError::Connection(e.to_string()))?;
            Some(Connector::NativeTls(tls))
        } else {
            None
        };

        info!("Opening game connection to {}", url);
        let (stream, _response) =
            tokio_tungstenite::connect_async_tls_with_config(request, None, false, connector)
                .await?;
        Ok(Self { stream })
    }
}

impl Transport for WsTransport {
    fn send(&mut self, text: String) -> BoxFuture<'_, Result<(), ClientError>> {
        async move {
            self.stream.send(Message::Text(text)).await?;
            Ok(())
        }
        .boxed()
    }

    fn recv(&mut self) -> BoxFuture<'_, Option<Result<String, ClientError>>> {
        async move {
            loop {
                match self.stream.next().await? {
                    Ok(Message::Text(text)) => return Some(Ok(text)),
                    Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                        Ok(text) => return Some(Ok(text)),
                        Err(_) => warn!("Dropping non-UTF-8 binary frame"),
                    },
                    Ok(Message::Close(frame)) => {
                        debug!("Peer closed connection: {:?}", frame);
                        return None;
                    }
                    Ok(_) => continue,
                    Err(e) => return Some(Err(e.into())),
                }
            }
        }
        .boxed()
    }

    fn close(&mut self) -> BoxFuture<'_, Result<(), ClientError>> {
        async move {
            use tokio_tungstenite::tungstenite::Error as WsError;
            match self.stream.close(None).await {
                Ok(()) | Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => Ok(()),
                Err(e) => Err(e.into()),
            }
        }
        .boxed()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Message(String),
    /// The transport went away without a local close request.
    Closed,
}

/// Completion of a connection close, shareable between callers.
pub type CloseFuture = Shared<BoxFuture<'static, ()>>;

/// Handle on an open game connection.
///
/// Sending is fire-and-forget and silently dropped once the connection is
/// not open. [`NetworkSession::close`] is idempotent: every caller gets the
/// same future and the transport is closed once.
pub struct NetworkSession {
    outbound: mpsc::UnboundedSender<String>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    open: Arc<AtomicBool>,
    listening: Arc<AtomicBool>,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    finished_rx: Mutex<Option<oneshot::Receiver<()>>>,
    closing: Mutex<Option<CloseFuture>>,
}

impl NetworkSession {
    /// Spawns the transport task on the current runtime. The greeting is the
    /// first message the peer sees.
    pub fn start(transport: impl Transport, names: Option<[String; 2]>) -> Self {
        let (outbound, outbound_rx) = mpsc::unbounded_channel::<String>();
        let (event_tx, events) = mpsc::unbounded_channel::<SessionEvent>();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (finished_tx, finished_rx) = oneshot::channel::<()>();
        let open = Arc::new(AtomicBool::new(true));
        let listening = Arc::new(AtomicBool::new(true));

        match (ClientMessage::Greetings { name: names }).to_wire() {
            Ok(text) => {
                let _ = outbound.send(text);
            }
            Err(e) => error!("Failed to encode greeting: {}", e),
        }

        tokio::spawn(transport_loop(
            transport,
            outbound_rx,
            event_tx,
            shutdown_rx,
            finished_tx,
            Arc::clone(&open),
            Arc::clone(&listening),
        ));

        Self {
            outbound,
            events,
            open,
            listening,
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            finished_rx: Mutex::new(Some(finished_rx)),
            closing: Mutex::new(None),
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && self.listening.load(Ordering::Acquire)
    }

    pub fn send(&self, message: &ClientMessage) {
        if !self.is_open() {
            debug!("Dropping {:?}: connection not open", message);
            return;
        }
        match message.to_wire() {
            Ok(text) => {
                if self.outbound.send(text).is_err() {
                    debug!("Transport task already gone");
                }
            }
            Err(e) => error!("Failed to encode {:?}: {}", message, e),
        }
    }

    /// Next pending inbound event without waiting.
    pub fn try_next_event(&mut self) -> Option<SessionEvent> {
        self.events.try_recv().ok()
    }

    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    /// Detaches listeners, says goodbye if still open, then closes the
    /// transport. Concurrent callers share one close.
    pub fn close(&self) -> CloseFuture {
        let mut closing = lock(&self.closing);
        if let Some(pending) = closing.as_ref() {
            return pending.clone();
        }

        let was_open = self.is_open();
        self.listening.store(false, Ordering::Release);
        if was_open {
            match ClientMessage::Disconnect.to_wire() {
                Ok(text) => {
                    let _ = self.outbound.send(text);
                }
                Err(e) => error!("Failed to encode disconnect: {}", e),
            }
        }

        let shutdown_tx = lock(&self.shutdown_tx).take();
        let finished_rx = lock(&self.finished_rx).take();
        let future = async move {
            if let Some(tx) = shutdown_tx {
                let _ = tx.send(());
            }
            if let Some(rx) = finished_rx {
                if tokio::time::timeout(CLOSE_TIMEOUT, rx).await.is_err() {
                    warn!("Transport did not close within {:?}", CLOSE_TIMEOUT);
                }
            }
        }
        .boxed()
        .shared();

        *closing = Some(future.clone());
        future
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn transport_loop(
    mut transport: impl Transport,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
    mut shutdown_rx: oneshot::Receiver<()>,
    finished_tx: oneshot::Sender<()>,
    open: Arc<AtomicBool>,
    listening: Arc<AtomicBool>,
) {
    debug!("Transport loop started");
    let emit = |event: SessionEvent| {
        if listening.load(Ordering::Acquire) {
            let _ = event_tx.send(event);
        }
    };

    loop {
        tokio::select! {
            biased;

            outgoing = outbound_rx.recv() => {
                match outgoing {
                    Some(text) => {
                        if let Err(e) = transport.send(text).await {
                            error!("Send failed: {}", e);
                            open.store(false, Ordering::Release);
                            emit(SessionEvent::Closed);
                            break;
                        }
                    }
                    None => {
                        let _ = transport.close().await;
                        open.store(false, Ordering::Release);
                        break;
                    }
                }
            }

            _ = &mut shutdown_rx => {
                // Flush whatever was queued before the close request.
                while let Ok(text) = outbound_rx.try_recv() {
                    if transport.send(text).await.is_err() {
                        break;
                    }
                }
                if let Err(e) = transport.close().await {
                    warn!("Close failed: {}", e);
                }
                open.store(false, Ordering::Release);
                break;
            }

            incoming = transport.recv() => {
                match incoming {
                    Some(Ok(text)) => emit(SessionEvent::Message(text)),
                    Some(Err(e)) => {
                        error!("Receive failed: {}", e);
                        open.store(false, Ordering::Release);
                        emit(SessionEvent::Closed);
                        break;
                    }
                    None => {
                        info!("Game connection closed by peer");
                        open.store(false, Ordering::Release);
                        emit(SessionEvent::Closed);
                        break;
                    }
                }
            }
        }
    }

    let _ = finished_tx.send(());
    debug!("Transport loop exited");
}
