//! WebSocket transport to the kdb+ engine: connect, send one query, receive
//! one reply.
//!
//! The engine cannot echo request ids, so replies are matched to requests in
//! FIFO order. A request's completion slot is queued while the writer lock is
//! held, which keeps queue order equal to wire order even when the live
//! ticker and a manual query send at the same time.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::MaybeTlsStream;
use tokio_tungstenite::WebSocketStream;

use crate::error::TransportError;
use crate::messages::Reply;

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type Completion = oneshot::Sender<Result<Reply, TransportError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Side-effect-only notifications from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,
    /// `expected` is true when the close came from [`Client::disconnect`].
    Closed { expected: bool },
    Error(String),
}

/// Connection tuning.
#[derive(Debug, Clone, Copy)]
pub struct ClientOptions {
    pub connect_timeout: Duration,
    pub request_timeout: Option<Duration>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(3000),
            request_timeout: None,
        }
    }
}

#[derive(Debug)]
struct Link {
    state: ConnectionState,
    generation: u64,
}

struct Inner {
    url: String,
    options: ClientOptions,
    link: Mutex<Link>,
    writer: tokio::sync::Mutex<Option<WsSink>>,
    pending: Mutex<VecDeque<Completion>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    events: broadcast::Sender<TransportEvent>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl Inner {
    fn emit(&self, event: TransportEvent) {
        let _ = self.events.send(event);
    }

    /// Move to disconnected if `generation` is still the live link. Returns
    /// whether this call performed the close, so exactly one close event is
    /// emitted per connection.
    fn mark_closed(&self, generation: u64, expected: bool) -> bool {
        {
            let mut link = lock(&self.link);
            if link.generation != generation || link.state != ConnectionState::Connected {
                return false;
            }
            link.state = ConnectionState::Disconnected;
        }
        let waiting: Vec<Completion> = lock(&self.pending).drain(..).collect();
        if !waiting.is_empty() {
            tracing::debug!(count = waiting.len(), "failing requests on close");
        }
        for completion in waiting {
            let _ = completion.send(Err(TransportError::Closed));
        }
        tracing::info!(url = %self.url, expected, "connection closed");
        self.emit(TransportEvent::Closed { expected });
        true
    }
}

/// Handle to one logical engine connection. Cheap to clone; all clones share
/// the same socket.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("url", &self.inner.url)
            .field("state", &self.state())
            .finish()
    }
}

/// Connect to the engine at `url` (e.g. `ws://localhost:5555`) with default options.
pub async fn connect(url: &str) -> Result<Client, TransportError> {
    let client = Client::new(url, ClientOptions::default());
    client.connect().await?;
    Ok(client)
}

impl Client {
    pub fn new(url: &str, options: ClientOptions) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                url: url.to_string(),
                options,
                link: Mutex::new(Link {
                    state: ConnectionState::Disconnected,
                    generation: 0,
                }),
                writer: tokio::sync::Mutex::new(None),
                pending: Mutex::new(VecDeque::new()),
                reader: Mutex::new(None),
                events,
            }),
        }
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    pub fn state(&self) -> ConnectionState {
        lock(&self.inner.link).state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.inner.events.subscribe()
    }

    /// Open the socket. A no-op when already connected.
    pub async fn connect(&self) -> Result<(), TransportError> {
        let generation = {
            let mut link = lock(&self.inner.link);
            match link.state {
                ConnectionState::Connected => return Ok(()),
                ConnectionState::Connecting => {
                    return Err(TransportError::Connection(
                        "connection attempt already in progress".into(),
                    ))
                }
                ConnectionState::Disconnected => {}
            }
            link.state = ConnectionState::Connecting;
            link.generation += 1;
            link.generation
        };

        tracing::info!(url = %self.inner.url, "connecting");
        let attempt = tokio::time::timeout(
            self.inner.options.connect_timeout,
            tokio_tungstenite::connect_async(self.inner.url.as_str()),
        )
        .await;

        let ws_stream = match attempt {
            Ok(Ok((ws_stream, _))) => ws_stream,
            Ok(Err(e)) => return Err(self.fail_connect(TransportError::from(e))),
            Err(_) => return Err(self.fail_connect(TransportError::Timeout)),
        };

        let (sink, stream) = ws_stream.split();
        *self.inner.writer.lock().await = Some(sink);
        // Connected must be visible before the reader can observe a close.
        lock(&self.inner.link).state = ConnectionState::Connected;
        tracing::info!(url = %self.inner.url, "connected");
        self.inner.emit(TransportEvent::Connected);
        let reader = tokio::spawn(read_replies(Arc::clone(&self.inner), stream, generation));
        if let Some(old) = lock(&self.inner.reader).replace(reader) {
            old.abort();
        }
        Ok(())
    }

    fn fail_connect(&self, error: TransportError) -> TransportError {
        lock(&self.inner.link).state = ConnectionState::Disconnected;
        tracing::warn!(url = %self.inner.url, %error, "connect failed");
        self.inner.emit(TransportEvent::Error(error.to_string()));
        error
    }

    /// Send one query and wait for the reply matched to it.
    pub async fn send(&self, query: &str) -> Result<Reply, TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        let (tx, rx) = oneshot::channel();
        {
            let mut writer = self.inner.writer.lock().await;
            let sink = writer.as_mut().ok_or(TransportError::NotConnected)?;
            lock(&self.inner.pending).push_back(tx);
            tracing::debug!(query, "sending request");
            if let Err(e) = sink.send(Message::Text(query.to_string())).await {
                lock(&self.inner.pending).pop_back();
                return Err(TransportError::Send(e.to_string()));
            }
        }

        let reply = match self.inner.options.request_timeout {
            Some(limit) => tokio::time::timeout(limit, rx)
                .await
                .map_err(|_| TransportError::Timeout)?,
            None => rx.await,
        };
        reply.map_err(|_| TransportError::Closed)?
    }

    /// Close the socket. Safe to call repeatedly; only the first call that
    /// finds a live connection emits a close event.
    pub async fn disconnect(&self) {
        let generation = lock(&self.inner.link).generation;
        // Mark first so the peer's close reply is not taken for a drop.
        self.inner.mark_closed(generation, true);
        let sink = self.inner.writer.lock().await.take();
        if let Some(mut sink) = sink {
            let _ = sink.send(Message::Close(None)).await;
            let _ = sink.close().await;
        }
        if let Some(reader) = lock(&self.inner.reader).take() {
            reader.abort();
        }
    }
}

async fn read_replies(inner: Arc<Inner>, mut stream: SplitStream<WsStream>, generation: u64) {
    while let Some(item) = stream.next().await {
        let text = match item {
            Ok(Message::Text(t)) => t,
            Ok(Message::Binary(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!(error = %e, "socket error");
                inner.emit(TransportEvent::Error(e.to_string()));
                break;
            }
        };
        let waiting = lock(&inner.pending).pop_front();
        match waiting {
            Some(completion) => {
                let _ = completion.send(Ok(Reply::decode(&text)));
            }
            None => tracing::debug!("reply with no outstanding request dropped"),
        }
    }
    if inner.mark_closed(generation, false) {
        inner.writer.lock().await.take();
    }
}
