//! In-process fake kdb+ engine for the integration tests (no mocks: a real
//! WebSocket server on a free port). It strips the pointer prefix from each
//! frame and answers a small fixed vocabulary of queries.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use kdb_console::{ClientOptions, Console, ConsoleEvent, VisualSink};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::{JoinHandle, JoinSet};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

pub const RESET_REPLY: &str = r#"{"status":"ok","message":"KDB+ server reset complete"}"#;

pub struct FakeEngine {
    pub port: u16,
    received: Arc<Mutex<Vec<String>>>,
    server: JoinHandle<()>,
}

impl FakeEngine {
    pub async fn start() -> Self {
        Self::start_on(0).await
    }

    /// Listen on a specific port (0 picks a free one).
    pub async fn start_on(port: u16) -> Self {
        let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let received = Arc::new(Mutex::new(Vec::new()));
        let log = received.clone();
        let server = tokio::spawn(async move {
            // Dropping the set (when the server task is aborted) drops every
            // open socket, which is how tests simulate the engine going away.
            let mut connections = JoinSet::new();
            while let Ok((tcp, _)) = listener.accept().await {
                let log = log.clone();
                connections.spawn(async move {
                    let Ok(ws) = accept_async(tcp).await else {
                        return;
                    };
                    let (mut write, mut read) = ws.split();
                    let mut counter = 0u64;
                    while let Some(Ok(msg)) = read.next().await {
                        let text = match msg {
                            Message::Text(text) => text,
                            Message::Close(_) => break,
                            _ => continue,
                        };
                        log.lock().unwrap().push(text.clone());
                        if let Some(reply) = answer(&text, &mut counter).await {
                            if write.send(Message::Text(reply)).await.is_err() {
                                break;
                            }
                        }
                    }
                });
            }
        });
        Self {
            port,
            received,
            server,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://127.0.0.1:{}", self.port)
    }

    /// Raw frames received so far, in arrival order.
    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }

    /// Drop the listener and every open connection.
    pub fn stop(&self) {
        self.server.abort();
    }
}

impl Drop for FakeEngine {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// Split `mouseX:..; mouseY:..; query` into the coordinates and the query.
/// Frames without the prefix come back unchanged.
pub fn strip_pointer(frame: &str) -> (Option<(f64, f64)>, &str) {
    let mut parts = frame.splitn(3, "; ");
    let (Some(x), Some(y), Some(query)) = (parts.next(), parts.next(), parts.next()) else {
        return (None, frame);
    };
    match (
        x.strip_prefix("mouseX:").and_then(|v| v.parse().ok()),
        y.strip_prefix("mouseY:").and_then(|v| v.parse().ok()),
    ) {
        (Some(x), Some(y)) => (Some((x, y)), query),
        _ => (None, frame),
    }
}

async fn answer(frame: &str, counter: &mut u64) -> Option<String> {
    let (pointer, query) = strip_pointer(frame);
    let reply = match query {
        "1+1" => "2".to_string(),
        "hang" => return None,
        "slow" => {
            tokio::time::sleep(Duration::from_millis(300)).await;
            r#""slow""#.to_string()
        }
        "slowtable" => {
            tokio::time::sleep(Duration::from_millis(300)).await;
            r#"[{"a":1}]"#.to_string()
        }
        "opaque" => "not json at all".to_string(),
        "table" => r#"[{"a":1,"b":"x"},{"a":2,"b":"y"}]"#.to_string(),
        "image" => "[[0,1,2],[3,4,5]]".to_string(),
        "nulls" => "[null,null]".to_string(),
        "mouse" => {
            let (x, y) = pointer.unwrap_or((-1.0, -1.0));
            format!("[{},{}]", x, y)
        }
        "tick" => {
            *counter += 1;
            format!("[{}]", counter)
        }
        q if q.starts_with("til ") => {
            let n: usize = q[4..].trim().parse().unwrap_or(0);
            serde_json::to_string(&(0..n).collect::<Vec<_>>()).unwrap()
        }
        q if q.starts_with('\'') => serde_json::json!({
            "error": "ExecutionError",
            "msg": &q[1..],
        })
        .to_string(),
        q if q.starts_with("delete from `.") => RESET_REPLY.to_string(),
        q => serde_json::to_string(q).unwrap(),
    };
    Some(reply)
}

pub fn options() -> ClientOptions {
    ClientOptions {
        connect_timeout: Duration::from_secs(2),
        request_timeout: Some(Duration::from_secs(5)),
    }
}

/// Console plus everything the sink was handed, oldest first.
pub fn recording_console() -> (Console, Arc<Mutex<Vec<Option<Value>>>>) {
    let seen: Arc<Mutex<Vec<Option<Value>>>> = Arc::new(Mutex::new(Vec::new()));
    let slot = seen.clone();
    let sink: VisualSink = Arc::new(move |value| slot.lock().unwrap().push(value));
    let console = Console::builder().sink(sink).build();
    (console, seen)
}

/// Poll `cond` for up to two seconds.
pub async fn eventually(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    cond()
}

/// Texts of every notice currently queued on `rx`, waiting briefly for
/// stragglers.
pub async fn drain_notices(rx: &mut broadcast::Receiver<ConsoleEvent>) -> Vec<String> {
    tokio::time::sleep(Duration::from_millis(50)).await;
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let ConsoleEvent::Notice { text, .. } = event {
            out.push(text);
        }
    }
    out
}
