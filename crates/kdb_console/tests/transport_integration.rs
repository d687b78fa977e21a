//! Integration tests for the WebSocket transport: connect, send, FIFO reply
//! matching and close semantics. Runs against the in-process fake engine.

mod common;

use std::time::Duration;

use common::FakeEngine;
use kdb_console::{
    connect, Client, ClientOptions, ConnectionState, Reply, TransportError, TransportEvent,
};
use serde_json::json;
use tokio::sync::broadcast;

fn closed_events(rx: &mut broadcast::Receiver<TransportEvent>) -> Vec<TransportEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if matches!(event, TransportEvent::Closed { .. }) {
            out.push(event);
        }
    }
    out
}

#[tokio::test]
async fn connect_and_send_query() {
    let engine = FakeEngine::start().await;
    let client = connect(&engine.url()).await.expect("connect should succeed");
    assert_eq!(client.state(), ConnectionState::Connected);

    let reply = client.send("1+1").await.expect("send should succeed");
    assert_eq!(reply, Reply::Json(json!(2)));
    assert_eq!(engine.received(), vec!["1+1".to_string()]);
}

#[tokio::test]
async fn undecodable_reply_is_opaque_text() {
    let engine = FakeEngine::start().await;
    let client = connect(&engine.url()).await.unwrap();

    let reply = client.send("opaque").await.unwrap();
    assert_eq!(reply, Reply::Opaque("not json at all".into()));
    assert_eq!(reply.into_value(), json!("not json at all"));
}

#[tokio::test]
async fn concurrent_sends_get_their_own_replies() {
    let engine = FakeEngine::start().await;
    let client = connect(&engine.url()).await.unwrap();

    let slow = {
        let client = client.clone();
        tokio::spawn(async move { client.send("slow").await })
    };
    // Let the slow frame reach the wire first.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let fast = client.send("til 3").await.unwrap();
    let slow = slow.await.unwrap().unwrap();

    assert_eq!(slow, Reply::Json(json!("slow")));
    assert_eq!(fast, Reply::Json(json!([0, 1, 2])));
}

#[tokio::test]
async fn many_interleaved_sends_stay_matched() {
    let engine = FakeEngine::start().await;
    let client = connect(&engine.url()).await.unwrap();

    let mut handles = Vec::new();
    for n in 1..=20usize {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            (n, client.send(&format!("til {}", n)).await)
        }));
    }
    for handle in handles {
        let (n, reply) = handle.await.unwrap();
        let expected: Vec<usize> = (0..n).collect();
        assert_eq!(reply.unwrap(), Reply::Json(json!(expected)));
    }
}

#[tokio::test]
async fn send_while_disconnected_fails_fast() {
    let client = Client::new("ws://127.0.0.1:9", ClientOptions::default());
    assert_eq!(client.send("1+1").await, Err(TransportError::NotConnected));
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn refused_connection_reports_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let client = Client::new(&format!("ws://127.0.0.1:{}", port), ClientOptions::default());
    let mut events = client.subscribe();

    let err = client.connect().await.expect_err("nothing listens on the port");
    assert!(matches!(err, TransportError::Connection(_)), "got {:?}", err);
    assert!(err.to_string().starts_with("Connection failed:"));
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(matches!(events.try_recv(), Ok(TransportEvent::Error(_))));
}

#[tokio::test]
async fn disconnect_twice_closes_once() {
    let engine = FakeEngine::start().await;
    let client = Client::new(&engine.url(), ClientOptions::default());
    let mut events = client.subscribe();
    client.connect().await.unwrap();
    assert_eq!(events.recv().await.unwrap(), TransportEvent::Connected);

    client.disconnect().await;
    client.disconnect().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(
        closed_events(&mut events),
        vec![TransportEvent::Closed { expected: true }]
    );
    assert_eq!(client.send("1+1").await, Err(TransportError::NotConnected));
}

#[tokio::test]
async fn engine_going_away_is_an_unexpected_close() {
    let engine = FakeEngine::start().await;
    let client = Client::new(&engine.url(), ClientOptions::default());
    let mut events = client.subscribe();
    client.connect().await.unwrap();

    let pending = {
        let client = client.clone();
        tokio::spawn(async move { client.send("hang").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    engine.stop();

    let outcome = tokio::time::timeout(Duration::from_secs(2), pending)
        .await
        .expect("pending request should fail when the socket drops")
        .unwrap();
    assert_eq!(outcome, Err(TransportError::Closed));
    assert_eq!(client.state(), ConnectionState::Disconnected);

    // A later manual disconnect must not add a second close.
    client.disconnect().await;
    assert_eq!(
        closed_events(&mut events),
        vec![TransportEvent::Closed { expected: false }]
    );
}

#[tokio::test]
async fn request_timeout_fails_the_request_only() {
    let engine = FakeEngine::start().await;
    let client = Client::new(
        &engine.url(),
        ClientOptions {
            connect_timeout: Duration::from_secs(2),
            request_timeout: Some(Duration::from_millis(100)),
        },
    );
    client.connect().await.unwrap();

    assert_eq!(client.send("hang").await, Err(TransportError::Timeout));
    assert!(client.is_connected());
}

#[tokio::test]
async fn reconnect_after_disconnect() {
    let engine = FakeEngine::start().await;
    let client = Client::new(&engine.url(), ClientOptions::default());
    client.connect().await.unwrap();
    client.disconnect().await;
    client.connect().await.unwrap();

    assert_eq!(client.send("1+1").await.unwrap(), Reply::Json(json!(2)));
}

/// Peer that completes the handshake and hangs up straight away.
async fn hang_up_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            if let Ok(mut ws) = tokio_tungstenite::accept_async(tcp).await {
                let _ = ws.close(None).await;
            }
        }
    });
    format!("ws://127.0.0.1:{}", port)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn immediate_peer_close_is_observed() {
    let url = hang_up_server().await;
    for _ in 0..20 {
        let client = Client::new(&url, ClientOptions::default());
        let mut events = client.subscribe();
        client.connect().await.unwrap();

        let closed = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                match events.recv().await {
                    Ok(TransportEvent::Closed { expected }) => break expected,
                    Ok(_) => continue,
                    Err(e) => panic!("event stream ended: {:?}", e),
                }
            }
        })
        .await
        .expect("an early close must still be reported");
        assert!(!closed);
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }
}
