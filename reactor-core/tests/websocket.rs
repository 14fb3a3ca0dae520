//! WebSocket transport tests against a live server on an ephemeral port.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use reactor_core::render::Fragment;
use reactor_core::store::MemoryStore;
use reactor_core::transport::{ClientMessage, Server, ServerMessage, SessionTable};
use reactor_core::{todo, ErrorKind, ServerConfig};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Harness {
    url: String,
    sessions: SessionTable,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Harness {
    async fn start() -> Self {
        let config = ServerConfig::bind("127.0.0.1", 0);
        let server = Server::bind(&config, Arc::new(todo::library()), Arc::new(MemoryStore::new()))
            .await
            .unwrap();
        let url = format!("ws://{}", server.local_addr().unwrap());
        let sessions = server.sessions();
        assert_eq!(server.active_sessions(), 0);

        let (tx, rx) = oneshot::channel();
        tokio::spawn(server.run_until(async {
            let _ = rx.await;
        }));

        Self {
            url,
            sessions,
            shutdown: Some(tx),
        }
    }

    async fn connect(&self) -> Client {
        let (ws, _) = connect_async(self.url.as_str()).await.unwrap();
        ws
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

async fn send_json(ws: &mut Client, msg: serde_json::Value) {
    ws.send(Message::Text(msg.to_string())).await.unwrap();
}

async fn recv_frame(ws: &mut Client) -> Message {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("connection closed")
            .unwrap();
        if frame.is_text() || frame.is_binary() {
            return frame;
        }
    }
}

async fn recv_json(ws: &mut Client) -> ServerMessage {
    match recv_frame(ws).await {
        Message::Text(text) => serde_json::from_str(&text).unwrap(),
        other => panic!("expected a text frame, got {other:?}"),
    }
}

#[tokio::test]
async fn join_and_event_over_json() {
    let harness = Harness::start().await;
    let mut ws = harness.connect().await;

    send_json(
        &mut ws,
        json!({"msg": "join", "type": "x-todo-list", "props": {"id": "todos", "showing": "all"}}),
    )
    .await;
    let mut doc = match recv_json(&mut ws).await {
        ServerMessage::Joined { id, markup } => {
            assert_eq!(id, "todos");
            Fragment::parse(&markup).unwrap()
        }
        other => panic!("unexpected {other:?}"),
    };

    send_json(
        &mut ws,
        json!({"msg": "event", "targetId": "todos", "name": "add", "payload": {"new_item": "Milk"}}),
    )
    .await;
    match recv_json(&mut ws).await {
        ServerMessage::Patch { component_id, patch } => {
            assert_eq!(component_id, "todos");
            patch.apply(&mut doc).unwrap();
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(doc.select("x-todo-item label")[0].text_content(), "Milk");
}

async fn join_over_json(ws: &mut Client, component_type: &str, id: &str) -> Fragment {
    send_json(ws, json!({"msg": "join", "type": component_type, "props": {"id": id}})).await;
    match recv_json(ws).await {
        ServerMessage::Joined { id: joined, markup } => {
            assert_eq!(joined, id);
            Fragment::parse(&markup).unwrap()
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn pipelined_events_are_answered_in_order() {
    let harness = Harness::start().await;
    let mut ws = harness.connect().await;

    let mut list = join_over_json(&mut ws, "x-todo-list", "todos").await;
    let mut counter = join_over_json(&mut ws, "x-todo-counter", "todos-counter").await;

    // Both events go out before any reply is read.
    for text in ["Milk", "Eggs"] {
        send_json(
            &mut ws,
            json!({"msg": "event", "targetId": "todos", "name": "add", "payload": {"new_item": text}}),
        )
        .await;
    }

    let mut order = Vec::new();
    let mut counts = Vec::new();
    for _ in 0..4 {
        match recv_json(&mut ws).await {
            ServerMessage::Patch { component_id, patch } => {
                let doc = if component_id == "todos" { &mut list } else { &mut counter };
                patch.apply(doc).unwrap();
                if component_id == "todos-counter" {
                    counts.push(counter.select("strong")[0].text_content());
                }
                order.push(component_id);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    assert_eq!(order, vec!["todos", "todos-counter", "todos", "todos-counter"]);
    assert_eq!(counts, vec!["1", "2"]);
    let labels: Vec<_> = list.select("x-todo-item label").iter().map(|l| l.text_content()).collect();
    assert_eq!(labels, vec!["Milk", "Eggs"]);
}

#[tokio::test]
async fn binary_frames_are_answered_in_messagepack() {
    let harness = Harness::start().await;
    let mut ws = harness.connect().await;

    let ping = rmp_serde::to_vec_named(&ClientMessage::Ping).unwrap();
    ws.send(Message::Binary(ping)).await.unwrap();

    match recv_frame(&mut ws).await {
        Message::Binary(bytes) => {
            let msg: ServerMessage = rmp_serde::from_slice(&bytes).unwrap();
            assert_eq!(msg, ServerMessage::Pong);
        }
        other => panic!("expected a binary frame, got {other:?}"),
    }

    // The next text frame switches back to JSON.
    send_json(&mut ws, json!({"msg": "ping"})).await;
    assert_eq!(recv_json(&mut ws).await, ServerMessage::Pong);
}

#[tokio::test]
async fn malformed_frames_and_client_errors_keep_the_connection() {
    let harness = Harness::start().await;
    let mut ws = harness.connect().await;

    ws.send(Message::Text("{not json".into())).await.unwrap();
    match recv_json(&mut ws).await {
        ServerMessage::Error { target_id, kind, .. } => {
            assert_eq!(target_id, None);
            assert_eq!(kind, ErrorKind::Protocol);
        }
        other => panic!("unexpected {other:?}"),
    }

    send_json(&mut ws, json!({"msg": "event", "targetId": "ghost", "name": "add"})).await;
    match recv_json(&mut ws).await {
        ServerMessage::Error { target_id, kind, .. } => {
            assert_eq!(target_id.as_deref(), Some("ghost"));
            assert_eq!(kind, ErrorKind::UnknownComponent);
        }
        other => panic!("unexpected {other:?}"),
    }

    send_json(&mut ws, json!({"msg": "ping"})).await;
    assert_eq!(recv_json(&mut ws).await, ServerMessage::Pong);
}

#[tokio::test]
async fn closed_connections_leave_the_session_table() {
    let harness = Harness::start().await;
    let mut ws = harness.connect().await;

    send_json(&mut ws, json!({"msg": "ping"})).await;
    assert_eq!(recv_json(&mut ws).await, ServerMessage::Pong);
    assert_eq!(harness.sessions.len(), 1);

    ws.close(None).await.unwrap();

    for _ in 0..100 {
        if harness.sessions.is_empty() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("session still registered after close");
}
