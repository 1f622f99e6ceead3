//! Shared fixtures for integration tests: an in-process mock gateway
//! speaking the wire protocol over a real WebSocket, plus event-capture
//! helpers.

#![allow(dead_code)]

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::frame::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

use discord_link::{EventHandlers, GatewayEvent};

pub type ServerWs = WebSocketStream<TcpStream>;

/// An in-process gateway endpoint tests drive frame by frame.
pub struct MockGateway {
    listener: TcpListener,
    pub url: String,
}

impl MockGateway {
    pub async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind mock gateway");
        let url = format!("ws://{}", listener.local_addr().unwrap());
        MockGateway { listener, url }
    }

    /// Accept the next client connection and complete the WebSocket upgrade.
    pub async fn accept(&self) -> ServerWs {
        let (stream, _) = self.listener.accept().await.expect("accept failed");
        accept_async(stream).await.expect("websocket upgrade failed")
    }

    /// Accept with a deadline.
    pub async fn accept_within(&self, timeout: Duration) -> ServerWs {
        tokio::time::timeout(timeout, self.accept())
            .await
            .expect("no connection within deadline")
    }

    /// Assert that no client connects within `timeout`.
    pub async fn expect_no_connection(&self, timeout: Duration) {
        let result = tokio::time::timeout(timeout, self.listener.accept()).await;
        assert!(result.is_err(), "unexpected reconnection attempt");
    }
}

pub async fn send_json(ws: &mut ServerWs, value: &Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .expect("mock gateway send failed");
}

/// Read the next JSON text frame, transparently answering pings.
pub async fn recv_json(ws: &mut ServerWs) -> Value {
    loop {
        let frame = ws
            .next()
            .await
            .expect("client closed the stream")
            .expect("websocket error");
        match frame {
            Message::Text(text) => {
                return serde_json::from_str(text.as_str()).expect("client sent invalid JSON")
            }
            Message::Ping(payload) => {
                let _ = ws.send(Message::Pong(payload)).await;
            }
            Message::Close(_) => panic!("client closed while a frame was expected"),
            _ => {}
        }
    }
}

pub async fn recv_json_within(ws: &mut ServerWs, timeout: Duration) -> Value {
    tokio::time::timeout(timeout, recv_json(ws))
        .await
        .expect("no frame within deadline")
}

/// Wait for the client to close (or the stream to end); panics on a
/// further data frame.
pub async fn expect_close(ws: &mut ServerWs, timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        match tokio::time::timeout(remaining, ws.next()).await {
            Ok(Some(Ok(Message::Close(_)))) | Ok(None) => return,
            Ok(Some(Ok(Message::Ping(payload)))) => {
                let _ = ws.send(Message::Pong(payload)).await;
            }
            Ok(Some(Ok(other))) => panic!("expected close, got {:?}", other),
            Ok(Some(Err(_))) => return,
            Err(_) => panic!("client did not close within deadline"),
        }
    }
}

pub async fn send_hello(ws: &mut ServerWs, interval_ms: u64) {
    send_json(ws, &json!({"op": 10, "d": {"heartbeat_interval": interval_ms}})).await;
}

pub async fn send_dispatch(ws: &mut ServerWs, event: &str, seq: u64, data: Value) {
    send_json(ws, &json!({"op": 0, "t": event, "s": seq, "d": data})).await;
}

pub async fn send_ready(ws: &mut ServerWs, session_id: &str, seq: u64) {
    send_dispatch(
        ws,
        "READY",
        seq,
        json!({
            "session_id": session_id,
            "user": {"id": "99", "username": "test-bot", "bot": true}
        }),
    )
    .await;
}

pub async fn send_heartbeat_ack(ws: &mut ServerWs) {
    send_json(ws, &json!({"op": 11, "d": null})).await;
}

/// Close the server side with a gateway close code.
pub async fn close_with_code(ws: &mut ServerWs, code: u16, reason: &str) {
    let frame = CloseFrame {
        code: WsCloseCode::from(code),
        reason: reason.to_string().into(),
    };
    let _ = ws.send(Message::Close(Some(frame))).await;
    // Drain until the close handshake completes.
    while let Some(Ok(frame)) = ws.next().await {
        if matches!(frame, Message::Close(_)) {
            break;
        }
    }
}

/// Expect an identify frame and return its payload.
pub async fn expect_identify(ws: &mut ServerWs, timeout: Duration) -> Value {
    let frame = recv_json_within(ws, timeout).await;
    assert_eq!(frame["op"], 2, "expected identify, got {}", frame);
    frame
}

/// Expect a resume frame and return its payload.
pub async fn expect_resume(ws: &mut ServerWs, timeout: Duration) -> Value {
    let frame = recv_json_within(ws, timeout).await;
    assert_eq!(frame["op"], 6, "expected resume, got {}", frame);
    frame
}

/// Expect a heartbeat frame and return the sequence it carries.
pub async fn expect_heartbeat(ws: &mut ServerWs, timeout: Duration) -> Value {
    let frame = recv_json_within(ws, timeout).await;
    assert_eq!(frame["op"], 1, "expected heartbeat, got {}", frame);
    frame["d"].clone()
}

/// Event handlers that forward every consumer event into a channel.
pub fn capturing_handlers() -> (EventHandlers, mpsc::UnboundedReceiver<GatewayEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handlers = EventHandlers::new().on_event(move |event| {
        let _ = tx.send(event);
    });
    (handlers, rx)
}

/// Wait for the next captured event matching `predicate`.
pub async fn wait_for_event(
    rx: &mut mpsc::UnboundedReceiver<GatewayEvent>,
    timeout: Duration,
    predicate: impl Fn(&GatewayEvent) -> bool,
) -> GatewayEvent {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        match tokio::time::timeout(remaining, rx.recv()).await {
            Ok(Some(event)) if predicate(&event) => return event,
            Ok(Some(_)) => continue,
            Ok(None) => panic!("event channel closed while waiting"),
            Err(_) => panic!("expected event did not arrive within deadline"),
        }
    }
}

/// Poll `condition` until it holds or the deadline passes.
pub async fn wait_until(timeout: Duration, condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within {:?}", timeout);
}
