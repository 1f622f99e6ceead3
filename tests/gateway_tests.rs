//! End-to-end gateway behavior against an in-process mock gateway.

mod common;

use std::time::Duration;

use serde_json::json;

use discord_link::{
    ConnectionOptions, ConnectionState, DiscordClient, GatewayEvent, GatewayTimeouts, Intents,
};

use common::*;

const STEP: Duration = Duration::from_secs(3);

fn test_client(url: &str) -> DiscordClient {
    DiscordClient::builder()
        .token("test-token")
        .intents(Intents::GUILD_MESSAGES)
        .gateway_url(url)
        .timeouts(GatewayTimeouts::fast())
        .connection_options(
            ConnectionOptions::new()
                .with_reconnect_delay_ms(50)
                .with_max_reconnect_delay_ms(200)
                .with_resume_backoff_ms(10),
        )
        .build()
        .expect("client must build")
}

#[tokio::test]
async fn hello_triggers_identify_and_schedules_heartbeat() {
    let server = MockGateway::bind().await;
    let client = test_client(&server.url);

    let (gateway, mut ws) = tokio::join!(client.connect(), server.accept());
    let gateway = gateway.expect("connect must succeed");

    // Hello carries the interval; the client must answer with exactly one
    // identify frame carrying token and intents.
    send_hello(&mut ws, 200).await;
    let identify = expect_identify(&mut ws, STEP).await;
    assert_eq!(identify["d"]["token"], "test-token");
    assert_eq!(identify["d"]["intents"], 512);
    assert!(identify["d"]["properties"]["os"].is_string());

    send_ready(&mut ws, "sess-1", 1).await;
    wait_until(STEP, || gateway.is_connected()).await;
    assert_eq!(gateway.state(), ConnectionState::Connected);

    // The heartbeat scheduled from the hello interval must echo the
    // then-current sequence number, not a constant.
    let seq = expect_heartbeat(&mut ws, STEP).await;
    assert_eq!(seq, 1);
    send_heartbeat_ack(&mut ws).await;

    // Advance the sequence; the next heartbeat must reflect it.
    send_dispatch(&mut ws, "MESSAGE_CREATE", 7, json!({"id": "m1", "channel_id": "c1"})).await;
    let seq = expect_heartbeat(&mut ws, STEP).await;
    assert_eq!(seq, 7);
    send_heartbeat_ack(&mut ws).await;

    gateway.logout().await;
}

#[tokio::test]
async fn first_heartbeat_before_any_dispatch_is_null() {
    let server = MockGateway::bind().await;
    let client = test_client(&server.url);

    let (gateway, mut ws) = tokio::join!(client.connect(), server.accept());
    let gateway = gateway.unwrap();

    send_hello(&mut ws, 100).await;
    let _ = expect_identify(&mut ws, STEP).await;

    // No dispatch yet, so the heartbeat payload must be null.
    let seq = expect_heartbeat(&mut ws, STEP).await;
    assert!(seq.is_null());

    gateway.logout().await;
}

#[tokio::test]
async fn missed_ack_forces_reconnect_with_resume() {
    let server = MockGateway::bind().await;
    let client = test_client(&server.url);

    let (gateway, mut ws) = tokio::join!(client.connect(), server.accept());
    let gateway = gateway.unwrap();

    send_hello(&mut ws, 150).await;
    let _ = expect_identify(&mut ws, STEP).await;
    send_ready(&mut ws, "sess-abc", 5).await;

    // First heartbeat arrives; we deliberately never acknowledge it. The
    // next tick must treat the missing ack as a protocol failure and force
    // exactly one disconnect followed by a reconnect.
    let _ = expect_heartbeat(&mut ws, STEP).await;

    let mut ws2 = server.accept_within(Duration::from_secs(5)).await;
    send_hello(&mut ws2, 150).await;

    // The retained session drives a resume, not a fresh identify.
    let resume = expect_resume(&mut ws2, STEP).await;
    assert_eq!(resume["d"]["session_id"], "sess-abc");
    assert_eq!(resume["d"]["seq"], 5);

    send_dispatch(&mut ws2, "RESUMED", 6, json!({})).await;
    wait_until(STEP, || gateway.is_connected()).await;

    gateway.logout().await;
}

#[tokio::test]
async fn sequence_is_preserved_across_resume() {
    let server = MockGateway::bind().await;
    let client = test_client(&server.url);

    let (gateway, mut ws) = tokio::join!(client.connect(), server.accept());
    let gateway = gateway.unwrap();

    send_hello(&mut ws, 5000).await;
    let _ = expect_identify(&mut ws, STEP).await;
    send_ready(&mut ws, "sess-seq", 10).await;
    send_dispatch(&mut ws, "MESSAGE_CREATE", 42, json!({"id": "m", "channel_id": "c"})).await;
    wait_until(STEP, || gateway.is_connected()).await;

    // A reconnect-request record forces a reconnect; the resume must carry
    // the highest sequence seen so far.
    send_json(&mut ws, &json!({"op": 7, "d": null})).await;

    let mut ws2 = server.accept_within(Duration::from_secs(5)).await;
    send_hello(&mut ws2, 5000).await;
    let resume = expect_resume(&mut ws2, STEP).await;
    assert_eq!(resume["d"]["session_id"], "sess-seq");
    assert_eq!(resume["d"]["seq"], 42);

    gateway.logout().await;
}

#[tokio::test]
async fn fatal_close_code_is_terminal() {
    let server = MockGateway::bind().await;
    let (handlers, mut events) = capturing_handlers();
    let client = DiscordClient::builder()
        .token("test-token")
        .gateway_url(&server.url)
        .timeouts(GatewayTimeouts::fast())
        .connection_options(ConnectionOptions::new().with_reconnect_delay_ms(50))
        .event_handlers(handlers)
        .build()
        .unwrap();

    let (gateway, mut ws) = tokio::join!(client.connect(), server.accept());
    let gateway = gateway.unwrap();

    send_hello(&mut ws, 5000).await;
    let _ = expect_identify(&mut ws, STEP).await;
    send_ready(&mut ws, "sess-fatal", 1).await;
    wait_until(STEP, || gateway.is_connected()).await;

    // Disallowed intents: terminal error state, session cleared, zero
    // subsequent reconnect attempts.
    close_with_code(&mut ws, 4014, "disallowed intents").await;

    let event = wait_for_event(&mut events, STEP, |e| matches!(e, GatewayEvent::Fatal(_))).await;
    match event {
        GatewayEvent::Fatal(code) => assert!(code.is_fatal()),
        other => panic!("unexpected event {:?}", other),
    }

    wait_until(STEP, || gateway.state() == ConnectionState::Error).await;
    server.expect_no_connection(Duration::from_millis(500)).await;
}

#[tokio::test]
async fn reconnectable_close_code_yields_one_reconnect() {
    let server = MockGateway::bind().await;
    let client = test_client(&server.url);

    let (gateway, mut ws) = tokio::join!(client.connect(), server.accept());
    let gateway = gateway.unwrap();

    send_hello(&mut ws, 5000).await;
    let _ = expect_identify(&mut ws, STEP).await;
    send_ready(&mut ws, "sess-r", 3).await;
    wait_until(STEP, || gateway.is_connected()).await;

    // 4000 "unknown error" is reconnectable.
    close_with_code(&mut ws, 4000, "unknown error").await;

    let mut ws2 = server.accept_within(Duration::from_secs(5)).await;
    send_hello(&mut ws2, 5000).await;
    let resume = expect_resume(&mut ws2, STEP).await;
    assert_eq!(resume["d"]["session_id"], "sess-r");

    gateway.logout().await;
}

#[tokio::test]
async fn unknown_dispatch_events_are_forwarded() {
    let server = MockGateway::bind().await;
    let (handlers, mut events) = capturing_handlers();
    let client = DiscordClient::builder()
        .token("test-token")
        .gateway_url(&server.url)
        .timeouts(GatewayTimeouts::fast())
        .event_handlers(handlers)
        .build()
        .unwrap();

    let (gateway, mut ws) = tokio::join!(client.connect(), server.accept());
    let gateway = gateway.unwrap();

    send_hello(&mut ws, 5000).await;
    let _ = expect_identify(&mut ws, STEP).await;
    send_ready(&mut ws, "sess-u", 1).await;

    send_dispatch(&mut ws, "SOMETHING_BRAND_NEW", 2, json!({"payload": true})).await;

    let event = wait_for_event(&mut events, STEP, |e| {
        matches!(e, GatewayEvent::Unknown { .. })
    })
    .await;
    match event {
        GatewayEvent::Unknown { name, data } => {
            assert_eq!(name, "SOMETHING_BRAND_NEW");
            assert_eq!(data["payload"], true);
        }
        other => panic!("unexpected event {:?}", other),
    }

    gateway.logout().await;
}

#[tokio::test]
async fn oversized_payload_surfaces_decode_error_and_connection_continues() {
    let server = MockGateway::bind().await;
    let (handlers, mut events) = capturing_handlers();
    let client = DiscordClient::builder()
        .token("test-token")
        .gateway_url(&server.url)
        .timeouts(GatewayTimeouts::fast())
        .connection_options(ConnectionOptions::new().with_max_payload_bytes(256))
        .event_handlers(handlers)
        .build()
        .unwrap();

    let (gateway, mut ws) = tokio::join!(client.connect(), server.accept());
    let gateway = gateway.unwrap();

    send_hello(&mut ws, 5000).await;
    let _ = expect_identify(&mut ws, STEP).await;
    send_ready(&mut ws, "s", 1).await;

    // Over the 256-byte ceiling: dropped with a surfaced decode error.
    let big = "x".repeat(512);
    send_dispatch(&mut ws, "MESSAGE_CREATE", 2, json!({"id": "m", "channel_id": "c", "content": big})).await;
    wait_for_event(&mut events, STEP, |e| matches!(e, GatewayEvent::DecodeError { .. })).await;

    // Processing continues: a small event afterwards still arrives.
    send_dispatch(&mut ws, "PING_CHECK", 3, json!({})).await;
    wait_for_event(&mut events, STEP, |e| {
        matches!(e, GatewayEvent::Unknown { name, .. } if name == "PING_CHECK")
    })
    .await;

    gateway.logout().await;
}

#[tokio::test]
async fn malformed_payload_surfaces_decode_error() {
    let server = MockGateway::bind().await;
    let (handlers, mut events) = capturing_handlers();
    let client = DiscordClient::builder()
        .token("test-token")
        .gateway_url(&server.url)
        .timeouts(GatewayTimeouts::fast())
        .event_handlers(handlers)
        .build()
        .unwrap();

    let (gateway, mut ws) = tokio::join!(client.connect(), server.accept());
    let gateway = gateway.unwrap();

    send_hello(&mut ws, 5000).await;
    let _ = expect_identify(&mut ws, STEP).await;

    use futures_util::SinkExt;
    use tokio_tungstenite::tungstenite::protocol::Message;
    ws.send(Message::Text("this is not json".into())).await.unwrap();

    wait_for_event(&mut events, STEP, |e| matches!(e, GatewayEvent::DecodeError { .. })).await;

    gateway.logout().await;
}

#[tokio::test]
async fn non_resumable_invalid_session_falls_back_to_identify() {
    let server = MockGateway::bind().await;
    let client = test_client(&server.url);

    let (gateway, mut ws) = tokio::join!(client.connect(), server.accept());
    let gateway = gateway.unwrap();

    send_hello(&mut ws, 5000).await;
    let _ = expect_identify(&mut ws, STEP).await;
    send_ready(&mut ws, "sess-inv", 4).await;
    wait_until(STEP, || gateway.is_connected()).await;

    // Non-resumable invalidation clears the session; the client must fall
    // back to a fresh identify after its backoff.
    send_json(&mut ws, &json!({"op": 9, "d": false})).await;
    let identify = expect_identify(&mut ws, STEP).await;
    assert_eq!(identify["d"]["token"], "test-token");

    gateway.logout().await;
}

#[tokio::test]
async fn resumable_invalid_session_retries_resume() {
    let server = MockGateway::bind().await;
    let client = test_client(&server.url);

    let (gateway, mut ws) = tokio::join!(client.connect(), server.accept());
    let gateway = gateway.unwrap();

    send_hello(&mut ws, 5000).await;
    let _ = expect_identify(&mut ws, STEP).await;
    send_ready(&mut ws, "sess-keep", 8).await;
    wait_until(STEP, || gateway.is_connected()).await;

    send_json(&mut ws, &json!({"op": 9, "d": true})).await;
    let resume = expect_resume(&mut ws, STEP).await;
    assert_eq!(resume["d"]["session_id"], "sess-keep");
    assert_eq!(resume["d"]["seq"], 8);

    gateway.logout().await;
}

#[tokio::test]
async fn out_of_band_heartbeat_request_is_answered_immediately() {
    let server = MockGateway::bind().await;
    let client = test_client(&server.url);

    let (gateway, mut ws) = tokio::join!(client.connect(), server.accept());
    let gateway = gateway.unwrap();

    // Long interval so the periodic timer cannot be the sender.
    send_hello(&mut ws, 60_000).await;
    let _ = expect_identify(&mut ws, STEP).await;
    send_ready(&mut ws, "s", 21).await;
    wait_until(STEP, || gateway.is_connected()).await;

    send_json(&mut ws, &json!({"op": 1, "d": null})).await;
    let seq = expect_heartbeat(&mut ws, STEP).await;
    assert_eq!(seq, 21);

    gateway.logout().await;
}

#[tokio::test]
async fn logout_suppresses_reconnect() {
    let server = MockGateway::bind().await;
    let client = test_client(&server.url);

    let (gateway, mut ws) = tokio::join!(client.connect(), server.accept());
    let gateway = gateway.unwrap();

    send_hello(&mut ws, 5000).await;
    let _ = expect_identify(&mut ws, STEP).await;
    send_ready(&mut ws, "sess-lo", 1).await;
    wait_until(STEP, || gateway.is_connected()).await;

    gateway.logout().await;
    assert_eq!(gateway.state(), ConnectionState::Disconnected);

    expect_close(&mut ws, STEP).await;
    server.expect_no_connection(Duration::from_millis(400)).await;
}

#[tokio::test]
async fn unknown_opcode_is_ignored() {
    let server = MockGateway::bind().await;
    let client = test_client(&server.url);

    let (gateway, mut ws) = tokio::join!(client.connect(), server.accept());
    let gateway = gateway.unwrap();

    send_hello(&mut ws, 5000).await;
    let _ = expect_identify(&mut ws, STEP).await;
    send_ready(&mut ws, "sess-op", 1).await;
    wait_until(STEP, || gateway.is_connected()).await;

    // Never treated as fatal: the session stays up and later frames work.
    send_json(&mut ws, &json!({"op": 42, "d": {"whatever": 1}})).await;
    send_json(&mut ws, &json!({"op": 1, "d": null})).await;
    let seq = expect_heartbeat(&mut ws, STEP).await;
    assert_eq!(seq, 1);

    gateway.logout().await;
}
