//! Integration tests for the WebSocket event stream.
//!
//! Clients connect to `/ws` on a real server and observe the events that
//! HTTP actions broadcast.

mod common;

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use reqwest::Client;
use serde_json::{json, Value};
use studygen_core::GENERATION_FAILED_MESSAGE;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use common::{memory_state, spawn_server, FAILING_TEXT};

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn connect_client(addr: std::net::SocketAddr) -> WsClient {
    let (ws_stream, _) = connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("Failed to connect to WebSocket");
    ws_stream
}

/// Receives the next event as JSON, answering pings along the way.
async fn receive_event(client: &mut WsClient) -> Value {
    loop {
        let msg = timeout(Duration::from_secs(5), client.next())
            .await
            .expect("Timeout waiting for message")
            .expect("Stream ended")
            .expect("WebSocket error");

        match msg {
            Message::Text(text) => {
                return serde_json::from_str(&text).expect("Failed to parse event");
            }
            Message::Ping(data) => {
                client
                    .send(Message::Pong(data))
                    .await
                    .expect("Failed to send pong");
            }
            Message::Pong(_) => {}
            other => panic!("Expected text message, got: {other:?}"),
        }
    }
}

/// Connects and consumes the initial `connected` event.
async fn connect_ready(addr: std::net::SocketAddr) -> (WsClient, Value) {
    let mut client = connect_client(addr).await;
    let event = receive_event(&mut client).await;
    assert_eq!(event["event"], "connected");
    (client, event)
}

async fn generate(addr: std::net::SocketAddr, body: Value) -> reqwest::StatusCode {
    Client::new()
        .post(format!("http://{addr}/api/generate"))
        .json(&body)
        .send()
        .await
        .expect("Request failed")
        .status()
}

// ============================================================================
// Connection
// ============================================================================

#[tokio::test]
async fn test_connected_event_carries_session() {
    let (addr, _handle) = spawn_server(memory_state()).await;

    let (_client, event) = connect_ready(addr).await;
    let session = &event["payload"]["session"];
    assert_eq!(session["theme"], "default");
    assert_eq!(session["mode"], "flashcards");
    assert_eq!(session["loading"], false);
    assert_eq!(session["flashcards"], json!([]));
}

#[tokio::test]
async fn test_late_client_sees_generated_items() {
    let (addr, _handle) = spawn_server(memory_state()).await;
    assert_eq!(
        generate(addr, json!({"text": "Photosynthesis", "mode": "flashcards"})).await,
        reqwest::StatusCode::OK
    );

    let (_client, event) = connect_ready(addr).await;
    let flashcards = event["payload"]["session"]["flashcards"].as_array().unwrap();
    assert_eq!(flashcards.len(), 2);
}

// ============================================================================
// Broadcasts
// ============================================================================

#[tokio::test]
async fn test_generation_events_in_order() {
    let (addr, _handle) = spawn_server(memory_state()).await;
    let (mut client, _) = connect_ready(addr).await;

    let status = generate(
        addr,
        json!({"text": "arithmetic", "mode": "mcq", "generateIcons": true}),
    )
    .await;
    assert_eq!(status, reqwest::StatusCode::OK);

    let started = receive_event(&mut client).await;
    assert_eq!(started["event"], "generation_started");
    assert_eq!(started["payload"]["mode"], "mcq");
    assert_eq!(started["payload"]["inputKind"], "text");
    assert_eq!(started["payload"]["generateIcons"], true);

    let completed = receive_event(&mut client).await;
    assert_eq!(completed["event"], "generation_completed");
    assert_eq!(completed["payload"]["mode"], "mcq");
    assert_eq!(completed["payload"]["items"], 2);
    assert!(completed["payload"]["recordId"].is_i64());
}

#[tokio::test]
async fn test_failed_generation_broadcasts_generic_message() {
    let (addr, _handle) = spawn_server(memory_state()).await;
    let (mut client, _) = connect_ready(addr).await;

    generate(addr, json!({"text": FAILING_TEXT})).await;

    let started = receive_event(&mut client).await;
    assert_eq!(started["event"], "generation_started");
    let failed = receive_event(&mut client).await;
    assert_eq!(failed["event"], "generation_failed");
    assert_eq!(failed["payload"]["message"], GENERATION_FAILED_MESSAGE);
}

#[tokio::test]
async fn test_theme_and_clear_reach_every_client() {
    let (addr, _handle) = spawn_server(memory_state()).await;
    let (mut first, _) = connect_ready(addr).await;
    let (mut second, _) = connect_ready(addr).await;

    let http = Client::new();
    http.put(format!("http://{addr}/api/theme"))
        .json(&json!({"theme": "sunset"}))
        .send()
        .await
        .unwrap();
    http.delete(format!("http://{addr}/api/history"))
        .send()
        .await
        .unwrap();

    for client in [&mut first, &mut second] {
        let theme = receive_event(client).await;
        assert_eq!(theme, json!({"event": "theme_changed", "payload": {"theme": "sunset"}}));
        let cleared = receive_event(client).await;
        assert_eq!(cleared["event"], "history_cleared");
    }
}

#[tokio::test]
async fn test_server_continues_after_client_disconnect() {
    let (addr, _handle) = spawn_server(memory_state()).await;

    let (mut leaving, _) = connect_ready(addr).await;
    leaving.close(None).await.unwrap();
    drop(leaving);

    let (mut staying, _) = connect_ready(addr).await;
    generate(addr, json!({"text": "cells"})).await;

    let started = receive_event(&mut staying).await;
    assert_eq!(started["event"], "generation_started");
}
