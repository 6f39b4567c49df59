//! End-to-end tests of generation, history and review over HTTP.
//!
//! Each test serves the real router on an ephemeral port, backed by fake
//! generation services, and drives it with `reqwest`.

mod common;

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use studygen_core::{
    FileStore, HistoryEntry, HistoryRecord, HistoryStore, StudyDeck, GENERATION_FAILED_MESSAGE,
};
use studygen_export::{export, ExportFormat};
use tokio::sync::Notify;

use common::{
    fresh_data_dir, memory_state, spawn_server, state_with, ScriptedText, FAILING_TEXT, ICON_DATA,
};

async fn post(client: &Client, url: String, body: Value) -> (StatusCode, Value) {
    let response = client.post(url).json(&body).send().await.expect("Request failed");
    let status = response.status();
    let body = response.json().await.unwrap_or(Value::Null);
    (status, body)
}

async fn get(client: &Client, url: String) -> (StatusCode, Value) {
    let response = client.get(url).send().await.expect("Request failed");
    let status = response.status();
    let body = response.json().await.unwrap_or(Value::Null);
    (status, body)
}

// ============================================================================
// Generation
// ============================================================================

#[tokio::test]
async fn test_text_to_flashcards_end_to_end() {
    let (addr, _handle) = spawn_server(memory_state()).await;
    let client = Client::new();

    let response = client
        .post(format!("http://{addr}/api/generate"))
        .json(&json!({"text": "Photosynthesis converts light to energy", "mode": "flashcards"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let record: HistoryRecord = response.json().await.unwrap();

    let StudyDeck::Flashcards(cards) = &record.deck else {
        panic!("Expected flashcards, got {:?}", record.deck);
    };
    assert_eq!(cards.len(), 2);
    assert_eq!(cards[0].question, "What does photosynthesis convert?");
    assert!(cards.iter().all(|card| card.icon.is_none()));
    assert_eq!(record.input_summary, "Photosynthesis converts light to energy");

    let entries: Vec<HistoryEntry> = client
        .get(format!("http://{addr}/api/history"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, record.id);
    assert_eq!(entries[0].items, 2);
    assert_eq!(entries[0].label, "Photosynthesis converts light to energy");

    let (status, session) = get(&client, format!("http://{addr}/api/session")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["loading"], false);
    assert_eq!(session["error"], Value::Null);
    assert_eq!(session["flashcards"].as_array().unwrap().len(), 2);
    assert_eq!(session["flashcardReview"]["currentIndex"], 0);
}

#[tokio::test]
async fn test_mcq_generation_with_icons() {
    let (addr, _handle) = spawn_server(memory_state()).await;
    let client = Client::new();

    let (status, record) = post(
        &client,
        format!("http://{addr}/api/generate"),
        json!({"text": "basic arithmetic", "mode": "mcq", "generateIcons": true}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["deck"]["mode"], "mcq");

    let items = record["deck"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    let expected_icon = format!("data:image/jpeg;base64,{ICON_DATA}");
    for item in items {
        assert_eq!(item["icon"], expected_icon.as_str());
    }
}

#[tokio::test]
async fn test_blank_text_is_rejected_without_history() {
    let (addr, _handle) = spawn_server(memory_state()).await;
    let client = Client::new();

    let (status, body) = post(
        &client,
        format!("http://{addr}/api/generate"),
        json!({"text": "   ", "mode": "flashcards"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!body["error"].as_str().unwrap().is_empty());

    let (_, history) = get(&client, format!("http://{addr}/api/history")).await;
    assert_eq!(history, json!([]));

    let (_, session) = get(&client, format!("http://{addr}/api/session")).await;
    assert_eq!(session["loading"], false);
    assert_eq!(session["error"], body["error"]);
}

#[tokio::test]
async fn test_service_failure_shows_generic_message() {
    let (addr, _handle) = spawn_server(memory_state()).await;
    let client = Client::new();

    let (status, body) = post(
        &client,
        format!("http://{addr}/api/generate"),
        json!({"text": FAILING_TEXT}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], GENERATION_FAILED_MESSAGE);

    let (_, history) = get(&client, format!("http://{addr}/api/history")).await;
    assert_eq!(history, json!([]));
}

#[tokio::test]
async fn test_second_generation_while_loading_conflicts() {
    let gate = Arc::new(Notify::new());
    let state = state_with(
        Arc::new(studygen_core::MemoryStore::new()),
        ScriptedText::gated(Arc::clone(&gate)),
    );
    let (addr, _handle) = spawn_server(state).await;
    let client = Client::new();

    let first = tokio::spawn({
        let client = client.clone();
        async move {
            post(
                &client,
                format!("http://{addr}/api/generate"),
                json!({"text": "cells"}),
            )
            .await
        }
    });

    let mut loading = false;
    for _ in 0..100 {
        let (_, session) = get(&client, format!("http://{addr}/api/session")).await;
        if session["loading"] == true {
            loading = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(loading, "First generation never started");

    let (status, _) = post(
        &client,
        format!("http://{addr}/api/generate"),
        json!({"text": "more cells"}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    gate.notify_one();
    let (status, _) = first.await.unwrap();
    assert_eq!(status, StatusCode::OK);

    let (_, history) = get(&client, format!("http://{addr}/api/history")).await;
    assert_eq!(history.as_array().unwrap().len(), 1);
}

// ============================================================================
// Review
// ============================================================================

#[tokio::test]
async fn test_flashcard_review_over_http() {
    let (addr, _handle) = spawn_server(memory_state()).await;
    let client = Client::new();
    post(
        &client,
        format!("http://{addr}/api/generate"),
        json!({"text": "Photosynthesis", "mode": "flashcards"}),
    )
    .await;

    let (_, snapshot) = post(&client, format!("http://{addr}/api/flashcards/flip"), json!({})).await;
    assert_eq!(snapshot["flashcardReview"]["flipped"], true);

    let (status, snapshot) = post(
        &client,
        format!("http://{addr}/api/flashcards/navigate"),
        json!({"direction": 1}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["flashcardReview"]["currentIndex"], 1);
    assert_eq!(snapshot["flashcardReview"]["flipped"], false);

    let (_, snapshot) = post(
        &client,
        format!("http://{addr}/api/flashcards/navigate"),
        json!({"direction": 1}),
    )
    .await;
    assert_eq!(snapshot["flashcardReview"]["currentIndex"], 1);

    let (status, _) = post(
        &client,
        format!("http://{addr}/api/flashcards/navigate"),
        json!({"direction": 0}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_mcq_quiz_over_http() {
    let (addr, _handle) = spawn_server(memory_state()).await;
    let client = Client::new();
    post(
        &client,
        format!("http://{addr}/api/generate"),
        json!({"text": "arithmetic", "mode": "mcq"}),
    )
    .await;

    let select = format!("http://{addr}/api/mcq/select");
    let next = format!("http://{addr}/api/mcq/next");

    let (_, snapshot) = post(&client, select.clone(), json!({"option": "4"})).await;
    assert_eq!(snapshot["mcqPhase"], json!({"phase": "answered", "index": 0}));
    assert_eq!(snapshot["mcqReview"]["score"], 1);

    let (_, snapshot) = post(&client, select.clone(), json!({"option": "3"})).await;
    assert_eq!(snapshot["mcqReview"]["selected"], "4");
    assert_eq!(snapshot["mcqReview"]["score"], 1);

    let (_, snapshot) = post(&client, next.clone(), json!({})).await;
    assert_eq!(snapshot["mcqPhase"], json!({"phase": "answering", "index": 1}));

    post(&client, select, json!({"option": "7"})).await;
    let (_, snapshot) = post(&client, next, json!({})).await;
    assert_eq!(snapshot["mcqPhase"], json!({"phase": "finished"}));
    assert_eq!(snapshot["mcqReview"]["score"], 1);

    let (_, snapshot) = post(&client, format!("http://{addr}/api/mcq/restart"), json!({})).await;
    assert_eq!(snapshot["mcqPhase"], json!({"phase": "answering", "index": 0}));
    assert_eq!(snapshot["mcqReview"]["score"], 0);
}

// ============================================================================
// Persistence
// ============================================================================

#[tokio::test]
async fn test_history_and_theme_survive_restart() {
    let dir = fresh_data_dir("restart");
    let client = Client::new();

    let record_id = {
        let storage = Arc::new(FileStore::new(&dir));
        let (addr, handle) = spawn_server(state_with(storage, ScriptedText::default())).await;

        let (status, record) = post(
            &client,
            format!("http://{addr}/api/generate"),
            json!({"text": "Photosynthesis converts light to energy"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let response = client
            .put(format!("http://{addr}/api/theme"))
            .json(&json!({"theme": "ocean"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        handle.abort();
        record["id"].as_i64().unwrap()
    };

    let storage = Arc::new(FileStore::new(&dir));
    let (addr, _handle) = spawn_server(state_with(storage, ScriptedText::default())).await;

    let (_, theme) = get(&client, format!("http://{addr}/api/theme")).await;
    assert_eq!(theme["theme"], "ocean");

    let (_, history) = get(&client, format!("http://{addr}/api/history")).await;
    assert_eq!(history[0]["id"], record_id);

    let (status, snapshot) =
        post(&client, format!("http://{addr}/api/history/{record_id}/select"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["theme"], "default");
    assert_eq!(snapshot["mode"], "flashcards");
    assert_eq!(snapshot["flashcards"].as_array().unwrap().len(), 2);

    let history = HistoryStore::load(Arc::new(FileStore::new(&dir)));
    let tsv = export(history.get(record_id).unwrap(), ExportFormat::Tsv).unwrap();
    assert!(tsv.starts_with("What does photosynthesis convert?\tLight into chemical energy\n"));

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_clear_history() {
    let (addr, _handle) = spawn_server(memory_state()).await;
    let client = Client::new();

    let (_, record) =
        post(&client, format!("http://{addr}/api/generate"), json!({"text": "cells"})).await;
    let id = record["id"].as_i64().unwrap();

    let response = client
        .delete(format!("http://{addr}/api/history"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let (_, history) = get(&client, format!("http://{addr}/api/history")).await;
    assert_eq!(history, json!([]));

    let (status, _) = get(&client, format!("http://{addr}/api/history/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
