//! Fixtures shared by the integration tests: fake generation services and a
//! server bound to an ephemeral port.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use studygen_core::{
    create_router, AppState, Config, ContentPart, GeneratedImage, GenerationPipeline,
    ImageGenerator, KeyValueStore, MemoryStore, Result, ServiceErrorKind, StudyError,
    TextGenerator, TextRequest,
};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Source text that makes [`ScriptedText`] fail like an unavailable service.
pub const FAILING_TEXT: &str = "trigger a service outage";

pub const FLASHCARDS: &str = r#"[
    {"question": "What does photosynthesis convert?", "answer": "Light into chemical energy"},
    {"question": "Where does photosynthesis happen?", "answer": "In the chloroplasts"}
]"#;

pub const MCQS: &str = r#"[
    {"question": "2 + 2?", "options": ["3", "4", "5", "6"], "correctAnswer": "4"},
    {"question": "3 + 3?", "options": ["6", "7", "8", "9"], "correctAnswer": "6"}
]"#;

/// Base64 payload returned for every icon.
pub const ICON_DATA: &str = "aWNvbg==";

/// Answers text requests with canned decks, chosen by the requested schema.
///
/// With a gate, each request waits until the gate is notified.
#[derive(Default)]
pub struct ScriptedText {
    gate: Option<Arc<Notify>>,
}

impl ScriptedText {
    pub fn gated(gate: Arc<Notify>) -> Self {
        Self { gate: Some(gate) }
    }
}

#[async_trait]
impl TextGenerator for ScriptedText {
    async fn generate_text(&self, request: TextRequest) -> Result<String> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let failing = request
            .parts
            .iter()
            .any(|part| matches!(part, ContentPart::Text(text) if text == FAILING_TEXT));
        if failing {
            return Err(StudyError::service(ServiceErrorKind::Server, "503 unavailable"));
        }

        let mcq = request.response_schema.to_string().contains("correctAnswer");
        Ok(if mcq { MCQS } else { FLASHCARDS }.to_string())
    }
}

/// Returns the same small JPEG payload for every prompt.
pub struct StaticIcons;

#[async_trait]
impl ImageGenerator for StaticIcons {
    async fn generate_image(&self, _prompt: &str) -> Result<GeneratedImage> {
        Ok(GeneratedImage {
            data: ICON_DATA.to_string(),
            mime_type: "image/jpeg".to_string(),
        })
    }
}

pub fn pipeline(text: ScriptedText) -> GenerationPipeline {
    GenerationPipeline::new(Arc::new(text), Arc::new(StaticIcons))
}

pub fn memory_state() -> AppState {
    AppState::new(
        Config::default(),
        Arc::new(MemoryStore::new()),
        pipeline(ScriptedText::default()),
    )
}

pub fn state_with(storage: Arc<dyn KeyValueStore>, text: ScriptedText) -> AppState {
    AppState::new(Config::default(), storage, pipeline(text))
}

/// A fresh, empty directory under the system temp dir.
pub fn fresh_data_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("studygen-it-{}-{name}", std::process::id()));
    if dir.exists() {
        std::fs::remove_dir_all(&dir).expect("Failed to clear data dir");
    }
    dir
}

/// Serves `state` on an ephemeral port and returns its address.
pub async fn spawn_server(state: AppState) -> (SocketAddr, JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to get local addr");

    let router = create_router(state);
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });

    (addr, handle)
}
