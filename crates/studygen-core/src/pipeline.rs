//! The generation pipeline.
//!
//! Turns one [`GenerationRequest`] into a validated [`StudyDeck`] and a
//! [`HistoryRecord`]. Steps run strictly in order:
//!
//! 1. validate the input
//! 2. build the request (encoding images)
//! 3. call the text generator with a response schema
//! 4. parse and validate the response
//! 5. optionally request one icon per item, all-or-nothing
//! 6. prepend a history record
//!
//! Any failure aborts the run; nothing is returned or persisted.

use std::path::PathBuf;
use std::sync::Arc;

use futures::future::try_join_all;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::encoder::{self, EncodedImage};
use crate::error::{Result, StudyError};
use crate::gemini::{ContentPart, ImageGenerator, TextGenerator, TextRequest};
use crate::history::HistoryStore;
use crate::model::{GenerationMode, HistoryRecord, InputKind, StudyDeck, Theme};

const FLASHCARD_INSTRUCTION: &str = "Create a set of study flashcards from the provided material. \
Each flashcard must have a concise 'question' and a clear, accurate 'answer'. \
Cover the most important facts and concepts. \
Respond only with a JSON array of objects shaped like {\"question\": string, \"answer\": string}.";

const MCQ_INSTRUCTION: &str = "Create a set of multiple-choice questions from the provided material. \
Each question must have exactly 4 unique 'options' and one 'correctAnswer' that is exactly equal to one of the options. \
Respond only with a JSON array of objects shaped like \
{\"question\": string, \"options\": [string, string, string, string], \"correctAnswer\": string}.";

/// Returns the fixed instruction for `mode`.
#[must_use]
pub const fn instruction(mode: GenerationMode) -> &'static str {
    match mode {
        GenerationMode::Flashcards => FLASHCARD_INSTRUCTION,
        GenerationMode::Mcq => MCQ_INSTRUCTION,
    }
}

/// Returns the response schema the text generator must follow for `mode`.
#[must_use]
pub fn response_schema(mode: GenerationMode) -> Value {
    match mode {
        GenerationMode::Flashcards => json!({
            "type": "ARRAY",
            "items": {
                "type": "OBJECT",
                "properties": {
                    "question": { "type": "STRING" },
                    "answer": { "type": "STRING" }
                },
                "required": ["question", "answer"]
            }
        }),
        GenerationMode::Mcq => json!({
            "type": "ARRAY",
            "items": {
                "type": "OBJECT",
                "properties": {
                    "question": { "type": "STRING" },
                    "options": { "type": "ARRAY", "items": { "type": "STRING" } },
                    "correctAnswer": { "type": "STRING" }
                },
                "required": ["question", "options", "correctAnswer"]
            }
        }),
    }
}

/// Builds the icon prompt for one item.
#[must_use]
pub fn icon_prompt(question: &str) -> String {
    format!(
        "a simple, clean, minimalist vector icon representing '{question}', flat design on plain background"
    )
}

// ============================================================================
// Requests
// ============================================================================

/// Where an image input comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// A file on disk, read and encoded by the pipeline.
    Path(PathBuf),
    /// An image that is already base64-encoded.
    Encoded(EncodedImage),
}

/// The user-provided source material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationInput {
    /// Free text.
    Text(String),
    /// An image; `None` when nothing was selected.
    Image(Option<ImageSource>),
}

impl GenerationInput {
    /// Returns the input kind.
    #[must_use]
    pub const fn kind(&self) -> InputKind {
        match self {
            Self::Text(_) => InputKind::Text,
            Self::Image(_) => InputKind::Image,
        }
    }
}

/// One user request to generate study material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// The source material.
    pub input: GenerationInput,
    /// Flashcards or MCQs.
    pub mode: GenerationMode,
    /// Whether to attach a generated icon to every item.
    pub generate_icons: bool,
}

impl GenerationRequest {
    /// A request built from free text.
    #[must_use]
    pub fn text(text: impl Into<String>, mode: GenerationMode) -> Self {
        Self {
            input: GenerationInput::Text(text.into()),
            mode,
            generate_icons: false,
        }
    }

    /// A request built from an image file.
    #[must_use]
    pub fn image_file(path: impl Into<PathBuf>, mode: GenerationMode) -> Self {
        Self {
            input: GenerationInput::Image(Some(ImageSource::Path(path.into()))),
            mode,
            generate_icons: false,
        }
    }

    /// A request built from an already-encoded image.
    #[must_use]
    pub fn image(image: EncodedImage, mode: GenerationMode) -> Self {
        Self {
            input: GenerationInput::Image(Some(ImageSource::Encoded(image))),
            mode,
            generate_icons: false,
        }
    }

    /// Sets whether icons are generated.
    #[must_use]
    pub fn with_icons(mut self, generate_icons: bool) -> Self {
        self.generate_icons = generate_icons;
        self
    }
}

// ============================================================================
// GenerationPipeline
// ============================================================================

/// Runs generation requests against a text and an image generator.
#[derive(Clone)]
pub struct GenerationPipeline {
    text: Arc<dyn TextGenerator>,
    images: Arc<dyn ImageGenerator>,
}

impl std::fmt::Debug for GenerationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationPipeline").finish_non_exhaustive()
    }
}

impl GenerationPipeline {
    /// Creates a pipeline from its two generators.
    #[must_use]
    pub fn new(text: Arc<dyn TextGenerator>, images: Arc<dyn ImageGenerator>) -> Self {
        Self { text, images }
    }

    /// Runs the whole pipeline and returns the stored history record.
    ///
    /// The history lock is only taken once generation has succeeded.
    ///
    /// # Errors
    ///
    /// Returns the first pipeline error encountered. No history record is
    /// written on failure.
    pub async fn generate(
        &self,
        request: GenerationRequest,
        history: &Mutex<HistoryStore>,
        theme: Theme,
    ) -> Result<HistoryRecord> {
        let mode = request.mode;
        let input_kind = request.input.kind();
        tracing::info!(%mode, input = %input_kind, icons = request.generate_icons, "Starting generation");

        let (part, input_summary) = build_input(request.input).await?;

        let raw = self
            .text
            .generate_text(TextRequest {
                parts: vec![part, ContentPart::Text(instruction(mode).to_string())],
                response_schema: response_schema(mode),
            })
            .await?;

        let mut deck = StudyDeck::parse(mode, &raw)?;
        tracing::debug!(%mode, items = deck.len(), "Parsed generated items");

        if request.generate_icons {
            let icons = self.generate_icons(&deck).await?;
            deck = deck.with_icons(icons)?;
        }

        let mut record = HistoryRecord::new(input_kind, input_summary, deck, theme);
        record.id = history.lock().await.append(record.clone()).await;
        tracing::info!(%mode, items = record.deck.len(), record_id = record.id, "Generation complete");
        Ok(record)
    }

    /// Requests one icon per item concurrently; fails if any request fails.
    async fn generate_icons(&self, deck: &StudyDeck) -> Result<Vec<String>> {
        let prompts: Vec<String> = deck.questions().into_iter().map(icon_prompt).collect();
        tracing::debug!(items = prompts.len(), "Requesting icons");

        let requests = prompts.iter().enumerate().map(|(index, prompt)| async move {
            match self.images.generate_image(prompt).await {
                Ok(image) => Ok(image.data_uri()),
                Err(e) => {
                    tracing::warn!(index, error = %e, "Icon generation failed");
                    Err(StudyError::icon(index, e.to_string()))
                }
            }
        });
        try_join_all(requests).await
    }
}

/// Validates the input and turns it into a content part plus the summary
/// stored with the history record.
async fn build_input(input: GenerationInput) -> Result<(ContentPart, String)> {
    match input {
        GenerationInput::Text(text) => {
            if text.trim().is_empty() {
                return Err(StudyError::EmptyInput {
                    kind: InputKind::Text,
                });
            }
            Ok((ContentPart::Text(text.clone()), text))
        }
        GenerationInput::Image(None) => Err(StudyError::EmptyInput {
            kind: InputKind::Image,
        }),
        GenerationInput::Image(Some(source)) => {
            let image = match source {
                ImageSource::Path(path) => encoder::encode_file(&path).await?,
                ImageSource::Encoded(image) => image,
            };
            let preview = image.data_uri();
            Ok((ContentPart::Image(image), preview))
        }
    }
}
