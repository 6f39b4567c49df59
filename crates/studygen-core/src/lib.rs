//! studygen core
//!
//! Generates flashcards and multiple-choice questions from text or images,
//! keeps a history of past generations, and runs the review state machines.

pub mod api;
pub mod config;
pub mod encoder;
pub mod error;
pub mod events;
pub mod gemini;
pub mod history;
pub mod model;
pub mod pipeline;
pub mod review;
pub mod session;
pub mod storage;

pub use api::{create_router, AppState, ErrorResponse, GenerateBody, HistoryEntry, ImageUpload};
pub use config::Config;
pub use encoder::{encode_file, EncodedImage, ImageFormat};
pub use error::{Result, ServiceErrorKind, StudyError, GENERATION_FAILED_MESSAGE};
pub use events::{EventBroadcaster, StudyEvent};
pub use gemini::{
    ContentPart, GeminiClient, GeneratedImage, ImageGenerator, TextGenerator, TextRequest,
};
pub use history::HistoryStore;
pub use model::{
    Flashcard, GenerationMode, HistoryRecord, InputKind, McqItem, StudyDeck, Theme,
    MCQ_OPTION_COUNT,
};
pub use pipeline::{
    icon_prompt, GenerationInput, GenerationPipeline, GenerationRequest, ImageSource,
};
pub use review::{Direction, FlashcardEvent, FlashcardReview, McqEvent, McqPhase, McqReview};
pub use session::{
    navigate_with_transition, SessionSnapshot, StudySession, FLIP_TRANSITION_DELAY,
};
pub use storage::{FileStore, KeyValueStore, MemoryStore, HISTORY_KEY, THEME_KEY};
