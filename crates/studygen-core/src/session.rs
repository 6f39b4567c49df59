//! The single-session controller.
//!
//! [`StudySession`] owns everything a user sees: the selected theme and
//! mode, the displayed items, both review machines, and the loading and
//! error indicators. It is shared behind a `tokio::sync::Mutex` by the
//! HTTP API and used directly by the terminal review.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::error::{Result, StudyError};
use crate::model::{Flashcard, GenerationMode, HistoryRecord, McqItem, StudyDeck, Theme};
use crate::review::{
    Direction, FlashcardEvent, FlashcardReview, McqEvent, McqPhase, McqReview,
};
use crate::storage::{KeyValueStore, THEME_KEY};

/// Pause between hiding a card's back and moving to the next card.
pub const FLIP_TRANSITION_DELAY: Duration = Duration::from_millis(150);

/// State of one user session.
#[derive(Debug)]
pub struct StudySession {
    theme: Theme,
    mode: GenerationMode,
    flashcards: Vec<Flashcard>,
    mcqs: Vec<McqItem>,
    flashcard_review: FlashcardReview,
    mcq_review: McqReview,
    loading: bool,
    error: Option<String>,
    storage: Arc<dyn KeyValueStore>,
}

/// Serializable view of a [`StudySession`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Active theme.
    pub theme: Theme,
    /// Selected generation mode.
    pub mode: GenerationMode,
    /// Whether a generation is in flight.
    pub loading: bool,
    /// The last user-facing error, if any.
    pub error: Option<String>,
    /// Displayed flashcards.
    pub flashcards: Vec<Flashcard>,
    /// Displayed multiple-choice questions.
    pub mcqs: Vec<McqItem>,
    /// Flashcard review position.
    pub flashcard_review: FlashcardReview,
    /// MCQ review progress.
    pub mcq_review: McqReview,
    /// Coarse MCQ phase.
    pub mcq_phase: McqPhase,
}

impl StudySession {
    /// Starts a session, restoring the persisted theme from `storage`.
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStore>, mode: GenerationMode) -> Self {
        let theme = load_theme(storage.as_ref());
        Self {
            theme,
            mode,
            flashcards: Vec::new(),
            mcqs: Vec::new(),
            flashcard_review: FlashcardReview::new(0),
            mcq_review: McqReview::new(0),
            loading: false,
            error: None,
            storage,
        }
    }

    /// Returns the active theme.
    #[must_use]
    pub const fn theme(&self) -> Theme {
        self.theme
    }

    /// Returns the selected mode.
    #[must_use]
    pub const fn mode(&self) -> GenerationMode {
        self.mode
    }

    /// Returns `true` while a generation is running.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.loading
    }

    /// Returns the last user-facing error.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns the displayed flashcards.
    #[must_use]
    pub fn flashcards(&self) -> &[Flashcard] {
        &self.flashcards
    }

    /// Returns the displayed MCQs.
    #[must_use]
    pub fn mcqs(&self) -> &[McqItem] {
        &self.mcqs
    }

    /// Returns the flashcard review state.
    #[must_use]
    pub const fn flashcard_review(&self) -> &FlashcardReview {
        &self.flashcard_review
    }

    /// Returns the MCQ review state.
    #[must_use]
    pub const fn mcq_review(&self) -> &McqReview {
        &self.mcq_review
    }

    /// Selects the generation mode for the next request.
    pub fn set_mode(&mut self, mode: GenerationMode) {
        self.mode = mode;
    }

    /// Switches theme and persists the choice.
    ///
    /// A failed write is logged; the theme still changes.
    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
        if let Err(e) = self.storage.set(THEME_KEY, theme.as_str()) {
            tracing::warn!(error = %e, theme = %theme, "Failed to persist theme");
        }
    }

    /// Marks a generation as started.
    ///
    /// Clears displayed results and any previous error.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::GenerationInProgress` if one is already running.
    pub fn begin_generation(&mut self) -> Result<()> {
        if self.loading {
            return Err(StudyError::GenerationInProgress);
        }
        self.loading = true;
        self.error = None;
        self.install(StudyDeck::Flashcards(Vec::new()));
        Ok(())
    }

    /// Records the outcome of the running generation.
    ///
    /// On success the new items are shown and their review machine starts
    /// over; on failure only the generic error message is kept.
    pub fn complete_generation(&mut self, outcome: &Result<HistoryRecord>) {
        self.loading = false;
        match outcome {
            Ok(record) => {
                self.mode = record.mode();
                self.install(record.deck.clone());
            }
            Err(e) => {
                self.error = Some(e.user_message());
            }
        }
    }

    /// Restores a past generation.
    pub fn select_record(&mut self, record: &HistoryRecord) {
        self.mode = record.mode();
        self.error = None;
        if record.theme != self.theme {
            self.set_theme(record.theme);
        }
        self.install(record.deck.clone());
        tracing::debug!(record_id = record.id, mode = %self.mode, "Selected history record");
    }

    fn install(&mut self, deck: StudyDeck) {
        match deck {
            StudyDeck::Flashcards(cards) => {
                self.flashcards = cards;
                self.mcqs = Vec::new();
            }
            StudyDeck::Mcqs(items) => {
                self.flashcards = Vec::new();
                self.mcqs = items;
            }
        }
        self.flashcard_review = FlashcardReview::new(self.flashcards.len());
        self.mcq_review = McqReview::new(self.mcqs.len());
    }

    /// Toggles the current flashcard.
    pub fn flip(&mut self) {
        self.flashcard_review = self.flashcard_review.apply(FlashcardEvent::Flip);
    }

    /// Shows the front of the current flashcard.
    pub fn reset_flip(&mut self) {
        self.flashcard_review = self.flashcard_review.apply(FlashcardEvent::ResetFlip);
    }

    /// Moves one flashcard, clamped to the deck.
    pub fn step(&mut self, direction: Direction) {
        self.flashcard_review = self.flashcard_review.apply(FlashcardEvent::Step(direction));
    }

    /// Resets the flip and moves immediately.
    pub fn navigate(&mut self, direction: Direction) {
        self.flashcard_review = self.flashcard_review.navigate(direction);
    }

    /// Answers the current MCQ.
    pub fn select_option(&mut self, option: impl Into<String>) {
        self.apply_mcq(McqEvent::Select(option.into()));
    }

    /// Advances past an answered MCQ.
    pub fn next_question(&mut self) {
        self.apply_mcq(McqEvent::Next);
    }

    /// Restarts the quiz.
    pub fn restart_quiz(&mut self) {
        self.apply_mcq(McqEvent::Restart);
    }

    fn apply_mcq(&mut self, event: McqEvent) {
        let review = std::mem::take(&mut self.mcq_review);
        self.mcq_review = review.apply(&self.mcqs, event);
    }

    /// Returns a serializable copy of the session.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            theme: self.theme,
            mode: self.mode,
            loading: self.loading,
            error: self.error.clone(),
            flashcards: self.flashcards.clone(),
            mcqs: self.mcqs.clone(),
            flashcard_review: self.flashcard_review,
            mcq_review: self.mcq_review.clone(),
            mcq_phase: self.mcq_review.phase(),
        }
    }
}

/// Reads the persisted theme; anything missing or unknown is the default.
#[must_use]
pub fn load_theme(storage: &dyn KeyValueStore) -> Theme {
    match storage.get(THEME_KEY) {
        Ok(Some(name)) => name.parse().unwrap_or_else(|e: String| {
            tracing::warn!(error = %e, "Unknown stored theme, using default");
            Theme::Default
        }),
        Ok(None) => Theme::Default,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read theme, using default");
            Theme::Default
        }
    }
}

/// Navigates with the visual transition: the card is turned face-up, the
/// session lock is released for [`FLIP_TRANSITION_DELAY`], then it moves.
pub async fn navigate_with_transition(session: &Mutex<StudySession>, direction: Direction) {
    session.lock().await.reset_flip();
    tokio::time::sleep(FLIP_TRANSITION_DELAY).await;
    session.lock().await.step(direction);
}
