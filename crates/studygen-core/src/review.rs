//! Review state machines for flashcards and multiple-choice quizzes.
//!
//! Both machines are pure values: every transition consumes the current
//! state and an event and returns the next state. Events that are not
//! valid in the current state leave it unchanged.

use serde::{Deserialize, Serialize};

use crate::model::McqItem;

// ============================================================================
// Direction
// ============================================================================

/// Direction of a flashcard navigation step.
///
/// Serialized as `-1` (backward) or `1` (forward).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Direction {
    /// Towards the first card.
    Backward,
    /// Towards the last card.
    Forward,
}

impl TryFrom<i64> for Direction {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Self::Backward),
            1 => Ok(Self::Forward),
            other => Err(format!("invalid direction {other}: expected -1 or 1")),
        }
    }
}

impl From<Direction> for i64 {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Backward => -1,
            Direction::Forward => 1,
        }
    }
}

// ============================================================================
// FlashcardReview
// ============================================================================

/// Events accepted by [`FlashcardReview`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashcardEvent {
    /// Toggle between the front and back of the current card.
    Flip,
    /// Show the front of the current card.
    ResetFlip,
    /// Move one card in the given direction, clamped to the deck.
    Step(Direction),
}

/// Position and flip state while reviewing a flashcard deck.
///
/// # Examples
///
/// ```
/// use studygen_core::{Direction, FlashcardEvent, FlashcardReview};
///
/// let review = FlashcardReview::new(2)
///     .apply(FlashcardEvent::Flip)
///     .navigate(Direction::Forward)
///     .navigate(Direction::Forward);
///
/// assert_eq!(review.current_index(), 1);
/// assert!(!review.is_flipped());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlashcardReview {
    current_index: usize,
    flipped: bool,
    len: usize,
}

impl FlashcardReview {
    /// Starts a review of `len` cards at the first card, front shown.
    #[must_use]
    pub const fn new(len: usize) -> Self {
        Self {
            current_index: 0,
            flipped: false,
            len,
        }
    }

    /// Returns the index of the card being shown.
    #[must_use]
    pub const fn current_index(&self) -> usize {
        self.current_index
    }

    /// Returns `true` if the back of the card is shown.
    #[must_use]
    pub const fn is_flipped(&self) -> bool {
        self.flipped
    }

    /// Returns the number of cards in the deck.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the deck has no cards.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Applies one event.
    #[must_use]
    pub fn apply(self, event: FlashcardEvent) -> Self {
        match event {
            FlashcardEvent::Flip => Self {
                flipped: !self.flipped,
                ..self
            },
            FlashcardEvent::ResetFlip => Self {
                flipped: false,
                ..self
            },
            FlashcardEvent::Step(direction) => {
                let target = match direction {
                    Direction::Backward => self.current_index.checked_sub(1),
                    Direction::Forward => Some(self.current_index + 1).filter(|&i| i < self.len),
                };
                target.map_or(self, |current_index| Self {
                    current_index,
                    ..self
                })
            }
        }
    }

    /// Resets the flip and then steps, without the visual delay.
    #[must_use]
    pub fn navigate(self, direction: Direction) -> Self {
        self.apply(FlashcardEvent::ResetFlip)
            .apply(FlashcardEvent::Step(direction))
    }
}

// ============================================================================
// McqReview
// ============================================================================

/// Events accepted by [`McqReview`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum McqEvent {
    /// Submit an answer for the current question.
    Select(String),
    /// Advance past an answered question.
    Next,
    /// Start the quiz over.
    Restart,
}

/// Coarse phase of an MCQ review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", content = "index", rename_all = "snake_case")]
pub enum McqPhase {
    /// Waiting for an answer to question `i`.
    Answering(usize),
    /// Question `i` has been answered.
    Answered(usize),
    /// Every question has been answered.
    Finished,
}

/// Progress through a multiple-choice quiz.
///
/// Invariants: `score <= current_index + 1`, and a finished quiz sits on
/// its last question with that question answered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McqReview {
    current_index: usize,
    selected: Option<String>,
    answered: bool,
    score: usize,
    finished: bool,
    len: usize,
}

impl McqReview {
    /// Starts a quiz of `len` questions.
    #[must_use]
    pub const fn new(len: usize) -> Self {
        Self {
            current_index: 0,
            selected: None,
            answered: false,
            score: 0,
            finished: false,
            len,
        }
    }

    /// Returns the index of the current question.
    #[must_use]
    pub const fn current_index(&self) -> usize {
        self.current_index
    }

    /// Returns the submitted answer for the current question, if any.
    #[must_use]
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Returns `true` once the current question has been answered.
    #[must_use]
    pub const fn is_answered(&self) -> bool {
        self.answered
    }

    /// Returns the number of correct answers so far.
    #[must_use]
    pub const fn score(&self) -> usize {
        self.score
    }

    /// Returns `true` once the quiz is over.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Returns the number of questions.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the quiz has no questions.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the current phase.
    #[must_use]
    pub const fn phase(&self) -> McqPhase {
        if self.finished {
            McqPhase::Finished
        } else if self.answered {
            McqPhase::Answered(self.current_index)
        } else {
            McqPhase::Answering(self.current_index)
        }
    }

    /// Applies one event against the quiz `items`.
    #[must_use]
    pub fn apply(self, items: &[McqItem], event: McqEvent) -> Self {
        match (self.phase(), event) {
            (_, McqEvent::Restart) => Self::new(items.len()),
            (McqPhase::Answering(i), McqEvent::Select(option)) => {
                let Some(item) = items.get(i) else {
                    return self;
                };
                let score = if item.is_correct(&option) {
                    self.score + 1
                } else {
                    self.score
                };
                Self {
                    selected: Some(option),
                    answered: true,
                    score,
                    ..self
                }
            }
            (McqPhase::Answered(i), McqEvent::Next) => {
                if i + 1 < items.len() {
                    Self {
                        current_index: i + 1,
                        selected: None,
                        answered: false,
                        ..self
                    }
                } else {
                    Self {
                        finished: true,
                        ..self
                    }
                }
            }
            _ => self,
        }
    }
}
