//! Study item types and history records.
//!
//! Generated content is either a deck of flashcards or a deck of
//! multiple-choice questions. Decks are produced by the generation
//! pipeline, shown by the review state machines and persisted inside
//! [`HistoryRecord`]s.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StudyError};

/// Number of options every multiple-choice question carries.
pub const MCQ_OPTION_COUNT: usize = 4;

// ============================================================================
// GenerationMode / InputKind / Theme
// ============================================================================

/// What kind of study material to generate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum GenerationMode {
    /// Question/answer flashcards (default).
    #[default]
    Flashcards,
    /// Multiple-choice questions.
    Mcq,
}

impl GenerationMode {
    /// Parses a string into a `GenerationMode`, case-insensitively.
    fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "flashcards" | "flashcard" => Some(Self::Flashcards),
            "mcq" | "mcqs" => Some(Self::Mcq),
            _ => None,
        }
    }

    /// Returns the canonical lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Flashcards => "flashcards",
            Self::Mcq => "mcq",
        }
    }
}

impl std::fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GenerationMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_str_case_insensitive(s).ok_or_else(|| {
            format!("invalid generation mode '{s}': expected one of 'flashcards', 'mcq'")
        })
    }
}

impl<'de> Deserialize<'de> for GenerationMode {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl Serialize for GenerationMode {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// Where the source material came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    /// Free text typed or pasted by the user.
    #[default]
    Text,
    /// An uploaded image.
    Image,
}

impl std::fmt::Display for InputKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Image => write!(f, "image"),
        }
    }
}

/// Colour theme of the user interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Theme {
    /// The default light theme.
    #[default]
    Default,
    /// Dark theme.
    Dark,
    /// Blue ocean theme.
    Ocean,
    /// Warm sunset theme.
    Sunset,
}

impl Theme {
    /// Every selectable theme, in menu order.
    pub const ALL: [Self; 4] = [Self::Default, Self::Dark, Self::Ocean, Self::Sunset];

    /// Returns the stored name of the theme.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Dark => "dark",
            Self::Ocean => "ocean",
            Self::Sunset => "sunset",
        }
    }
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|theme| theme.as_str() == lower)
            .ok_or_else(|| {
                format!("invalid theme '{s}': expected one of 'default', 'dark', 'ocean', 'sunset'")
            })
    }
}

impl<'de> Deserialize<'de> for Theme {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl Serialize for Theme {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

// ============================================================================
// Flashcard / McqItem
// ============================================================================

/// A question/answer study card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    /// Front of the card.
    pub question: String,
    /// Back of the card.
    pub answer: String,
    /// Optional illustrative icon as a `data:` URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl Flashcard {
    /// Creates a flashcard without an icon.
    #[must_use]
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            icon: None,
        }
    }

    fn validate(&self, index: usize) -> Result<()> {
        if self.question.trim().is_empty() {
            return Err(StudyError::parse(format!("flashcard {index} has an empty question")));
        }
        if self.answer.trim().is_empty() {
            return Err(StudyError::parse(format!("flashcard {index} has an empty answer")));
        }
        Ok(())
    }
}

/// A multiple-choice question with exactly one correct option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McqItem {
    /// The question text.
    pub question: String,
    /// Four unique answer options, in display order.
    pub options: Vec<String>,
    /// The correct option; always equal to one entry of `options`.
    pub correct_answer: String,
    /// Optional illustrative icon as a `data:` URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl McqItem {
    /// Creates an MCQ item without an icon.
    ///
    /// The item is not validated; use [`McqItem::validate`] for that.
    #[must_use]
    pub fn new(
        question: impl Into<String>,
        options: impl IntoIterator<Item = impl Into<String>>,
        correct_answer: impl Into<String>,
    ) -> Self {
        Self {
            question: question.into(),
            options: options.into_iter().map(Into::into).collect(),
            correct_answer: correct_answer.into(),
            icon: None,
        }
    }

    /// Returns `true` if `option` is the correct answer.
    #[must_use]
    pub fn is_correct(&self, option: &str) -> bool {
        self.correct_answer == option
    }

    /// Checks the item's invariants.
    ///
    /// The question must not be blank, there must be exactly
    /// [`MCQ_OPTION_COUNT`] unique options, and `correct_answer` must be
    /// one of them.
    pub fn validate(&self, index: usize) -> Result<()> {
        if self.question.trim().is_empty() {
            return Err(StudyError::parse(format!("question {index} is empty")));
        }
        if self.options.len() != MCQ_OPTION_COUNT {
            return Err(StudyError::parse(format!(
                "question {index} has {} options, expected {MCQ_OPTION_COUNT}",
                self.options.len()
            )));
        }
        let unique: HashSet<&str> = self.options.iter().map(String::as_str).collect();
        if unique.len() != self.options.len() {
            return Err(StudyError::parse(format!(
                "question {index} has duplicate options"
            )));
        }
        if !unique.contains(self.correct_answer.as_str()) {
            return Err(StudyError::parse(format!(
                "question {index}: correct answer '{}' is not one of the options",
                self.correct_answer
            )));
        }
        Ok(())
    }
}

// ============================================================================
// StudyDeck
// ============================================================================

static CODE_FENCE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?s)^\s*```[A-Za-z]*\s*\n?(.*?)\s*```\s*$").ok());

/// An ordered sequence of generated items, all of the same mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "items")]
pub enum StudyDeck {
    /// A deck of flashcards.
    #[serde(rename = "flashcards")]
    Flashcards(Vec<Flashcard>),
    /// A deck of multiple-choice questions.
    #[serde(rename = "mcq")]
    Mcqs(Vec<McqItem>),
}

impl StudyDeck {
    /// Parses and validates the structured text returned by the service.
    ///
    /// A surrounding Markdown code fence is tolerated. The parsed array must
    /// be non-empty and every item must satisfy its invariants.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::Parse` for malformed or invalid content and
    /// `StudyError::EmptyResult` for an empty array.
    pub fn parse(mode: GenerationMode, raw: &str) -> Result<Self> {
        let body = strip_code_fence(raw);
        let deck = match mode {
            GenerationMode::Flashcards => Self::Flashcards(
                serde_json::from_str(body).map_err(|e| StudyError::parse(e.to_string()))?,
            ),
            GenerationMode::Mcq => Self::Mcqs(
                serde_json::from_str(body).map_err(|e| StudyError::parse(e.to_string()))?,
            ),
        };

        if deck.is_empty() {
            return Err(StudyError::EmptyResult);
        }
        deck.validate()?;
        Ok(deck)
    }

    /// Checks every item's invariants.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Flashcards(cards) => cards
                .iter()
                .enumerate()
                .try_for_each(|(i, card)| card.validate(i)),
            Self::Mcqs(items) => items
                .iter()
                .enumerate()
                .try_for_each(|(i, item)| item.validate(i)),
        }
    }

    /// Returns the mode this deck was generated in.
    #[must_use]
    pub const fn mode(&self) -> GenerationMode {
        match self {
            Self::Flashcards(_) => GenerationMode::Flashcards,
            Self::Mcqs(_) => GenerationMode::Mcq,
        }
    }

    /// Returns the number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Flashcards(cards) => cards.len(),
            Self::Mcqs(items) => items.len(),
        }
    }

    /// Returns `true` if the deck has no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the question text of every item, in order.
    #[must_use]
    pub fn questions(&self) -> Vec<&str> {
        match self {
            Self::Flashcards(cards) => cards.iter().map(|c| c.question.as_str()).collect(),
            Self::Mcqs(items) => items.iter().map(|i| i.question.as_str()).collect(),
        }
    }

    /// Attaches one icon per item, by index.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::IconGeneration` if the number of icons differs
    /// from the number of items.
    pub fn with_icons(self, icons: Vec<String>) -> Result<Self> {
        if icons.len() != self.len() {
            return Err(StudyError::icon(
                icons.len().min(self.len()),
                format!("expected {} icons, got {}", self.len(), icons.len()),
            ));
        }
        Ok(match self {
            Self::Flashcards(cards) => Self::Flashcards(
                cards
                    .into_iter()
                    .zip(icons)
                    .map(|(card, icon)| Flashcard {
                        icon: Some(icon),
                        ..card
                    })
                    .collect(),
            ),
            Self::Mcqs(items) => Self::Mcqs(
                items
                    .into_iter()
                    .zip(icons)
                    .map(|(item, icon)| McqItem {
                        icon: Some(icon),
                        ..item
                    })
                    .collect(),
            ),
        })
    }
}

/// Removes a Markdown code fence wrapped around a JSON payload.
fn strip_code_fence(raw: &str) -> &str {
    CODE_FENCE
        .as_ref()
        .and_then(|re| re.captures(raw))
        .and_then(|caps| caps.get(1))
        .map_or_else(|| raw.trim(), |m| m.as_str())
}

// ============================================================================
// HistoryRecord
// ============================================================================

/// A persisted snapshot of one completed generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    /// Creation time in epoch milliseconds; unique within the history.
    pub id: i64,
    /// When the generation completed.
    pub timestamp: DateTime<Utc>,
    /// Whether the source was text or an image.
    pub input_kind: InputKind,
    /// The original text, or a `data:` URI preview of the image.
    pub input_summary: String,
    /// The generated items, tagged with their mode.
    pub deck: StudyDeck,
    /// The theme that was active when the record was created.
    pub theme: Theme,
}

impl HistoryRecord {
    /// Creates a record stamped with the current time.
    #[must_use]
    pub fn new(
        input_kind: InputKind,
        input_summary: impl Into<String>,
        deck: StudyDeck,
        theme: Theme,
    ) -> Self {
        let timestamp = Utc::now();
        Self {
            id: timestamp.timestamp_millis(),
            timestamp,
            input_kind,
            input_summary: input_summary.into(),
            deck,
            theme,
        }
    }

    /// Returns the mode of the stored deck.
    #[must_use]
    pub const fn mode(&self) -> GenerationMode {
        self.deck.mode()
    }

    /// Returns a short single-line label for history listings.
    #[must_use]
    pub fn label(&self, max_chars: usize) -> String {
        let summary = match self.input_kind {
            InputKind::Text => self.input_summary.split_whitespace().collect::<Vec<_>>().join(" "),
            InputKind::Image => "[image]".to_string(),
        };
        if summary.chars().count() <= max_chars {
            summary
        } else {
            let truncated: String = summary.chars().take(max_chars.saturating_sub(3)).collect();
            format!("{truncated}...")
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample_mcq() -> McqItem {
        McqItem::new(
            "What do plants absorb for photosynthesis?",
            ["Light", "Sound", "Heat only", "Magnetism"],
            "Light",
        )
    }

    #[test]
    fn test_generation_mode_serialization() {
        assert_eq!(
            serde_json::to_string(&GenerationMode::Flashcards).unwrap(),
            r#""flashcards""#
        );
        assert_eq!(serde_json::to_string(&GenerationMode::Mcq).unwrap(), r#""mcq""#);
    }

    #[test]
    fn test_generation_mode_case_insensitive() {
        let mode: GenerationMode = serde_json::from_str(r#""MCQ""#).unwrap();
        assert_eq!(mode, GenerationMode::Mcq);
        let mode: GenerationMode = "Flashcards".parse().unwrap();
        assert_eq!(mode, GenerationMode::Flashcards);

        let err = "quiz".parse::<GenerationMode>().unwrap_err();
        assert!(err.contains("invalid generation mode"));
    }

    #[test]
    fn test_theme_round_trip_names() {
        for theme in Theme::ALL {
            let parsed: Theme = theme.as_str().parse().unwrap();
            assert_eq!(parsed, theme);
        }
        assert_eq!("OCEAN".parse::<Theme>().unwrap(), Theme::Ocean);
        assert!("neon".parse::<Theme>().is_err());
    }

    #[test]
    fn test_parse_flashcards() {
        let raw = r#"[{"question": "What does photosynthesis convert?", "answer": "Light into chemical energy"}]"#;
        let deck = StudyDeck::parse(GenerationMode::Flashcards, raw).unwrap();

        assert_eq!(deck.mode(), GenerationMode::Flashcards);
        assert_eq!(deck.len(), 1);
        let StudyDeck::Flashcards(cards) = deck else {
            unreachable!("parsed flashcards mode");
        };
        assert_eq!(cards[0].answer, "Light into chemical energy");
        assert!(cards[0].icon.is_none());
    }

    #[test]
    fn test_parse_strips_code_fence() {
        let raw = "```json\n[{\"question\": \"Q\", \"answer\": \"A\"}]\n```";
        let deck = StudyDeck::parse(GenerationMode::Flashcards, raw).unwrap();
        assert_eq!(deck.questions(), vec!["Q"]);
    }

    #[test]
    fn test_parse_malformed_is_parse_error() {
        let err = StudyDeck::parse(GenerationMode::Flashcards, "not json").unwrap_err();
        assert!(matches!(err, StudyError::Parse { .. }));

        let err =
            StudyDeck::parse(GenerationMode::Mcq, r#"[{"question": "Q", "answer": "A"}]"#)
                .unwrap_err();
        assert!(matches!(err, StudyError::Parse { .. }));
    }

    #[test]
    fn test_parse_empty_array_is_empty_result() {
        let err = StudyDeck::parse(GenerationMode::Mcq, "[]").unwrap_err();
        assert!(matches!(err, StudyError::EmptyResult));
    }

    #[test]
    fn test_mcq_validation() {
        assert!(sample_mcq().validate(0).is_ok());

        let mut wrong_answer = sample_mcq();
        wrong_answer.correct_answer = "Water".to_string();
        assert!(wrong_answer.validate(0).is_err());

        let mut three_options = sample_mcq();
        three_options.options.pop();
        assert!(three_options.validate(0).is_err());

        let duplicates = McqItem::new("Q", ["A", "A", "B", "C"], "A");
        let err = duplicates.validate(3).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_parse_mcq_rejects_answer_outside_options() {
        let raw = r#"[{"question": "Q", "options": ["a", "b", "c", "d"], "correctAnswer": "e"}]"#;
        let err = StudyDeck::parse(GenerationMode::Mcq, raw).unwrap_err();
        assert!(matches!(err, StudyError::Parse { .. }));
    }

    #[test]
    fn test_with_icons_preserves_order() {
        let deck = StudyDeck::Flashcards(vec![Flashcard::new("Q1", "A1"), Flashcard::new("Q2", "A2")]);
        let deck = deck
            .with_icons(vec!["data:image/png;base64,AA==".into(), "data:image/png;base64,BB==".into()])
            .unwrap();

        let StudyDeck::Flashcards(cards) = deck else {
            unreachable!("mode is preserved");
        };
        assert_eq!(cards[0].question, "Q1");
        assert_eq!(cards[0].icon.as_deref(), Some("data:image/png;base64,AA=="));
        assert_eq!(cards[1].icon.as_deref(), Some("data:image/png;base64,BB=="));
    }

    #[test]
    fn test_with_icons_rejects_count_mismatch() {
        let deck = StudyDeck::Mcqs(vec![sample_mcq()]);
        assert!(deck.with_icons(vec![]).is_err());
    }

    #[test]
    fn test_deck_serialization_is_tagged_by_mode() {
        let deck = StudyDeck::Mcqs(vec![sample_mcq()]);
        let json = serde_json::to_string(&deck).unwrap();
        assert!(json.contains(r#""mode":"mcq""#));
        assert!(json.contains(r#""correctAnswer":"Light""#));
        assert!(!json.contains("icon"));
    }

    #[test]
    fn test_history_record_round_trip() {
        let record = HistoryRecord::new(
            InputKind::Text,
            "Photosynthesis converts light to energy",
            StudyDeck::Flashcards(vec![Flashcard::new("Q", "A")]),
            Theme::Dark,
        );
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains(r#""inputKind":"text""#));
        assert!(json.contains(r#""theme":"dark""#));

        let restored: HistoryRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, record);
        assert_eq!(restored.mode(), GenerationMode::Flashcards);
    }

    #[test]
    fn test_history_record_label() {
        let record = HistoryRecord::new(
            InputKind::Text,
            "Photosynthesis   converts\nlight to energy",
            StudyDeck::Flashcards(vec![Flashcard::new("Q", "A")]),
            Theme::Default,
        );
        assert_eq!(record.label(100), "Photosynthesis converts light to energy");
        assert_eq!(record.label(10), "Photosy...");

        let image = HistoryRecord::new(
            InputKind::Image,
            "data:image/png;base64,AAAA",
            StudyDeck::Flashcards(vec![Flashcard::new("Q", "A")]),
            Theme::Default,
        );
        assert_eq!(image.label(40), "[image]");
    }
}
