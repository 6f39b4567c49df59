//! Tab-separated export for flashcard applications.
//!
//! Each item becomes one `front<TAB>back` line. For multiple-choice
//! questions the back is the correct answer.

use studygen_core::{HistoryRecord, StudyDeck};

/// Renders a [`HistoryRecord`] as tab-separated lines.
pub struct TsvExporter<'a> {
    record: &'a HistoryRecord,
}

impl<'a> TsvExporter<'a> {
    /// Creates an exporter for `record`.
    #[must_use]
    pub const fn new(record: &'a HistoryRecord) -> Self {
        Self { record }
    }

    /// Generates one line per item, each terminated by `\n`.
    #[must_use]
    pub fn generate(&self) -> String {
        let pairs: Vec<(&str, &str)> = match &self.record.deck {
            StudyDeck::Flashcards(cards) => cards
                .iter()
                .map(|card| (card.question.as_str(), card.answer.as_str()))
                .collect(),
            StudyDeck::Mcqs(items) => items
                .iter()
                .map(|item| (item.question.as_str(), item.correct_answer.as_str()))
                .collect(),
        };

        let mut output = String::new();
        for (front, back) in pairs {
            output.push_str(&clean_field(front));
            output.push('\t');
            output.push_str(&clean_field(back));
            output.push('\n');
        }
        output
    }
}

/// Collapses tabs and line breaks so a field cannot split a row.
fn clean_field(text: &str) -> String {
    text.split(['\t', '\r', '\n'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
