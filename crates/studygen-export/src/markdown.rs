//! Markdown study sheets.
//!
//! A sheet lists every item of a record. Flashcards are written as
//! question/answer pairs; multiple-choice questions get lettered options
//! and a separate answer key at the end so the sheet can be used as a quiz.

use chrono::{DateTime, Utc};
use std::fmt::Write;

use studygen_core::{Flashcard, HistoryRecord, InputKind, McqItem, StudyDeck};

/// Maximum length of the text summary shown in the title.
const MAX_TITLE_LENGTH: usize = 60;

/// Option letters, in display order.
const OPTION_LETTERS: [char; 4] = ['A', 'B', 'C', 'D'];

/// Renders a [`HistoryRecord`] as a Markdown study sheet.
pub struct MarkdownExporter<'a> {
    record: &'a HistoryRecord,
}

impl<'a> MarkdownExporter<'a> {
    /// Creates an exporter for `record`.
    #[must_use]
    pub const fn new(record: &'a HistoryRecord) -> Self {
        Self { record }
    }

    /// Generates the complete sheet.
    #[must_use]
    pub fn generate(&self) -> String {
        let mut output = String::new();

        self.write_title(&mut output);
        self.write_summary(&mut output);
        match &self.record.deck {
            StudyDeck::Flashcards(cards) => write_flashcards(&mut output, cards),
            StudyDeck::Mcqs(items) => {
                write_questions(&mut output, items);
                write_answer_key(&mut output, items);
            }
        }
        Self::write_footer(&mut output);

        output
    }

    fn write_title(&self, output: &mut String) {
        let _ = writeln!(
            output,
            "# Study Set: {}\n",
            escape_markdown(&self.record.label(MAX_TITLE_LENGTH))
        );
    }

    fn write_summary(&self, output: &mut String) {
        let input = match self.record.input_kind {
            InputKind::Text => "Text",
            InputKind::Image => "Image",
        };
        let kind = match self.record.deck {
            StudyDeck::Flashcards(_) => "Flashcards",
            StudyDeck::Mcqs(_) => "Multiple choice",
        };

        let _ = writeln!(output, "## Summary\n");
        let _ = writeln!(output, "| Field | Value |");
        let _ = writeln!(output, "|-------|-------|");
        let _ = writeln!(
            output,
            "| Created | {} |",
            format_timestamp(&self.record.timestamp)
        );
        let _ = writeln!(output, "| Mode | {kind} |");
        let _ = writeln!(output, "| Input | {input} |");
        let _ = writeln!(output, "| Items | {} |", self.record.deck.len());
        let _ = writeln!(output, "| Theme | {} |", self.record.theme);
        let _ = writeln!(output);
    }

    fn write_footer(output: &mut String) {
        let _ = writeln!(output, "---");
        let timestamp = format_timestamp(&Utc::now());
        let _ = writeln!(output, "*Exported by studygen at {timestamp}*");
    }
}

fn write_flashcards(output: &mut String, cards: &[Flashcard]) {
    let _ = writeln!(output, "## Flashcards\n");

    for (i, card) in cards.iter().enumerate() {
        let _ = writeln!(output, "### {}. {}\n", i + 1, escape_markdown(&card.question));
        let _ = writeln!(output, "**Answer:** {}\n", escape_markdown(&card.answer));
        if card.icon.is_some() {
            let _ = writeln!(output, "*(icon attached)*\n");
        }
    }
}

fn write_questions(output: &mut String, items: &[McqItem]) {
    let _ = writeln!(output, "## Questions\n");

    for (i, item) in items.iter().enumerate() {
        let _ = writeln!(output, "### {}. {}\n", i + 1, escape_markdown(&item.question));
        for (letter, option) in OPTION_LETTERS.iter().zip(&item.options) {
            let _ = writeln!(output, "- **{letter}.** {}", escape_markdown(option));
        }
        let _ = writeln!(output);
        if item.icon.is_some() {
            let _ = writeln!(output, "*(icon attached)*\n");
        }
    }
}

fn write_answer_key(output: &mut String, items: &[McqItem]) {
    let _ = writeln!(output, "## Answer Key\n");
    let _ = writeln!(output, "| # | Answer |");
    let _ = writeln!(output, "|---|--------|");

    for (i, item) in items.iter().enumerate() {
        let letter = item
            .options
            .iter()
            .position(|option| item.is_correct(option))
            .and_then(|index| OPTION_LETTERS.get(index))
            .map_or_else(String::new, |letter| format!("{letter}. "));
        let _ = writeln!(
            output,
            "| {} | {letter}{} |",
            i + 1,
            escape_markdown(&item.correct_answer)
        );
    }
    let _ = writeln!(output);
}

fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Escapes Markdown control characters.
///
/// Newlines become `<br>` so that multi-line text stays inside table cells
/// and headings.
fn escape_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for ch in text.chars() {
        match ch {
            '*' | '_' | '`' | '#' | '[' | ']' | '(' | ')' | '!' | '\\' | '<' | '>' | '|' => {
                result.push('\\');
                result.push(ch);
            }
            '\n' => result.push_str("<br>"),
            _ => result.push(ch),
        }
    }

    result
}
