//! JSON export of history records.
//!
//! The output is the record exactly as studygen stores it, so an exported
//! file can be inspected or fed to other tools.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use studygen_core::HistoryRecord;

use crate::{ExportError, Result};

/// Serializes a [`HistoryRecord`] to JSON.
///
/// # Example
///
/// ```rust
/// use studygen_core::{HistoryRecord, InputKind, McqItem, StudyDeck, Theme};
/// use studygen_export::json::JsonExporter;
///
/// let record = HistoryRecord::new(
///     InputKind::Text,
///     "arithmetic",
///     StudyDeck::Mcqs(vec![McqItem::new("2 + 2?", ["3", "4", "5", "6"], "4")]),
///     Theme::Default,
/// );
///
/// let json = JsonExporter::new(&record).generate().unwrap();
/// assert!(json.contains(r#""correctAnswer":"4""#));
/// ```
pub struct JsonExporter<'a> {
    record: &'a HistoryRecord,
}

impl<'a> JsonExporter<'a> {
    /// Creates an exporter for `record`.
    #[must_use]
    pub const fn new(record: &'a HistoryRecord) -> Self {
        Self { record }
    }

    /// Generates single-line JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Serialization`] if serialization fails.
    pub fn generate(&self) -> Result<String> {
        serde_json::to_string(self.record).map_err(ExportError::from)
    }

    /// Generates indented JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Serialization`] if serialization fails.
    pub fn generate_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self.record).map_err(ExportError::from)
    }

    /// Writes the JSON to `path`, creating or truncating the file.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Serialization`] or [`ExportError::Io`].
    pub fn write_to_file(&self, path: &Path, pretty: bool) -> Result<()> {
        let json = if pretty {
            self.generate_pretty()?
        } else {
            self.generate()?
        };

        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
