//! studygen export
//!
//! Renders a [`HistoryRecord`] for use outside studygen.
//!
//! # Exporters
//!
//! - [`MarkdownExporter`] - printable study sheet with an answer key
//! - [`json::JsonExporter`] - the full record, compact or pretty
//! - [`TsvExporter`] - `front<TAB>back` lines for flashcard apps
//!
//! # Example
//!
//! ```rust
//! use studygen_core::{Flashcard, HistoryRecord, InputKind, StudyDeck, Theme};
//! use studygen_export::{export, ExportFormat};
//!
//! let record = HistoryRecord::new(
//!     InputKind::Text,
//!     "Photosynthesis converts light to energy",
//!     StudyDeck::Flashcards(vec![Flashcard::new("What is converted?", "Light")]),
//!     Theme::Default,
//! );
//!
//! let tsv = export(&record, ExportFormat::Tsv).unwrap();
//! assert_eq!(tsv, "What is converted?\tLight\n");
//! ```

pub mod json;
mod markdown;
mod tsv;

pub use markdown::MarkdownExporter;
pub use tsv::TsvExporter;

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use studygen_core::HistoryRecord;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while exporting a record.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Failed to serialize the record to JSON.
    #[error("failed to serialize record: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Failed to write the export file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The requested format name is not known.
    #[error("unknown export format '{0}': expected one of 'markdown', 'json', 'tsv'")]
    UnknownFormat(String),
}

/// Result type for export operations.
pub type Result<T> = std::result::Result<T, ExportError>;

// ============================================================================
// ExportFormat
// ============================================================================

/// Output formats supported by [`export`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
    /// Markdown study sheet.
    #[default]
    Markdown,
    /// Pretty-printed JSON.
    Json,
    /// Tab-separated front/back pairs.
    Tsv,
}

impl ExportFormat {
    /// Returns the conventional file extension.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Json => "json",
            Self::Tsv => "tsv",
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Markdown => write!(f, "markdown"),
            Self::Json => write!(f, "json"),
            Self::Tsv => write!(f, "tsv"),
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            "tsv" => Ok(Self::Tsv),
            _ => Err(ExportError::UnknownFormat(s.to_string())),
        }
    }
}

/// Renders `record` in the given format.
///
/// # Errors
///
/// Returns [`ExportError::Serialization`] if JSON output cannot be produced.
pub fn export(record: &HistoryRecord, format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Markdown => Ok(MarkdownExporter::new(record).generate()),
        ExportFormat::Json => json::JsonExporter::new(record).generate_pretty(),
        ExportFormat::Tsv => Ok(TsvExporter::new(record).generate()),
    }
}

/// Writes `record` to `path` in the given format and returns the file written.
///
/// A directory target gets `studygen-<id>.<ext>` inside it; a file name
/// without an extension gets the format's extension appended.
///
/// # Errors
///
/// Returns [`ExportError::Serialization`] or [`ExportError::Io`].
pub fn export_to_path(record: &HistoryRecord, format: ExportFormat, path: &Path) -> Result<PathBuf> {
    let target = if path.is_dir() {
        path.join(format!("studygen-{}.{}", record.id, format.extension()))
    } else if path.extension().is_none() {
        path.with_extension(format.extension())
    } else {
        path.to_path_buf()
    };

    match format {
        ExportFormat::Json => json::JsonExporter::new(record).write_to_file(&target, true)?,
        ExportFormat::Markdown | ExportFormat::Tsv => {
            let mut file = File::create(&target)?;
            file.write_all(export(record, format)?.as_bytes())?;
        }
    }
    Ok(target)
}
