//! Error types for studygen.
//!
//! This module defines the error hierarchy for every core operation:
//! configuration loading, image encoding, calls to the generation service,
//! response parsing, icon enrichment, and durable storage.

use std::path::PathBuf;

use crate::model::InputKind;

/// A specialized `Result` type for studygen operations.
pub type Result<T> = std::result::Result<T, StudyError>;

/// The single message shown to the user when a generation fails.
pub const GENERATION_FAILED_MESSAGE: &str = "Failed to generate content. Please try again.";

/// Errors that can occur while generating or reviewing study material.
///
/// Variants are grouped by subsystem and carry actionable suggestions
/// where the user can do something about them.
#[derive(Debug, thiserror::Error)]
pub enum StudyError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in the configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your studygen.json with a JSON linter")]
    ConfigParse {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    /// The API key environment variable is not set.
    #[error("API key not configured: '{env_var}' is not set\n\nSuggestion: Export {env_var} or add it to a .env file")]
    MissingApiKey {
        /// Name of the environment variable that was consulted.
        env_var: String,
    },

    // ========================================================================
    // Pipeline Errors
    // ========================================================================
    /// No text was entered, or no image was selected.
    #[error("No {kind} input provided")]
    EmptyInput {
        /// Which kind of input was missing.
        kind: InputKind,
    },

    /// The selected image could not be read or recognised.
    #[error("Could not encode image '{source_name}': {message}")]
    Encoding {
        /// File name or description of the image source.
        source_name: String,
        /// Description of the failure.
        message: String,
    },

    /// The text-generation service call failed.
    #[error("Generation service error ({kind}): {message}\n\nSuggestion: {suggestion}")]
    GenerationService {
        /// Classification of the failure.
        kind: ServiceErrorKind,
        /// Detailed error message from the service or transport.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    /// The service response was not the structured data we asked for.
    #[error("Could not parse generated content: {message}")]
    Parse {
        /// Description of what was wrong with the response.
        message: String,
    },

    /// The service returned an empty list of items.
    #[error("The generation service returned no items")]
    EmptyResult,

    /// At least one icon sub-request failed; the whole icon set is discarded.
    #[error("Icon generation failed for item {index}: {message}")]
    IconGeneration {
        /// Zero-based index of the item whose icon failed.
        index: usize,
        /// Description of the failure.
        message: String,
    },

    /// A generation was requested while another one is still running.
    #[error("A generation is already in progress")]
    GenerationInProgress,

    // ========================================================================
    // Storage Errors
    // ========================================================================
    /// Durable storage could not be read or written.
    #[error("Storage error for '{key}': {message}")]
    Storage {
        /// Storage key involved.
        key: String,
        /// Description of the failure.
        message: String,
    },

    /// No history record exists with the given id.
    #[error("History record not found: {id}")]
    RecordNotFound {
        /// The id that was looked up.
        id: i64,
    },

    // ========================================================================
    // General I/O Errors
    // ========================================================================
    /// General I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A background task ended without producing a result.
    #[error("Background task failed: {message}")]
    TaskFailed {
        /// Description of the failure.
        message: String,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Categories of generation-service failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceErrorKind {
    /// Authentication failure (invalid or missing API key).
    Authentication,
    /// Rate limit or quota exceeded.
    RateLimit,
    /// Server error (5xx responses).
    Server,
    /// Network connectivity issues.
    Network,
    /// Other unclassified errors.
    Other,
}

impl std::fmt::Display for ServiceErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::RateLimit => write!(f, "rate_limit"),
            Self::Server => write!(f, "server"),
            Self::Network => write!(f, "network"),
            Self::Other => write!(f, "other"),
        }
    }
}

impl ServiceErrorKind {
    /// Classifies an HTTP status code returned by the service.
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Authentication,
            429 => Self::RateLimit,
            500..=599 => Self::Server,
            _ => Self::Other,
        }
    }

    /// Returns a suggestion message for this error kind.
    #[must_use]
    pub const fn suggestion(&self) -> &'static str {
        match self {
            Self::Authentication => "Check your API key",
            Self::RateLimit => "Wait a moment before generating again",
            Self::Server => "Try again later; the service may be experiencing issues",
            Self::Network => "Check your network connection",
            Self::Other => "Check the service status page",
        }
    }
}

impl StudyError {
    /// Creates a new `ConfigParse` error with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidation` error with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `Encoding` error.
    #[must_use]
    pub fn encoding(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Encoding {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Creates a new `GenerationService` error with the suggestion for its kind.
    #[must_use]
    pub fn service(kind: ServiceErrorKind, message: impl Into<String>) -> Self {
        Self::GenerationService {
            kind,
            message: message.into(),
            suggestion: kind.suggestion().to_string(),
        }
    }

    /// Creates a new `Parse` error.
    #[must_use]
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Creates a new `IconGeneration` error.
    #[must_use]
    pub fn icon(index: usize, message: impl Into<String>) -> Self {
        Self::IconGeneration {
            index,
            message: message.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Storage {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if this error aborts a generation.
    ///
    /// Storage failures never abort a generation; they are logged instead.
    #[must_use]
    pub const fn is_pipeline_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyInput { .. }
                | Self::Encoding { .. }
                | Self::GenerationService { .. }
                | Self::Parse { .. }
                | Self::EmptyResult
                | Self::IconGeneration { .. }
                | Self::MissingApiKey { .. }
        )
    }

    /// Returns the message shown to the user for this error.
    ///
    /// All pipeline failures collapse to one generic message; the detailed
    /// cause is only logged.
    #[must_use]
    pub fn user_message(&self) -> String {
        if self.is_pipeline_error() {
            GENERATION_FAILED_MESSAGE.to_string()
        } else {
            self.to_string()
        }
    }
}
