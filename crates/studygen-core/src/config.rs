//! Configuration for studygen.
//!
//! Settings come from an optional `studygen.json` file in the working
//! directory. Every field has a default, so a missing file is not an error.
//! The API key itself is never stored in the file; it is read from the
//! environment variable named by `apiKeyEnv`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StudyError};
use crate::model::GenerationMode;

/// The default config file name.
const CONFIG_FILE_NAME: &str = "studygen.json";

/// Icon MIME types the image service can produce.
const SUPPORTED_ICON_MIME_TYPES: [&str; 2] = ["image/jpeg", "image/png"];

fn default_api_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_text_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_image_model() -> String {
    "imagen-3.0-generate-002".to_string()
}

fn default_icon_mime_type() -> String {
    "image/jpeg".to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_data_dir() -> String {
    ".studygen".to_string()
}

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Base URL of the generative-language API.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Model used for flashcard / MCQ text generation.
    #[serde(default = "default_text_model")]
    pub text_model: String,

    /// Model used for icon generation.
    #[serde(default = "default_image_model")]
    pub image_model: String,

    /// Output format requested for generated icons.
    #[serde(default = "default_icon_mime_type")]
    pub icon_mime_type: String,

    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Directory holding durable storage (history and theme).
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Mode selected when the session starts.
    #[serde(default)]
    pub default_mode: GenerationMode,

    /// Whether icon generation is enabled by default.
    #[serde(default)]
    pub generate_icons: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            text_model: default_text_model(),
            image_model: default_image_model(),
            icon_mime_type: default_icon_mime_type(),
            api_key_env: default_api_key_env(),
            data_dir: default_data_dir(),
            default_mode: GenerationMode::default(),
            generate_icons: false,
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// Looks for `studygen.json`; if absent, returns the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            StudyError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads configuration from `studygen.json` inside `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        Self::load_from_file(&dir.join(CONFIG_FILE_NAME))
    }

    /// Loads configuration from a specific file path.
    ///
    /// If the file does not exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::ConfigParse` if the file exists but cannot be
    /// read or parsed, and `StudyError::ConfigValidation` if a value is
    /// invalid.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(StudyError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| StudyError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::ConfigValidation` if any check fails.
    pub fn validate(&self) -> Result<()> {
        let required = [
            (&self.api_base_url, "apiBaseUrl", "the generative-language API base URL"),
            (&self.text_model, "textModel", "a text generation model name"),
            (&self.image_model, "imageModel", "an image generation model name"),
            (&self.api_key_env, "apiKeyEnv", "the name of the API key environment variable"),
            (&self.data_dir, "dataDir", "a directory for history storage"),
        ];
        for (value, field, what) in required {
            if value.trim().is_empty() {
                return Err(StudyError::config_validation(
                    format!("{field} must not be empty"),
                    format!("Provide {what} in your studygen.json"),
                ));
            }
        }

        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://") {
            return Err(StudyError::config_validation(
                format!("apiBaseUrl '{}' is not an http(s) URL", self.api_base_url),
                "Use a URL such as https://generativelanguage.googleapis.com/v1beta",
            ));
        }

        if !SUPPORTED_ICON_MIME_TYPES.contains(&self.icon_mime_type.as_str()) {
            return Err(StudyError::config_validation(
                format!("iconMimeType '{}' is not supported", self.icon_mime_type),
                "Use 'image/jpeg' or 'image/png'",
            ));
        }

        Ok(())
    }

    /// Returns the data directory as a path.
    #[must_use]
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    /// Reads the API key from the configured environment variable.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::MissingApiKey` if the variable is unset or blank.
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| StudyError::MissingApiKey {
                env_var: self.api_key_env.clone(),
            })
    }
}
