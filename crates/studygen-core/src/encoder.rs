//! Image encoding for transport to the generation service.
//!
//! Images chosen by the user are read without blocking the runtime, their
//! MIME type is detected, and the bytes are base64-encoded so they can be
//! sent inline with the generation request.

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StudyError};

/// Image formats accepted as generation input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG image format.
    Png,
    /// JPEG image format.
    Jpeg,
    /// GIF image format.
    Gif,
    /// WebP image format.
    Webp,
    /// HEIC image format.
    Heic,
    /// HEIF image format.
    Heif,
}

impl ImageFormat {
    /// Attempts to detect image format from file extension.
    ///
    /// Returns `None` if the extension is not recognized.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::Webp),
            "heic" => Some(Self::Heic),
            "heif" => Some(Self::Heif),
            _ => None,
        }
    }

    /// Attempts to detect image format from a file path.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Attempts to detect image format from a MIME type.
    #[must_use]
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        match mime.trim().to_lowercase().as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/gif" => Some(Self::Gif),
            "image/webp" => Some(Self::Webp),
            "image/heic" => Some(Self::Heic),
            "image/heif" => Some(Self::Heif),
            _ => None,
        }
    }

    /// Detects the format from the leading "magic" bytes of the file.
    #[must_use]
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
            Some(Self::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(b"GIF8") {
            Some(Self::Gif)
        } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(Self::Webp)
        } else if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" {
            match &bytes[8..12] {
                b"heic" | b"heix" => Some(Self::Heic),
                b"mif1" | b"msf1" => Some(Self::Heif),
                _ => None,
            }
        } else {
            None
        }
    }

    /// Returns the MIME type for this format.
    #[must_use]
    pub const fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
            Self::Heic => "image/heic",
            Self::Heif => "image/heif",
        }
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Png => write!(f, "png"),
            Self::Jpeg => write!(f, "jpeg"),
            Self::Gif => write!(f, "gif"),
            Self::Webp => write!(f, "webp"),
            Self::Heic => write!(f, "heic"),
            Self::Heif => write!(f, "heif"),
        }
    }
}

/// A base64-encoded image ready to be sent inline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedImage {
    /// Standard base64 encoding of the image bytes.
    pub data: String,
    /// MIME type of the image (e.g. `image/png`).
    pub mime_type: String,
}

impl EncodedImage {
    /// Renders the image as a `data:` URI.
    #[must_use]
    pub fn data_uri(&self) -> String {
        data_uri(&self.mime_type, &self.data)
    }
}

/// Builds a `data:` URI from a MIME type and base64 payload.
#[must_use]
pub fn data_uri(mime_type: &str, base64_data: &str) -> String {
    format!("data:{mime_type};base64,{base64_data}")
}

/// Reads and encodes the image at `path`.
///
/// The format comes from the file extension, falling back to the file's
/// magic bytes.
///
/// # Errors
///
/// Returns `StudyError::Encoding` if the file cannot be read, is empty,
/// or is not a recognised image.
pub async fn encode_file(path: impl AsRef<Path>) -> Result<EncodedImage> {
    let path = path.as_ref();
    let source_name = path.display().to_string();

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| StudyError::encoding(&source_name, e.to_string()))?;

    let format = ImageFormat::from_path(path).or_else(|| ImageFormat::sniff(&bytes));
    let Some(format) = format else {
        return Err(StudyError::encoding(
            &source_name,
            "unsupported image format (expected png, jpeg, gif, webp, heic or heif)",
        ));
    };

    encode_bytes(&source_name, &bytes, format)
}

/// Encodes in-memory image bytes of a known format.
///
/// # Errors
///
/// Returns `StudyError::Encoding` if `bytes` is empty.
pub fn encode_bytes(source_name: &str, bytes: &[u8], format: ImageFormat) -> Result<EncodedImage> {
    if bytes.is_empty() {
        return Err(StudyError::encoding(source_name, "image file is empty"));
    }

    tracing::debug!(source = source_name, format = %format, size = bytes.len(), "Encoded image");

    Ok(EncodedImage {
        data: STANDARD.encode(bytes),
        mime_type: format.mime_type().to_string(),
    })
}

/// Validates an image that arrived already base64-encoded (e.g. an upload).
///
/// # Errors
///
/// Returns `StudyError::Encoding` if the MIME type is unsupported or the
/// payload is not valid, non-empty base64.
pub fn decode_upload(data: &str, mime_type: &str) -> Result<EncodedImage> {
    let Some(format) = ImageFormat::from_mime_type(mime_type) else {
        return Err(StudyError::encoding(
            "upload",
            format!("unsupported image type '{mime_type}'"),
        ));
    };
    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|e| StudyError::encoding("upload", format!("invalid base64: {e}")))?;
    encode_bytes("upload", &bytes, format)
}
