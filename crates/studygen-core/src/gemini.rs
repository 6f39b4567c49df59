//! Client for the hosted generative-language service.
//!
//! Two capabilities are used: schema-constrained text generation (the
//! flashcards / MCQs themselves) and single-image generation (icons). Both
//! are modelled as traits so the pipeline can run against fakes.
//!
//! No retries and no client-side timeouts are applied; a failure surfaces
//! only when the underlying request fails.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::Config;
use crate::encoder::{data_uri, EncodedImage};
use crate::error::{Result, ServiceErrorKind, StudyError};

/// One part of a multi-part generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    /// Plain text.
    Text(String),
    /// An inline base64-encoded image.
    Image(EncodedImage),
}

impl ContentPart {
    fn to_json(&self) -> Value {
        match self {
            Self::Text(text) => json!({ "text": text }),
            Self::Image(image) => json!({
                "inlineData": {
                    "mimeType": image.mime_type,
                    "data": image.data,
                }
            }),
        }
    }
}

/// A schema-constrained text generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRequest {
    /// Content parts, sent in order.
    pub parts: Vec<ContentPart>,
    /// JSON schema the response must conform to.
    pub response_schema: Value,
}

/// A generated image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    /// Base64-encoded image bytes.
    pub data: String,
    /// MIME type of the image.
    pub mime_type: String,
}

impl GeneratedImage {
    /// Renders the image as a `data:` URI.
    #[must_use]
    pub fn data_uri(&self) -> String {
        data_uri(&self.mime_type, &self.data)
    }
}

/// Produces structured text from multi-part content.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Returns the raw response text, expected to be JSON.
    async fn generate_text(&self, request: TextRequest) -> Result<String>;
}

/// Produces a single image from a text prompt.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generates exactly one image for `prompt`.
    async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage>;
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    bytes_base64_encoded: Option<String>,
    mime_type: Option<String>,
}

// ============================================================================
// GeminiClient
// ============================================================================

/// HTTP client for the generative-language API.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    text_model: String,
    image_model: String,
    icon_mime_type: String,
}

impl GeminiClient {
    /// Creates a client from configuration and an API key.
    #[must_use]
    pub fn new(config: &Config, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            text_model: config.text_model.clone(),
            image_model: config.image_model.clone(),
            icon_mime_type: config.icon_mime_type.clone(),
        }
    }

    /// Creates a client, reading the API key from the environment.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::MissingApiKey` if the key is not set.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(config, config.api_key()?))
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        format!("{}/models/{model}:{method}", self.base_url)
    }

    async fn post_json(&self, url: &str, payload: &Value) -> Result<Vec<u8>> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(payload)
            .send()
            .await
            .map_err(|e| StudyError::service(ServiceErrorKind::Network, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Generation service returned an error");
            return Err(StudyError::service(
                ServiceErrorKind::from_status(status.as_u16()),
                format!("HTTP {status}: {}", error_message(&body)),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| StudyError::service(ServiceErrorKind::Network, e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate_text(&self, request: TextRequest) -> Result<String> {
        let parts: Vec<Value> = request.parts.iter().map(ContentPart::to_json).collect();
        let payload = json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": request.response_schema,
            }
        });

        let url = self.model_url(&self.text_model, "generateContent");
        tracing::debug!(model = %self.text_model, parts = parts.len(), "Requesting text generation");
        let body = self.post_json(&url, &payload).await?;

        let response: GenerateContentResponse = serde_json::from_slice(&body).map_err(|e| {
            StudyError::service(ServiceErrorKind::Other, format!("unexpected response: {e}"))
        })?;
        extract_text(response)
    }
}

#[async_trait]
impl ImageGenerator for GeminiClient {
    async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage> {
        let payload = json!({
            "instances": [{ "prompt": prompt }],
            "parameters": {
                "sampleCount": 1,
                "outputMimeType": self.icon_mime_type,
            }
        });

        let url = self.model_url(&self.image_model, "predict");
        tracing::debug!(model = %self.image_model, "Requesting image generation");
        let body = self.post_json(&url, &payload).await?;

        let response: PredictResponse = serde_json::from_slice(&body).map_err(|e| {
            StudyError::service(ServiceErrorKind::Other, format!("unexpected response: {e}"))
        })?;
        extract_image(response, &self.icon_mime_type)
    }
}

/// Concatenates the text parts of the first candidate.
fn extract_text(response: GenerateContentResponse) -> Result<String> {
    let Some(content) = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
    else {
        return Err(StudyError::service(
            ServiceErrorKind::Other,
            "response contained no candidates",
        ));
    };

    Ok(content
        .parts
        .into_iter()
        .filter_map(|part| part.text)
        .collect::<String>())
}

/// Takes the first prediction's image bytes.
fn extract_image(response: PredictResponse, default_mime: &str) -> Result<GeneratedImage> {
    let Some(prediction) = response.predictions.into_iter().next() else {
        return Err(StudyError::service(
            ServiceErrorKind::Other,
            "response contained no images",
        ));
    };
    let Some(data) = prediction.bytes_base64_encoded.filter(|d| !d.is_empty()) else {
        return Err(StudyError::service(
            ServiceErrorKind::Other,
            "image prediction had no data",
        ));
    };

    Ok(GeneratedImage {
        data,
        mime_type: prediction
            .mime_type
            .unwrap_or_else(|| default_mime.to_string()),
    })
}

/// Pulls `error.message` out of an API error body, falling back to the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_content_part_json() {
        let text = ContentPart::Text("hello".to_string()).to_json();
        assert_eq!(text, json!({ "text": "hello" }));

        let image = ContentPart::Image(EncodedImage {
            data: "AAAA".to_string(),
            mime_type: "image/png".to_string(),
        })
        .to_json();
        assert_eq!(image["inlineData"]["mimeType"], "image/png");
        assert_eq!(image["inlineData"]["data"], "AAAA");
    }

    #[test]
    fn test_model_url() {
        let config = Config {
            api_base_url: "https://example.test/v1beta/".to_string(),
            ..Config::default()
        };
        let client = GeminiClient::new(&config, "key");
        assert_eq!(
            client.model_url("gemini-2.5-flash", "generateContent"),
            "https://example.test/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": { "parts": [{ "text": "[{\"question\":" }, { "text": "\"Q\",\"answer\":\"A\"}]" }] }
            }]
        }))
        .unwrap();

        let text = extract_text(response).unwrap();
        assert_eq!(text, r#"[{"question":"Q","answer":"A"}]"#);
    }

    #[test]
    fn test_extract_text_without_candidates() {
        let response: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        let err = extract_text(response).unwrap_err();
        assert!(matches!(err, StudyError::GenerationService { .. }));
    }

    #[test]
    fn test_extract_image() {
        let response: PredictResponse = serde_json::from_value(json!({
            "predictions": [{ "bytesBase64Encoded": "QUJD", "mimeType": "image/png" }]
        }))
        .unwrap();
        let image = extract_image(response, "image/jpeg").unwrap();
        assert_eq!(image.data_uri(), "data:image/png;base64,QUJD");
    }

    #[test]
    fn test_extract_image_defaults_mime_type() {
        let response: PredictResponse = serde_json::from_value(json!({
            "predictions": [{ "bytesBase64Encoded": "QUJD" }]
        }))
        .unwrap();
        let image = extract_image(response, "image/jpeg").unwrap();
        assert_eq!(image.mime_type, "image/jpeg");
    }

    #[test]
    fn test_extract_image_without_predictions() {
        let response: PredictResponse =
            serde_json::from_value(json!({ "predictions": [] })).unwrap();
        assert!(extract_image(response, "image/jpeg").is_err());
    }

    #[test]
    fn test_error_message() {
        let body = r#"{"error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}}"#;
        assert_eq!(error_message(body), "API key not valid");
        assert_eq!(error_message("Bad gateway\n"), "Bad gateway");
    }
}
