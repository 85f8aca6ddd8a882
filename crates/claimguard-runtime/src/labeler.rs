//! Image content labeling.
//!
//! An [`ImageLabeler`] turns image bytes into descriptive labels, highest
//! confidence first. The pipeline only compares them against the narrative;
//! it never interprets scores.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors from a labeling service.
#[derive(Error, Debug)]
pub enum LabelerError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Failed to parse labeler response: {0}")]
    ParseError(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Labeler not configured: {0}")]
    NotConfigured(String),
}

/// Image in, labels out.
#[async_trait]
pub trait ImageLabeler: Send + Sync {
    /// Labels for the image, ordered by descending confidence.
    async fn labels(&self, image: &[u8]) -> Result<Vec<String>, LabelerError>;

    fn name(&self) -> &str;
}

/// Returns the same labels for every image.
///
/// Used for offline runs (`--labels` on the CLI) and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticLabeler {
    labels: Vec<String>,
}

impl StaticLabeler {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl ImageLabeler for StaticLabeler {
    async fn labels(&self, _image: &[u8]) -> Result<Vec<String>, LabelerError> {
        Ok(self.labels.clone())
    }

    fn name(&self) -> &str {
        "static"
    }
}

#[cfg(feature = "google")]
pub use vision::GoogleVisionLabeler;

#[cfg(feature = "google")]
mod vision {
    use super::{ImageLabeler, LabelerError};
    use crate::providers::{ApiCredential, CredentialSource, ProviderError, GOOGLE_API_KEY_ENV};
    use async_trait::async_trait;
    use backon::{ExponentialBuilder, Retryable};
    use base64::Engine as _;
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    const DEFAULT_BASE_URL: &str = "https://vision.googleapis.com/v1";

    /// Google Cloud Vision `LABEL_DETECTION`.
    pub struct GoogleVisionLabeler {
        credential: ApiCredential,
        base_url: String,
        max_results: u32,
        timeout: Duration,
        client: reqwest::Client,
    }

    impl std::fmt::Debug for GoogleVisionLabeler {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("GoogleVisionLabeler")
                .field("credential", &self.credential)
                .field("base_url", &self.base_url)
                .field("max_results", &self.max_results)
                .finish()
        }
    }

    impl GoogleVisionLabeler {
        pub fn new(api_key: impl Into<String>) -> Self {
            Self::with_credential(ApiCredential::new(
                api_key,
                CredentialSource::Programmatic,
                "Google API key",
            ))
        }

        /// Reads `GOOGLE_API_KEY`, shared with the Gemini provider.
        pub fn from_env() -> Result<Self, LabelerError> {
            let credential = ApiCredential::from_env(GOOGLE_API_KEY_ENV, "Google API key")
                .map_err(|e| match e {
                    ProviderError::NotConfigured(msg) => LabelerError::NotConfigured(msg),
                    other => LabelerError::NotConfigured(other.to_string()),
                })?;
            Ok(Self::with_credential(credential))
        }

        fn with_credential(credential: ApiCredential) -> Self {
            Self {
                credential,
                base_url: DEFAULT_BASE_URL.to_string(),
                max_results: 10,
                timeout: Duration::from_secs(10),
                client: reqwest::Client::new(),
            }
        }

        pub fn with_max_results(mut self, max_results: u32) -> Self {
            self.max_results = max_results;
            self
        }

        pub fn with_timeout(mut self, timeout: Duration) -> Self {
            self.timeout = timeout;
            self
        }

        async fn annotate_once(&self, request: &AnnotateRequest) -> Result<Vec<String>, LabelerError> {
            let response = self
                .client
                .post(format!("{}/images:annotate", self.base_url))
                .header("x-goog-api-key", self.credential.expose())
                .timeout(self.timeout)
                .json(request)
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        LabelerError::Timeout(self.timeout)
                    } else {
                        LabelerError::HttpError(e.to_string())
                    }
                })?;

            let status = response.status();
            if status.as_u16() == 429 {
                return Err(LabelerError::RateLimited);
            }
            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(LabelerError::ApiError {
                    status: status.as_u16(),
                    message,
                });
            }

            let body: AnnotateResponse = response
                .json()
                .await
                .map_err(|e| LabelerError::ParseError(e.to_string()))?;

            body.into_labels()
        }
    }

    #[derive(Debug, Serialize)]
    struct AnnotateRequest {
        requests: Vec<ImageRequest>,
    }

    impl AnnotateRequest {
        fn new(image: &[u8], max_results: u32) -> Self {
            Self {
                requests: vec![ImageRequest {
                    image: ImageContent {
                        content: base64::engine::general_purpose::STANDARD.encode(image),
                    },
                    features: vec![Feature {
                        kind: "LABEL_DETECTION",
                        max_results,
                    }],
                }],
            }
        }
    }

    #[derive(Debug, Serialize)]
    struct ImageRequest {
        image: ImageContent,
        features: Vec<Feature>,
    }

    #[derive(Debug, Serialize)]
    struct ImageContent {
        content: String,
    }

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Feature {
        #[serde(rename = "type")]
        kind: &'static str,
        max_results: u32,
    }

    #[derive(Debug, Deserialize)]
    struct AnnotateResponse {
        #[serde(default)]
        responses: Vec<ImageResponse>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct ImageResponse {
        #[serde(default)]
        label_annotations: Vec<LabelAnnotation>,
        error: Option<VisionStatus>,
    }

    #[derive(Debug, Deserialize)]
    struct LabelAnnotation {
        description: String,
        #[serde(default)]
        score: f32,
    }

    #[derive(Debug, Deserialize)]
    struct VisionStatus {
        #[serde(default)]
        code: u16,
        #[serde(default)]
        message: String,
    }

    impl AnnotateResponse {
        fn into_labels(self) -> Result<Vec<String>, LabelerError> {
            let Some(response) = self.responses.into_iter().next() else {
                return Ok(Vec::new());
            };

            if let Some(error) = response.error {
                return Err(LabelerError::ApiError {
                    status: error.code,
                    message: error.message,
                });
            }

            let mut annotations = response.label_annotations;
            annotations.sort_by(|a, b| b.score.total_cmp(&a.score));
            Ok(annotations.into_iter().map(|a| a.description).collect())
        }
    }

    #[async_trait]
    impl ImageLabeler for GoogleVisionLabeler {
        async fn labels(&self, image: &[u8]) -> Result<Vec<String>, LabelerError> {
            let request = AnnotateRequest::new(image, self.max_results);

            (|| self.annotate_once(&request))
                .retry(ExponentialBuilder::default().with_max_times(2))
                .when(|e| matches!(e, LabelerError::RateLimited))
                .notify(|e, delay| {
                    tracing::warn!(error = %e, ?delay, "Vision rate limited, backing off");
                })
                .await
        }

        fn name(&self) -> &str {
            "google-vision"
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_request_encodes_image() {
            let request = AnnotateRequest::new(b"hello", 5);
            let json = serde_json::to_value(&request).unwrap();

            assert_eq!(json["requests"][0]["image"]["content"], "aGVsbG8=");
            assert_eq!(json["requests"][0]["features"][0]["type"], "LABEL_DETECTION");
            assert_eq!(json["requests"][0]["features"][0]["maxResults"], 5);
        }

        #[test]
        fn test_labels_sorted_by_score() {
            let body: AnnotateResponse = serde_json::from_value(serde_json::json!({
                "responses": [{
                    "labelAnnotations": [
                        { "description": "Tree", "score": 0.81 },
                        { "description": "Roof", "score": 0.97 },
                        { "description": "Sky", "score": 0.60 }
                    ]
                }]
            }))
            .unwrap();

            assert_eq!(body.into_labels().unwrap(), vec!["Roof", "Tree", "Sky"]);
        }

        #[test]
        fn test_no_annotations_is_empty() {
            let body: AnnotateResponse =
                serde_json::from_value(serde_json::json!({ "responses": [{}] })).unwrap();
            assert!(body.into_labels().unwrap().is_empty());
        }

        #[test]
        fn test_per_image_error_surfaces() {
            let body: AnnotateResponse = serde_json::from_value(serde_json::json!({
                "responses": [{ "error": { "code": 3, "message": "Bad image data." } }]
            }))
            .unwrap();

            assert!(matches!(
                body.into_labels(),
                Err(LabelerError::ApiError { status: 3, .. })
            ));
        }

        #[test]
        fn test_api_key_not_in_debug_output() {
            let secret = "AIza-vision-secret";
            let debug = format!("{:?}", GoogleVisionLabeler::new(secret));
            assert!(!debug.contains(secret));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_labeler_ignores_image() {
        let labeler = StaticLabeler::new(["Roof", "Tree"]);
        assert_eq!(labeler.labels(b"").await.unwrap(), vec!["Roof", "Tree"]);
        assert_eq!(labeler.labels(b"other").await.unwrap(), vec!["Roof", "Tree"]);
        assert_eq!(labeler.name(), "static");
    }
}
