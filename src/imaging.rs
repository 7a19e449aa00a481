use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use tracing::debug;

use crate::error::ApiError;

/// Background removal is slow, so the processing call gets a generous
/// timeout. Deletes and health checks must stay snappy.
const PROCESS_TIMEOUT: Duration = Duration::from_secs(120);
const DELETE_TIMEOUT: Duration = Duration::from_secs(30);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Artifact pair returned by the image processing service for one upload.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ProcessedImage {
    pub processed_url: String,
    pub original_url: String,
    pub file_name: String,
    pub file_size: i64,
}

/// Which half of the artifact pair to delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteScope {
    Original,
    Processed,
    Both,
}

impl DeleteScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeleteScope::Original => "original",
            DeleteScope::Processed => "processed",
            DeleteScope::Both => "both",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ImagingError {
    /// Transport-level failure: could not reach the service or it timed out.
    #[error("image service unavailable: {0}")]
    Unavailable(String),
    /// The service answered but reported a failure of its own.
    #[error("{message}")]
    Failed { code: String, message: String },
}

impl From<ImagingError> for ApiError {
    fn from(e: ImagingError) -> Self {
        match e {
            ImagingError::Unavailable(detail) => ApiError::CollaboratorUnavailable(detail),
            ImagingError::Failed { code, message } => ApiError::ProcessingFailed { code, message },
        }
    }
}

#[async_trait]
pub trait ImageProcessor: Send + Sync {
    async fn process(
        &self,
        file_name: &str,
        content_type: &str,
        body: Bytes,
    ) -> Result<ProcessedImage, ImagingError>;
    async fn delete(&self, file_name: &str, scope: DeleteScope) -> Result<(), ImagingError>;
    async fn health(&self) -> Result<serde_json::Value, ImagingError>;
}

/// Response envelope the image service wraps everything in.
#[derive(Debug, Deserialize)]
struct ServiceResponse {
    success: bool,
    #[serde(default)]
    data: Option<ProcessedImage>,
    #[serde(default)]
    error: Option<ServiceError>,
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    #[serde(default = "default_error_code")]
    code: String,
    #[serde(default = "default_error_message")]
    message: String,
}

fn default_error_code() -> String {
    "PROCESSING_FAILED".into()
}

fn default_error_message() -> String {
    "Image processing failed".into()
}

fn interpret(resp: ServiceResponse) -> Result<ProcessedImage, ImagingError> {
    if resp.success {
        resp.data.ok_or_else(|| {
            ImagingError::Unavailable("image service returned success without data".into())
        })
    } else {
        let err = resp.error.unwrap_or(ServiceError {
            code: default_error_code(),
            message: default_error_message(),
        });
        Err(ImagingError::Failed {
            code: err.code,
            message: err.message,
        })
    }
}

/// HTTP client for the image processing collaborator.
#[derive(Clone)]
pub struct HttpImageProcessor {
    client: reqwest::Client,
    base_url: String,
}

impl HttpImageProcessor {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ImageProcessor for HttpImageProcessor {
    async fn process(
        &self,
        file_name: &str,
        content_type: &str,
        body: Bytes,
    ) -> Result<ProcessedImage, ImagingError> {
        let part = reqwest::multipart::Part::stream(body)
            .file_name(file_name.to_string())
            .mime_str(content_type)
            .map_err(|e| ImagingError::Unavailable(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("image", part);

        let response = self
            .client
            .post(format!("{}/images/process", self.base_url))
            .timeout(PROCESS_TIMEOUT)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ImagingError::Unavailable(e.to_string()))?;

        let parsed: ServiceResponse = response
            .json()
            .await
            .map_err(|e| ImagingError::Unavailable(e.to_string()))?;
        let image = interpret(parsed)?;
        debug!(file_name = %image.file_name, file_size = image.file_size, "image processed");
        Ok(image)
    }

    /// Deleting an already-absent artifact is not an error on the service
    /// side, so a successful round trip is all we check for.
    async fn delete(&self, file_name: &str, scope: DeleteScope) -> Result<(), ImagingError> {
        let response = self
            .client
            .delete(format!("{}/images/{}", self.base_url, file_name))
            .timeout(DELETE_TIMEOUT)
            .query(&[("type", scope.as_str())])
            .send()
            .await
            .map_err(|e| ImagingError::Unavailable(e.to_string()))?;

        if response.status().is_server_error() {
            return Err(ImagingError::Failed {
                code: "SERVER_ERROR".into(),
                message: format!("image delete returned {}", response.status()),
            });
        }
        debug!(%file_name, scope = scope.as_str(), "image artifacts deleted");
        Ok(())
    }

    async fn health(&self) -> Result<serde_json::Value, ImagingError> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .map_err(|e| ImagingError::Unavailable(e.to_string()))?;
        response
            .json()
            .await
            .map_err(|e| ImagingError::Unavailable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_scope_matches_wire_values() {
        assert_eq!(DeleteScope::Original.as_str(), "original");
        assert_eq!(DeleteScope::Processed.as_str(), "processed");
        assert_eq!(DeleteScope::Both.as_str(), "both");
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = HttpImageProcessor::new("http://localhost:3002/");
        assert_eq!(client.base_url, "http://localhost:3002");
    }

    #[test]
    fn interpret_success_returns_artifact_pair() {
        let resp: ServiceResponse = serde_json::from_str(
            r#"{
                "success": true,
                "data": {
                    "processed_url": "http://img/storage/processed/a.png",
                    "original_url": "http://img/storage/original/a.jpg",
                    "file_name": "a.png",
                    "file_size": 1234
                }
            }"#,
        )
        .unwrap();
        let image = interpret(resp).unwrap();
        assert_eq!(image.file_name, "a.png");
        assert_eq!(image.file_size, 1234);
    }

    #[test]
    fn interpret_failure_keeps_code_and_message() {
        let resp: ServiceResponse = serde_json::from_str(
            r#"{"success": false, "error": {"code": "INVALID_FILE_TYPE", "message": "Invalid file type"}}"#,
        )
        .unwrap();
        match interpret(resp) {
            Err(ImagingError::Failed { code, message }) => {
                assert_eq!(code, "INVALID_FILE_TYPE");
                assert_eq!(message, "Invalid file type");
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn interpret_failure_without_error_body_uses_defaults() {
        let resp: ServiceResponse = serde_json::from_str(r#"{"success": false}"#).unwrap();
        match interpret(resp) {
            Err(ImagingError::Failed { code, .. }) => assert_eq!(code, "PROCESSING_FAILED"),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn interpret_success_without_data_is_unavailable() {
        let resp: ServiceResponse = serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert!(matches!(interpret(resp), Err(ImagingError::Unavailable(_))));
    }
}
