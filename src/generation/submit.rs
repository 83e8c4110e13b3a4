//! Submission of full-course generation jobs to the producer service.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::models::{FullGenerationRequest, SubmitResponse};
use crate::errors::SubmitError;

/// Path of the generation endpoint, relative to the API base URL.
pub const GENERATE_FULL_PATH: &str = "/courses/generate-full";

/// Abstraction over the submission call for testability.
/// Real implementation: `HttpSubmitter`.
#[async_trait]
pub trait JobSubmitter: Send + Sync {
    /// Ask the producer to start generating. Resolves once the request is
    /// accepted; progress arrives later over the channel.
    async fn submit(&self, request: &FullGenerationRequest)
    -> Result<SubmitResponse, SubmitError>;
}

pub struct HttpSubmitter {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpSubmitter {
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, GENERATE_FULL_PATH)
    }
}

#[async_trait]
impl JobSubmitter for HttpSubmitter {
    async fn submit(
        &self,
        request: &FullGenerationRequest,
    ) -> Result<SubmitResponse, SubmitError> {
        let url = self.endpoint();
        let mut builder = self
            .client
            .post(&url)
            .header("Accept", "application/json")
            .header("User-Agent", "coursegen")
            .json(request);
        if let Some(token) = &self.token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }

        let resp = builder.send().await.map_err(|source| SubmitError::Transport {
            url: url.clone(),
            source,
        })?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|source| SubmitError::Transport {
                url: url.clone(),
                source,
            })?;
        debug!(status = status.as_u16(), "Generation request answered");

        if !status.is_success() {
            return Err(SubmitError::Rejected {
                status: status.as_u16(),
                message: error_message(&body, status.canonical_reason()),
            });
        }

        if body.trim().is_empty() {
            return Ok(SubmitResponse::default());
        }
        serde_json::from_str(&body).map_err(|e| SubmitError::InvalidResponse(e.to_string()))
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
    message: Option<String>,
}

/// Pull a human-readable message out of an error response body.
fn error_message(body: &str, fallback: Option<&str>) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        match parsed.detail {
            Some(serde_json::Value::String(s)) if !s.is_empty() => return s,
            Some(other @ (serde_json::Value::Array(_) | serde_json::Value::Object(_))) => {
                return other.to_string();
            }
            _ => {}
        }
        if let Some(message) = parsed.message.filter(|m| !m.is_empty()) {
            return message;
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        fallback.unwrap_or("Request failed").to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, http::StatusCode, routing::post};

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let submitter = HttpSubmitter::new("http://localhost:8000/api/", None);
        assert_eq!(
            submitter.endpoint(),
            "http://localhost:8000/api/courses/generate-full"
        );
    }

    #[test]
    fn test_error_message_prefers_detail() {
        assert_eq!(
            error_message(r#"{"detail": "Topic is required"}"#, None),
            "Topic is required"
        );
        assert_eq!(
            error_message(r#"{"message": "Quota exceeded"}"#, None),
            "Quota exceeded"
        );
    }

    #[test]
    fn test_error_message_validation_detail_is_serialized() {
        let msg = error_message(r#"{"detail": [{"loc": ["body", "topic"]}]}"#, None);
        assert!(msg.contains("topic"));
    }

    #[test]
    fn test_error_message_falls_back_to_body_then_reason() {
        assert_eq!(error_message("Bad Gateway\n", None), "Bad Gateway");
        assert_eq!(
            error_message("", Some("Internal Server Error")),
            "Internal Server Error"
        );
        assert_eq!(error_message("", None), "Request failed");
    }

    async fn serve(app: Router) -> Option<String> {
        let listener = match tokio::net::TcpListener::bind("127.0.0.1:0").await {
            Ok(l) => l,
            Err(e) => {
                eprintln!("Skipping HTTP submit test (sandbox): {:?}", e);
                return None;
            }
        };
        let addr = listener.local_addr().ok()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Some(format!("http://{}", addr))
    }

    #[tokio::test]
    async fn test_submit_accepted_returns_note() {
        let app = Router::new().route(
            GENERATE_FULL_PATH,
            post(|Json(req): Json<serde_json::Value>| async move {
                assert_eq!(req["noOfChapters"], 5);
                Json(serde_json::json!({ "note": "Queued behind 2 jobs" }))
            }),
        );
        let Some(base) = serve(app).await else { return };

        let submitter = HttpSubmitter::new(&base, Some("secret".to_string()));
        let response = submitter
            .submit(&FullGenerationRequest::new("Rust ownership"))
            .await
            .unwrap();
        assert_eq!(response.note.as_deref(), Some("Queued behind 2 jobs"));
    }

    #[tokio::test]
    async fn test_submit_rejected_carries_status_and_detail() {
        let app = Router::new().route(
            GENERATE_FULL_PATH,
            post(|| async {
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(serde_json::json!({ "detail": "Topic too short" })),
                )
            }),
        );
        let Some(base) = serve(app).await else { return };

        let submitter = HttpSubmitter::new(&base, None);
        let err = submitter
            .submit(&FullGenerationRequest::new("Rust"))
            .await
            .unwrap_err();
        match err {
            SubmitError::Rejected { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(message, "Topic too short");
            }
            other => panic!("Expected Rejected, got {:?}", other),
        }
    }
}
