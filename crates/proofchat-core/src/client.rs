use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CoreError, ResultExt};

/// One prior exchange as the backend sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub prompt: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRequest {
    pub prompt: String,
    pub history: Vec<HistoryEntry>,
    pub kb_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionResponse {
    pub answer: String,
    #[serde(default)]
    pub latex_macros: HashMap<String, String>,
}

/// Sends one request to the reasoning backend.
///
/// Every failure is reported as [`CoreError::SubmissionFailed`]; callers do
/// not retry or distinguish causes.
#[async_trait]
pub trait SubmissionClient: Send + Sync {
    async fn submit(&self, request: &SubmissionRequest) -> Result<SubmissionResponse, CoreError>;
}

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";

/// JSON-over-HTTP client for the FastAPI reasoning backend.
#[derive(Clone)]
pub struct HttpSubmissionClient {
    client: Client,
    base_url: String,
}

impl HttpSubmissionClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the backend's tactic status document as-is.
    pub async fn tactics_status(&self) -> Result<serde_json::Value, CoreError> {
        let url = format!("{}/tactics/", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .submission("GET /tactics/")?;

        if !response.status().is_success() {
            return Err(CoreError::SubmissionFailed(format!(
                "GET /tactics/ returned status {}",
                response.status()
            )));
        }

        response.json().await.submission("decoding /tactics/")
    }
}

#[async_trait]
impl SubmissionClient for HttpSubmissionClient {
    async fn submit(&self, request: &SubmissionRequest) -> Result<SubmissionResponse, CoreError> {
        let url = format!("{}/submit_prompt/", self.base_url);
        debug!(
            kb_label = %request.kb_label,
            history_len = request.history.len(),
            "submitting prompt"
        );

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .submission("POST /submit_prompt/")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            warn!(%status, "backend rejected prompt");
            return Err(CoreError::SubmissionFailed(format!(
                "backend error {}: {}",
                status, text
            )));
        }

        response
            .json::<SubmissionResponse>()
            .await
            .submission("decoding /submit_prompt/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> SubmissionRequest {
        SubmissionRequest {
            prompt: "Prove p_i.\n\np_i: 1+1=2".to_string(),
            history: vec![HistoryEntry {
                prompt: "Is p_i correct?".to_string(),
                answer: "Yes.".to_string(),
            }],
            kb_label: "lm_theory".to_string(),
        }
    }

    #[tokio::test]
    async fn posts_request_and_decodes_answer() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/submit_prompt/"))
            .and(body_json(serde_json::json!({
                "prompt": "Prove p_i.\n\np_i: 1+1=2",
                "history": [{"prompt": "Is p_i correct?", "answer": "Yes."}],
                "kb_label": "lm_theory"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "answer": "By \\(\\mathrm{succ}\\).",
                "latex_macros": {"\\N": "\\mathbb{N}"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpSubmissionClient::new(&server.uri());
        let response = client.submit(&request()).await.unwrap();
        assert_eq!(response.answer, "By \\(\\mathrm{succ}\\).");
        assert_eq!(
            response.latex_macros.get("\\N").map(String::as_str),
            Some("\\mathbb{N}")
        );
    }

    #[tokio::test]
    async fn missing_macros_default_to_empty() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/submit_prompt/"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"answer": "True."})),
            )
            .mount(&server)
            .await;

        let client = HttpSubmissionClient::new(&format!("{}/", server.uri()));
        let response = client.submit(&request()).await.unwrap();
        assert_eq!(response.answer, "True.");
        assert!(response.latex_macros.is_empty());
    }

    #[tokio::test]
    async fn server_error_is_submission_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = HttpSubmissionClient::new(&server.uri());
        let err = client.submit(&request()).await.unwrap_err();
        assert!(matches!(err, CoreError::SubmissionFailed(ref msg) if msg.contains("500")));
    }

    #[tokio::test]
    async fn malformed_body_is_submission_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = HttpSubmissionClient::new(&server.uri());
        let err = client.submit(&request()).await.unwrap_err();
        assert!(matches!(err, CoreError::SubmissionFailed(_)));
    }

    #[tokio::test]
    async fn tactics_status_passes_document_through() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/tactics/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "prove": "implemented",
                "geometry": "not implemented"
            })))
            .mount(&server)
            .await;

        let client = HttpSubmissionClient::new(&server.uri());
        let status = client.tactics_status().await.unwrap();
        assert_eq!(status["prove"], "implemented");
    }
}
