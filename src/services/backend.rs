use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value as JsonValue;
use tracing::{info, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::models::quiz::QuizDefinition;
use crate::models::submission::{SubmissionPayload, SubmissionReceipt};
use crate::utils::time;

/// The tutoring backend as seen from the quiz player: one read, one write.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuizBackend: Send + Sync {
    async fn fetch_quiz(&self, quiz_id: &str) -> Result<QuizDefinition>;

    async fn submit_attempt(&self, payload: &SubmissionPayload) -> Result<SubmissionReceipt>;
}

#[derive(Clone)]
pub struct HttpQuizBackend {
    client: Client,
    base_url: Url,
}

impl HttpQuizBackend {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        info!("Quiz backend client configured for {}", base_url);
        Ok(Self { client, base_url })
    }

    fn quiz_url(&self, quiz_id: &str, tail: Option<&str>) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| Error::Config(format!("backend URL {} cannot be a base", self.base_url)))?;
            segments.pop_if_empty().extend(["api", "quizzes", quiz_id]);
            if let Some(tail) = tail {
                segments.push(tail);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl QuizBackend for HttpQuizBackend {
    async fn fetch_quiz(&self, quiz_id: &str) -> Result<QuizDefinition> {
        let url = self.quiz_url(quiz_id, None)?;
        let resp = self.client.get(url).send().await.map_err(|e| {
            warn!(quiz_id, error = %e, "quiz fetch failed");
            Error::QuizUnavailable(format!("could not reach quiz service: {}", e))
        })?;

        match resp.status() {
            s if s.is_success() => {}
            StatusCode::NOT_FOUND => {
                return Err(Error::NotFound(format!("quiz {} does not exist", quiz_id)))
            }
            s => {
                let body = resp.text().await.unwrap_or_default();
                warn!(quiz_id, status = %s, "quiz fetch rejected: {}", body);
                return Err(Error::QuizUnavailable(format!(
                    "quiz service responded with {}",
                    s
                )));
            }
        }

        resp.json::<QuizDefinition>()
            .await
            .map_err(|e| Error::QuizUnavailable(format!("malformed quiz definition: {}", e)))
    }

    async fn submit_attempt(&self, payload: &SubmissionPayload) -> Result<SubmissionReceipt> {
        let url = self.quiz_url(&payload.quiz_id, Some("submissions"))?;
        let resp = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| Error::Submission(format!("could not reach quiz service: {}", e)))?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            warn!(quiz_id = %payload.quiz_id, status = %status, "submission rejected: {}", body);
            return Err(Error::Submission(format!(
                "quiz service responded with {}",
                status
            )));
        }

        let response = if body.trim().is_empty() {
            JsonValue::Null
        } else {
            serde_json::from_str(&body).unwrap_or(JsonValue::String(body))
        };
        info!(quiz_id = %payload.quiz_id, "submission accepted by backend");
        Ok(SubmissionReceipt {
            submitted_at: time::now(),
            response,
        })
    }
}
