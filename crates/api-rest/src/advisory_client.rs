//! HTTP client for the external advisory service.
//!
//! The service is expected to expose three JSON endpoints under its base URL:
//!
//! - `POST {base}/score` with `{"patients": [AdvisoryInput...]}`, answering with a list of
//!   `{id, score, rationale}` (or the older `{id, priorityScore, clinicalInsight}`)
//! - `POST {base}/summary` with the corridor statistics, answering `{"summary": "..."}`
//! - `POST {base}/handover` with `{"corridor": "...", "patients": [AdvisoryInput...]}`,
//!   answering `{"handover": "..."}`
//!
//! Any transport or decoding failure is reported as `CollaboratorUnavailable`.

use async_trait::async_trait;
use corridor_core::advisory::{AdvisoryInput, AdvisoryScore, AdvisoryService, NarrativeRequest};
use corridor_core::{CorridorError, CorridorResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Serialize)]
struct ScoreRequest<'a> {
    patients: &'a [AdvisoryInput],
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScoreResponse {
    Bare(Vec<AdvisoryScore>),
    Wrapped { scores: Vec<AdvisoryScore> },
}

#[derive(Serialize)]
struct HandoverRequest<'a> {
    corridor: &'a str,
    patients: &'a [AdvisoryInput],
}

#[derive(Deserialize)]
struct SummaryResponse {
    summary: String,
}

#[derive(Deserialize)]
struct HandoverResponse {
    handover: String,
}

#[derive(Clone, Debug)]
pub struct HttpAdvisoryClient {
    client: reqwest::Client,
    base_url: String,
}

fn unavailable(e: reqwest::Error) -> CorridorError {
    CorridorError::CollaboratorUnavailable(e.to_string())
}

impl HttpAdvisoryClient {
    /// # Errors
    ///
    /// Returns [`CorridorError::Validation`] if the URL is blank, or
    /// [`CorridorError::CollaboratorUnavailable`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> CorridorResult<Self> {
        let base_url = base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(CorridorError::Validation(
                "advisory base URL cannot be empty".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(unavailable)?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post(&self, path: &str, body: &impl Serialize) -> CorridorResult<reqwest::Response> {
        self.client
            .post(format!("{}/{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .map_err(unavailable)?
            .error_for_status()
            .map_err(unavailable)
    }
}

#[async_trait]
impl AdvisoryService for HttpAdvisoryClient {
    async fn score(&self, inputs: &[AdvisoryInput]) -> CorridorResult<Vec<AdvisoryScore>> {
        let response = self.post("score", &ScoreRequest { patients: inputs }).await?;

        match response.json::<ScoreResponse>().await.map_err(unavailable)? {
            ScoreResponse::Bare(scores) | ScoreResponse::Wrapped { scores } => Ok(scores),
        }
    }

    async fn narrate(&self, request: NarrativeRequest<'_>) -> CorridorResult<String> {
        match request {
            NarrativeRequest::Summary(stats) => {
                let response = self.post("summary", stats).await?;
                let body: SummaryResponse = response.json().await.map_err(unavailable)?;
                Ok(body.summary)
            }
            NarrativeRequest::Handover { corridor, patients } => {
                let response = self
                    .post("handover", &HandoverRequest { corridor, patients })
                    .await?;
                let body: HandoverResponse = response.json().await.map_err(unavailable)?;
                Ok(body.handover)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_trailing_slash_and_rejects_blank_url() {
        let client = HttpAdvisoryClient::new(" http://advisor.local/ ", Duration::from_secs(1))
            .unwrap();
        assert_eq!(client.base_url(), "http://advisor.local");

        assert!(matches!(
            HttpAdvisoryClient::new("  ", Duration::from_secs(1)),
            Err(CorridorError::Validation(_))
        ));
    }

    #[test]
    fn score_response_accepts_bare_and_wrapped_lists() {
        let bare: ScoreResponse =
            serde_json::from_str(r#"[{"id":"a","priorityScore":80,"clinicalInsight":"x"}]"#)
                .unwrap();
        let wrapped: ScoreResponse =
            serde_json::from_str(r#"{"scores":[{"id":"a","score":80}]}"#).unwrap();

        for parsed in [bare, wrapped] {
            match parsed {
                ScoreResponse::Bare(scores) | ScoreResponse::Wrapped { scores } => {
                    assert_eq!(scores.len(), 1);
                    assert_eq!(scores[0].score, 80.0);
                }
            }
        }
    }

    #[test]
    fn handover_request_carries_corridor_and_patients() {
        let body = serde_json::to_value(HandoverRequest {
            corridor: "Corridor 1",
            patients: &[],
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"corridor": "Corridor 1", "patients": []}));

        let parsed: HandoverResponse =
            serde_json::from_str(r#"{"handover":"All stable."}"#).unwrap();
        assert_eq!(parsed.handover, "All stable.");
    }

    #[tokio::test]
    async fn unreachable_service_is_unavailable() {
        let client =
            HttpAdvisoryClient::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let err = client.score(&[]).await.unwrap_err();
        assert!(matches!(err, CorridorError::CollaboratorUnavailable(_)));

        let handover = NarrativeRequest::Handover {
            corridor: "Corridor 1",
            patients: &[],
        };
        let err = client.narrate(handover).await.unwrap_err();
        assert!(matches!(err, CorridorError::CollaboratorUnavailable(_)));
    }
}
