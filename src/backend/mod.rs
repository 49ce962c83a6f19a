/// Backend collaborators: weight prediction, pattern recognition, and
/// final submission
///
/// The backend owns the schemas; this client only depends on three logical
/// operations and a `{success, error?, data?}` envelope, decoded into an
/// explicit `Result` so every call site handles both outcomes. There are no
/// automatic retries — failures surface immediately and the user retries
/// explicitly.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::measure::engine::{RemotePrediction, RemotePredictionRequest, WeightBackend};
use crate::pattern::{PatternBackend, PatternSubmission, PatternVerdict};
use crate::workflow::{Recommendation, VerificationStepState};

/// Environment variable overriding the backend base URL
pub const BACKEND_URL_ENV: &str = "HERDCHECK_BACKEND_URL";

const DEFAULT_BACKEND_URL: &str = "http://localhost:4000";

/// What went wrong talking to the backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The request never completed (DNS, connection, timeout)
    #[error("request failed: {0}")]
    Transport(String),

    /// The backend answered with success:false
    #[error("{0}")]
    Rejected(String),

    /// The body did not match the expected envelope
    #[error("malformed response: {0}")]
    Decode(String),
}

/// Standard response envelope used by every backend endpoint
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    data: Option<T>,
}

impl<T> Envelope<T> {
    fn into_result(self) -> Result<T, RemoteError> {
        if self.success {
            self.data
                .ok_or_else(|| RemoteError::Decode("success without data".to_string()))
        } else {
            Err(RemoteError::Rejected(
                self.error.unwrap_or_else(|| "unspecified error".to_string()),
            ))
        }
    }
}

/// Final decision payload for `submit_verification_decision`
#[derive(Debug, Clone, Serialize)]
pub struct DecisionPayload {
    pub application_id: String,
    pub verification_score: f64,
    pub recommendation: &'static str,
    pub submitted_at: String,
    pub steps: serde_json::Value,
}

impl DecisionPayload {
    pub fn new(
        application_id: &str,
        state: &VerificationStepState,
        score: f64,
        recommendation: Recommendation,
    ) -> Self {
        Self {
            application_id: application_id.to_string(),
            verification_score: score,
            recommendation: recommendation.as_str(),
            submitted_at: Utc::now().to_rfc3339(),
            steps: state.to_payload(),
        }
    }
}

/// Acknowledgement of an accepted submission
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubmissionAck {
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// HTTP client for the verification backend
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Base URL from `HERDCHECK_BACKEND_URL`, falling back to localhost
    pub fn from_env() -> Self {
        let base_url =
            std::env::var(BACKEND_URL_ENV).unwrap_or_else(|_| DEFAULT_BACKEND_URL.to_string());
        Self::new(base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<Req: Serialize, Resp: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &Req,
    ) -> Result<Resp, RemoteError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        let envelope: Envelope<Resp> = response
            .json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))?;
        envelope.into_result()
    }

    /// Finalize the verification workflow for an application
    pub async fn submit_verification_decision(
        &self,
        payload: &DecisionPayload,
    ) -> Result<SubmissionAck, RemoteError> {
        let path = format!("/api/applications/{}/decision", payload.application_id);
        self.post(&path, payload).await
    }
}

impl WeightBackend for BackendClient {
    async fn predict_weight(
        &self,
        request: &RemotePredictionRequest,
    ) -> Result<RemotePrediction, RemoteError> {
        self.post("/api/predictions/weight", request).await
    }
}

/// Wire form of a pattern submission: images travel as data URIs
#[derive(Debug, Serialize)]
struct PatternRequestBody<'a> {
    application_id: &'a str,
    image: String,
    selection: crate::selector::SelectionRect,
}

impl PatternBackend for BackendClient {
    async fn process_pattern(
        &self,
        submission: &PatternSubmission,
    ) -> Result<PatternVerdict, RemoteError> {
        let body = PatternRequestBody {
            application_id: &submission.application_id,
            image: submission.cropped_image.to_data_uri(),
            selection: submission.selection,
        };
        self.post("/api/patterns/process", &body).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn envelope<T: for<'de> Deserialize<'de>>(value: serde_json::Value) -> Envelope<T> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn success_envelope_yields_the_data() {
        let env: Envelope<SubmissionAck> = envelope(json!({
            "success": true,
            "data": { "reference": "VRF-42" }
        }));
        let ack = env.into_result().unwrap();
        assert_eq!(ack.reference.as_deref(), Some("VRF-42"));
    }

    #[test]
    fn failure_envelope_yields_the_backend_message() {
        let env: Envelope<SubmissionAck> = envelope(json!({
            "success": false,
            "error": "application already decided"
        }));
        assert_eq!(
            env.into_result(),
            Err(RemoteError::Rejected(
                "application already decided".to_string()
            ))
        );
    }

    #[test]
    fn failure_without_message_still_fails() {
        let env: Envelope<SubmissionAck> = envelope(json!({ "success": false }));
        assert!(matches!(env.into_result(), Err(RemoteError::Rejected(_))));
    }

    #[test]
    fn success_without_data_is_a_decode_error() {
        let env: Envelope<SubmissionAck> = envelope(json!({ "success": true }));
        assert!(matches!(env.into_result(), Err(RemoteError::Decode(_))));
    }

    #[test]
    fn verdict_deserializes_from_the_wire_shape() {
        let verdict: PatternVerdict = serde_json::from_value(json!({
            "pattern_hash": "9f8e7d",
            "confidence": 0.81,
            "features": ["ridge_density", "groove_map"],
            "is_duplicate": true,
            "duplicate_applicant_name": "J. Mwangi"
        }))
        .unwrap();
        assert!(verdict.is_duplicate);
        assert_eq!(verdict.features.len(), 2);
    }

    #[test]
    fn decision_payload_carries_score_recommendation_and_steps() {
        let mut state = VerificationStepState::new();
        let mut record = crate::workflow::StepRecord::new();
        record.insert("national_id_sighted".to_string(), json!(true));
        state.merge(crate::workflow::StepId::Documents, record);

        let payload = DecisionPayload::new("APP-3", &state, 25.0, Recommendation::Approve);
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["application_id"], json!("APP-3"));
        assert_eq!(value["recommendation"], json!("approve"));
        assert_eq!(value["verification_score"], json!(25.0));
        assert_eq!(value["steps"]["documents"]["national_id_sighted"], json!(true));
        assert!(value["submitted_at"].as_str().unwrap().contains('T'));
    }
}
