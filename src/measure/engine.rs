/// Estimation engine: modes, remote delegation, combining, dispatch gating
///
/// Manual mode is the pure formula. AI mode delegates to the backend's
/// estimation endpoint. Both mode runs the two paths and reports the
/// components, their combined value, and an agreement score — neither
/// estimate is ever silently discarded in favor of the other.
///
/// `AutoTrigger` and `ResponseGate` govern how the UI dispatches estimation
/// tasks: exactly one automatic attempt per completed image pair, and stale
/// responses (arriving after the user cleared or replaced inputs) are
/// dropped instead of landing on cleared state.

use serde::{Deserialize, Serialize};

use crate::backend::RemoteError;
use crate::capture::ImageBuffer;
use crate::error::EstimateError;
use crate::measure::formula::ManualMeasurement;

/// How the operator wants the weight estimated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionMode {
    /// Tape measurements and the heart-girth formula only
    Manual,
    /// Remote estimation from the two side photos only
    Ai,
    /// Both paths, combined and cross-checked
    Both,
}

impl PredictionMode {
    pub const ALL: [PredictionMode; 3] =
        [PredictionMode::Manual, PredictionMode::Ai, PredictionMode::Both];

    /// Whether completing the side-photo pair should start estimation
    /// without an explicit user action. Manual mode never auto-fires: it
    /// depends on numbers the operator may still be editing.
    pub fn auto_triggers(&self) -> bool {
        !matches!(self, PredictionMode::Manual)
    }
}

impl std::fmt::Display for PredictionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            PredictionMode::Manual => "Manual (tape measure)",
            PredictionMode::Ai => "AI (side photos)",
            PredictionMode::Both => "Both (cross-checked)",
        })
    }
}

/// One estimation attempt, built fresh from the current form state
#[derive(Debug, Clone)]
pub struct WeightPredictionRequest {
    pub application_id: String,
    pub left_image: Option<ImageBuffer>,
    pub right_image: Option<ImageBuffer>,
    pub breed: String,
    pub age_years: f64,
    pub mode: PredictionMode,
    pub measurement: Option<ManualMeasurement>,
}

/// What the engine reports back to the UI
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightPredictionResult {
    pub manual_weight_kg: Option<f64>,
    pub ai_weight_kg: Option<f64>,
    pub combined_weight_kg: Option<f64>,
    /// Remote service's confidence in its own estimate, 0..1
    pub confidence_score: Option<f64>,
    /// How closely the two estimates agree, 0..1 (client-side)
    pub agreement_score: Option<f64>,
    pub measurement: Option<ManualMeasurement>,
    /// Free-text reasoning passed through from the remote service
    pub processing_notes: Vec<String>,
}

impl WeightPredictionResult {
    /// Absolute difference between the two estimates when both are present
    pub fn estimate_difference_kg(&self) -> Option<f64> {
        match (self.manual_weight_kg, self.ai_weight_kg) {
            (Some(m), Some(a)) => Some((m - a).abs()),
            _ => None,
        }
    }
}

/// Wire request for the remote estimation endpoint
#[derive(Debug, Clone, Serialize)]
pub struct RemotePredictionRequest {
    pub application_id: String,
    pub breed: String,
    pub age_years: f64,
    /// Side photos as base64 data URIs
    pub left_image: String,
    pub right_image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurement: Option<ManualMeasurement>,
}

/// Wire response from the remote estimation endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct RemotePrediction {
    pub weight_kg: f64,
    #[serde(default)]
    pub confidence: Option<f64>,
    /// Backend-owned blend of manual and AI estimates, when it supplies one
    #[serde(default)]
    pub combined_weight_kg: Option<f64>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// Seam to the remote estimation service, faked in tests
pub trait WeightBackend {
    async fn predict_weight(
        &self,
        request: &RemotePredictionRequest,
    ) -> Result<RemotePrediction, RemoteError>;
}

/// Run one estimation attempt. Deterministic in manual mode; AI and Both
/// modes surface whatever the remote service returns, with failures mapped
/// to `RemoteEstimation` and left for the user to retry explicitly.
pub async fn estimate<B: WeightBackend>(
    backend: &B,
    request: &WeightPredictionRequest,
) -> Result<WeightPredictionResult, EstimateError> {
    match request.mode {
        PredictionMode::Manual => {
            let measurement = request
                .measurement
                .ok_or(EstimateError::MissingMeasurement)?;
            let manual = measurement.weight_kg()?;
            Ok(WeightPredictionResult {
                manual_weight_kg: Some(manual),
                measurement: Some(measurement),
                ..Default::default()
            })
        }
        PredictionMode::Ai => {
            let remote = call_remote(backend, request).await?;
            let mut result = WeightPredictionResult {
                ai_weight_kg: Some(remote.weight_kg),
                confidence_score: remote.confidence,
                ..Default::default()
            };
            if let Some(reasoning) = remote.reasoning {
                result.processing_notes.push(reasoning);
            }
            Ok(result)
        }
        PredictionMode::Both => {
            let measurement = request
                .measurement
                .ok_or(EstimateError::MissingMeasurement)?;
            let manual = measurement.weight_kg()?;
            let remote = call_remote(backend, request).await?;

            let (combined, agreement) = combine_estimates(manual, &remote);
            let mut result = WeightPredictionResult {
                manual_weight_kg: Some(manual),
                ai_weight_kg: Some(remote.weight_kg),
                combined_weight_kg: Some(combined),
                confidence_score: remote.confidence,
                agreement_score: Some(agreement),
                measurement: Some(measurement),
                ..Default::default()
            };
            if let Some(reasoning) = remote.reasoning {
                result.processing_notes.push(reasoning);
            }
            Ok(result)
        }
    }
}

async fn call_remote<B: WeightBackend>(
    backend: &B,
    request: &WeightPredictionRequest,
) -> Result<RemotePrediction, EstimateError> {
    let (left, right) = match (&request.left_image, &request.right_image) {
        (Some(left), Some(right)) => (left, right),
        _ => return Err(EstimateError::MissingSideImages),
    };

    let remote_request = RemotePredictionRequest {
        application_id: request.application_id.clone(),
        breed: request.breed.clone(),
        age_years: request.age_years,
        left_image: left.to_data_uri(),
        right_image: right.to_data_uri(),
        measurement: request.measurement,
    };

    backend
        .predict_weight(&remote_request)
        .await
        .map_err(|e| EstimateError::RemoteEstimation(e.to_string()))
}

/// Combined value and agreement score for Both mode. The blend itself is
/// backend-owned when the service supplies one; the plain mean is only the
/// fallback. Agreement is the relative closeness of the two estimates.
fn combine_estimates(manual_kg: f64, remote: &RemotePrediction) -> (f64, f64) {
    let ai_kg = remote.weight_kg;
    let mean = (manual_kg + ai_kg) / 2.0;
    let combined = remote.combined_weight_kg.unwrap_or(mean);
    let agreement = if mean > 0.0 {
        (1.0 - (manual_kg - ai_kg).abs() / mean).clamp(0.0, 1.0)
    } else {
        0.0
    };
    (combined, agreement)
}

/// Fires estimation exactly once per completed side-photo pair.
///
/// The condition checks presence of both images, not arrival order: filling
/// right before left still fires exactly once, when the second image lands.
/// Clearing or replacing a photo re-arms the trigger.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoTrigger {
    fired: bool,
}

impl AutoTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report the current pair state; returns true when estimation should
    /// start now
    pub fn on_images_changed(&mut self, left_present: bool, right_present: bool) -> bool {
        if left_present && right_present {
            if self.fired {
                return false;
            }
            self.fired = true;
            return true;
        }
        self.fired = false;
        false
    }

    /// Re-arm after a photo is replaced or the form is cleared
    pub fn reset(&mut self) {
        self.fired = false;
    }
}

/// Generation counter that drops stale async responses.
///
/// Each dispatched request carries the token issued for it; a response is
/// applied only if its token is still current. Cancelling (clearing the
/// form, replacing inputs) bumps the generation so in-flight responses are
/// ignored rather than landing on cleared state.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseGate {
    current: u64,
}

impl ResponseGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a token for a request about to be dispatched
    pub fn issue(&mut self) -> u64 {
        self.current += 1;
        self.current
    }

    /// Whether a response with this token may be applied
    pub fn accepts(&self, token: u64) -> bool {
        token == self.current
    }

    /// Invalidate every outstanding token
    pub fn cancel(&mut self) {
        self.current += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedBackend {
        response: Result<RemotePrediction, RemoteError>,
    }

    impl WeightBackend for FixedBackend {
        async fn predict_weight(
            &self,
            _request: &RemotePredictionRequest,
        ) -> Result<RemotePrediction, RemoteError> {
            self.response.clone()
        }
    }

    fn side_photo() -> ImageBuffer {
        ImageBuffer {
            bytes: vec![0xFF, 0xD8, 0xFF, 0xD9],
            mime: "image/jpeg".to_string(),
            width: 4,
            height: 3,
        }
    }

    fn request(mode: PredictionMode) -> WeightPredictionRequest {
        WeightPredictionRequest {
            application_id: "APP-001".to_string(),
            left_image: Some(side_photo()),
            right_image: Some(side_photo()),
            breed: "Boran".to_string(),
            age_years: 3.0,
            mode,
            measurement: Some(ManualMeasurement {
                heart_girth_cm: 180.0,
                body_length_cm: 150.0,
                reference_length_cm: None,
            }),
        }
    }

    fn prediction(weight_kg: f64) -> RemotePrediction {
        RemotePrediction {
            weight_kg,
            confidence: Some(0.9),
            combined_weight_kg: None,
            reasoning: Some("stereo girth fit".to_string()),
        }
    }

    #[tokio::test]
    async fn manual_mode_is_the_pure_formula() {
        let backend = FixedBackend {
            response: Err(RemoteError::Transport("must not be called".to_string())),
        };
        let result = estimate(&backend, &request(PredictionMode::Manual))
            .await
            .unwrap();
        assert!((result.manual_weight_kg.unwrap() - 162.0).abs() < 1e-6);
        assert_eq!(result.ai_weight_kg, None);
        assert_eq!(result.combined_weight_kg, None);
    }

    #[tokio::test]
    async fn manual_mode_without_measurement_fails_locally() {
        let backend = FixedBackend {
            response: Err(RemoteError::Transport("must not be called".to_string())),
        };
        let mut req = request(PredictionMode::Manual);
        req.measurement = None;
        let err = estimate(&backend, &req).await.unwrap_err();
        assert_eq!(err, EstimateError::MissingMeasurement);
    }

    #[tokio::test]
    async fn ai_mode_surfaces_the_remote_estimate() {
        let backend = FixedBackend {
            response: Ok(prediction(170.0)),
        };
        let result = estimate(&backend, &request(PredictionMode::Ai))
            .await
            .unwrap();
        assert_eq!(result.ai_weight_kg, Some(170.0));
        assert_eq!(result.confidence_score, Some(0.9));
        assert_eq!(result.processing_notes, vec!["stereo girth fit"]);
        assert_eq!(result.manual_weight_kg, None);
    }

    #[tokio::test]
    async fn ai_mode_without_both_photos_fails_before_the_network() {
        let backend = FixedBackend {
            response: Ok(prediction(170.0)),
        };
        let mut req = request(PredictionMode::Ai);
        req.left_image = None;
        let err = estimate(&backend, &req).await.unwrap_err();
        assert_eq!(err, EstimateError::MissingSideImages);
    }

    #[tokio::test]
    async fn remote_failure_maps_to_remote_estimation_error() {
        let backend = FixedBackend {
            response: Err(RemoteError::Rejected("blurred photos".to_string())),
        };
        let err = estimate(&backend, &request(PredictionMode::Ai))
            .await
            .unwrap_err();
        match err {
            EstimateError::RemoteEstimation(message) => {
                assert!(message.contains("blurred photos"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn both_mode_reports_components_combined_and_agreement() {
        let backend = FixedBackend {
            response: Ok(prediction(170.0)),
        };
        let result = estimate(&backend, &request(PredictionMode::Both))
            .await
            .unwrap();
        let manual = result.manual_weight_kg.unwrap();
        assert!((manual - 162.0).abs() < 1e-6);
        assert_eq!(result.ai_weight_kg, Some(170.0));
        // No backend blend supplied → plain mean
        assert!((result.combined_weight_kg.unwrap() - 166.0).abs() < 1e-6);
        assert!((result.estimate_difference_kg().unwrap() - 8.0).abs() < 1e-6);
        let agreement = result.agreement_score.unwrap();
        assert!((agreement - (1.0 - 8.0 / 166.0)).abs() < 1e-6);
    }

    #[tokio::test]
    async fn backend_supplied_blend_is_preferred_over_the_mean() {
        let mut remote = prediction(170.0);
        remote.combined_weight_kg = Some(168.5);
        let backend = FixedBackend {
            response: Ok(remote),
        };
        let result = estimate(&backend, &request(PredictionMode::Both))
            .await
            .unwrap();
        assert_eq!(result.combined_weight_kg, Some(168.5));
        // Components still visible alongside the blend
        assert!(result.manual_weight_kg.is_some());
        assert!(result.ai_weight_kg.is_some());
    }

    #[test]
    fn trigger_fires_once_regardless_of_arrival_order() {
        let mut trigger = AutoTrigger::new();
        // Right image first, then left
        assert!(!trigger.on_images_changed(false, true));
        assert!(trigger.on_images_changed(true, true));
        // Re-reporting the same pair must not fire a second estimation
        assert!(!trigger.on_images_changed(true, true));
    }

    #[test]
    fn trigger_rearms_when_a_photo_is_cleared() {
        let mut trigger = AutoTrigger::new();
        assert!(trigger.on_images_changed(true, true));
        assert!(!trigger.on_images_changed(true, false));
        assert!(trigger.on_images_changed(true, true));
    }

    #[test]
    fn gate_accepts_only_the_latest_token() {
        let mut gate = ResponseGate::new();
        let first = gate.issue();
        let second = gate.issue();
        assert!(!gate.accepts(first));
        assert!(gate.accepts(second));
    }

    #[test]
    fn cancel_drops_in_flight_responses() {
        let mut gate = ResponseGate::new();
        let token = gate.issue();
        gate.cancel();
        // The response arrives after the user cleared the form
        assert!(!gate.accepts(token));
    }
}
