use iced::widget::image as photo;
use iced::widget::stack;
use iced::{Element, Point, Subscription, Task, Theme};

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

mod backend;
mod capture;
mod error;
mod measure;
mod pattern;
mod selector;
mod ui;
mod workflow;

use backend::{BackendClient, DecisionPayload, RemoteError, SubmissionAck};
use capture::camera::CameraSession;
use capture::normalize::normalize;
use capture::{ImageBuffer, NormalizeConstraints};
use error::{CaptureError, EstimateError, PatternError, SelectionError};
use measure::{
    AutoTrigger, ManualMeasurement, PredictionMode, ResponseGate, WeightPredictionRequest,
    WeightPredictionResult,
};
use pattern::{submit_pattern, PatternSubmission, PatternVerdict};
use selector::{SelectionRect, SelectorSession};
use ui::panels;
use ui::{SELECTOR_CANVAS_HEIGHT, SELECTOR_CANVAS_WIDTH};
use workflow::{Recommendation, StepId, StepRecord, Wizard};

/// Which photo slot a capture action feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureTarget {
    SideLeft,
    SideRight,
    Muzzle,
}

impl CaptureTarget {
    fn constraints(&self) -> NormalizeConstraints {
        match self {
            CaptureTarget::SideLeft | CaptureTarget::SideRight => {
                NormalizeConstraints::side_photo()
            }
            CaptureTarget::Muzzle => NormalizeConstraints::muzzle_photo(),
        }
    }
}

/// Application messages (events)
#[derive(Debug, Clone)]
pub enum Message {
    // Application context
    ApplicationIdChanged(String),
    BreedChanged(String),
    AgeChanged(String),

    // Photo capture
    PickPhoto(CaptureTarget),
    PhotoPicked(CaptureTarget, Option<Result<ImageBuffer, CaptureError>>),
    ClearPhoto(CaptureTarget),
    OpenCamera(CaptureTarget),
    CameraOpened(u64, Result<Arc<Mutex<Option<CameraSession>>>, CaptureError>),
    CameraTick,
    CaptureFrame,
    FrameCaptured(CaptureTarget, Result<ImageBuffer, CaptureError>),
    CloseCamera,

    // Weight estimation
    ModeSelected(PredictionMode),
    GirthChanged(String),
    LengthChanged(String),
    RunEstimate,
    EstimateFinished(u64, Result<WeightPredictionResult, EstimateError>),

    // Muzzle region selector and pattern check
    OpenSelector,
    SelectorDragStarted(Point),
    SelectorDragMoved(Point),
    SelectorDragEnded,
    SelectorReset,
    SelectorConfirm,
    SelectorCancel,
    PatternFinished(u64, Result<PatternVerdict, PatternError>),

    // Wizard navigation and submission
    ChecklistToggled(StepId, &'static str, bool),
    NextStep,
    PreviousStep,
    TermsToggled(bool),
    ConsentToggled(bool),
    RecommendationSelected(Recommendation),
    SubmitDecision,
    SubmitFinished(u64, Result<SubmissionAck, RemoteError>),
}

/// Exclusive overlay over the wizard
enum Modal {
    None,
    Selector {
        session: SelectorSession,
        handle: photo::Handle,
    },
    /// Device acquisition is outstanding on a blocking task; the modal
    /// shows the acquiring state and Cancel stays available
    CameraOpening {
        target: CaptureTarget,
    },
    Camera {
        session: CameraSession,
        target: CaptureTarget,
        preview: Option<photo::Handle>,
    },
}

/// Main application state
pub struct App {
    backend: BackendClient,

    pub application_id: String,
    pub breed: String,
    pub age_input: String,

    pub left_photo: Option<ImageBuffer>,
    pub right_photo: Option<ImageBuffer>,
    pub muzzle_photo: Option<ImageBuffer>,
    pub capture_error: Option<CaptureError>,
    camera_gate: ResponseGate,

    pub mode: PredictionMode,
    pub girth_input: String,
    pub length_input: String,
    pub estimating: bool,
    pub estimate: Option<WeightPredictionResult>,
    pub estimate_error: Option<String>,
    estimate_gate: ResponseGate,
    trigger: AutoTrigger,

    pub selection: Option<SelectionRect>,
    pub selector_error: Option<SelectionError>,
    pub pattern_busy: bool,
    pub pattern_verdict: Option<PatternVerdict>,
    pub pattern_error: Option<String>,
    pattern_gate: ResponseGate,

    pub wizard: Wizard,
    drafts: BTreeMap<StepId, StepRecord>,
    pub step_error: Option<String>,
    pub terms_explained: bool,
    pub applicant_consents: bool,
    pub recommendation: Recommendation,
    pub submitting: bool,
    submit_gate: ResponseGate,
    pub submitted: Option<SubmissionAck>,

    modal: Modal,
    pub status: String,
}

impl App {
    fn new() -> (Self, Task<Message>) {
        let backend = BackendClient::from_env();
        println!("🐄 Herdcheck starting, backend at {}", backend.base_url());

        let app = App {
            backend,
            application_id: String::new(),
            breed: String::new(),
            age_input: String::new(),
            left_photo: None,
            right_photo: None,
            muzzle_photo: None,
            capture_error: None,
            camera_gate: ResponseGate::new(),
            mode: PredictionMode::Both,
            girth_input: String::new(),
            length_input: String::new(),
            estimating: false,
            estimate: None,
            estimate_error: None,
            estimate_gate: ResponseGate::new(),
            trigger: AutoTrigger::new(),
            selection: None,
            selector_error: None,
            pattern_busy: false,
            pattern_verdict: None,
            pattern_error: None,
            pattern_gate: ResponseGate::new(),
            wizard: Wizard::new(),
            drafts: BTreeMap::new(),
            step_error: None,
            terms_explained: false,
            applicant_consents: false,
            recommendation: Recommendation::Approve,
            submitting: false,
            submit_gate: ResponseGate::new(),
            submitted: None,
            modal: Modal::None,
            status: "Ready. Verify the applicant step by step.".to_string(),
        };
        (app, Task::none())
    }

    /// Whether a checklist draft checkbox is currently ticked
    pub fn draft_checked(&self, step: StepId, field: &str) -> bool {
        self.drafts
            .get(&step)
            .and_then(|record| record.get(field))
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::ApplicationIdChanged(value) => {
                self.application_id = value;
                Task::none()
            }
            Message::BreedChanged(value) => {
                self.breed = value;
                Task::none()
            }
            Message::AgeChanged(value) => {
                self.age_input = value;
                Task::none()
            }

            Message::PickPhoto(target) => {
                let constraints = target.constraints();
                Task::perform(pick_and_normalize(constraints), move |result| {
                    Message::PhotoPicked(target, result)
                })
            }
            Message::PhotoPicked(target, result) => match result {
                // Dialog dismissed without choosing a file
                None => Task::none(),
                Some(Ok(buffer)) => self.install_photo(target, buffer),
                Some(Err(error)) => {
                    self.capture_error = Some(error);
                    Task::none()
                }
            },
            Message::ClearPhoto(target) => {
                self.clear_photo(target);
                Task::none()
            }

            Message::OpenCamera(target) => {
                // Acquisition can block for seconds (OS permission prompt),
                // so it runs on a blocking task while the modal shows the
                // acquiring state with Cancel available
                self.capture_error = None;
                self.modal = Modal::CameraOpening { target };
                let token = self.camera_gate.issue();
                Task::perform(
                    async move {
                        tokio::task::spawn_blocking(CameraSession::open_default)
                            .await
                            .unwrap_or_else(|e| {
                                Err(CaptureError::CameraAccessDenied(e.to_string()))
                            })
                            .map(|session| Arc::new(Mutex::new(Some(session))))
                    },
                    move |result| Message::CameraOpened(token, result),
                )
            }
            Message::CameraOpened(token, result) => {
                let opening_target = match (&self.modal, self.camera_gate.accepts(token)) {
                    (Modal::CameraOpening { target }, true) => Some(*target),
                    _ => None,
                };
                match (opening_target, result) {
                    (Some(target), Ok(slot)) => {
                        if let Some(session) = slot.lock().ok().and_then(|mut slot| slot.take()) {
                            self.modal = Modal::Camera {
                                session,
                                target,
                                preview: None,
                            };
                        }
                    }
                    (Some(_), Err(error)) => {
                        self.modal = Modal::None;
                        self.capture_error = Some(error);
                    }
                    // Cancelled while acquisition was outstanding; the late
                    // session is released, never installed
                    (None, Ok(slot)) => {
                        if let Some(session) = slot.lock().ok().and_then(|mut slot| slot.take()) {
                            session.close();
                        }
                    }
                    (None, Err(_)) => {}
                }
                Task::none()
            }
            Message::CameraTick => {
                if let Modal::Camera {
                    session, preview, ..
                } = &mut self.modal
                {
                    if let Ok(frame) = session.preview_frame() {
                        let (width, height) = frame.dimensions();
                        let rgba = image::DynamicImage::ImageRgb8(frame).to_rgba8();
                        *preview = Some(photo::Handle::from_rgba(width, height, rgba.into_raw()));
                    }
                }
                Task::none()
            }
            Message::CaptureFrame => {
                match std::mem::replace(&mut self.modal, Modal::None) {
                    Modal::Camera {
                        mut session,
                        target,
                        ..
                    } => {
                        // Lanczos resize + JPEG encode belong off the event
                        // thread, same as the picker path
                        let constraints = target.constraints();
                        Task::perform(
                            async move {
                                tokio::task::spawn_blocking(move || {
                                    let result = session.capture(&constraints);
                                    session.close();
                                    result
                                })
                                .await
                                .unwrap_or_else(|e| Err(CaptureError::Decode(e.to_string())))
                            },
                            move |result| Message::FrameCaptured(target, result),
                        )
                    }
                    other => {
                        self.modal = other;
                        Task::none()
                    }
                }
            }
            Message::FrameCaptured(target, result) => match result {
                Ok(buffer) => self.install_photo(target, buffer),
                Err(error) => {
                    self.capture_error = Some(error);
                    Task::none()
                }
            },
            Message::CloseCamera => {
                match std::mem::replace(&mut self.modal, Modal::None) {
                    Modal::Camera { session, .. } => session.close(),
                    // Acquisition still outstanding; drop its token so the
                    // late session is released on arrival
                    Modal::CameraOpening { .. } => self.camera_gate.cancel(),
                    other => self.modal = other,
                }
                Task::none()
            }

            Message::ModeSelected(mode) => {
                self.mode = mode;
                Task::none()
            }
            Message::GirthChanged(value) => {
                self.girth_input = value;
                Task::none()
            }
            Message::LengthChanged(value) => {
                self.length_input = value;
                Task::none()
            }
            Message::RunEstimate => self.start_estimate(),
            Message::EstimateFinished(token, result) => {
                if !self.estimate_gate.accepts(token) {
                    // A stale response for inputs the user has since changed
                    return Task::none();
                }
                self.estimating = false;
                match result {
                    Ok(prediction) => {
                        self.estimate_error = None;
                        self.estimate = Some(prediction);
                        self.status = "Weight estimate recorded.".to_string();
                    }
                    Err(error) => self.estimate_error = Some(error.to_string()),
                }
                Task::none()
            }

            Message::OpenSelector => {
                if let Some(buffer) = &self.muzzle_photo {
                    let session = SelectorSession::new(
                        buffer.clone(),
                        SELECTOR_CANVAS_WIDTH,
                        SELECTOR_CANVAS_HEIGHT,
                    );
                    let handle = photo::Handle::from_bytes(session.image().bytes.clone());
                    self.selector_error = None;
                    self.modal = Modal::Selector { session, handle };
                }
                Task::none()
            }
            Message::SelectorDragStarted(point) => {
                if let Modal::Selector { session, .. } = &mut self.modal {
                    session.begin_drag(point.x, point.y);
                    self.selector_error = None;
                }
                Task::none()
            }
            Message::SelectorDragMoved(point) => {
                if let Modal::Selector { session, .. } = &mut self.modal {
                    session.drag_to(point.x, point.y);
                }
                Task::none()
            }
            Message::SelectorDragEnded => {
                if let Modal::Selector { session, .. } = &mut self.modal {
                    session.end_drag();
                }
                Task::none()
            }
            Message::SelectorReset => {
                if let Modal::Selector { session, .. } = &mut self.modal {
                    session.reset();
                    self.selector_error = None;
                }
                Task::none()
            }
            Message::SelectorCancel => {
                // Dropping the session discards all transient drag state
                self.modal = Modal::None;
                self.selector_error = None;
                Task::none()
            }
            Message::SelectorConfirm => {
                let outcome = match &self.modal {
                    Modal::Selector { session, .. } => Some(session.confirm()),
                    _ => None,
                };
                match outcome {
                    Some(Ok(selection)) => {
                        self.selection = Some(selection);
                        self.modal = Modal::None;
                        self.start_pattern_submission(selection)
                    }
                    // The modal stays open so the user can drag again
                    Some(Err(error)) => {
                        self.selector_error = Some(error);
                        Task::none()
                    }
                    None => Task::none(),
                }
            }
            Message::PatternFinished(token, result) => {
                if !self.pattern_gate.accepts(token) {
                    return Task::none();
                }
                self.pattern_busy = false;
                match result {
                    Ok(verdict) => {
                        self.pattern_error = None;
                        if verdict.blocks_enrollment() {
                            self.status = "Duplicate muzzle pattern detected.".to_string();
                        } else {
                            self.status = "Muzzle pattern enrolled.".to_string();
                        }
                        self.pattern_verdict = Some(verdict);
                    }
                    Err(error) => self.pattern_error = Some(error.to_string()),
                }
                Task::none()
            }

            Message::ChecklistToggled(step, field, checked) => {
                self.drafts
                    .entry(step)
                    .or_default()
                    .insert(field.to_string(), checked.into());
                self.step_error = None;
                Task::none()
            }
            Message::NextStep => {
                let step = self.wizard.current_step();
                let record = self.drafts.get(&step).cloned().unwrap_or_default();
                let outcome = if step == StepId::Animal {
                    self.wizard.complete_animal_step(
                        record,
                        self.pattern_verdict.as_ref(),
                        self.estimate.is_some(),
                    )
                } else {
                    self.wizard.complete_current(record)
                };
                match outcome {
                    Ok(()) => {
                        self.step_error = None;
                        self.status = format!("{} complete.", step.title());
                    }
                    Err(error) => self.step_error = Some(error.to_string()),
                }
                Task::none()
            }
            Message::PreviousStep => {
                self.wizard.previous();
                self.step_error = None;
                Task::none()
            }
            Message::TermsToggled(checked) => {
                self.terms_explained = checked;
                self.wizard.clear_submit_error();
                Task::none()
            }
            Message::ConsentToggled(checked) => {
                self.applicant_consents = checked;
                self.wizard.clear_submit_error();
                Task::none()
            }
            Message::RecommendationSelected(recommendation) => {
                self.recommendation = recommendation;
                Task::none()
            }
            Message::SubmitDecision => self.submit_decision(),
            Message::SubmitFinished(token, result) => {
                if !self.submit_gate.accepts(token) {
                    return Task::none();
                }
                self.submitting = false;
                match result {
                    Ok(ack) => {
                        println!(
                            "✅ Verification submitted{}",
                            ack.reference
                                .as_deref()
                                .map(|r| format!(" ({r})"))
                                .unwrap_or_default()
                        );
                        self.submitted = Some(ack);
                    }
                    Err(error) => self.wizard.submission_failed(error.to_string()),
                }
                Task::none()
            }
        }
    }

    /// Place a freshly normalized photo in its slot and run the side effects
    /// that follow from the slot changing.
    fn install_photo(&mut self, target: CaptureTarget, buffer: ImageBuffer) -> Task<Message> {
        self.capture_error = None;
        match target {
            CaptureTarget::SideLeft | CaptureTarget::SideRight => {
                if target == CaptureTarget::SideLeft {
                    self.left_photo = Some(buffer);
                } else {
                    self.right_photo = Some(buffer);
                }
                // The previous estimate described different photos
                self.estimate = None;
                self.estimate_error = None;
                self.estimating = false;
                self.estimate_gate.cancel();

                // Replacing a photo of a completed pair re-arms the trigger
                self.trigger.reset();
                let complete = self
                    .trigger
                    .on_images_changed(self.left_photo.is_some(), self.right_photo.is_some());
                if complete && self.mode.auto_triggers() {
                    return self.start_estimate();
                }
                Task::none()
            }
            CaptureTarget::Muzzle => {
                self.muzzle_photo = Some(buffer);
                // Selection and verdict belonged to the previous photo
                self.selection = None;
                self.pattern_verdict = None;
                self.pattern_error = None;
                self.pattern_busy = false;
                self.pattern_gate.cancel();
                Task::none()
            }
        }
    }

    fn clear_photo(&mut self, target: CaptureTarget) {
        self.capture_error = None;
        match target {
            CaptureTarget::SideLeft | CaptureTarget::SideRight => {
                if target == CaptureTarget::SideLeft {
                    self.left_photo = None;
                } else {
                    self.right_photo = None;
                }
                self.estimate = None;
                self.estimate_error = None;
                self.estimating = false;
                self.estimate_gate.cancel();
                self.trigger
                    .on_images_changed(self.left_photo.is_some(), self.right_photo.is_some());
            }
            CaptureTarget::Muzzle => {
                self.muzzle_photo = None;
                self.selection = None;
                self.pattern_verdict = None;
                self.pattern_error = None;
                self.pattern_busy = false;
                self.pattern_gate.cancel();
            }
        }
    }

    /// Dispatch one estimation attempt from the current form state
    fn start_estimate(&mut self) -> Task<Message> {
        let age_years = match parse_age(&self.age_input) {
            Ok(age) => age,
            Err(message) => {
                self.estimate_error = Some(message);
                return Task::none();
            }
        };

        let measurement = parse_measurement(&self.girth_input, &self.length_input);
        let request = WeightPredictionRequest {
            application_id: self.application_id.trim().to_string(),
            left_image: self.left_photo.clone(),
            right_image: self.right_photo.clone(),
            breed: self.breed.trim().to_string(),
            age_years,
            mode: self.mode,
            measurement,
        };

        self.estimating = true;
        self.estimate_error = None;
        let token = self.estimate_gate.issue();
        let backend = self.backend.clone();
        Task::perform(
            async move { measure::estimate(&backend, &request).await },
            move |result| Message::EstimateFinished(token, result),
        )
    }

    /// Crop the confirmed region and send it to the pattern service
    fn start_pattern_submission(&mut self, selection: SelectionRect) -> Task<Message> {
        let Some(buffer) = &self.muzzle_photo else {
            return Task::none();
        };

        let submission = match PatternSubmission::new(&self.application_id, buffer, selection) {
            Ok(submission) => submission,
            Err(error) => {
                self.pattern_error = Some(error.to_string());
                return Task::none();
            }
        };

        self.pattern_busy = true;
        self.pattern_error = None;
        self.pattern_verdict = None;
        let token = self.pattern_gate.issue();
        let backend = self.backend.clone();
        Task::perform(
            async move { submit_pattern(&backend, &submission).await },
            move |result| Message::PatternFinished(token, result),
        )
    }

    /// Final-review gate, then dispatch the decision to the backend
    fn submit_decision(&mut self) -> Task<Message> {
        if self.application_id.trim().is_empty() {
            self.step_error = Some("enter the application id before submitting".to_string());
            return Task::none();
        }
        if let Err(error) = self.wizard.ready_to_submit(
            self.terms_explained,
            self.applicant_consents,
            self.recommendation,
        ) {
            self.step_error = Some(error.to_string());
            return Task::none();
        }

        self.step_error = None;
        self.wizard.clear_submit_error();
        self.wizard
            .merge_final_review(self.terms_explained, self.applicant_consents);

        let payload = DecisionPayload::new(
            self.application_id.trim(),
            self.wizard.state(),
            self.wizard.score(),
            self.recommendation,
        );

        self.submitting = true;
        let token = self.submit_gate.issue();
        let backend = self.backend.clone();
        Task::perform(
            async move { backend.submit_verification_decision(&payload).await },
            move |result| Message::SubmitFinished(token, result),
        )
    }

    fn view(&self) -> Element<Message> {
        if let Some(ack) = &self.submitted {
            return panels::submitted_view(ack);
        }

        let base = panels::wizard_view(self);
        match &self.modal {
            Modal::None => base,
            Modal::Selector { session, handle } => stack(vec![
                base,
                panels::selector_modal(session, handle, self.selector_error),
            ])
            .into(),
            Modal::CameraOpening { .. } => stack(vec![base, panels::camera_modal(None)]).into(),
            Modal::Camera { preview, .. } => {
                stack(vec![base, panels::camera_modal(preview.as_ref())]).into()
            }
        }
    }

    /// Poll the camera for preview frames only while the modal is open
    fn subscription(&self) -> Subscription<Message> {
        match &self.modal {
            Modal::Camera { .. } => {
                iced::time::every(Duration::from_millis(150)).map(|_| Message::CameraTick)
            }
            _ => Subscription::none(),
        }
    }

    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

/// Age in years from its text input. Blank means not recorded; anything
/// else must be a plausible non-negative number, surfaced inline when it
/// is not.
fn parse_age(input: &str) -> Result<f64, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(0.0);
    }
    match trimmed.parse::<f64>() {
        Ok(age) if age.is_finite() && (0.0..=40.0).contains(&age) => Ok(age),
        _ => Err(format!("age \"{trimmed}\" is not a plausible number of years")),
    }
}

/// Manual measurement from the two text inputs, if both parse
fn parse_measurement(girth_input: &str, length_input: &str) -> Option<ManualMeasurement> {
    let heart_girth_cm = girth_input.trim().parse().ok()?;
    let body_length_cm = length_input.trim().parse().ok()?;
    Some(ManualMeasurement {
        heart_girth_cm,
        body_length_cm,
        reference_length_cm: None,
    })
}

/// Native file picker followed by normalization on a blocking thread.
/// `None` means the dialog was dismissed.
async fn pick_and_normalize(
    constraints: NormalizeConstraints,
) -> Option<Result<ImageBuffer, CaptureError>> {
    let file = rfd::AsyncFileDialog::new()
        .set_title("Select a photo")
        .add_filter("Images", &["jpg", "jpeg", "png", "webp", "bmp"])
        .pick_file()
        .await?;

    let mime = mime_for_name(&file.file_name());
    let raw = file.read().await;

    let result = tokio::task::spawn_blocking(move || normalize(&mime, &raw, &constraints))
        .await
        .unwrap_or_else(|e| Err(CaptureError::Decode(e.to_string())));
    Some(result)
}

/// Declared MIME type from the picked file's extension. Unknown extensions
/// fall through to a non-image type so normalization rejects them cleanly.
fn mime_for_name(name: &str) -> String {
    let extension = std::path::Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        _ => "application/octet-stream",
    }
    .to_string()
}

fn main() -> iced::Result {
    iced::application("Herdcheck Loan Verification", App::update, App::view)
        .subscription(App::subscription)
        .theme(App::theme)
        .centered()
        .run_with(App::new)
}
