/// Error taxonomy for the verification pipeline
///
/// One enum per component boundary. Validation errors are raised locally and
/// never reach the network layer; remote errors are mapped to user-facing
/// messages at the call site. Everything is `Clone` because errors travel
/// inside iced messages and render inline next to the control that caused
/// them.

use thiserror::Error;

use crate::workflow::steps::StepId;

/// Errors from image capture and normalization
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CaptureError {
    /// Declared type is not an image; rejected before any decode attempt
    #[error("unsupported file type: {0}")]
    InvalidFileType(String),

    /// Raw payload exceeds the call site's size limit
    #[error("file is {actual_mb:.1} MB, limit is {limit_mb:.0} MB")]
    FileTooLarge { actual_mb: f64, limit_mb: f64 },

    /// Bytes claimed to be an image but could not be decoded
    #[error("could not decode image: {0}")]
    Decode(String),

    /// JPEG re-encoding failed
    #[error("could not encode image: {0}")]
    Encode(String),

    /// Camera device could not be acquired (denied by user/OS, or missing)
    #[error("camera access denied: {0}")]
    CameraAccessDenied(String),

    /// Frame requested from a stream that was already stopped
    #[error("camera stream is closed")]
    CameraClosed,
}

/// Errors from the region selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SelectionError {
    /// Confirm pressed with a zero-width or zero-height rectangle.
    /// The selector session stays open so the user can drag again.
    #[error("selection is empty, drag a rectangle over the muzzle first")]
    EmptySelection,

    /// Confirm pressed before any drag happened
    #[error("no selection yet, drag a rectangle over the muzzle first")]
    NoSelection,
}

/// Errors from the weight estimation engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EstimateError {
    /// Manual or combined mode without heart girth / body length entered
    #[error("heart girth and body length are required for manual estimation")]
    MissingMeasurement,

    /// A measurement fell outside its plausible physiological range.
    /// Values are rejected, never silently clamped.
    #[error("{field} of {value:.1} cm is outside the plausible range {min:.0}-{max:.0} cm")]
    MeasurementOutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// AI or combined mode before both side photos are present
    #[error("both side photos are required for AI estimation")]
    MissingSideImages,

    /// The remote estimation call failed or returned success:false
    #[error("remote estimation failed: {0}")]
    RemoteEstimation(String),
}

/// Errors from the muzzle pattern flow
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PatternError {
    /// The flow cannot run before an application record exists
    #[error("no application id is bound yet, save the application first")]
    MissingApplicationContext,

    /// Cropping the confirmed region out of the muzzle photo failed
    #[error("could not crop the selected region: {0}")]
    Crop(String),

    /// The recognition service call failed; retry by re-selecting the region
    #[error("pattern service failed: {0}")]
    Remote(String),
}

/// Errors from the verification wizard
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorkflowError {
    /// A step's required checklist is not fully confirmed
    #[error("{step} checklist incomplete: {}", .missing.join(", "))]
    ChecklistIncomplete { step: StepId, missing: Vec<String> },

    /// The muzzle pattern matched another application's animal.
    /// Hard gate for the one-loan-per-animal policy.
    #[error("duplicate animal: muzzle pattern already enrolled{}", .applicant.as_deref().map(|a| format!(" for {a}")).unwrap_or_default())]
    DuplicatePattern { applicant: Option<String> },

    /// Animal step completion attempted before a pattern verdict exists
    #[error("muzzle pattern has not been enrolled yet")]
    PatternNotEnrolled,

    /// Animal step completion attempted before a weight estimate exists
    #[error("no weight estimate has been recorded yet")]
    WeightNotRecorded,

    /// Approval recommended without the applicant's recorded consent
    #[error("applicant consent is required before recommending approval")]
    ConsentRequired,

    /// The final submission was rejected by the backend; the wizard stays
    /// on final review with all accumulated state intact
    #[error("submission failed: {0}")]
    Submit(String),
}
