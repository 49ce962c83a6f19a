/// Verification workflow orchestration
///
/// This module handles:
/// - Step definitions, checklists, weights, and the score function (steps.rs)
/// - The wizard state machine and submission handling (wizard.rs)

pub mod steps;
pub mod wizard;

pub use steps::{verification_score, StepId, StepRecord, VerificationStepState};
pub use wizard::{Recommendation, Wizard};
