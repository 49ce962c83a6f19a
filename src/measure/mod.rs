/// Weight estimation engine
///
/// This module handles:
/// - The heart-girth estimation formula and measurement validation (formula.rs)
/// - Prediction modes, remote delegation, combining, and dispatch gating
///   (engine.rs)

pub mod engine;
pub mod formula;

pub use engine::{
    estimate, AutoTrigger, PredictionMode, ResponseGate, WeightPredictionRequest,
    WeightPredictionResult,
};
pub use formula::ManualMeasurement;
