/// Verification steps, checklists, weights, and the score function
///
/// Five ordered steps: basic info → documents → financial → animal/weight →
/// final review. Each scored step carries a fixed weight (20/25/30/25) split
/// equally across its checklist items; the final review is unweighted. The
/// score is a pure function of the accumulated step state, computed for
/// display only.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

/// One step of the verification wizard, in fixed order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum StepId {
    BasicInfo,
    Documents,
    Financial,
    Animal,
    FinalReview,
}

impl StepId {
    pub const ORDER: [StepId; 5] = [
        StepId::BasicInfo,
        StepId::Documents,
        StepId::Financial,
        StepId::Animal,
        StepId::FinalReview,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            StepId::BasicInfo => "Basic information",
            StepId::Documents => "Documents",
            StepId::Financial => "Financial",
            StepId::Animal => "Animal & weight",
            StepId::FinalReview => "Final review",
        }
    }

    /// JSON key under which this step's record lands in the payload
    pub fn key(&self) -> &'static str {
        match self {
            StepId::BasicInfo => "basic_info",
            StepId::Documents => "documents",
            StepId::Financial => "financial",
            StepId::Animal => "animal",
            StepId::FinalReview => "final_review",
        }
    }

    /// Contribution to the verification score, in percent
    pub fn weight(&self) -> f64 {
        match self {
            StepId::BasicInfo => 20.0,
            StepId::Documents => 25.0,
            StepId::Financial => 30.0,
            StepId::Animal => 25.0,
            StepId::FinalReview => 0.0,
        }
    }

    /// Required attestations the operator must confirm before the step
    /// can complete. The two evidence-backed animal items are filled from
    /// actual pipeline results, not user checkboxes.
    pub fn checklist(&self) -> &'static [&'static str] {
        match self {
            StepId::BasicInfo => &[
                "identity_document_matches",
                "contact_details_confirmed",
                "applicant_interviewed_in_person",
            ],
            StepId::Documents => &[
                "national_id_sighted",
                "residence_proof_sighted",
                "guarantor_form_signed",
            ],
            StepId::Financial => &[
                "income_source_verified",
                "existing_debts_disclosed",
                "repayment_plan_discussed",
            ],
            StepId::Animal => &[
                "animal_matches_description",
                "health_condition_acceptable",
                "weight_estimate_recorded",
                "muzzle_pattern_enrolled",
            ],
            StepId::FinalReview => &["terms_explained", "applicant_consents"],
        }
    }

    /// Checklist items the operator toggles by hand (the rest are filled
    /// from pipeline evidence)
    pub fn operator_checklist(&self) -> &'static [&'static str] {
        match self {
            StepId::Animal => &["animal_matches_description", "health_condition_acceptable"],
            other => other.checklist(),
        }
    }
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.title())
    }
}

/// Arbitrary key-value record a step merges on completion
pub type StepRecord = Map<String, Value>;

/// Step state accumulated as the wizard progresses. Forward completion
/// merges a step's validated record; Previous navigation never discards
/// already-merged data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerificationStepState {
    records: BTreeMap<StepId, StepRecord>,
}

impl VerificationStepState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a step's record, overwriting keys it re-submits
    pub fn merge(&mut self, step: StepId, record: StepRecord) {
        let target = self.records.entry(step).or_default();
        for (key, value) in record {
            target.insert(key, value);
        }
    }

    pub fn record(&self, step: StepId) -> Option<&StepRecord> {
        self.records.get(&step)
    }

    /// Whether a boolean attestation is affirmatively true in a step's record
    pub fn is_checked(&self, step: StepId, field: &str) -> bool {
        self.records
            .get(&step)
            .and_then(|record| record.get(field))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Aggregate payload for the final submission
    pub fn to_payload(&self) -> Value {
        let mut out = Map::new();
        for (step, record) in &self.records {
            out.insert(step.key().to_string(), Value::Object(record.clone()));
        }
        Value::Object(out)
    }
}

/// Weighted verification score over the accumulated state, 0..100.
/// Deterministic: the same map always produces the same number.
pub fn verification_score(state: &VerificationStepState) -> f64 {
    StepId::ORDER
        .iter()
        .filter(|step| step.weight() > 0.0)
        .map(|step| {
            let checklist = step.checklist();
            let checked = checklist
                .iter()
                .filter(|field| state.is_checked(*step, field))
                .count();
            step.weight() * checked as f64 / checklist.len() as f64
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(fields: &[(&str, bool)]) -> StepRecord {
        let mut map = StepRecord::new();
        for (key, value) in fields {
            map.insert((*key).to_string(), json!(value));
        }
        map
    }

    fn fully_checked(step: StepId) -> StepRecord {
        record(
            &step
                .checklist()
                .iter()
                .map(|f| (*f, true))
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn weights_sum_to_one_hundred() {
        let total: f64 = StepId::ORDER.iter().map(StepId::weight).sum();
        assert!((total - 100.0).abs() < 1e-9);
    }

    #[test]
    fn empty_state_scores_zero() {
        assert_eq!(verification_score(&VerificationStepState::new()), 0.0);
    }

    #[test]
    fn all_steps_fully_checked_score_one_hundred() {
        let mut state = VerificationStepState::new();
        for step in StepId::ORDER {
            state.merge(step, fully_checked(step));
        }
        assert!((verification_score(&state) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn checkboxes_carry_equal_shares_within_a_step() {
        let mut state = VerificationStepState::new();
        // One of three basic-info items: a third of 20 points
        state.merge(
            StepId::BasicInfo,
            record(&[("identity_document_matches", true)]),
        );
        assert!((verification_score(&state) - 20.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn score_is_a_pure_function_of_the_map() {
        let mut a = VerificationStepState::new();
        a.merge(StepId::Financial, fully_checked(StepId::Financial));
        a.merge(StepId::Documents, record(&[("national_id_sighted", true)]));
        let b = a.clone();
        assert_eq!(verification_score(&a), verification_score(&b));
        // And recomputing on the same map gives the same number
        assert_eq!(verification_score(&a), verification_score(&a));
    }

    #[test]
    fn final_review_does_not_contribute_to_the_score() {
        let mut state = VerificationStepState::new();
        state.merge(StepId::FinalReview, fully_checked(StepId::FinalReview));
        assert_eq!(verification_score(&state), 0.0);
    }

    #[test]
    fn non_boolean_and_missing_fields_count_as_unchecked() {
        let mut state = VerificationStepState::new();
        let mut rec = StepRecord::new();
        rec.insert("income_source_verified".to_string(), json!("yes"));
        state.merge(StepId::Financial, rec);
        assert!(!state.is_checked(StepId::Financial, "income_source_verified"));
        assert!(!state.is_checked(StepId::Financial, "repayment_plan_discussed"));
    }

    #[test]
    fn merge_overwrites_resubmitted_keys_and_keeps_the_rest() {
        let mut state = VerificationStepState::new();
        state.merge(
            StepId::BasicInfo,
            record(&[
                ("identity_document_matches", true),
                ("contact_details_confirmed", true),
            ]),
        );
        state.merge(
            StepId::BasicInfo,
            record(&[("identity_document_matches", false)]),
        );
        assert!(!state.is_checked(StepId::BasicInfo, "identity_document_matches"));
        assert!(state.is_checked(StepId::BasicInfo, "contact_details_confirmed"));
    }

    #[test]
    fn payload_is_keyed_by_step() {
        let mut state = VerificationStepState::new();
        state.merge(StepId::Documents, record(&[("national_id_sighted", true)]));
        let payload = state.to_payload();
        assert_eq!(payload["documents"]["national_id_sighted"], json!(true));
    }
}
