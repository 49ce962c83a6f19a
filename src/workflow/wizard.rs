/// Wizard state machine for the verification workflow
///
/// Steps complete forward one at a time: local validation gates the merge
/// into the shared step state, then the pointer advances. Previous is always
/// allowed and keeps merged data. The final review is terminal — it owns the
/// consent checklist and the submit action, and a rejected submission puts
/// the wizard back on final review with everything intact.

use crate::error::WorkflowError;
use crate::pattern::PatternVerdict;
use crate::workflow::steps::{verification_score, StepId, StepRecord, VerificationStepState};

/// The operator's recommendation to the manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recommendation {
    Approve,
    Reject,
}

impl Recommendation {
    pub const ALL: [Recommendation; 2] = [Recommendation::Approve, Recommendation::Reject];

    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Approve => "approve",
            Recommendation::Reject => "reject",
        }
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Recommendation::Approve => "Recommend approval",
            Recommendation::Reject => "Recommend rejection",
        })
    }
}

/// One verification session for one loan application
#[derive(Debug, Clone, Default)]
pub struct Wizard {
    current: usize,
    state: VerificationStepState,
    /// Error from the last rejected submission, kept for display
    last_submit_error: Option<String>,
}

impl Wizard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_step(&self) -> StepId {
        StepId::ORDER[self.current]
    }

    pub fn state(&self) -> &VerificationStepState {
        &self.state
    }

    pub fn score(&self) -> f64 {
        verification_score(&self.state)
    }

    pub fn last_submit_error(&self) -> Option<&str> {
        self.last_submit_error.as_deref()
    }

    pub fn is_at_final_review(&self) -> bool {
        self.current_step() == StepId::FinalReview
    }

    /// Whether a step has already been merged (used for the step indicator)
    pub fn is_step_complete(&self, step: StepId) -> bool {
        self.state.record(step).is_some()
    }

    /// Validate and complete the current (non-terminal, non-animal) step,
    /// merging its record and advancing the pointer.
    pub fn complete_current(&mut self, record: StepRecord) -> Result<(), WorkflowError> {
        let step = self.current_step();
        if step == StepId::FinalReview {
            return Err(WorkflowError::Submit(
                "the final review is submitted, not completed".to_string(),
            ));
        }

        Self::require_checklist(step, &record)?;
        self.state.merge(step, record);
        self.current += 1;
        Ok(())
    }

    /// Complete the animal step. Beyond its checklist, this is the hard
    /// gate for the one-loan-per-animal policy: a duplicate muzzle verdict
    /// blocks completion no matter what the checkboxes say, and both a
    /// weight estimate and a pattern verdict must exist.
    pub fn complete_animal_step(
        &mut self,
        mut record: StepRecord,
        verdict: Option<&PatternVerdict>,
        weight_recorded: bool,
    ) -> Result<(), WorkflowError> {
        debug_assert_eq!(self.current_step(), StepId::Animal);

        let verdict = verdict.ok_or(WorkflowError::PatternNotEnrolled)?;
        if verdict.blocks_enrollment() {
            return Err(WorkflowError::DuplicatePattern {
                applicant: verdict.duplicate_applicant_name.clone(),
            });
        }
        if !weight_recorded {
            return Err(WorkflowError::WeightNotRecorded);
        }

        // Evidence-backed items come from the pipeline, not checkboxes
        record.insert("weight_estimate_recorded".to_string(), true.into());
        record.insert("muzzle_pattern_enrolled".to_string(), true.into());
        record.insert(
            "pattern_hash".to_string(),
            verdict.pattern_hash.clone().into(),
        );

        Self::require_checklist(StepId::Animal, &record)?;
        self.state.merge(StepId::Animal, record);
        self.current += 1;
        Ok(())
    }

    /// Always allowed; already-merged data stays put
    pub fn previous(&mut self) {
        self.current = self.current.saturating_sub(1);
    }

    /// Final-review gate: terms must have been explained, and a recorded
    /// consent is required before recommending approval.
    pub fn ready_to_submit(
        &self,
        terms_explained: bool,
        applicant_consents: bool,
        recommendation: Recommendation,
    ) -> Result<(), WorkflowError> {
        if !terms_explained {
            return Err(WorkflowError::ChecklistIncomplete {
                step: StepId::FinalReview,
                missing: vec!["terms_explained".to_string()],
            });
        }
        if recommendation == Recommendation::Approve && !applicant_consents {
            return Err(WorkflowError::ConsentRequired);
        }
        Ok(())
    }

    /// Record the final-review attestations just before dispatching
    pub fn merge_final_review(&mut self, terms_explained: bool, applicant_consents: bool) {
        let mut record = StepRecord::new();
        record.insert("terms_explained".to_string(), terms_explained.into());
        record.insert("applicant_consents".to_string(), applicant_consents.into());
        self.state.merge(StepId::FinalReview, record);
    }

    /// Remote rejection: stay on final review, keep all accumulated state,
    /// surface the error.
    pub fn submission_failed(&mut self, message: String) {
        self.current = StepId::ORDER.len() - 1;
        self.last_submit_error = Some(message);
    }

    pub fn clear_submit_error(&mut self) {
        self.last_submit_error = None;
    }

    fn require_checklist(step: StepId, record: &StepRecord) -> Result<(), WorkflowError> {
        let missing: Vec<String> = step
            .checklist()
            .iter()
            .filter(|field| {
                !record
                    .get(**field)
                    .and_then(serde_json::Value::as_bool)
                    .unwrap_or(false)
            })
            .map(|field| (*field).to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(WorkflowError::ChecklistIncomplete { step, missing })
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn checked(step: StepId) -> StepRecord {
        let mut record = StepRecord::new();
        for field in step.checklist() {
            record.insert((*field).to_string(), json!(true));
        }
        record
    }

    fn operator_checked(step: StepId) -> StepRecord {
        let mut record = StepRecord::new();
        for field in step.operator_checklist() {
            record.insert((*field).to_string(), json!(true));
        }
        record
    }

    fn clean_verdict() -> PatternVerdict {
        PatternVerdict {
            pattern_hash: "deadbeef".to_string(),
            confidence: 0.92,
            features: Vec::new(),
            is_duplicate: false,
            duplicate_applicant_name: None,
        }
    }

    fn duplicate_verdict() -> PatternVerdict {
        PatternVerdict {
            is_duplicate: true,
            duplicate_applicant_name: Some("N. Wanjiru".to_string()),
            ..clean_verdict()
        }
    }

    /// Walk the wizard to the animal step with the first three steps done
    fn wizard_at_animal() -> Wizard {
        let mut wizard = Wizard::new();
        for step in [StepId::BasicInfo, StepId::Documents, StepId::Financial] {
            wizard.complete_current(checked(step)).unwrap();
        }
        assert_eq!(wizard.current_step(), StepId::Animal);
        wizard
    }

    #[test]
    fn incomplete_checklist_blocks_and_names_the_missing_items() {
        let mut wizard = Wizard::new();
        let mut record = checked(StepId::BasicInfo);
        record.insert("contact_details_confirmed".to_string(), json!(false));

        let err = wizard.complete_current(record).unwrap_err();
        match err {
            WorkflowError::ChecklistIncomplete { step, missing } => {
                assert_eq!(step, StepId::BasicInfo);
                assert_eq!(missing, vec!["contact_details_confirmed"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // Nothing merged, pointer unmoved
        assert_eq!(wizard.current_step(), StepId::BasicInfo);
        assert!(!wizard.is_step_complete(StepId::BasicInfo));
    }

    #[test]
    fn previous_keeps_merged_data() {
        let mut wizard = Wizard::new();
        wizard.complete_current(checked(StepId::BasicInfo)).unwrap();
        assert_eq!(wizard.current_step(), StepId::Documents);

        wizard.previous();
        assert_eq!(wizard.current_step(), StepId::BasicInfo);
        assert!(wizard.is_step_complete(StepId::BasicInfo));
        // And previous at the first step stays put
        wizard.previous();
        assert_eq!(wizard.current_step(), StepId::BasicInfo);
    }

    #[test]
    fn duplicate_verdict_blocks_the_animal_step_despite_checkboxes() {
        let mut wizard = wizard_at_animal();
        let verdict = duplicate_verdict();

        let err = wizard
            .complete_animal_step(operator_checked(StepId::Animal), Some(&verdict), true)
            .unwrap_err();
        assert_eq!(
            err,
            WorkflowError::DuplicatePattern {
                applicant: Some("N. Wanjiru".to_string())
            }
        );
        // The step stays incomplete
        assert_eq!(wizard.current_step(), StepId::Animal);
        assert!(!wizard.is_step_complete(StepId::Animal));
    }

    #[test]
    fn animal_step_needs_a_verdict_and_a_weight() {
        let mut wizard = wizard_at_animal();
        let err = wizard
            .complete_animal_step(operator_checked(StepId::Animal), None, true)
            .unwrap_err();
        assert_eq!(err, WorkflowError::PatternNotEnrolled);

        let verdict = clean_verdict();
        let err = wizard
            .complete_animal_step(operator_checked(StepId::Animal), Some(&verdict), false)
            .unwrap_err();
        assert_eq!(err, WorkflowError::WeightNotRecorded);
    }

    #[test]
    fn animal_step_completes_with_evidence_and_reaches_final_review() {
        let mut wizard = wizard_at_animal();
        let verdict = clean_verdict();
        wizard
            .complete_animal_step(operator_checked(StepId::Animal), Some(&verdict), true)
            .unwrap();

        assert!(wizard.is_at_final_review());
        assert!(wizard.state().is_checked(StepId::Animal, "muzzle_pattern_enrolled"));
        assert!(wizard.state().is_checked(StepId::Animal, "weight_estimate_recorded"));
        assert_eq!(
            wizard.state().record(StepId::Animal).unwrap()["pattern_hash"],
            json!("deadbeef")
        );
        // All four scored steps fully confirmed
        assert!((wizard.score() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn approval_requires_consent_but_rejection_does_not() {
        let wizard = Wizard::new();
        assert_eq!(
            wizard.ready_to_submit(true, false, Recommendation::Approve),
            Err(WorkflowError::ConsentRequired)
        );
        assert!(wizard
            .ready_to_submit(true, false, Recommendation::Reject)
            .is_ok());
        assert!(wizard
            .ready_to_submit(true, true, Recommendation::Approve)
            .is_ok());
    }

    #[test]
    fn terms_must_be_explained_before_any_submission() {
        let wizard = Wizard::new();
        let err = wizard
            .ready_to_submit(false, true, Recommendation::Reject)
            .unwrap_err();
        assert!(matches!(err, WorkflowError::ChecklistIncomplete { .. }));
    }

    #[test]
    fn rejected_submission_returns_to_final_review_with_state_intact() {
        let mut wizard = wizard_at_animal();
        let verdict = clean_verdict();
        wizard
            .complete_animal_step(operator_checked(StepId::Animal), Some(&verdict), true)
            .unwrap();
        let state_before = wizard.state().clone();

        wizard.submission_failed("backend rejected: stale application".to_string());
        assert!(wizard.is_at_final_review());
        assert_eq!(
            wizard.last_submit_error(),
            Some("backend rejected: stale application")
        );
        assert_eq!(wizard.state(), &state_before);
    }
}
