//! Result of a single reconciliation pass.

use varstore_types::{ReasonCode, RunResult};

/// What a pass decided. Infrastructure failures are not represented here;
/// they surface as the `Err` arm of [`Reconciler::reconcile`](crate::Reconciler::reconcile).
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Every parameter evaluated and (if a store was referenced) persisted.
    Succeeded(Vec<RunResult>),
    FailedValidation(String),
    FailedLookup(String),
    FailedSyntax { param: String, reason: String },
    FailedEvaluation { param: String, reason: String },
    FailedPersist(String),
    /// The run does not reference a resource this reconciler handles.
    NotOwned,
    /// The run already reached a terminal condition.
    AlreadyDone,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Succeeded(_))
    }

    pub fn is_failure(&self) -> bool {
        self.reason_code().is_some() && !self.is_success()
    }

    /// Reason recorded on the run condition. `None` for skipped passes.
    pub fn reason_code(&self) -> Option<ReasonCode> {
        match self {
            Outcome::Succeeded(_) => Some(ReasonCode::EvaluationSuccess),
            Outcome::FailedValidation(_) => Some(ReasonCode::FailedValidation),
            Outcome::FailedLookup(_) => Some(ReasonCode::CouldntGetVariableStore),
            Outcome::FailedSyntax { .. } => Some(ReasonCode::SyntaxError),
            Outcome::FailedEvaluation { .. } => Some(ReasonCode::EvaluationError),
            Outcome::FailedPersist(_) => Some(ReasonCode::UpdateFailed),
            Outcome::NotOwned | Outcome::AlreadyDone => None,
        }
    }

    /// Human-readable condition message.
    pub fn message(&self) -> Option<String> {
        let message = match self {
            Outcome::Succeeded(_) => "Expressions were evaluated successfully".to_string(),
            Outcome::FailedValidation(reason) => {
                format!("Run can't be run because it has an invalid spec - {reason}")
            }
            Outcome::FailedLookup(reason) | Outcome::FailedPersist(reason) => reason.clone(),
            Outcome::FailedSyntax { param, reason } => {
                format!("Expression {param} could not be parsed: {reason}")
            }
            Outcome::FailedEvaluation { param, reason } => {
                format!("Expression {param} could not be evaluated: {reason}")
            }
            Outcome::NotOwned | Outcome::AlreadyDone => return None,
        };
        Some(message)
    }
}
