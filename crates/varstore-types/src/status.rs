//! Observed run status: the `Succeeded` condition, results, and reason codes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Type of the single condition this engine manages on a run.
pub const CONDITION_SUCCEEDED: &str = "Succeeded";

// ---------------------------------------------------------------------------
// ReasonCode: stable wire contract
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReasonCode {
    /// Initial `Unknown` condition set when a run is first observed.
    Started,
    CouldntGetVariableStore,
    FailedValidation,
    SyntaxError,
    EvaluationError,
    UpdateFailed,
    EvaluationSuccess,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::Started => "Started",
            ReasonCode::CouldntGetVariableStore => "CouldntGetVariableStore",
            ReasonCode::FailedValidation => "FailedValidation",
            ReasonCode::SyntaxError => "SyntaxError",
            ReasonCode::EvaluationError => "EvaluationError",
            ReasonCode::UpdateFailed => "UpdateFailed",
            ReasonCode::EvaluationSuccess => "EvaluationSuccess",
        }
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Condition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: ConditionStatus,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
    pub last_transition_time: DateTime<Utc>,
}

/// Lifecycle state of a run as seen by this engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    NotStarted,
    Running,
    Succeeded,
    Failed,
}

// ---------------------------------------------------------------------------
// RunStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<RunResult>,
}

impl RunStatus {
    pub fn has_started(&self) -> bool {
        self.start_time.is_some()
    }

    /// A run is done once its condition leaves `Unknown`.
    pub fn is_done(&self) -> bool {
        matches!(
            self.condition.as_ref().map(|c| c.status),
            Some(ConditionStatus::True | ConditionStatus::False)
        )
    }

    pub fn state(&self) -> RunState {
        match self.condition.as_ref().map(|c| c.status) {
            Some(ConditionStatus::True) => RunState::Succeeded,
            Some(ConditionStatus::False) => RunState::Failed,
            Some(ConditionStatus::Unknown) => RunState::Running,
            None if self.has_started() => RunState::Running,
            None => RunState::NotStarted,
        }
    }

    /// Set the start time and an `Unknown` condition.
    pub fn initialize(&mut self, now: DateTime<Utc>) {
        if self.start_time.is_none() {
            self.start_time = Some(now);
        }
        if self.condition.is_none() {
            self.set_condition(ConditionStatus::Unknown, ReasonCode::Started, String::new(), now);
        }
    }

    pub fn mark_succeeded(&mut self, reason: ReasonCode, message: impl Into<String>) {
        self.set_condition(ConditionStatus::True, reason, message.into(), Utc::now());
    }

    pub fn mark_failed(&mut self, reason: ReasonCode, message: impl Into<String>) {
        self.set_condition(ConditionStatus::False, reason, message.into(), Utc::now());
    }

    fn set_condition(
        &mut self,
        status: ConditionStatus,
        reason: ReasonCode,
        message: String,
        now: DateTime<Utc>,
    ) {
        self.condition = Some(Condition {
            condition_type: CONDITION_SUCCEEDED.to_string(),
            status,
            reason: reason.as_str().to_string(),
            message,
            last_transition_time: now,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_codes_are_stable_strings() {
        assert_eq!(ReasonCode::CouldntGetVariableStore.as_str(), "CouldntGetVariableStore");
        assert_eq!(ReasonCode::FailedValidation.as_str(), "FailedValidation");
        assert_eq!(ReasonCode::SyntaxError.as_str(), "SyntaxError");
        assert_eq!(ReasonCode::EvaluationError.as_str(), "EvaluationError");
        assert_eq!(ReasonCode::UpdateFailed.as_str(), "UpdateFailed");
        assert_eq!(ReasonCode::EvaluationSuccess.to_string(), "EvaluationSuccess");
        assert_eq!(
            serde_json::to_string(&ReasonCode::UpdateFailed).unwrap(),
            "\"UpdateFailed\""
        );
    }

    #[test]
    fn fresh_status_is_not_started() {
        let status = RunStatus::default();
        assert_eq!(status.state(), RunState::NotStarted);
        assert!(!status.has_started());
        assert!(!status.is_done());
    }

    #[test]
    fn initialize_moves_to_running() {
        let mut status = RunStatus::default();
        let now = Utc::now();
        status.initialize(now);

        assert_eq!(status.state(), RunState::Running);
        assert_eq!(status.start_time, Some(now));
        let cond = status.condition.as_ref().unwrap();
        assert_eq!(cond.condition_type, CONDITION_SUCCEEDED);
        assert_eq!(cond.status, ConditionStatus::Unknown);
        assert_eq!(cond.reason, "Started");
        assert!(!status.is_done());
    }

    #[test]
    fn mark_failed_and_succeeded_are_terminal() {
        let mut status = RunStatus::default();
        status.initialize(Utc::now());
        status.mark_failed(ReasonCode::SyntaxError, "bad");
        assert_eq!(status.state(), RunState::Failed);
        assert!(status.is_done());

        let mut status = RunStatus::default();
        status.initialize(Utc::now());
        status.mark_succeeded(ReasonCode::EvaluationSuccess, "ok");
        assert_eq!(status.state(), RunState::Succeeded);
        assert_eq!(status.condition.unwrap().message, "ok");
    }

    #[test]
    fn condition_serializes_type_field() {
        let mut status = RunStatus::default();
        status.initialize(Utc::now());
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["condition"]["type"], "Succeeded");
        assert_eq!(json["condition"]["status"], "Unknown");
        assert!(json.get("results").is_none());
    }
}
