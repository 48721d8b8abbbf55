//! Shared types, errors, and status conditions for the VariableStore reconciler.
//!
//! This crate provides the foundational types used across the other crates:
//! - `VarStoreError`: unified error taxonomy
//! - `VariableStore` / `Binding`: the persisted variable collection
//! - `TaskRun`: the externally owned run this engine drives to a terminal state
//! - `Condition` / `ReasonCode`: the status contract written back onto a run

mod resource;
mod status;

pub use resource::{Binding, ObjectMeta, ObjectRef, Param, RunSpec, TaskRun, VariableStore, VariableStoreSpec};
pub use status::{Condition, ConditionStatus, ReasonCode, RunResult, RunState, RunStatus, CONDITION_SUCCEEDED};

/// Unified error type for all reconciler subsystems.
#[derive(Debug, thiserror::Error)]
pub enum VarStoreError {
    // === Store Errors ===
    #[error("VariableStore {namespace}/{name} not found")]
    StoreNotFound { namespace: String, name: String },

    #[error(
        "VariableStore {namespace}/{name} was modified concurrently: \
         expected resource version {expected}, found {found}"
    )]
    Conflict {
        namespace: String,
        name: String,
        expected: u64,
        found: u64,
    },

    #[error("invalid {field} '{value}': must be a lowercase RFC 1123 label")]
    InvalidName { field: &'static str, value: String },

    // === Request Errors ===
    #[error("Run spec is invalid: {0}")]
    Validation(String),

    // === Expression Runtime Errors ===
    #[error("Expression runtime unavailable: {0}")]
    Runtime(String),

    // === Generic ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VarStoreError {
    /// Returns `true` if the error is environmental and the scheduler should
    /// re-invoke reconciliation later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, VarStoreError::Runtime(_))
    }
}

/// A convenience alias for `Result<T, VarStoreError>`.
pub type Result<T> = std::result::Result<T, VarStoreError>;
