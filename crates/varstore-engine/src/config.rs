//! Reconciler configuration.

use serde::{Deserialize, Serialize};

pub const DEFAULT_API_VERSION: &str = "custom.tekton.dev/v1alpha1";
pub const DEFAULT_KIND: &str = "VariableStore";

/// Which run references this reconciler claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReconcilerConfig {
    pub api_version: String,
    pub kind: String,
    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            api_version: DEFAULT_API_VERSION.to_string(),
            kind: DEFAULT_KIND.to_string(),
            event_capacity: 256,
        }
    }
}
