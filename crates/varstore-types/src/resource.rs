//! Resource shapes exchanged with the persistence layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::status::RunStatus;

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Optimistic-concurrency token. Writes carrying a stale version are rejected.
    #[serde(default)]
    pub resource_version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
}

fn default_namespace() -> String {
    "default".to_string()
}

impl ObjectMeta {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            resource_version: 0,
            creation_timestamp: None,
        }
    }

    /// `namespace/name`, used as the log and event key.
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

// ---------------------------------------------------------------------------
// VariableStore
// ---------------------------------------------------------------------------

/// A single name/value pair held by a [`VariableStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub name: String,
    pub value: String,
}

impl Binding {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableStoreSpec {
    #[serde(default)]
    pub vars: Vec<Binding>,
}

/// Persisted, ordered collection of bindings that seeds expression evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableStore {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: VariableStoreSpec,
}

impl VariableStore {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, vars: Vec<Binding>) -> Self {
        Self {
            metadata: ObjectMeta::new(namespace, name),
            spec: VariableStoreSpec { vars },
        }
    }

    /// Index of the first binding called `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.spec.vars.iter().position(|b| b.name == name)
    }

    /// Value of the first binding called `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.spec
            .vars
            .iter()
            .find(|b| b.name == name)
            .map(|b| b.value.as_str())
    }
}

// ---------------------------------------------------------------------------
// TaskRun
// ---------------------------------------------------------------------------

/// Reference from a run to the resource that owns its semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRef {
    pub api_version: String,
    pub kind: String,
    /// Empty when the run evaluates without a backing store.
    #[serde(default)]
    pub name: String,
}

/// One requested expression. `value` holds the expression source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

impl Param {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSpec {
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<ObjectRef>,
    #[serde(default)]
    pub params: Vec<Param>,
}

/// The long-lived run reconciled by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRun {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: RunSpec,
    #[serde(default)]
    pub status: RunStatus,
}

impl TaskRun {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta::new(namespace, name),
            spec: RunSpec::default(),
            status: RunStatus::default(),
        }
    }

    /// Point the run at a resource. An empty `name` means "no store".
    pub fn with_ref(
        mut self,
        api_version: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        self.spec.reference = Some(ObjectRef {
            api_version: api_version.into(),
            kind: kind.into(),
            name: name.into(),
        });
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, expression: impl Into<String>) -> Self {
        self.spec.params.push(Param::new(name, expression));
        self
    }

    pub fn with_creation_timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.metadata.creation_timestamp = Some(ts);
        self
    }

    /// Name of the referenced store, if one was supplied.
    pub fn store_name(&self) -> Option<&str> {
        self.spec
            .reference
            .as_ref()
            .map(|r| r.name.as_str())
            .filter(|n| !n.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_position_returns_first_match() {
        let store = VariableStore::new(
            "default",
            "vars",
            vec![
                Binding::new("x", "1"),
                Binding::new("y", "2"),
                Binding::new("x", "3"),
            ],
        );
        assert_eq!(store.position("x"), Some(0));
        assert_eq!(store.get("x"), Some("1"));
        assert_eq!(store.position("z"), None);
    }

    #[test]
    fn store_deserializes_without_vars() {
        let store: VariableStore =
            serde_json::from_str(r#"{"metadata":{"name":"empty"}}"#).unwrap();
        assert_eq!(store.metadata.namespace, "default");
        assert_eq!(store.metadata.resource_version, 0);
        assert!(store.spec.vars.is_empty());
    }

    #[test]
    fn run_ref_serializes_as_ref() {
        let run = TaskRun::new("ci", "run-1")
            .with_ref("custom.tekton.dev/v1alpha1", "VariableStore", "vars")
            .with_param("a", "1 + 1");
        let json = serde_json::to_value(&run).unwrap();
        assert_eq!(json["spec"]["ref"]["apiVersion"], "custom.tekton.dev/v1alpha1");
        assert_eq!(json["spec"]["ref"]["kind"], "VariableStore");
        assert_eq!(json["spec"]["params"][0]["value"], "1 + 1");
    }

    #[test]
    fn store_name_ignores_empty_ref_name() {
        let run = TaskRun::new("ci", "r").with_ref("v1", "VariableStore", "");
        assert_eq!(run.store_name(), None);

        let run = run.with_ref("v1", "VariableStore", "vars");
        assert_eq!(run.store_name(), Some("vars"));
    }

    #[test]
    fn missing_param_value_defaults_to_empty() {
        let param: Param = serde_json::from_str(r#"{"name":"a"}"#).unwrap();
        assert_eq!(param.value, "");
    }
}
