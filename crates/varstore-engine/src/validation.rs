//! Structural validation of a run's parameters.
//!
//! Runs before the store is read. Every violation is collected so the run's
//! failure message lists all of them at once. Call [`validate`] for the
//! violation list or [`validate_or_raise`] to turn them into an error.

use std::fmt;

use varstore_types::{RunSpec, VarStoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Path of the offending field, e.g. `params.sum.value`.
    pub field: String,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.message, self.field)
    }
}

pub fn validate(spec: &RunSpec) -> Vec<Violation> {
    let mut violations = Vec::new();

    if spec.params.is_empty() {
        violations.push(Violation {
            field: "params".into(),
            message: "missing field(s)".into(),
        });
    }

    for param in &spec.params {
        // Whitespace-only sources are left for the compiler to reject.
        if param.value.is_empty() {
            violations.push(Violation {
                field: format!("params.{}.value", param.name),
                message: format!(
                    "invalid value: expression parameter {} must be a non-empty string",
                    param.name
                ),
            });
        }
    }

    violations
}

/// Join all violations into one message, or `Ok(())` when there are none.
pub fn validate_or_raise(spec: &RunSpec) -> varstore_types::Result<()> {
    let violations = validate(spec);
    if violations.is_empty() {
        return Ok(());
    }
    let joined = violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ");
    Err(VarStoreError::Validation(joined))
}

#[cfg(test)]
mod tests {
    use super::*;
    use varstore_types::Param;

    #[test]
    fn empty_params_rejected() {
        let violations = validate(&RunSpec::default());
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "params");
    }

    #[test]
    fn collects_every_empty_expression() {
        let spec = RunSpec {
            reference: None,
            params: vec![
                Param::new("a", ""),
                Param::new("b", "1 + 1"),
                Param::new("c", ""),
                Param::new("d", "  "),
            ],
        };
        let violations = validate(&spec);
        let fields: Vec<_> = violations.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, ["params.a.value", "params.c.value"]);
    }

    #[test]
    fn raise_joins_messages() {
        let spec = RunSpec {
            reference: None,
            params: vec![Param::new("a", ""), Param::new("b", "")],
        };
        let err = validate_or_raise(&spec).unwrap_err();
        assert!(matches!(err, VarStoreError::Validation(_)));
        let text = err.to_string();
        assert!(text.contains("params.a.value"), "{text}");
        assert!(text.contains("params.b.value"), "{text}");
    }

    #[test]
    fn valid_spec_passes() {
        let spec = RunSpec {
            reference: None,
            params: vec![Param::new("sum", "1 + 2")],
        };
        assert!(validate(&spec).is_empty());
        assert!(validate_or_raise(&spec).is_ok());
    }
}
