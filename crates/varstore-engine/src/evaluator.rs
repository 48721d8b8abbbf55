//! Sequential evaluation of a run's parameters.

use varstore_expr::{Declaration, ExpressionRuntime};
use varstore_types::{Param, RunResult, VarStoreError};

use crate::environment::Seed;
use crate::outcome::Outcome;

/// Evaluate `params` in order, each one seeing every earlier result.
///
/// Returns [`Outcome::Succeeded`] with one result per parameter, or the first
/// [`Outcome::FailedSyntax`] / [`Outcome::FailedEvaluation`]; partial results
/// are dropped. Only a failure to build the initial environment is an `Err`.
pub fn evaluate_params(
    runtime: &dyn ExpressionRuntime,
    seed: Seed,
    params: &[Param],
) -> varstore_types::Result<Outcome> {
    let Seed {
        declarations,
        mut context,
    } = seed;

    let mut env = runtime
        .new_environment(&declarations)
        .map_err(|e| VarStoreError::Runtime(e.to_string()))?;

    let mut results = Vec::with_capacity(params.len());
    for param in params {
        let program = match env.compile(&param.value) {
            Ok(program) => program,
            Err(e) => {
                tracing::warn!(param = %param.name, error = %e, "Expression could not be compiled");
                return Ok(Outcome::FailedSyntax {
                    param: param.name.clone(),
                    reason: e.to_string(),
                });
            }
        };

        let value = match program
            .evaluate(&context)
            .and_then(|v| v.to_canonical_string())
        {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(param = %param.name, error = %e, "Expression could not be evaluated");
                return Ok(Outcome::FailedEvaluation {
                    param: param.name.clone(),
                    reason: e.to_string(),
                });
            }
        };

        env = match env.extend(Declaration::dyn_var(&param.name)) {
            Ok(next) => next,
            Err(e) => {
                return Ok(Outcome::FailedEvaluation {
                    param: param.name.clone(),
                    reason: format!("could not be added to the environment: {e}"),
                });
            }
        };

        tracing::debug!(param = %param.name, value = %value, "Expression evaluated");
        context.insert(param.name.clone(), value.clone());
        results.push(RunResult {
            name: param.name.clone(),
            value,
        });
    }

    Ok(Outcome::Succeeded(results))
}
