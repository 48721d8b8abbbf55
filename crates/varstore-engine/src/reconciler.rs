//! The reconciliation pass for a single run.

use std::sync::Arc;

use chrono::Utc;
use varstore_expr::ExpressionRuntime;
use varstore_types::{TaskRun, VarStoreError, VariableStore};

use crate::client::VariableStoreClient;
use crate::config::ReconcilerConfig;
use crate::environment::build_environment;
use crate::evaluator::evaluate_params;
use crate::events::{EventEmitter, RunEvent};
use crate::outcome::Outcome;
use crate::sync::commit;
use crate::validation::validate_or_raise;

/// Drives runs that reference a VariableStore to a terminal condition.
///
/// Holds no per-run state; one reconciler can serve many runs concurrently.
pub struct Reconciler {
    config: ReconcilerConfig,
    client: Arc<dyn VariableStoreClient>,
    runtime: Arc<dyn ExpressionRuntime>,
    events: EventEmitter,
}

impl Reconciler {
    pub fn new(client: Arc<dyn VariableStoreClient>, runtime: Arc<dyn ExpressionRuntime>) -> Self {
        Self::with_config(ReconcilerConfig::default(), client, runtime)
    }

    pub fn with_config(
        config: ReconcilerConfig,
        client: Arc<dyn VariableStoreClient>,
        runtime: Arc<dyn ExpressionRuntime>,
    ) -> Self {
        let events = EventEmitter::new(config.event_capacity.max(1));
        Self {
            config,
            client,
            runtime,
            events,
        }
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    pub fn events(&self) -> &EventEmitter {
        &self.events
    }

    /// Whether `run` references the api version and kind this reconciler handles.
    pub fn owns(&self, run: &TaskRun) -> bool {
        run.spec.reference.as_ref().is_some_and(|r| {
            r.api_version == self.config.api_version && r.kind == self.config.kind
        })
    }

    /// Run one pass over `run`, updating its status in place.
    ///
    /// Terminal failures are recorded on the run and returned as `Ok`; only
    /// errors worth retrying later come back as `Err`, with the run left
    /// `Running`.
    pub async fn reconcile(&self, run: &mut TaskRun) -> varstore_types::Result<Outcome> {
        let key = run.metadata.key();

        if !self.owns(run) {
            tracing::warn!(run = %key, "Run does not reference a VariableStore, ignoring");
            return Ok(Outcome::NotOwned);
        }

        if run.status.condition.is_none() || !run.status.has_started() {
            let before = run.status.condition.clone();
            run.status.initialize(Utc::now());
            clamp_start_time(run);
            tracing::info!(run = %key, "Run started");
            self.events.emit(RunEvent {
                run: key.clone(),
                before,
                after: run.status.condition.clone(),
            });
        }

        if run.status.is_done() {
            tracing::info!(run = %key, "Run is already done");
            return Ok(Outcome::AlreadyDone);
        }

        let before = run.status.condition.clone();
        let result = self.pass(run).await;

        match &result {
            Ok(outcome) => {
                record(run, outcome);
                match outcome {
                    Outcome::Succeeded(results) => {
                        tracing::info!(run = %key, results = results.len(), "Run succeeded")
                    }
                    other => tracing::error!(
                        run = %key,
                        reason = ?other.reason_code(),
                        detail = %other.message().unwrap_or_default(),
                        "Run failed"
                    ),
                }
            }
            Err(e) => tracing::error!(run = %key, error = %e, "Reconcile error"),
        }

        let event = RunEvent {
            run: key,
            before,
            after: run.status.condition.clone(),
        };
        if event.is_transition() {
            self.events.emit(event);
        }
        result
    }

    async fn pass(&self, run: &TaskRun) -> varstore_types::Result<Outcome> {
        match validate_or_raise(&run.spec) {
            Ok(()) => {}
            Err(VarStoreError::Validation(reason)) => return Ok(Outcome::FailedValidation(reason)),
            Err(e) => return Err(e),
        }

        let store = match self.load_store(run).await {
            Ok(store) => store,
            Err(outcome) => return Ok(outcome),
        };

        let seed = build_environment(store.as_ref(), &run.spec.params);
        let outcome = evaluate_params(self.runtime.as_ref(), seed, &run.spec.params)?;

        let Outcome::Succeeded(results) = outcome else {
            return Ok(outcome);
        };

        if let Some(store) = &store {
            if let Err(e) = commit(self.client.as_ref(), store, &results).await {
                return Ok(Outcome::FailedPersist(format!(
                    "Update VariableStore {} failed: {e}",
                    store.metadata.name
                )));
            }
        }

        Ok(Outcome::Succeeded(results))
    }

    async fn load_store(&self, run: &TaskRun) -> Result<Option<VariableStore>, Outcome> {
        let Some(name) = run.store_name() else {
            return Ok(None);
        };
        self.client
            .get(&run.metadata.namespace, name)
            .await
            .map(Some)
            .map_err(|e| {
                Outcome::FailedLookup(format!(
                    "Error retrieving VariableStore {name} for Run {}: {e}",
                    run.metadata.key()
                ))
            })
    }
}

/// Keep the start time from preceding the run's creation.
fn clamp_start_time(run: &mut TaskRun) {
    if let (Some(start), Some(created)) =
        (run.status.start_time, run.metadata.creation_timestamp)
    {
        if start < created {
            run.status.start_time = Some(created);
        }
    }
}

fn record(run: &mut TaskRun, outcome: &Outcome) {
    let (Some(reason), Some(message)) = (outcome.reason_code(), outcome.message()) else {
        return;
    };
    match outcome {
        Outcome::Succeeded(results) => {
            run.status.results.extend(results.iter().cloned());
            run.status.mark_succeeded(reason, message);
        }
        _ => run.status.mark_failed(reason, message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use varstore_expr::{CelRuntime, Declaration, Environment, RuntimeError};
    use varstore_types::{ConditionStatus, ReasonCode, RunState};

    use crate::client::MemoryStore;
    use crate::config::{DEFAULT_API_VERSION, DEFAULT_KIND};

    fn reconciler() -> Reconciler {
        Reconciler::new(Arc::new(MemoryStore::new()), Arc::new(CelRuntime::new()))
    }

    #[test]
    fn ownership_requires_matching_ref() {
        let r = reconciler();
        let owned = TaskRun::new("default", "r").with_ref(DEFAULT_API_VERSION, DEFAULT_KIND, "");
        let wrong_kind = TaskRun::new("default", "r").with_ref(DEFAULT_API_VERSION, "TaskLoop", "");
        let wrong_api = TaskRun::new("default", "r").with_ref("other/v1", DEFAULT_KIND, "");
        let none = TaskRun::new("default", "r");

        assert!(r.owns(&owned));
        assert!(!r.owns(&wrong_kind));
        assert!(!r.owns(&wrong_api));
        assert!(!r.owns(&none));
    }

    #[tokio::test]
    async fn unowned_run_is_untouched() {
        let r = reconciler();
        let mut run = TaskRun::new("default", "r").with_param("a", "1");
        let before = run.clone();

        let outcome = r.reconcile(&mut run).await.unwrap();
        assert_eq!(outcome, Outcome::NotOwned);
        assert_eq!(run, before);
    }

    #[tokio::test]
    async fn start_time_never_precedes_creation() {
        let r = reconciler();
        let created = Utc::now() + Duration::hours(1);
        let mut run = TaskRun::new("default", "r")
            .with_ref(DEFAULT_API_VERSION, DEFAULT_KIND, "")
            .with_creation_timestamp(created)
            .with_param("a", "1 + 1");

        r.reconcile(&mut run).await.unwrap();
        assert_eq!(run.status.start_time, Some(created));
        assert_eq!(run.status.state(), RunState::Succeeded);
    }

    #[tokio::test]
    async fn done_run_keeps_its_start_time() {
        let r = reconciler();
        let created = Utc::now();
        let started = created - Duration::minutes(5);
        let mut run = TaskRun::new("default", "r")
            .with_ref(DEFAULT_API_VERSION, DEFAULT_KIND, "")
            .with_creation_timestamp(created)
            .with_param("a", "1");
        run.status.initialize(started);
        run.status.mark_succeeded(ReasonCode::EvaluationSuccess, "done");
        let before = run.clone();

        let outcome = r.reconcile(&mut run).await.unwrap();
        assert_eq!(outcome, Outcome::AlreadyDone);
        assert_eq!(run.status.start_time, Some(started));
        assert_eq!(run, before);
    }

    #[tokio::test]
    async fn retryable_error_emits_no_event() {
        let r = Reconciler::new(Arc::new(MemoryStore::new()), Arc::new(UnavailableRuntime));
        let mut run = TaskRun::new("default", "r")
            .with_ref(DEFAULT_API_VERSION, DEFAULT_KIND, "")
            .with_param("a", "1");
        let mut rx = r.events().subscribe();

        assert!(r.reconcile(&mut run).await.is_err());
        let started = rx.recv().await.unwrap();
        assert!(started.before.is_none());
        // The pass left the run Running, so nothing changed.
        assert!(rx.try_recv().is_err());
    }

    struct UnavailableRuntime;

    impl ExpressionRuntime for UnavailableRuntime {
        fn new_environment(
            &self,
            _declarations: &[Declaration],
        ) -> Result<Box<dyn Environment>, RuntimeError> {
            Err(RuntimeError::Unavailable("warming up".into()))
        }
    }

    #[tokio::test]
    async fn storeless_run_succeeds_without_writes() {
        let r = reconciler();
        let mut run = TaskRun::new("default", "r")
            .with_ref(DEFAULT_API_VERSION, DEFAULT_KIND, "")
            .with_param("a", "2 * 3");

        let outcome = r.reconcile(&mut run).await.unwrap();
        assert!(outcome.is_success());
        let cond = run.status.condition.as_ref().unwrap();
        assert_eq!(cond.status, ConditionStatus::True);
        assert_eq!(cond.reason, "EvaluationSuccess");
        assert_eq!(run.status.results[0].value, "6");
    }
}
