//! Re-running passes that failed for environmental reasons.
//!
//! Stands in for a control-loop work queue: terminal outcomes are returned as
//! they are, a retryable error puts the run back after a delay, and the run
//! stays `Running` while it waits.

use std::time::Duration;

use varstore_types::TaskRun;

use crate::outcome::Outcome;
use crate::reconciler::Reconciler;

/// How often, and how patiently, a run is put back after a retryable error.
///
/// The wait before requeue `n` (0-indexed) is `initial_delay * 2^n`, never
/// more than `max_delay`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequeuePolicy {
    pub max_requeues: usize,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RequeuePolicy {
    pub fn new(max_requeues: usize, initial_delay: Duration) -> Self {
        Self {
            max_requeues,
            initial_delay,
            max_delay: Duration::from_secs(30),
        }
    }

    /// Requeue without waiting.
    pub fn immediate(max_requeues: usize) -> Self {
        Self::new(max_requeues, Duration::ZERO)
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn delay_before(&self, requeue: usize) -> Duration {
        let factor = 1u32.checked_shl(requeue as u32).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for RequeuePolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(500))
    }
}

/// Reconcile `run`, putting it back on retryable errors until the policy's
/// requeue budget runs out.
///
/// Non-retryable errors and every `Ok` outcome return immediately. When the
/// budget runs out the last retryable error is returned.
pub async fn reconcile_with_requeue(
    reconciler: &Reconciler,
    run: &mut TaskRun,
    policy: &RequeuePolicy,
) -> varstore_types::Result<Outcome> {
    let mut requeues = 0;
    loop {
        match reconciler.reconcile(run).await {
            Err(e) if e.is_retryable() && requeues < policy.max_requeues => {
                let delay = policy.delay_before(requeues);
                tracing::warn!(
                    run = %run.metadata.key(),
                    requeue = requeues + 1,
                    delay_ms = %delay.as_millis(),
                    error = %e,
                    "Run requeued"
                );
                tokio::time::sleep(delay).await;
                requeues += 1;
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_up_to_the_cap() {
        let p = RequeuePolicy::new(10, Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(1000));
        assert_eq!(p.delay_before(0), Duration::from_millis(100));
        assert_eq!(p.delay_before(1), Duration::from_millis(200));
        assert_eq!(p.delay_before(3), Duration::from_millis(800));
        assert_eq!(p.delay_before(4), Duration::from_millis(1000));
        assert_eq!(p.delay_before(60), Duration::from_millis(1000));
    }

    #[test]
    fn immediate_never_waits() {
        let p = RequeuePolicy::immediate(3);
        assert_eq!(p.delay_before(0), Duration::ZERO);
        assert_eq!(p.delay_before(40), Duration::ZERO);
    }

    #[test]
    fn default_budget() {
        let p = RequeuePolicy::default();
        assert_eq!(p.max_requeues, 5);
        assert_eq!(p.delay_before(0), Duration::from_millis(500));
        assert_eq!(p.max_delay, Duration::from_secs(30));
    }
}
