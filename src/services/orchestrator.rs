//! Tier orchestrator: drives one unit through the cascade.
//!
//! The orchestrator owns no tier logic. It walks the [`CascadePlan`]
//! transitions, calls the registered [`TierHandler`] for each tier, repeats
//! retryable attempts with exponential backoff, and records every attempt
//! in the unit's history.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use tracing::{debug, info, instrument, warn};

use super::tiers::{TierContext, TierHandler};
use crate::domain::models::{
    should_retry, CascadePlan, CascadeState, ExhaustReason, FinalStatus, RetryConfig, Tier,
    TierOutcome, TierStatus, UnitRecord, WorkUnit,
};
use crate::infrastructure::process::Cancellation;

/// Notified after every tier attempt, before the cascade moves on.
#[async_trait]
pub trait AttemptObserver: Send + Sync {
    /// `outcome` was just appended to `unit`'s history.
    async fn on_attempt(&self, unit: &WorkUnit, outcome: &TierOutcome);
}

/// Per-unit cascade driver shared by all workers.
pub struct TierOrchestrator {
    handlers: [Option<Arc<dyn TierHandler>>; Tier::CASCADE.len()],
    restriction: Option<Tier>,
    retry: RetryConfig,
    cancel: Cancellation,
}

impl TierOrchestrator {
    /// Register `handlers` by the tier they report.
    ///
    /// A later handler for the same tier replaces an earlier one.
    pub fn new(
        handlers: impl IntoIterator<Item = Arc<dyn TierHandler>>,
        retry: RetryConfig,
        cancel: Cancellation,
    ) -> Self {
        let mut slots: [Option<Arc<dyn TierHandler>>; Tier::CASCADE.len()] = Default::default();
        for handler in handlers {
            if let Some(ordinal) = handler.tier().ordinal() {
                slots[ordinal] = Some(handler);
            }
        }
        Self {
            handlers: slots,
            restriction: None,
            retry,
            cancel,
        }
    }

    /// Run only `tier` for every unit.
    #[must_use]
    pub const fn with_restriction(mut self, restriction: Option<Tier>) -> Self {
        self.restriction = restriction;
        self
    }

    /// The single tier this orchestrator is restricted to.
    pub const fn restriction(&self) -> Option<Tier> {
        self.restriction
    }

    fn handler(&self, tier: Tier) -> Option<&Arc<dyn TierHandler>> {
        tier.ordinal()
            .and_then(|ordinal| self.handlers.get(ordinal))
            .and_then(Option::as_ref)
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(self.retry.initial_backoff_ms))
            .with_max_interval(Duration::from_millis(self.retry.max_backoff_ms))
            .with_max_elapsed_time(None)
            .build()
    }

    /// Drive `unit` from `PENDING` to a terminal state.
    ///
    /// `on_attempt` sees every outcome as soon as it is recorded.
    #[instrument(
        skip_all,
        fields(project = %unit.id.project, sha = %unit.id.short_sha(), file = %unit.id.file_name)
    )]
    pub async fn process(
        &self,
        unit: &WorkUnit,
        workspace: &Path,
        on_attempt: Option<&dyn AttemptObserver>,
    ) -> UnitRecord {
        let plan = CascadePlan::new(self.restriction, unit.malformed_reason());
        let mut attempts: Vec<TierOutcome> = Vec::new();
        let mut state = plan.start();

        while let CascadeState::Running(tier) = state {
            if self.cancel.is_cancelled() {
                state = CascadeState::Exhausted(ExhaustReason::Cancelled);
                break;
            }
            let settled = self
                .run_tier(tier, unit, workspace, &mut attempts, on_attempt)
                .await;
            state = if settled != TierStatus::Success && self.cancel.is_cancelled() {
                CascadeState::Exhausted(ExhaustReason::Cancelled)
            } else {
                plan.advance(tier, settled)
            };
        }

        let (final_status, diagnostic) = match state {
            CascadeState::Succeeded(tier) => (FinalStatus::resolved_by(tier), None),
            CascadeState::Exhausted(reason) => (FinalStatus::Exhausted, Some(reason.to_string())),
            CascadeState::Pending | CascadeState::Running(_) => (
                FinalStatus::Exhausted,
                Some(ExhaustReason::AllTiersExhausted.to_string()),
            ),
        };
        info!(
            final_status = %final_status,
            attempts = attempts.len(),
            diagnostic = diagnostic.as_deref().unwrap_or(""),
            "Unit settled"
        );

        UnitRecord {
            unit: unit.id.clone(),
            attempts,
            final_status,
            diagnostic,
        }
    }

    /// Attempt `tier` until it settles; returns the settled status.
    async fn run_tier(
        &self,
        tier: Tier,
        unit: &WorkUnit,
        workspace: &Path,
        attempts: &mut Vec<TierOutcome>,
        on_attempt: Option<&dyn AttemptObserver>,
    ) -> TierStatus {
        let Some(handler) = self.handler(tier) else {
            let outcome = TierOutcome::no_candidate(tier, "no handler registered for this tier");
            if let Some(observer) = on_attempt {
                observer.on_attempt(unit, &outcome).await;
            }
            attempts.push(outcome);
            return TierStatus::NoCandidate;
        };

        let mut backoff = self.backoff();
        let mut attempt: u32 = 1;
        loop {
            let outcome = {
                let ctx = TierContext {
                    unit,
                    attempt,
                    history: attempts.as_slice(),
                    workspace,
                    cancel: &self.cancel,
                };
                handler.attempt(&ctx).await.with_attempt(attempt)
            };
            let status = outcome.status;
            debug!(
                tier = %tier,
                status = %status,
                attempt,
                diagnostic = outcome.diagnostic.as_deref().unwrap_or(""),
                "Tier attempt finished"
            );
            if let Some(observer) = on_attempt {
                observer.on_attempt(unit, &outcome).await;
            }
            attempts.push(outcome);

            if !should_retry(status, attempt, handler.retries()) || self.cancel.is_cancelled() {
                return status;
            }

            let delay = backoff
                .next_backoff()
                .unwrap_or_else(|| Duration::from_millis(self.retry.max_backoff_ms));
            warn!(tier = %tier, status = %status, attempt, delay = ?delay, "Retrying tier");
            tokio::select! {
                () = self.cancel.cancelled() => return status,
                () = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{FileChange, UnitId};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Scripted {
        tier: Tier,
        retries: u32,
        outcomes: Mutex<VecDeque<TierStatus>>,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(tier: Tier, statuses: &[TierStatus]) -> Arc<Self> {
            Self::with_retries(tier, 0, statuses)
        }

        fn with_retries(tier: Tier, retries: u32, statuses: &[TierStatus]) -> Arc<Self> {
            Arc::new(Self {
                tier,
                retries,
                outcomes: Mutex::new(statuses.iter().copied().collect()),
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TierHandler for Scripted {
        fn tier(&self) -> Tier {
            self.tier
        }

        fn retries(&self) -> u32 {
            self.retries
        }

        async fn attempt(&self, _ctx: &TierContext<'_>) -> TierOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let status = self
                .outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(TierStatus::NoCandidate);
            match status {
                TierStatus::Success => TierOutcome::success(self.tier, "artifact"),
                TierStatus::NoCandidate => TierOutcome::no_candidate(self.tier, "none"),
                TierStatus::ToolFailure => TierOutcome::tool_failure(self.tier, "boom"),
                TierStatus::Timeout => TierOutcome::timeout(self.tier, "slow"),
                TierStatus::CompileFailure => TierOutcome::compile_failure(self.tier, "1 error"),
            }
        }
    }

    fn unit(after: &str) -> WorkUnit {
        WorkUnit {
            id: UnitId::new("p", "abcdef0123", "src/main/java/Foo.java"),
            change: FileChange {
                file_name: "src/main/java/Foo.java".to_string(),
                before_source: "class Foo {}".to_string(),
                after_source: after.to_string(),
            },
        }
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
        }
    }

    fn orchestrator(handlers: Vec<Arc<dyn TierHandler>>) -> TierOrchestrator {
        TierOrchestrator::new(handlers, fast_retry(), Cancellation::never())
    }

    #[tokio::test]
    async fn first_success_halts_the_cascade() {
        let t1 = Scripted::new(Tier::Extracted, &[TierStatus::Success]);
        let t2 = Scripted::new(Tier::DoubleChecked, &[]);
        let orch = orchestrator(vec![t1.clone(), t2.clone()]);

        let record = orch.process(&unit("class Foo {}"), Path::new("."), None).await;
        assert_eq!(record.final_status, FinalStatus::Extracted);
        assert_eq!(record.attempts.len(), 1);
        assert_eq!(record.diagnostic, None);
        assert_eq!(t2.calls(), 0);
    }

    #[tokio::test]
    async fn retryable_failure_is_retried_within_budget() {
        let t1 = Scripted::new(Tier::Extracted, &[]);
        let t2 = Scripted::new(Tier::DoubleChecked, &[]);
        let t3a = Scripted::with_retries(
            Tier::GeneratedPrimary,
            2,
            &[TierStatus::ToolFailure, TierStatus::Timeout, TierStatus::Success],
        );
        let orch = orchestrator(vec![t1, t2, t3a.clone()]);

        let record = orch.process(&unit("class Foo {}"), Path::new("."), None).await;
        assert_eq!(record.final_status, FinalStatus::GeneratedPrimary);
        assert_eq!(t3a.calls(), 3);
        let attempts: Vec<u32> = record
            .attempts
            .iter()
            .filter(|o| o.tier == Tier::GeneratedPrimary)
            .map(|o| o.attempt)
            .collect();
        assert_eq!(attempts, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn compile_failure_is_never_retried() {
        let t3a = Scripted::with_retries(Tier::GeneratedPrimary, 3, &[TierStatus::CompileFailure]);
        let t3b = Scripted::new(Tier::GeneratedFallback, &[TierStatus::NoCandidate]);
        let orch = orchestrator(vec![
            Scripted::new(Tier::Extracted, &[]),
            Scripted::new(Tier::DoubleChecked, &[]),
            t3a.clone(),
            t3b.clone(),
        ]);

        let record = orch.process(&unit("class Foo {}"), Path::new("."), None).await;
        assert_eq!(t3a.calls(), 1);
        assert_eq!(t3b.calls(), 1);
        assert_eq!(record.final_status, FinalStatus::Exhausted);
        assert_eq!(record.diagnostic.as_deref(), Some("all tiers exhausted"));
        assert_eq!(record.attempts.len(), 4);
    }

    #[tokio::test]
    async fn malformed_unit_skips_generation() {
        let t3a = Scripted::new(Tier::GeneratedPrimary, &[TierStatus::Success]);
        let orch = orchestrator(vec![
            Scripted::new(Tier::Extracted, &[]),
            Scripted::new(Tier::DoubleChecked, &[]),
            t3a.clone(),
        ]);

        let record = orch.process(&unit(""), Path::new("."), None).await;
        assert_eq!(t3a.calls(), 0);
        assert_eq!(record.final_status, FinalStatus::Exhausted);
        assert!(record.diagnostic.unwrap().starts_with("malformed source"));
        assert!(record.attempts.iter().all(|o| !o.tier.is_generative()));
    }

    #[tokio::test]
    async fn restriction_runs_one_tier() {
        let t1 = Scripted::new(Tier::Extracted, &[TierStatus::Success]);
        let t2 = Scripted::new(Tier::DoubleChecked, &[TierStatus::NoCandidate]);
        let orch = orchestrator(vec![t1.clone(), t2.clone()])
            .with_restriction(Some(Tier::DoubleChecked));

        let record = orch.process(&unit("class Foo {}"), Path::new("."), None).await;
        assert_eq!(t1.calls(), 0);
        assert_eq!(record.attempts.len(), 1);
        assert_eq!(record.diagnostic.as_deref(), Some("tier restricted"));
    }

    #[tokio::test]
    async fn cancelled_run_records_cancellation() {
        let (handle, token) = Cancellation::pair();
        handle.cancel();
        let t1 = Scripted::new(Tier::Extracted, &[TierStatus::Success]);
        let orch = TierOrchestrator::new(vec![t1.clone() as Arc<dyn TierHandler>], fast_retry(), token);

        let record = orch.process(&unit("class Foo {}"), Path::new("."), None).await;
        assert_eq!(t1.calls(), 0);
        assert_eq!(record.final_status, FinalStatus::Exhausted);
        assert_eq!(record.diagnostic.as_deref(), Some("run cancelled"));
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Tier>>);

    #[async_trait]
    impl AttemptObserver for Recorder {
        async fn on_attempt(&self, _unit: &WorkUnit, outcome: &TierOutcome) {
            self.0.lock().unwrap().push(outcome.tier);
        }
    }

    #[tokio::test]
    async fn observer_sees_every_attempt() {
        let recorder = Recorder::default();
        let orch = orchestrator(vec![Scripted::new(Tier::Extracted, &[])]);

        let record = orch
            .process(&unit("class Foo {}"), Path::new("."), Some(&recorder))
            .await;
        assert_eq!(*recorder.0.lock().unwrap(), Tier::CASCADE.to_vec());
        assert_eq!(record.attempts.len(), 4);
    }
}
