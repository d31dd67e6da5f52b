//! The tier handler seam.
//!
//! The orchestrator only knows [`TierHandler`] trait objects indexed by
//! [`Tier::ordinal`](crate::domain::models::Tier::ordinal); each strategy is
//! one implementation.

use std::path::Path;

use async_trait::async_trait;

use crate::domain::models::{Tier, TierOutcome, TierStatus, WorkUnit};
use crate::infrastructure::process::Cancellation;

// ---------------------------------------------------------------------------
// TierContext
// ---------------------------------------------------------------------------

/// Everything a tier may look at while handling one unit.
#[derive(Debug, Clone, Copy)]
pub struct TierContext<'a> {
    /// The unit being handled.
    pub unit: &'a WorkUnit,
    /// 1-based attempt number within the current tier.
    pub attempt: u32,
    /// Outcomes recorded so far for this unit, in cascade order.
    pub history: &'a [TierOutcome],
    /// The unit's private working directory.
    pub workspace: &'a Path,
    /// Run-level cancellation.
    pub cancel: &'a Cancellation,
}

impl TierContext<'_> {
    /// The settled status of `tier` in this unit's history, if it ran.
    pub fn settled_status(&self, tier: Tier) -> Option<TierStatus> {
        self.history
            .iter()
            .rev()
            .find(|outcome| outcome.tier == tier)
            .map(|outcome| outcome.status)
    }
}

// ---------------------------------------------------------------------------
// TierHandler
// ---------------------------------------------------------------------------

/// One test-acquisition strategy.
///
/// Handlers never fail: every problem is classified into the returned
/// [`TierOutcome`].
#[async_trait]
pub trait TierHandler: Send + Sync {
    /// The tier this handler implements.
    fn tier(&self) -> Tier;

    /// Extra attempts allowed after a retryable failure.
    fn retries(&self) -> u32 {
        0
    }

    /// Run one attempt against `ctx.unit`.
    async fn attempt(&self, ctx: &TierContext<'_>) -> TierOutcome;
}
