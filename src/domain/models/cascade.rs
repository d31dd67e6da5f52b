//! Cascade state machine.
//!
//! A unit moves `PENDING -> TIER1 -> TIER2 -> TIER3A -> TIER3B` and ends in
//! `SUCCEEDED` or `EXHAUSTED`. Transitions are a pure function of the current
//! tier, the settled status of that tier (after retries), the optional
//! single-tier restriction, and whether the unit is malformed.

use std::fmt;

use super::outcome::{Tier, TierStatus};

/// Why a unit ended without a usable test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExhaustReason {
    /// A single-tier run stopped where the cascade would have continued.
    TierRestricted,
    /// Generation tiers were skipped because a source side is empty.
    Malformed(String),
    /// Every tier was attempted without success.
    AllTiersExhausted,
    /// The run was interrupted while the unit was in flight.
    Cancelled,
}

impl fmt::Display for ExhaustReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TierRestricted => f.write_str("tier restricted"),
            Self::Malformed(reason) => write!(f, "malformed source: {reason}"),
            Self::AllTiersExhausted => f.write_str("all tiers exhausted"),
            Self::Cancelled => f.write_str("run cancelled"),
        }
    }
}

/// Position of a unit in the cascade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CascadeState {
    /// Not started.
    Pending,
    /// The given tier is to be attempted next.
    Running(Tier),
    /// Terminal: the given tier produced a usable test.
    Succeeded(Tier),
    /// Terminal: nothing usable.
    Exhausted(ExhaustReason),
}

impl CascadeState {
    /// Whether no further tier will run.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded(_) | Self::Exhausted(_))
    }
}

/// Per-unit transition rules.
#[derive(Debug, Clone, Default)]
pub struct CascadePlan {
    restriction: Option<Tier>,
    malformed: Option<String>,
}

impl CascadePlan {
    /// Plan for a unit.
    ///
    /// `restriction` limits the run to one tier; `malformed` carries the
    /// reason the unit may not enter generation tiers.
    pub fn new(restriction: Option<Tier>, malformed: Option<String>) -> Self {
        Self {
            restriction: restriction.filter(|t| t.ordinal().is_some()),
            malformed,
        }
    }

    /// The single tier this plan is restricted to.
    pub const fn restriction(&self) -> Option<Tier> {
        self.restriction
    }

    /// Leave `PENDING`.
    pub fn start(&self) -> CascadeState {
        let first = self.restriction.unwrap_or(Tier::Extracted);
        self.enter(first)
    }

    /// Transition after `tier` settled with `status`.
    pub fn advance(&self, tier: Tier, status: TierStatus) -> CascadeState {
        if status == TierStatus::Success {
            return CascadeState::Succeeded(tier);
        }
        if self.restriction.is_some() {
            return CascadeState::Exhausted(ExhaustReason::TierRestricted);
        }
        match tier.next() {
            Some(next) => self.enter(next),
            None => CascadeState::Exhausted(ExhaustReason::AllTiersExhausted),
        }
    }

    fn enter(&self, tier: Tier) -> CascadeState {
        match &self.malformed {
            Some(reason) if tier.is_generative() => {
                CascadeState::Exhausted(ExhaustReason::Malformed(reason.clone()))
            }
            _ => CascadeState::Running(tier),
        }
    }
}

/// Whether a failed attempt should be repeated within the same tier.
///
/// `attempt` is the 1-based number of the attempt that just finished;
/// `retries` is the number of extra attempts the tier may make.
pub const fn should_retry(status: TierStatus, attempt: u32, retries: u32) -> bool {
    status.is_retryable() && attempt <= retries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_cascade_walks_every_tier() {
        let plan = CascadePlan::default();
        let mut state = plan.start();
        let mut visited = Vec::new();
        while let CascadeState::Running(tier) = state {
            visited.push(tier);
            state = plan.advance(tier, TierStatus::NoCandidate);
        }
        assert_eq!(visited, Tier::CASCADE.to_vec());
        assert_eq!(state, CascadeState::Exhausted(ExhaustReason::AllTiersExhausted));
    }

    #[test]
    fn success_halts_immediately() {
        let plan = CascadePlan::default();
        assert_eq!(
            plan.advance(Tier::Extracted, TierStatus::Success),
            CascadeState::Succeeded(Tier::Extracted)
        );
    }

    #[test]
    fn every_failure_kind_advances() {
        let plan = CascadePlan::default();
        for status in [
            TierStatus::NoCandidate,
            TierStatus::ToolFailure,
            TierStatus::Timeout,
            TierStatus::CompileFailure,
        ] {
            assert_eq!(
                plan.advance(Tier::GeneratedPrimary, status),
                CascadeState::Running(Tier::GeneratedFallback)
            );
        }
    }

    #[test]
    fn restriction_runs_only_the_requested_tier() {
        let plan = CascadePlan::new(Some(Tier::DoubleChecked), None);
        assert_eq!(plan.start(), CascadeState::Running(Tier::DoubleChecked));
        assert_eq!(
            plan.advance(Tier::DoubleChecked, TierStatus::NoCandidate),
            CascadeState::Exhausted(ExhaustReason::TierRestricted)
        );
        assert_eq!(
            plan.advance(Tier::DoubleChecked, TierStatus::Success),
            CascadeState::Succeeded(Tier::DoubleChecked)
        );
    }

    #[test]
    fn restriction_to_none_is_ignored() {
        let plan = CascadePlan::new(Some(Tier::None), None);
        assert_eq!(plan.restriction(), None);
        assert_eq!(plan.start(), CascadeState::Running(Tier::Extracted));
    }

    #[test]
    fn malformed_unit_stops_before_generation() {
        let plan = CascadePlan::new(None, Some("after source is empty".into()));
        assert_eq!(plan.start(), CascadeState::Running(Tier::Extracted));
        assert_eq!(
            plan.advance(Tier::Extracted, TierStatus::NoCandidate),
            CascadeState::Running(Tier::DoubleChecked)
        );
        let end = plan.advance(Tier::DoubleChecked, TierStatus::NoCandidate);
        assert_eq!(
            end,
            CascadeState::Exhausted(ExhaustReason::Malformed("after source is empty".into()))
        );
        if let CascadeState::Exhausted(reason) = end {
            assert_eq!(reason.to_string(), "malformed source: after source is empty");
        }
    }

    #[test]
    fn malformed_unit_restricted_to_generation_never_starts() {
        let plan = CascadePlan::new(Some(Tier::GeneratedFallback), Some("x".into()));
        assert!(matches!(
            plan.start(),
            CascadeState::Exhausted(ExhaustReason::Malformed(_))
        ));
    }

    #[test]
    fn retry_budget_counts_extra_attempts() {
        assert!(!should_retry(TierStatus::ToolFailure, 1, 0));
        assert!(should_retry(TierStatus::ToolFailure, 1, 1));
        assert!(!should_retry(TierStatus::ToolFailure, 2, 1));
        assert!(should_retry(TierStatus::Timeout, 2, 2));
        assert!(!should_retry(TierStatus::CompileFailure, 1, 5));
        assert!(!should_retry(TierStatus::NoCandidate, 1, 5));
    }

    #[test]
    fn exhaust_reasons_render_report_diagnostics() {
        assert_eq!(ExhaustReason::TierRestricted.to_string(), "tier restricted");
        assert_eq!(ExhaustReason::Cancelled.to_string(), "run cancelled");
        assert_eq!(ExhaustReason::AllTiersExhausted.to_string(), "all tiers exhausted");
    }
}
