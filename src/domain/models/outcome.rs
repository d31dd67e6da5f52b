//! Tier outcomes and per-unit attempt history.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::unit::UnitId;

// ---------------------------------------------------------------------------
// Tier
// ---------------------------------------------------------------------------

/// A test-acquisition strategy, ordered by cost.
///
/// `None` is never attempted; it marks outcomes not attributable to a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    /// Tier 1: existing tests found by naming convention.
    Extracted,
    /// Tier 2: existing tests found by relaxed matching over history.
    DoubleChecked,
    /// Tier 3a: tests synthesized by the primary generator.
    GeneratedPrimary,
    /// Tier 3b: tests synthesized by the fallback generator.
    GeneratedFallback,
    /// No tier.
    None,
}

impl Tier {
    /// The attempted tiers in cascade order.
    pub const CASCADE: [Self; 4] = [
        Self::Extracted,
        Self::DoubleChecked,
        Self::GeneratedPrimary,
        Self::GeneratedFallback,
    ];

    /// Position in [`CASCADE`](Self::CASCADE).
    pub const fn ordinal(self) -> Option<usize> {
        match self {
            Self::Extracted => Some(0),
            Self::DoubleChecked => Some(1),
            Self::GeneratedPrimary => Some(2),
            Self::GeneratedFallback => Some(3),
            Self::None => None,
        }
    }

    /// The tier after this one, if any.
    pub fn next(self) -> Option<Self> {
        self.ordinal()
            .and_then(|i| Self::CASCADE.get(i + 1).copied())
    }

    /// Whether this tier synthesizes tests (and therefore needs sources).
    pub const fn is_generative(self) -> bool {
        matches!(self, Self::GeneratedPrimary | Self::GeneratedFallback)
    }

    /// Short label used on the command line and in logs.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Extracted => "1",
            Self::DoubleChecked => "2",
            Self::GeneratedPrimary => "3a",
            Self::GeneratedFallback => "3b",
            Self::None => "-",
        }
    }

    /// Base name of this tier's report files.
    pub const fn report_name(self) -> &'static str {
        match self {
            Self::Extracted => "tier1_extracted",
            Self::DoubleChecked => "tier2_double_checked",
            Self::GeneratedPrimary => "tier3a_generated_primary",
            Self::GeneratedFallback => "tier3b_generated_fallback",
            Self::None => "none",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Extracted => "EXTRACTED",
            Self::DoubleChecked => "DOUBLE_CHECKED",
            Self::GeneratedPrimary => "GENERATED_PRIMARY",
            Self::GeneratedFallback => "GENERATED_FALLBACK",
            Self::None => "NONE",
        };
        f.write_str(s)
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "extracted" => Ok(Self::Extracted),
            "2" | "double_checked" | "double-checked" => Ok(Self::DoubleChecked),
            "3a" | "generated_primary" | "primary" => Ok(Self::GeneratedPrimary),
            "3b" | "generated_fallback" | "fallback" => Ok(Self::GeneratedFallback),
            other => Err(format!(
                "unknown tier '{other}'; expected one of 1, 2, 3a, 3b"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// TierStatus
// ---------------------------------------------------------------------------

/// Result classification of one tier attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TierStatus {
    /// A usable test artifact exists.
    Success,
    /// The tier ran cleanly but found or produced nothing.
    NoCandidate,
    /// The external tool crashed, exited non-zero, or produced nothing usable.
    ToolFailure,
    /// The external tool exceeded its time budget.
    Timeout,
    /// The unit (or the generated tests) did not compile.
    CompileFailure,
}

impl TierStatus {
    /// Failures worth retrying in place before advancing.
    ///
    /// Compilation is deterministic, so `CompileFailure` is not retryable.
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::ToolFailure | Self::Timeout)
    }
}

impl fmt::Display for TierStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Success => "SUCCESS",
            Self::NoCandidate => "NO_CANDIDATE",
            Self::ToolFailure => "TOOL_FAILURE",
            Self::Timeout => "TIMEOUT",
            Self::CompileFailure => "COMPILE_FAILURE",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// TestEvidence
// ---------------------------------------------------------------------------

/// A test source file found or produced for a unit, with its test methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestEvidence {
    /// Commit the file was read at (empty for generated files).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub commit_sha: String,
    /// Path of the test file (repository-relative or on disk).
    pub path: String,
    /// Names of the test methods found in it.
    #[serde(default)]
    pub test_methods: Vec<String>,
}

// ---------------------------------------------------------------------------
// TierOutcome
// ---------------------------------------------------------------------------

/// The result of running one tier against one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierOutcome {
    /// Tier that produced this outcome.
    pub tier: Tier,
    /// Classification.
    pub status: TierStatus,
    /// 1-based attempt number within the tier.
    #[serde(default = "first_attempt")]
    pub attempt: u32,
    /// Pointer to the produced test source on disk or in the repository.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_reference: Option<String>,
    /// Explanation; always present when `status` is not `Success`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
    /// Random seed handed to a generator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Test files backing a success.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<TestEvidence>,
}

const fn first_attempt() -> u32 {
    1
}

impl TierOutcome {
    fn new(tier: Tier, status: TierStatus, diagnostic: Option<String>) -> Self {
        Self {
            tier,
            status,
            attempt: 1,
            artifact_reference: None,
            diagnostic,
            seed: None,
            evidence: Vec::new(),
        }
    }

    /// A successful outcome pointing at `artifact`.
    pub fn success(tier: Tier, artifact: impl Into<String>) -> Self {
        let mut outcome = Self::new(tier, TierStatus::Success, None);
        outcome.artifact_reference = Some(artifact.into());
        outcome
    }

    /// Nothing found or produced.
    pub fn no_candidate(tier: Tier, diagnostic: impl Into<String>) -> Self {
        Self::new(tier, TierStatus::NoCandidate, Some(diagnostic.into()))
    }

    /// External tool failure.
    pub fn tool_failure(tier: Tier, diagnostic: impl Into<String>) -> Self {
        Self::new(tier, TierStatus::ToolFailure, Some(diagnostic.into()))
    }

    /// Time budget exceeded.
    pub fn timeout(tier: Tier, diagnostic: impl Into<String>) -> Self {
        Self::new(tier, TierStatus::Timeout, Some(diagnostic.into()))
    }

    /// Compilation failure.
    pub fn compile_failure(tier: Tier, diagnostic: impl Into<String>) -> Self {
        Self::new(tier, TierStatus::CompileFailure, Some(diagnostic.into()))
    }

    /// Record the seed used for this attempt.
    ///
    /// The seed is also appended to the diagnostic of a non-success outcome
    /// so that a failing generation can be replayed from the report alone.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        if let Some(diagnostic) = self.diagnostic.as_mut() {
            diagnostic.push_str(&format!(" (seed={seed})"));
        }
        self
    }

    /// Attach test evidence.
    #[must_use]
    pub fn with_evidence(mut self, evidence: Vec<TestEvidence>) -> Self {
        self.evidence = evidence;
        self
    }

    /// Set the attempt number.
    #[must_use]
    pub const fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    /// Whether this outcome ends the cascade.
    pub fn is_success(&self) -> bool {
        self.status == TierStatus::Success
    }

    /// Total number of test methods across the evidence.
    pub fn test_method_count(&self) -> usize {
        self.evidence.iter().map(|e| e.test_methods.len()).sum()
    }
}

// ---------------------------------------------------------------------------
// FinalStatus / UnitRecord
// ---------------------------------------------------------------------------

/// Terminal status of a unit after the cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinalStatus {
    /// Resolved by Tier 1.
    Extracted,
    /// Resolved by Tier 2.
    DoubleChecked,
    /// Resolved by Tier 3a.
    GeneratedPrimary,
    /// Resolved by Tier 3b.
    GeneratedFallback,
    /// No tier produced a usable test.
    Exhausted,
}

impl FinalStatus {
    /// All terminal statuses, in report order.
    pub const ALL: [Self; 5] = [
        Self::Extracted,
        Self::DoubleChecked,
        Self::GeneratedPrimary,
        Self::GeneratedFallback,
        Self::Exhausted,
    ];

    /// The terminal status for a success at `tier`.
    pub const fn resolved_by(tier: Tier) -> Self {
        match tier {
            Tier::Extracted => Self::Extracted,
            Tier::DoubleChecked => Self::DoubleChecked,
            Tier::GeneratedPrimary => Self::GeneratedPrimary,
            Tier::GeneratedFallback => Self::GeneratedFallback,
            Tier::None => Self::Exhausted,
        }
    }

    /// Whether a test oracle was obtained.
    pub const fn is_resolved(self) -> bool {
        !matches!(self, Self::Exhausted)
    }
}

impl fmt::Display for FinalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Extracted => "EXTRACTED",
            Self::DoubleChecked => "DOUBLE_CHECKED",
            Self::GeneratedPrimary => "GENERATED_PRIMARY",
            Self::GeneratedFallback => "GENERATED_FALLBACK",
            Self::Exhausted => "EXHAUSTED",
        };
        f.write_str(s)
    }
}

/// Everything that happened to one unit in one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitRecord {
    /// Unit identity.
    pub unit: UnitId,
    /// Every tier attempt, in cascade order.
    pub attempts: Vec<TierOutcome>,
    /// Terminal status.
    pub final_status: FinalStatus,
    /// Why the unit is exhausted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

impl UnitRecord {
    /// The successful outcome, if any.
    pub fn winning_outcome(&self) -> Option<&TierOutcome> {
        self.attempts.iter().find(|o| o.is_success())
    }

    /// Number of successful outcomes in the history (0 or 1 when well-formed).
    pub fn success_count(&self) -> usize {
        self.attempts.iter().filter(|o| o.is_success()).count()
    }
}
