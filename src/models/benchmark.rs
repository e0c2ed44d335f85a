//! Benchmark result models

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

use super::policy::{LanguagePolicy, ResourceLimits};

/// Classified outcome of a single sandboxed invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    Timeout,
    RuntimeError,
    StackOverflow,
}

impl OutcomeKind {
    /// Short code used by the grading layer (`success`, `tle`, `rte`, `so`)
    pub fn code(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Timeout => "tle",
            Self::RuntimeError => "rte",
            Self::StackOverflow => "so",
        }
    }
}

impl std::fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Timeout => write!(f, "timeout"),
            Self::RuntimeError => write!(f, "runtime_error"),
            Self::StackOverflow => write!(f, "stack_overflow"),
        }
    }
}

/// Result of one sandboxed invocation.
///
/// `elapsed` is present exactly when the invocation succeeded. The fields are
/// private so that only the constructors below can build a value.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    kind: OutcomeKind,
    elapsed: Option<Duration>,
    stderr: String,
}

impl ExecutionOutcome {
    /// Process exited with status 0
    pub fn success(elapsed: Duration, stderr: impl Into<String>) -> Self {
        Self {
            kind: OutcomeKind::Success,
            elapsed: Some(elapsed),
            stderr: stderr.into(),
        }
    }

    /// Process was killed at the hard timeout
    pub fn timeout(stderr: impl Into<String>) -> Self {
        Self {
            kind: OutcomeKind::Timeout,
            elapsed: None,
            stderr: stderr.into(),
        }
    }

    /// Process exited non-zero for an unrecognized reason
    pub fn runtime_error(stderr: impl Into<String>) -> Self {
        Self {
            kind: OutcomeKind::RuntimeError,
            elapsed: None,
            stderr: stderr.into(),
        }
    }

    /// Process exhausted its stack or the interpreter's recursion limit
    pub fn stack_overflow(stderr: impl Into<String>) -> Self {
        Self {
            kind: OutcomeKind::StackOverflow,
            elapsed: None,
            stderr: stderr.into(),
        }
    }

    pub fn ok(&self) -> bool {
        self.kind == OutcomeKind::Success
    }

    pub fn kind(&self) -> OutcomeKind {
        self.kind
    }

    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed
    }

    pub fn stderr(&self) -> &str {
        &self.stderr
    }
}

/// Measured (non-warm-up) outcomes for one language in one run
#[derive(Debug, Clone, Default)]
pub struct SampleSet {
    outcomes: Vec<ExecutionOutcome>,
}

impl SampleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one measured outcome
    pub fn push(&mut self, outcome: ExecutionOutcome) {
        self.outcomes.push(outcome);
    }

    /// Number of measured invocations, failures included
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn outcomes(&self) -> &[ExecutionOutcome] {
        &self.outcomes
    }

    /// Elapsed seconds of successful invocations, in measurement order
    pub fn successful_seconds(&self) -> Vec<f64> {
        self.outcomes
            .iter()
            .filter_map(|o| o.elapsed())
            .map(|d| d.as_secs_f64())
            .collect()
    }

    /// Count of outcomes per kind
    pub fn histogram(&self) -> BTreeMap<OutcomeKind, usize> {
        let mut counts = BTreeMap::new();
        for outcome in &self.outcomes {
            *counts.entry(outcome.kind()).or_insert(0) += 1;
        }
        counts
    }
}

impl FromIterator<ExecutionOutcome> for SampleSet {
    fn from_iter<I: IntoIterator<Item = ExecutionOutcome>>(iter: I) -> Self {
        Self {
            outcomes: iter.into_iter().collect(),
        }
    }
}

/// Noise verdict for a sample set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StabilityStatus {
    Stable,
    Unstable,
    NoSuccess,
}

impl std::fmt::Display for StabilityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stable => write!(f, "stable"),
            Self::Unstable => write!(f, "unstable"),
            Self::NoSuccess => write!(f, "no_success"),
        }
    }
}

/// Robust statistics over successful elapsed times, in seconds.
///
/// All numeric fields are `None` exactly when `status` is `NoSuccess`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateStatistics {
    pub median: Option<f64>,
    pub p10: Option<f64>,
    pub p90: Option<f64>,
    pub iqr: Option<f64>,
    pub status: StabilityStatus,
}

impl AggregateStatistics {
    /// Statistics for a fully censored sample set
    pub fn no_success() -> Self {
        Self {
            median: None,
            p10: None,
            p90: None,
            iqr: None,
            status: StabilityStatus::NoSuccess,
        }
    }
}

/// How the adjustment factor was (or was not) derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationStatus {
    /// Both medians measured, factor is their ratio
    Calibrated,
    /// Target never succeeded, factor set to the supplied cap
    CappedCensoredTarget,
    /// Target never succeeded and no cap was supplied
    IncompleteCensoredTarget,
    /// Reference never succeeded (or measured zero), no factor
    UnusableBaseline,
}

impl CalibrationStatus {
    /// Whether the record carries a usable adjustment factor
    pub fn has_factor(&self) -> bool {
        matches!(self, Self::Calibrated | Self::CappedCensoredTarget)
    }
}

/// Per-language section of a benchmark record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageReport {
    pub language: String,
    pub image: String,
    /// Successful elapsed seconds, in measurement order
    pub runs: Vec<f64>,
    /// Outcome histogram over all measured invocations
    pub counts: BTreeMap<OutcomeKind, usize>,
    pub stats: AggregateStatistics,
}

impl LanguageReport {
    pub fn from_samples(
        language: &str,
        image: &str,
        samples: &SampleSet,
        stats: AggregateStatistics,
    ) -> Self {
        Self {
            language: language.to_string(),
            image: image.to_string(),
            runs: samples.successful_seconds(),
            counts: samples.histogram(),
            stats,
        }
    }

    /// Total measured invocations, failures included
    pub fn measured_count(&self) -> usize {
        self.counts.values().sum()
    }
}

/// Resource limits applied to each side of the comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLimits {
    pub reference: ResourceLimits,
    pub target: ResourceLimits,
}

/// Complete outcome of one calibration run, handed to persistence.
///
/// Statistics live inside each language section: `reference_stats` is
/// serialized as `reference.stats` and `target_stats` as `target.stats`.
/// [`BenchmarkRecord::reference_stats`] and [`BenchmarkRecord::target_stats`]
/// return them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkRecord {
    pub problem_id: String,
    pub created_at: DateTime<Utc>,
    pub resource_limits: RunLimits,
    pub repeat_count: u32,
    pub warmup_count: u32,
    pub reference: LanguageReport,
    pub target: LanguageReport,
    /// Reference median in seconds; the baseline the factor scales
    pub base_time_reference: Option<f64>,
    pub adjustment_factor: Option<f64>,
    pub calibration_status: CalibrationStatus,
    pub notes: Vec<String>,
    pub schema_version: u32,
}

/// Problem ids double as storage keys: `[A-Za-z0-9._-]+`, not `.` or `..`
pub fn validate_problem_id(problem_id: &str) -> AppResult<()> {
    let valid = !problem_id.is_empty()
        && problem_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && problem_id != "."
        && problem_id != "..";

    if !valid {
        return Err(AppError::InvalidInput(format!(
            "Problem id '{}' cannot be used as a storage key",
            problem_id
        )));
    }
    Ok(())
}

impl BenchmarkRecord {
    pub fn reference_stats(&self) -> &AggregateStatistics {
        &self.reference.stats
    }

    pub fn target_stats(&self) -> &AggregateStatistics {
        &self.target.stats
    }

    /// Scale a reference-language limit for the target language.
    ///
    /// The factor is clamped to the policy band first. Returns `None` when
    /// calibration produced no factor.
    pub fn time_limit_for(&self, reference_limit: f64, policy: &LanguagePolicy) -> Option<f64> {
        self.adjustment_factor
            .map(|factor| reference_limit * policy.clamp_factor(factor))
    }
}
