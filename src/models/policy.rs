//! Language policy model
//!
//! Per-language calibration bounds and sandbox limits. Policies are read-only
//! input: they are loaded once from configuration and never mutated by a run.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CPU_LIMIT, DEFAULT_FACTOR_CAP, DEFAULT_FACTOR_FLOOR, DEFAULT_MEMORY_LIMIT_MB,
    DEFAULT_STABILITY_THRESHOLD,
};

/// Calibration policy for one language
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguagePolicy {
    pub factor_floor: f64,
    pub factor_cap: f64,
    /// CPU cores available to the container
    pub cpu_limit: f64,
    /// Memory (and memory+swap) limit in megabytes
    pub mem_limit_mb: u64,
    /// Stack ulimit in kilobytes, if any
    pub stack_limit_kb: Option<u64>,
    /// Maximum IQR as a fraction of the median (0.05 = 5%)
    pub stability_threshold_pct: f64,
}

impl Default for LanguagePolicy {
    fn default() -> Self {
        Self {
            factor_floor: DEFAULT_FACTOR_FLOOR,
            factor_cap: DEFAULT_FACTOR_CAP,
            cpu_limit: DEFAULT_CPU_LIMIT,
            mem_limit_mb: DEFAULT_MEMORY_LIMIT_MB,
            stack_limit_kb: None,
            stability_threshold_pct: DEFAULT_STABILITY_THRESHOLD,
        }
    }
}

impl LanguagePolicy {
    /// Sandbox limits derived from this policy
    pub fn limits(&self) -> ResourceLimits {
        ResourceLimits {
            cpu_limit: self.cpu_limit,
            memory_limit_mb: self.mem_limit_mb,
            stack_limit_kb: self.stack_limit_kb,
        }
    }

    /// Clamp a factor into `[factor_floor, factor_cap]`
    pub fn clamp_factor(&self, factor: f64) -> f64 {
        factor.max(self.factor_floor).min(self.factor_cap)
    }

    /// Reject policies that cannot produce a meaningful calibration
    pub fn validate(&self) -> Result<(), String> {
        if !(self.factor_floor > 0.0) {
            return Err(format!("factor_floor must be positive, got {}", self.factor_floor));
        }
        if self.factor_cap < self.factor_floor {
            return Err(format!(
                "factor_cap {} is below factor_floor {}",
                self.factor_cap, self.factor_floor
            ));
        }
        if !(self.cpu_limit > 0.0) {
            return Err(format!("cpu_limit must be positive, got {}", self.cpu_limit));
        }
        if self.mem_limit_mb == 0 {
            return Err("mem_limit_mb must be positive".to_string());
        }
        if to_bytes(self.mem_limit_mb, 1024 * 1024).is_none() {
            return Err(format!("mem_limit_mb {} is too large", self.mem_limit_mb));
        }
        if let Some(kb) = self.stack_limit_kb {
            if to_bytes(kb, 1024).is_none() {
                return Err(format!("stack_limit_kb {} is too large", kb));
            }
        }
        if !(self.stability_threshold_pct >= 0.0) {
            return Err(format!(
                "stability_threshold_pct must be non-negative, got {}",
                self.stability_threshold_pct
            ));
        }
        Ok(())
    }
}

/// Policies keyed by language identifier, with a fallback default
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyTable {
    #[serde(flatten)]
    policies: HashMap<String, LanguagePolicy>,
}

impl PolicyTable {
    pub fn new(policies: HashMap<String, LanguagePolicy>) -> Self {
        Self { policies }
    }

    /// Policy for a language, or the built-in default
    pub fn for_language(&self, language: &str) -> LanguagePolicy {
        self.policies.get(language).cloned().unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), String> {
        for (language, policy) in &self.policies {
            policy
                .validate()
                .map_err(|e| format!("policy for '{}': {}", language, e))?;
        }
        Ok(())
    }
}

/// Resource caps enforced by the container runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub cpu_limit: f64,
    pub memory_limit_mb: u64,
    pub stack_limit_kb: Option<u64>,
}

impl ResourceLimits {
    /// CPU quota in units of 1e-9 CPUs, as Docker expects
    pub fn nano_cpus(&self) -> i64 {
        (self.cpu_limit * 1_000_000_000.0) as i64
    }

    /// Memory limit in bytes, saturating at `i64::MAX`
    pub fn memory_bytes(&self) -> i64 {
        to_bytes(self.memory_limit_mb, 1024 * 1024).unwrap_or(i64::MAX)
    }

    pub fn stack_bytes(&self) -> Option<i64> {
        self.stack_limit_kb
            .map(|kb| to_bytes(kb, 1024).unwrap_or(i64::MAX))
    }
}

/// `value * unit` as Docker's signed byte count, `None` on overflow
fn to_bytes(value: u64, unit: u64) -> Option<i64> {
    value
        .checked_mul(unit)
        .and_then(|bytes| i64::try_from(bytes).ok())
}

impl Default for ResourceLimits {
    fn default() -> Self {
        LanguagePolicy::default().limits()
    }
}
