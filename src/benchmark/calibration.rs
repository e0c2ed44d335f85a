//! Adjustment factor derivation
//!
//! The reference median is a hard prerequisite. When only the target never
//! completes, a supplied cap stands in for the unobservable ratio.

use crate::models::{AggregateStatistics, CalibrationStatus, LanguagePolicy};

/// Factor, machine-checkable status and explanatory notes
#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    pub factor: Option<f64>,
    pub status: CalibrationStatus,
    pub notes: Vec<String>,
}

/// Derive the target/reference adjustment factor
pub fn compute(
    reference: &AggregateStatistics,
    target: &AggregateStatistics,
    factor_cap: Option<f64>,
) -> Calibration {
    let Some(reference_median) = reference.median else {
        return Calibration {
            factor: None,
            status: CalibrationStatus::UnusableBaseline,
            notes: vec![
                "Reference language had no successful runs; baseline unusable, factor not computed."
                    .to_string(),
            ],
        };
    };

    if reference_median <= 0.0 {
        return Calibration {
            factor: None,
            status: CalibrationStatus::UnusableBaseline,
            notes: vec![format!(
                "Reference median is {}s; baseline unusable, factor not computed.",
                reference_median
            )],
        };
    }

    match (target.median, factor_cap) {
        (Some(target_median), _) => Calibration {
            factor: Some(target_median / reference_median),
            status: CalibrationStatus::Calibrated,
            notes: Vec::new(),
        },
        (None, Some(cap)) => Calibration {
            factor: Some(cap),
            status: CalibrationStatus::CappedCensoredTarget,
            notes: vec![
                "Target language had no successful runs (censored data).".to_string(),
                format!("Factor capped at {}x.", cap),
            ],
        },
        (None, None) => Calibration {
            factor: None,
            status: CalibrationStatus::IncompleteCensoredTarget,
            notes: vec![
                "Target language had no successful runs (censored data).".to_string(),
                "Calibration incomplete: no factor cap supplied.".to_string(),
            ],
        },
    }
}

/// Notes for a computed ratio that falls outside the policy band.
///
/// The factor itself is left unchanged.
pub fn policy_notes(calibration: &Calibration, policy: &LanguagePolicy) -> Vec<String> {
    let Some(factor) = calibration.factor else {
        return Vec::new();
    };
    if calibration.status != CalibrationStatus::Calibrated {
        return Vec::new();
    }

    if factor < policy.factor_floor {
        vec![format!(
            "Factor {:.3} is below the policy floor {}.",
            factor, policy.factor_floor
        )]
    } else if factor > policy.factor_cap {
        vec![format!(
            "Factor {:.3} exceeds the policy cap {}.",
            factor, policy.factor_cap
        )]
    } else {
        Vec::new()
    }
}
