//! Metrics collection and analysis
//!
//! Reduces a sample set to robust statistics. Percentiles interpolate
//! linearly between order statistics; stability compares the interquartile
//! range to the median.

use crate::models::{AggregateStatistics, SampleSet, StabilityStatus};

/// Percentile `p` (0-100) of already sorted values.
///
/// Uses rank `k = (n-1)*p/100` and interpolates between `v[floor(k)]` and
/// `v[ceil(k)]`. Returns `None` for an empty slice.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }

    let k = (sorted.len() - 1) as f64 * p / 100.0;
    let f = k.floor();
    let c = k.ceil();

    if f == c {
        return Some(sorted[f as usize]);
    }
    Some(sorted[f as usize] * (c - k) + sorted[c as usize] * (k - f))
}

/// Percentile of unsorted values
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    percentile_sorted(&sorted(values), p)
}

/// Standard median: middle value, or the mean of the two middle values
pub fn median(values: &[f64]) -> Option<f64> {
    let sorted = sorted(values);
    let n = sorted.len();

    match n {
        0 => None,
        _ if n % 2 == 1 => Some(sorted[n / 2]),
        _ => Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0),
    }
}

/// Stable iff `iqr <= threshold * median`; the boundary is stable
pub fn stability(iqr: f64, median: f64, threshold: f64) -> StabilityStatus {
    if iqr <= threshold * median {
        StabilityStatus::Stable
    } else {
        StabilityStatus::Unstable
    }
}

/// Aggregate the successful elapsed times of a sample set
pub fn aggregate(samples: &SampleSet, stability_threshold: f64) -> AggregateStatistics {
    aggregate_values(&samples.successful_seconds(), stability_threshold)
}

/// Aggregate raw elapsed seconds
pub fn aggregate_values(values: &[f64], stability_threshold: f64) -> AggregateStatistics {
    let sorted = sorted(values);

    let (Some(mid), Some(p10), Some(p25), Some(p75), Some(p90)) = (
        median(&sorted),
        percentile_sorted(&sorted, 10.0),
        percentile_sorted(&sorted, 25.0),
        percentile_sorted(&sorted, 75.0),
        percentile_sorted(&sorted, 90.0),
    ) else {
        return AggregateStatistics::no_success();
    };

    let iqr = p75 - p25;

    AggregateStatistics {
        median: Some(mid),
        p10: Some(p10),
        p90: Some(p90),
        iqr: Some(iqr),
        status: stability(iqr, mid, stability_threshold),
    }
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}
