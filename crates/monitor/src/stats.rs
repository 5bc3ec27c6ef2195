//! Small numeric helpers shared by the analytics computation.

/// Nearest-rank percentile of an unsorted sample: the selected value is
/// always an element of `samples`, never an interpolation. Returns 0 for an
/// empty sample.
pub fn percentile(samples: &[f64], p: u8) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let n = sorted.len();
    let rank = ((p as f64 / 100.0) * n as f64).ceil() as usize;
    sorted[rank.saturating_sub(1).min(n - 1)]
}

/// Round to two decimal places, the precision used for all reported
/// percentages and durations.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
