use chrono::{DateTime, Duration, Utc};

use crate::stats::round2;

/// Fraction of expected schedule checkpoints for which a timely successful
/// execution exists, in [0, 100].
///
/// Checkpoints are generated by walking backward from `now` in steps of
/// `interval_minutes` until `period_start` (inclusive), modelling "a sync
/// was expected at every interval boundary since the window opened". A
/// checkpoint is satisfied when any successful stop time falls within
/// `[checkpoint - window, checkpoint]`, which tolerates jitter while still
/// penalizing pipelines that silently stop running. Zero checkpoints (a
/// period shorter than one interval) reads as 100.
pub fn freshness_percent(
    succeeded_stops: &[DateTime<Utc>],
    interval_minutes: u32,
    window_minutes: u32,
    period_start: DateTime<Utc>,
    now: DateTime<Utc>,
) -> f64 {
    let interval = Duration::minutes(interval_minutes as i64);
    let window = Duration::minutes(window_minutes as i64);

    let mut checkpoints = Vec::new();
    let mut t = now;
    while t >= period_start {
        checkpoints.push(t);
        t = t - interval;
    }
    if checkpoints.is_empty() {
        return 100.0;
    }

    let on_time = checkpoints
        .iter()
        .filter(|checkpoint| {
            let window_start = **checkpoint - window;
            succeeded_stops
                .iter()
                .any(|stop| *stop >= window_start && *stop <= **checkpoint)
        })
        .count();

    round2(on_time as f64 / checkpoints.len() as f64 * 100.0)
}
