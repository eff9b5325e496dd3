//! Trajectory merging.
//!
//! A mission trail is assembled from two sources: the append-only history of
//! periodic snapshots and the single live slot that the device keeps
//! overwriting. The functions here fold both into one sequence ordered by
//! `recorded_at` in which the live slot appears at most once.

use crate::models::{PositionSample, SampleOrigin, TrajectoryStats};

/// Merges the history with the current live slot.
///
/// The live sample is appended only when it is strictly newer than the last
/// history entry (or when there is no history); otherwise a later history
/// snapshot has already captured it.
pub fn merge(mut history: Vec<PositionSample>, live: Option<PositionSample>) -> Vec<PositionSample> {
    // History should already be ascending; a stable sort keeps equal timestamps in source order.
    history.sort_by_key(|sample| sample.recorded_at);

    if let Some(mut live) = live {
        live.origin = SampleOrigin::Live;
        let is_newer = history
            .last()
            .map(|tail| live.recorded_at > tail.recorded_at)
            .unwrap_or(true);
        if is_newer {
            history.push(live);
        }
    }

    history
}

/// Applies a pushed live sample to an existing trajectory.
///
/// Previous live entries with the same id or the same timestamp are replaced.
/// The sample is appended when it is the newest point and inserted in sorted
/// position when it arrives out of order.
pub fn apply_live_update(trajectory: &mut Vec<PositionSample>, mut sample: PositionSample) {
    sample.origin = SampleOrigin::Live;
    trajectory.retain(|existing| {
        !(existing.is_live()
            && (existing.id == sample.id || existing.recorded_at == sample.recorded_at))
    });

    let at = trajectory.partition_point(|existing| existing.recorded_at <= sample.recorded_at);
    trajectory.insert(at, sample);
}

/// Computes distance, duration and speed aggregates over a trajectory.
pub fn compute_stats(trajectory: &[PositionSample]) -> TrajectoryStats {
    let (first, last) = match (trajectory.first(), trajectory.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return TrajectoryStats::default(),
    };

    let total_distance_km = trajectory
        .windows(2)
        .map(|leg| leg[0].coordinates().distance_km(&leg[1].coordinates()))
        .sum();

    let duration_minutes = (last.recorded_at - first.recorded_at).num_milliseconds() as f64 / 60_000.0;

    let speeds: Vec<f64> = trajectory.iter().filter_map(|s| s.speed_kmh()).collect();
    let (average_speed_kmh, max_speed_kmh) = if speeds.is_empty() {
        (0.0, 0.0)
    } else {
        let sum: f64 = speeds.iter().sum();
        let max = speeds.iter().copied().fold(0.0_f64, f64::max);
        (sum / speeds.len() as f64, max)
    };

    TrajectoryStats {
        total_distance_km,
        duration_minutes,
        average_speed_kmh,
        max_speed_kmh,
        points_count: trajectory.len(),
    }
}

/// Returns true if the trajectory is non-decreasing by `recorded_at`.
pub fn is_ordered(trajectory: &[PositionSample]) -> bool {
    trajectory
        .windows(2)
        .all(|pair| pair[0].recorded_at <= pair[1].recorded_at)
}
