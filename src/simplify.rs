//! Track simplification.
//!
//! Douglas-Peucker compaction applied before persistence. Implemented
//! iteratively with an explicit work stack so pathological
//! near-collinear inputs cannot overflow the native stack; the stack
//! holds at most one range per input point.
//!
//! The perpendicular metric is planar Euclidean over raw degrees (see
//! [`crate::geo_utils::point_segment_distance_deg`]), while distance
//! integration elsewhere is haversine. The mismatch is an accepted
//! approximation at the walking scale this engine targets.

use log::debug;

use crate::geo_utils::point_segment_distance_deg;
use crate::trajectory::TrackPoint;
use crate::TrackerConfig;

/// Simplify a track with Douglas-Peucker.
///
/// Tracks shorter than `config.simplify_min_points` pass through
/// unmodified. Endpoints are always preserved, the output is never
/// longer than the input, and non-empty input yields non-empty output.
pub fn simplify_track(points: &[TrackPoint], config: &TrackerConfig) -> Vec<TrackPoint> {
    if points.len() < config.simplify_min_points {
        return points.to_vec();
    }
    let simplified = douglas_peucker(points, config.simplify_tolerance_deg);
    debug!(
        "simplified track: {} -> {} points",
        points.len(),
        simplified.len()
    );
    simplified
}

/// Iterative Douglas-Peucker over an explicit work stack.
///
/// Each stack entry is an index range whose interior points are still
/// undecided. The point of maximum perpendicular distance from the
/// range's chord either splits the range (distance > tolerance) or the
/// whole interior is dropped.
fn douglas_peucker(points: &[TrackPoint], tolerance_deg: f64) -> Vec<TrackPoint> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;

    let mut stack: Vec<(usize, usize)> = vec![(0, points.len() - 1)];

    while let Some((first, last)) = stack.pop() {
        if last <= first + 1 {
            continue;
        }

        let mut max_dist = 0.0;
        let mut max_index = first;
        for i in first + 1..last {
            let d = point_segment_distance_deg(
                &points[i].point,
                &points[first].point,
                &points[last].point,
            );
            if d > max_dist {
                max_dist = d;
                max_index = i;
            }
        }

        if max_dist > tolerance_deg {
            keep[max_index] = true;
            stack.push((first, max_index));
            stack.push((max_index, last));
        }
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(p, kept)| kept.then_some(*p))
        .collect()
}
