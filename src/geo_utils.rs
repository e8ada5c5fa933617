//! Geographic utilities: great-circle distance, polyline length, and the
//! planar point-to-segment distance used by track simplification.

use crate::GeoPoint;

/// Mean Earth radius in meters (spherical approximation).
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle (haversine) distance between two points, in meters.
pub fn haversine_distance(p1: &GeoPoint, p2: &GeoPoint) -> f64 {
    let lat1 = p1.latitude.to_radians();
    let lat2 = p2.latitude.to_radians();
    let dlat = (p2.latitude - p1.latitude).to_radians();
    let dlng = (p2.longitude - p1.longitude).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Total haversine length of a polyline in meters.
pub fn polyline_length(points: &[GeoPoint]) -> f64 {
    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

/// Perpendicular distance from `point` to the segment `start`..`end`,
/// computed in raw coordinate-degree units (planar Euclidean).
///
/// This is deliberately NOT a geodesic metric: simplification tolerances
/// are expressed in degrees, and at walking scale the planar error is
/// negligible. Distance integration elsewhere uses the haversine metric.
pub fn point_segment_distance_deg(point: &GeoPoint, start: &GeoPoint, end: &GeoPoint) -> f64 {
    let dx = end.longitude - start.longitude;
    let dy = end.latitude - start.latitude;

    let seg_len_sq = dx * dx + dy * dy;
    if seg_len_sq == 0.0 {
        // Degenerate segment: fall back to point distance
        let px = point.longitude - start.longitude;
        let py = point.latitude - start.latitude;
        return (px * px + py * py).sqrt();
    }

    // Project onto the segment, clamped to the endpoints
    let t = ((point.longitude - start.longitude) * dx + (point.latitude - start.latitude) * dy)
        / seg_len_sq;
    let t = t.clamp(0.0, 1.0);

    let proj_x = start.longitude + t * dx;
    let proj_y = start.latitude + t * dy;
    let px = point.longitude - proj_x;
    let py = point.latitude - proj_y;
    (px * px + py * py).sqrt()
}
