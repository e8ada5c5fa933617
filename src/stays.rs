//! Stay-cluster detection.
//!
//! Accepted fixes are clustered into stationary regions: a fix within
//! `stay_radius_m` of an existing cluster's centroid extends that
//! cluster's dwell time; otherwise it seeds a new cluster. A cluster
//! whose dwell time reaches `stay_threshold_ms` is promoted exactly
//! once, and the promotion is surfaced so the display collaborator can
//! draw its marker.
//!
//! Matching is first-match in newest-to-oldest creation order, NOT
//! nearest-centroid. This is a deliberate, documented approximation: a
//! fix can land in a distant older cluster ahead of a nearer newer one
//! when radii overlap. Cluster counts per session are small, so the
//! linear scan is fine without a spatial index.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::filter::AcceptedFix;
use crate::geo_utils::haversine_distance;
use crate::{GeoPoint, TrackerConfig};

/// A spatial-temporal grouping of fixes where the subject lingered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StayCluster {
    /// Position of the first fix that created the cluster. Never
    /// recomputed as fixes join.
    pub centroid: GeoPoint,
    pub start_time_ms: i64,
    pub end_time_ms: i64,
    pub duration_ms: i64,
    /// One-way false→true transition at the promotion threshold.
    pub promoted: bool,
}

/// Outcome of observing one fix.
#[derive(Debug, Clone, PartialEq)]
pub enum StayOutcome {
    /// The fix seeded a new cluster at the given index.
    Created { index: usize },
    /// The fix extended an existing cluster. `promoted_now` is true at
    /// most once per cluster, on the observation that first pushes its
    /// dwell time over the threshold.
    Updated { index: usize, promoted_now: bool },
}

/// Incremental stay-cluster detector for one session's accepted fixes.
#[derive(Debug, Default)]
pub struct StayDetector {
    /// Clusters in discovery order.
    clusters: Vec<StayCluster>,
}

impl StayDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clusters(&self) -> &[StayCluster] {
        &self.clusters
    }

    /// Rebuild the detector from persisted clusters (load path).
    pub fn from_clusters(clusters: Vec<StayCluster>) -> Self {
        Self { clusters }
    }

    /// Fold one accepted fix into the cluster set.
    pub fn observe(&mut self, fix: &AcceptedFix, config: &TrackerConfig) -> StayOutcome {
        // Newest-created first; first centroid within radius wins.
        for index in (0..self.clusters.len()).rev() {
            let cluster = &mut self.clusters[index];
            if haversine_distance(&cluster.centroid, &fix.point) <= config.stay_radius_m {
                // Dwell time never shrinks, even if fix timestamps jitter
                // backwards past the filter.
                cluster.end_time_ms = cluster.end_time_ms.max(fix.timestamp_ms);
                cluster.duration_ms = cluster.end_time_ms - cluster.start_time_ms;

                let promoted_now =
                    !cluster.promoted && cluster.duration_ms >= config.stay_threshold_ms;
                if promoted_now {
                    cluster.promoted = true;
                    debug!(
                        "stay cluster {} promoted after {} ms",
                        index, cluster.duration_ms
                    );
                }
                return StayOutcome::Updated {
                    index,
                    promoted_now,
                };
            }
        }

        self.clusters.push(StayCluster {
            centroid: fix.point,
            start_time_ms: fix.timestamp_ms,
            end_time_ms: fix.timestamp_ms,
            duration_ms: 0,
            promoted: false,
        });
        StayOutcome::Created {
            index: self.clusters.len() - 1,
        }
    }
}
