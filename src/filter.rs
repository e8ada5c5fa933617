//! Fix gating: accuracy and implied-speed rules.
//!
//! [`evaluate`] is a pure function of the incoming fix, the previously
//! accepted fix, the accepted count so far, and the configured
//! thresholds. Rejections carry a [`RejectReason`] and are reported to
//! the caller, never silently dropped.

use crate::geo_utils::haversine_distance;
use crate::{Fix, TrackerConfig};

/// Why a fix was turned away.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RejectReason {
    /// Reported accuracy radius exceeds the active gate.
    LowAccuracy { accuracy_m: f64, threshold_m: f64 },
    /// Implied speed from the prior accepted fix is beyond the plausible
    /// maximum (or the elapsed time was zero/negative).
    ImplausibleSpeed { implied_mps: f64 },
    /// The session is not live (stopped before this fix was processed).
    SessionInactive,
    /// The session is paused.
    Paused,
}

/// A fix that passed the gates, with `speed_mps` normalized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcceptedFix {
    pub point: crate::GeoPoint,
    pub accuracy_m: f64,
    /// Sensor speed clamped to be non-negative; `Some(0.0)` when the
    /// sensor reported a negative value, `None` when it reported none.
    pub speed_mps: Option<f64>,
    pub timestamp_ms: i64,
}

/// Verdict from the gate chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterVerdict {
    Accept(AcceptedFix),
    Reject(RejectReason),
}

/// Evaluate a raw fix against the accuracy and implied-speed gates.
///
/// Rules, in order:
/// 1. Accuracy gate: the threshold is `warmup_accuracy_m` while fewer
///    than `warmup_fix_count` fixes have been accepted, else
///    `accuracy_m`. The looser warm-up gate lets a cold-start fix
///    through under poor satellite lock.
/// 2. Implied-speed gate (only when a prior accepted fix exists):
///    haversine distance over elapsed seconds must not exceed
///    `max_speed_mps`. Elapsed time ≤ 0 rejects outright rather than
///    dividing by it.
/// 3. Accept, clamping any reported speed to be non-negative.
pub fn evaluate(
    fix: &Fix,
    prior_accepted: Option<&AcceptedFix>,
    accepted_count: u32,
    config: &TrackerConfig,
) -> FilterVerdict {
    let threshold_m = if accepted_count < config.warmup_fix_count {
        config.warmup_accuracy_m
    } else {
        config.accuracy_m
    };

    if fix.accuracy_m > threshold_m {
        return FilterVerdict::Reject(RejectReason::LowAccuracy {
            accuracy_m: fix.accuracy_m,
            threshold_m,
        });
    }

    if let Some(prior) = prior_accepted {
        let elapsed_s = (fix.timestamp_ms - prior.timestamp_ms) as f64 / 1_000.0;
        if elapsed_s <= 0.0 {
            return FilterVerdict::Reject(RejectReason::ImplausibleSpeed {
                implied_mps: f64::INFINITY,
            });
        }
        let implied_mps = haversine_distance(&prior.point, &fix.point) / elapsed_s;
        if implied_mps > config.max_speed_mps {
            return FilterVerdict::Reject(RejectReason::ImplausibleSpeed { implied_mps });
        }
    }

    FilterVerdict::Accept(AcceptedFix {
        point: fix.point,
        accuracy_m: fix.accuracy_m,
        speed_mps: fix.speed_mps.map(|s| s.max(0.0)),
        timestamp_ms: fix.timestamp_ms,
    })
}
