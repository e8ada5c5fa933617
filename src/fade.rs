//! Elapsed-time color/opacity mapping for trail display.
//!
//! Stateless contract consumed by the display collaborator: a
//! trajectory's age since `start_time_ms` maps to a color/opacity
//! bucket at fixed breakpoints. The core never depends on this; it is
//! exposed so simulated and real clocks render identically.

use serde::Serialize;

/// Display color bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrailColor {
    White,
    Green,
    Orange,
    Red,
    Brown,
}

/// Color plus opacity in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrailStyle {
    pub color: TrailColor,
    pub opacity: f64,
}

const FRESH_S: f64 = 36_000.0; // 10 h: white, fading
const RECENT_S: f64 = 50_400.0; // 14 h: green
const WEEK_S: f64 = 604_800.0; // 7 d: orange
const MONTH_S: f64 = 2_592_000.0; // 30 d: red

/// Map elapsed time since a trajectory's start to its display style.
///
/// Under 10 hours the trail is white with opacity fading linearly from
/// 1.0 to 0.4; afterwards the color steps through green, orange, red
/// and brown at fixed breakpoints, all at 0.4.
pub fn fade_style(start_time_ms: i64, now_ms: i64) -> TrailStyle {
    let elapsed_s = ((now_ms - start_time_ms) as f64 / 1_000.0).max(0.0);

    if elapsed_s < FRESH_S {
        let opacity = 1.0 - 0.6 * (elapsed_s / FRESH_S);
        TrailStyle {
            color: TrailColor::White,
            opacity,
        }
    } else {
        let color = if elapsed_s < RECENT_S {
            TrailColor::Green
        } else if elapsed_s < WEEK_S {
            TrailColor::Orange
        } else if elapsed_s < MONTH_S {
            TrailColor::Red
        } else {
            TrailColor::Brown
        };
        TrailStyle {
            color,
            opacity: 0.4,
        }
    }
}
