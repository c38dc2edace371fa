use log::warn;

use crate::telemetry::{TIMED_RACE_LAPS_REMAINING, is_final_lap};

/// Time remaining above this is the simulator's "not started" placeholder
const IMPLAUSIBLE_TIME_REMAINING_S: f64 = 600_000.;
/// Laps remaining are never reported above this
const MAX_REASONABLE_LAPS: f32 = 1000.;
/// Bounds of the fuel-based estimate used when the lap time is unknown
const FUEL_ESTIMATE_MIN_LAPS: f32 = 1.;
const FUEL_ESTIMATE_MAX_LAPS: f32 = 50.;

/// Everything the race horizon depends on for one tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HorizonInputs {
    pub lap: i32,
    pub lap_dist_pct: f32,
    /// `SessionLapsRemain`, `TIMED_RACE_LAPS_REMAINING` for time-limited sessions
    pub session_laps_remain: i32,
    pub session_time_remain: Option<f64>,
    pub session_time_total: Option<f64>,
    pub session_flags: u32,
    /// Official lap count of a lap-limited session
    pub official_laps: Option<u32>,
    pub avg_lap_time: Option<f32>,
    /// Used to size timed sessions when the lap time is unknown
    pub laps_with_fuel: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RaceHorizon {
    /// Laps left including the remainder of the current one. Time-limited sessions
    /// round up to whole laps crossed at the line.
    pub laps_remaining: f32,
    /// Projected race length for display, fractional in time-limited sessions
    pub total_laps: f32,
}

impl HorizonInputs {
    fn lap_dist(&self) -> f32 {
        self.lap_dist_pct.clamp(0., 1.)
    }

    fn laps_completed(&self) -> f32 {
        (self.lap - 1).max(0) as f32
    }

    fn is_timed(&self) -> bool {
        self.session_laps_remain == TIMED_RACE_LAPS_REMAINING
    }

    /// Time remaining, falling back to the session length while the clock has not started.
    fn time_remaining(&self) -> Option<f64> {
        let plausible = |t: &f64| t.is_finite() && *t < IMPLAUSIBLE_TIME_REMAINING_S;
        match self.session_time_remain {
            Some(remain) if plausible(&remain) => Some(remain),
            _ => self.session_time_total.filter(plausible),
        }
    }
}

/// Estimate laps remaining and total race laps.
pub fn estimate(inputs: &HorizonInputs) -> RaceHorizon {
    let d = inputs.lap_dist();

    if is_final_lap(inputs.session_flags) {
        return RaceHorizon {
            laps_remaining: (1. - d).max(0.),
            total_laps: (inputs.lap + 1) as f32,
        };
    }

    let horizon = if inputs.is_timed() {
        estimate_timed(inputs, d)
    } else {
        estimate_lap_limited(inputs, d)
    };
    sanitize(inputs, horizon)
}

fn estimate_lap_limited(inputs: &HorizonInputs, d: f32) -> RaceHorizon {
    let mut laps_remaining = inputs.session_laps_remain as f32 - d;
    if let Some(official) = inputs.official_laps {
        // the lap counter can tick over one frame before the remaining-laps counter
        let cap = official as f32 - inputs.laps_completed();
        laps_remaining = laps_remaining.min(cap);
    }
    let laps_remaining = laps_remaining.max(0.);

    let total_laps = match inputs.official_laps {
        Some(official) => official as f32,
        None => inputs.laps_completed() + d + laps_remaining,
    };
    RaceHorizon {
        laps_remaining,
        total_laps,
    }
}

fn estimate_timed(inputs: &HorizonInputs, d: f32) -> RaceHorizon {
    let time_remaining = inputs.time_remaining();
    let avg_lap_time = inputs.avg_lap_time.filter(|t| t.is_finite() && *t > 0.);

    match (time_remaining, avg_lap_time) {
        (Some(remain), _) if remain <= 0. => RaceHorizon {
            // clock ran out, the lap in progress is the last one
            laps_remaining: (1. - d).max(0.),
            total_laps: (inputs.lap + 1) as f32,
        },
        (Some(remain), Some(lap_time)) => {
            let projected = (remain / lap_time as f64) as f32;
            RaceHorizon {
                laps_remaining: (d + projected).ceil() - d,
                total_laps: inputs.laps_completed() + d + projected,
            }
        }
        _ => {
            let laps_remaining = if inputs.laps_with_fuel.is_finite() {
                inputs
                    .laps_with_fuel
                    .floor()
                    .clamp(FUEL_ESTIMATE_MIN_LAPS, FUEL_ESTIMATE_MAX_LAPS)
            } else {
                FUEL_ESTIMATE_MIN_LAPS
            };
            RaceHorizon {
                laps_remaining,
                total_laps: inputs.laps_completed() + d + laps_remaining,
            }
        }
    }
}

fn sanitize(inputs: &HorizonInputs, horizon: RaceHorizon) -> RaceHorizon {
    let mut laps_remaining = horizon.laps_remaining;
    if !laps_remaining.is_finite() || laps_remaining < 0. {
        let fallback = if inputs.is_timed() {
            0.
        } else {
            inputs.session_laps_remain.max(0) as f32
        };
        warn!(
            "Implausible laps remaining {}, falling back to {}",
            laps_remaining, fallback
        );
        laps_remaining = fallback;
    }
    if laps_remaining > MAX_REASONABLE_LAPS {
        warn!(
            "Laps remaining {} above {}, clamping",
            laps_remaining, MAX_REASONABLE_LAPS
        );
        laps_remaining = MAX_REASONABLE_LAPS;
    }

    let total_laps = if horizon.total_laps.is_finite() && horizon.total_laps >= 0. {
        horizon.total_laps
    } else {
        inputs.laps_completed() + laps_remaining
    };
    RaceHorizon {
        laps_remaining,
        total_laps,
    }
}

/// Band of whole laps the race is likely to last for, `[-10%, +10% + 1]`.
pub fn laps_range(laps_remaining: f32) -> (u32, u32) {
    if !laps_remaining.is_finite() || laps_remaining <= 0. {
        return (0, 0);
    }
    let low = (laps_remaining * 0.9).floor() as u32;
    let high = (laps_remaining * 1.1).ceil() as u32 + 1;
    (low, high)
}
