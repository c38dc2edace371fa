/// Fallback lap usage when nothing is known about the car (liters)
const DEFAULT_LAP_USAGE: f32 = 3.2;
/// Last lap is preferred to the average while within this share of it
const LAST_LAP_TOLERANCE: f32 = 0.2;
const RAW_PROJECTION_MIN: f32 = 0.1;
const RAW_PROJECTION_MAX: f32 = 20.;
/// Lap distance outside which the live projection is meaningless
const LAP_START_DIST: f32 = 0.001;
const LAP_END_DIST: f32 = 0.99;
/// Largest change of the projection between two ticks of the same lap
const MAX_TICK_CHANGE: f32 = 0.5;
/// Largest step the smoothed value takes towards a new projection
const MAX_SMOOTHING_STEP: f32 = 0.2;
const LATE_LAP_DIST: f32 = 0.9;
const LATE_LAP_SMOOTHING: f32 = 0.05;

/// Inputs of one projection update.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProjectionInputs {
    pub lap: i32,
    pub lap_dist_pct: f32,
    pub fuel_level: f32,
    pub lap_start_fuel: f32,
    pub lap_dist_reset: bool,
    pub last_lap_usage: Option<f32>,
    pub avg_lap_usage: Option<f32>,
    pub qualify_consumption: Option<f32>,
}

/// Projected fuel use of the lap in progress.
///
/// Blends the live in-lap rate with a historical reference, weighting the live
/// rate more as the lap progresses, then smooths the result across ticks.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LapProjector {
    lap: Option<i32>,
    last_projected: Option<f32>,
    smoothed: f32,
}

impl LapProjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn update(&mut self, inputs: &ProjectionInputs) -> f32 {
        if self.lap != Some(inputs.lap) || inputs.lap_dist_reset {
            self.reset();
            self.lap = Some(inputs.lap);
        }

        let projected = self.project(inputs);
        self.smooth(projected, inputs.lap_dist_pct)
    }

    fn project(&mut self, inputs: &ProjectionInputs) -> f32 {
        let reference = historical_reference(inputs);
        let d = inputs.lap_dist_pct;
        if inputs.fuel_level > inputs.lap_start_fuel
            || inputs.lap_dist_reset
            || !(LAP_START_DIST..=LAP_END_DIST).contains(&d)
        {
            return reference;
        }

        let current_usage = inputs.lap_start_fuel - inputs.fuel_level;
        let raw = (current_usage / d).clamp(RAW_PROJECTION_MIN, RAW_PROJECTION_MAX);
        let weight = live_weight(d);
        let safety = 1.02 + 0.05 * (1. - weight);
        let mut projected = (raw * weight + reference * (1. - weight)) * safety;

        if let Some(previous) = self.last_projected.filter(|p| *p > 0.) {
            projected = projected.clamp(
                previous * (1. - MAX_TICK_CHANGE),
                previous * (1. + MAX_TICK_CHANGE),
            );
        }
        self.last_projected = Some(projected);
        projected
    }

    fn smooth(&mut self, target: f32, lap_dist_pct: f32) -> f32 {
        if self.smoothed == 0. {
            self.smoothed = target;
            return target;
        }
        let factor = if lap_dist_pct > LATE_LAP_DIST {
            LATE_LAP_SMOOTHING
        } else {
            (0.1 * (1. + 2. * lap_dist_pct)).min(0.3)
        };
        let target = target.clamp(
            self.smoothed - MAX_SMOOTHING_STEP,
            self.smoothed + MAX_SMOOTHING_STEP,
        );
        self.smoothed += (target - self.smoothed) * factor;
        self.smoothed
    }
}

/// Share of the projection given to the live rate, 0 to 0.5 over the first half
/// of the lap and 0.5 to 0.8 over the second.
fn live_weight(lap_dist_pct: f32) -> f32 {
    if lap_dist_pct < 0.5 {
        lap_dist_pct
    } else {
        0.5 + (lap_dist_pct - 0.5) / 0.5 * 0.3
    }
}

fn historical_reference(inputs: &ProjectionInputs) -> f32 {
    let average = inputs.avg_lap_usage.filter(|v| *v > 0.);
    match (inputs.last_lap_usage.filter(|v| *v > 0.), average) {
        (Some(last), Some(avg)) if ((last - avg) / avg).abs() <= LAST_LAP_TOLERANCE => last,
        (_, Some(avg)) => avg,
        _ => inputs
            .qualify_consumption
            .filter(|v| *v > 0.)
            .unwrap_or(DEFAULT_LAP_USAGE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(lap: i32, d: f32, fuel: f32) -> ProjectionInputs {
        ProjectionInputs {
            lap,
            lap_dist_pct: d,
            fuel_level: fuel,
            lap_start_fuel: 50.,
            lap_dist_reset: false,
            last_lap_usage: Some(3.1),
            avg_lap_usage: Some(3.),
            qualify_consumption: None,
        }
    }

    #[test]
    fn test_historical_reference() {
        assert_eq!(historical_reference(&inputs(1, 0.5, 49.)), 3.1);

        let mut far_last = inputs(1, 0.5, 49.);
        far_last.last_lap_usage = Some(4.);
        assert_eq!(historical_reference(&far_last), 3.);

        let mut nothing = inputs(1, 0.5, 49.);
        nothing.last_lap_usage = None;
        nothing.avg_lap_usage = None;
        assert_eq!(historical_reference(&nothing), DEFAULT_LAP_USAGE);

        nothing.qualify_consumption = Some(2.2);
        assert_eq!(historical_reference(&nothing), 2.2);
    }

    #[test]
    fn test_reference_used_at_lap_edges_and_after_refuel() {
        let mut projector = LapProjector::new();
        assert_eq!(projector.update(&inputs(3, 0.0, 50.)), 3.1);

        let mut projector = LapProjector::new();
        assert_eq!(projector.update(&inputs(3, 0.4, 55.)), 3.1);

        let mut projector = LapProjector::new();
        let mut reset = inputs(3, 0.4, 48.);
        reset.lap_dist_reset = true;
        assert_eq!(projector.update(&reset), 3.1);
    }

    #[test]
    fn test_first_projection_blends_live_rate() {
        let mut projector = LapProjector::new();
        // 2L over half a lap: raw 4.0, weight 0.5
        let projected = projector.update(&inputs(3, 0.5, 48.));
        let expected = (4. * 0.5 + 3.1 * 0.5) * (1.02 + 0.025);
        assert!((projected - expected).abs() < 1e-5);
    }

    #[test]
    fn test_smoothing_limits_steps() {
        let mut projector = LapProjector::new();
        let first = projector.update(&inputs(3, 0.2, 49.4));
        let second = projector.update(&inputs(3, 0.3, 47.));
        assert!(second > first);
        assert!(second - first <= MAX_SMOOTHING_STEP * 0.3 + 1e-6);
    }

    #[test]
    fn test_reset_on_new_lap() {
        let mut projector = LapProjector::new();
        projector.update(&inputs(3, 0.5, 46.));
        projector.update(&inputs(3, 0.6, 45.));
        // a new lap starts from the reference again
        assert_eq!(projector.update(&inputs(4, 0.0, 45.)), 3.1);
    }

    #[test]
    fn test_live_weight() {
        assert_eq!(live_weight(0.), 0.);
        assert_eq!(live_weight(0.25), 0.25);
        assert_eq!(live_weight(0.5), 0.5);
        assert!((live_weight(1.) - 0.8).abs() < 1e-6);
    }
}
