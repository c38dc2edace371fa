use crate::telemetry::PIT_SV_FUEL_FILL;

use super::TargetScenario;

/// Tank size assumed when neither the session nor the fuel fraction tell us
const DEFAULT_TANK_CAPACITY: f32 = 60.;
const MAX_TANK_CAPACITY: f32 = 200.;
/// Fuel fractions outside this range are too imprecise to derive the tank size
const MIN_DERIVE_PCT: f32 = 0.01;
const MAX_DERIVE_PCT: f32 = 0.99;
/// The pit window closes once this share of the fuel on board is used
const PIT_WINDOW_SHARE: f32 = 0.8;
/// Requested pit fuel only counts when the deficit exceeds this amount
const QUEUED_FUEL_MIN_DEFICIT: f32 = 2.;
/// Fewer laps of fuel than this produce no target scenarios
const MIN_SCENARIO_LAPS: f32 = 0.5;

/// Tank capacity from the session, else derived from the fuel fraction, else a default.
pub fn tank_capacity(fuel_level: f32, fuel_level_pct: f32, session_capacity: Option<f32>) -> f32 {
    if let Some(capacity) = session_capacity.filter(|c| c.is_finite() && *c > 0.) {
        return capacity;
    }
    if fuel_level > 0. && fuel_level_pct > MIN_DERIVE_PCT && fuel_level_pct < MAX_DERIVE_PCT {
        let derived = fuel_level / fuel_level_pct;
        if derived.is_finite() {
            return derived
                .clamp(fuel_level * 1.1, fuel_level * 50.)
                .min(MAX_TANK_CAPACITY);
        }
    }
    DEFAULT_TANK_CAPACITY
}

/// Scale consumption up by a worsening trend. An improving trend is ignored.
pub fn trend_adjusted(base_consumption: f32, trend_percent: f32) -> f32 {
    let trend = if trend_percent.is_finite() {
        trend_percent.max(0.)
    } else {
        0.
    };
    base_consumption * (1. + trend / 100.)
}

/// Fuel-per-lap targets around the number of laps the fuel on board covers.
pub fn target_scenarios(fuel_level: f32, laps_with_fuel: f32) -> Vec<TargetScenario> {
    if !laps_with_fuel.is_finite() || laps_with_fuel < MIN_SCENARIO_LAPS {
        return Vec::new();
    }
    let base = laps_with_fuel.floor() as u32;
    let mut candidates = Vec::with_capacity(3);
    if base > 1 {
        candidates.push(base - 1);
    }
    candidates.push(base);
    candidates.push(base + 1);

    candidates
        .into_iter()
        .filter(|laps| *laps > 0)
        .map(|laps| TargetScenario {
            laps,
            fuel_per_lap: fuel_level / laps as f32,
            is_current_target: laps == base,
        })
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrategyInputs {
    pub fuel_level: f32,
    pub tank_capacity: f32,
    /// Average consumption before the trend adjustment, > 0
    pub base_consumption: f32,
    pub trend_percent: f32,
    pub laps_remaining: f32,
    pub lap: i32,
    /// Safety margin already converted to liters
    pub safety_margin: f32,
    pub pit_sv_flags: u32,
    pub pit_sv_fuel: Option<f32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FuelStrategy {
    pub trend_adjusted_consumption: f32,
    pub laps_with_fuel: f32,
    pub fuel_to_finish: f32,
    pub can_finish: bool,
    pub fuel_to_add: f32,
    pub queued_fuel: f32,
    pub fuel_at_finish: f32,
    pub target_consumption: Option<f32>,
    pub stops_remaining: Option<u32>,
    pub laps_per_stint: Option<f32>,
    pub pit_window_open: i32,
    pub pit_window_close: i32,
    pub earliest_pit_lap: Option<i32>,
    pub target_scenarios: Vec<TargetScenario>,
}

/// Turn consumption and laps remaining into pit stop guidance.
pub fn plan(inputs: &StrategyInputs) -> FuelStrategy {
    let fuel_level = inputs.fuel_level.max(0.);
    let tank = inputs.tank_capacity;
    let consumption = trend_adjusted(inputs.base_consumption, inputs.trend_percent);
    let usable_consumption = (consumption.is_finite() && consumption > 0.).then_some(consumption);

    let laps_with_fuel = usable_consumption.map_or(0., |c| fuel_level / c);
    let fuel_needed =
        inputs.laps_remaining * usable_consumption.unwrap_or(0.) + inputs.safety_margin;
    let can_finish = fuel_level >= fuel_needed;
    let deficit = fuel_needed - fuel_level;

    let stops_remaining = usable_consumption.filter(|_| tank > 0.).map(|_| {
        if can_finish {
            0
        } else {
            (deficit / tank).ceil() as u32
        }
    });
    let laps_per_stint = usable_consumption
        .filter(|_| tank > 0.)
        .map(|c| tank / c);

    let fuel_service_requested = inputs.pit_sv_flags & PIT_SV_FUEL_FILL != 0;
    let queued_fuel = if fuel_service_requested && deficit > QUEUED_FUEL_MIN_DEFICIT {
        inputs.pit_sv_fuel.unwrap_or(0.).max(0.)
    } else {
        0.
    };

    let raw_to_add = match stops_remaining {
        Some(stops) if stops > 1 => tank - fuel_level,
        _ => tank.min(fuel_needed) - fuel_level,
    };
    let fuel_to_add = (raw_to_add.max(0.) - queued_fuel).max(0.);

    let fuel_at_finish =
        fuel_level + queued_fuel - inputs.laps_remaining * usable_consumption.unwrap_or(0.);
    let target_consumption = (inputs.laps_remaining > 0.).then(|| fuel_level / inputs.laps_remaining);

    let pit_window_open = inputs.lap + 1;
    let pit_window_close =
        pit_window_open.max(inputs.lap + (laps_with_fuel * PIT_WINDOW_SHARE).floor() as i32);

    let earliest_pit_lap = match (stops_remaining, laps_per_stint) {
        (Some(stops), Some(stint)) if stops > 0 && stint > 0. => {
            let excess = stint * stops as f32 - inputs.laps_remaining;
            let earliest = if excess >= 0. {
                inputs.lap + 1
            } else {
                inputs.lap + ((-excess).ceil() as i32).max(1)
            };
            Some(earliest.min(pit_window_close))
        }
        _ => None,
    };

    FuelStrategy {
        trend_adjusted_consumption: consumption,
        laps_with_fuel,
        fuel_to_finish: fuel_needed,
        can_finish,
        fuel_to_add,
        queued_fuel,
        fuel_at_finish,
        target_consumption,
        stops_remaining,
        laps_per_stint,
        pit_window_open,
        pit_window_close,
        earliest_pit_lap,
        target_scenarios: target_scenarios(fuel_level, laps_with_fuel),
    }
}
