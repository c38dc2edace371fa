use crate::{
    config::{FuelStatusBasis, FuelStatusThresholds},
    telemetry::{SessionState, SessionType},
};

use super::{FuelStatus, GridWarning};

/// Laps of fuel below which a qualifying or practice car is at least in caution
const QUALIFY_CAUTION_LAPS: f32 = 2.;
/// Red-lap threshold ceiling in qualifying and practice
const QUALIFY_RED_LAPS: f32 = 1.;
/// Laps used by the low fuel grid warning
const GRID_LOW_FUEL_LAPS: f32 = 5.;
/// Distance from a full tank tolerated by the fill tank grid warning
const GRID_FILL_TOLERANCE: f32 = 2.;

#[derive(Clone, Debug, PartialEq)]
pub struct AlertInputs<'a> {
    pub session_type: &'a SessionType,
    pub session_state: Option<SessionState>,
    pub fuel_level: f32,
    pub fuel_level_pct: f32,
    pub tank_capacity: f32,
    pub trend_adjusted_consumption: f32,
    pub last_lap_usage: Option<f32>,
    pub min_lap_usage: Option<f32>,
    pub max_lap_usage: Option<f32>,
    pub laps_remaining: f32,
    pub fuel_needed: f32,
}

/// Alert thresholds resolved from the configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AlertSettings {
    pub race_thresholds: FuelStatusThresholds,
    pub qualify_thresholds: FuelStatusThresholds,
    pub basis: FuelStatusBasis,
    pub red_laps: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Alerts {
    pub fuel_status: FuelStatus,
    pub grid_warning: Option<GridWarning>,
    /// Laps the fuel on board covers at the configured basis consumption
    pub laps_on_basis: f32,
}

pub fn evaluate(inputs: &AlertInputs, settings: &AlertSettings) -> Alerts {
    let qualifying_or_practice = inputs.session_type.is_qualifying_or_practice();
    let thresholds = if qualifying_or_practice {
        settings.qualify_thresholds
    } else {
        settings.race_thresholds
    };

    let fuel_pct = inputs.fuel_level_pct * 100.;
    let mut fuel_status = if fuel_pct >= thresholds.green {
        FuelStatus::Safe
    } else if fuel_pct >= thresholds.amber {
        FuelStatus::Caution
    } else {
        FuelStatus::Danger
    };

    let basis_usage = match settings.basis {
        FuelStatusBasis::Last => inputs.last_lap_usage,
        FuelStatusBasis::Avg => Some(inputs.trend_adjusted_consumption),
        FuelStatusBasis::Min => inputs.min_lap_usage,
        FuelStatusBasis::Max => inputs.max_lap_usage,
    };
    let laps_on_basis = basis_usage
        .filter(|usage| *usage > 0.)
        .map_or(0., |usage| inputs.fuel_level / usage);

    let red_laps = if qualifying_or_practice {
        settings.red_laps.min(QUALIFY_RED_LAPS)
    } else {
        settings.red_laps
    };
    if laps_on_basis > 0. && laps_on_basis < red_laps {
        fuel_status = FuelStatus::Danger;
    } else if qualifying_or_practice
        && laps_on_basis < QUALIFY_CAUTION_LAPS
        && fuel_status == FuelStatus::Safe
    {
        fuel_status = FuelStatus::Caution;
    }

    let pre_race = inputs
        .session_state
        .is_some_and(|state| state.is_pre_race());
    let grid_warning = if pre_race && !qualifying_or_practice {
        grid_warning(inputs)
    } else {
        None
    };

    Alerts {
        fuel_status,
        grid_warning,
        laps_on_basis,
    }
}

fn grid_warning(inputs: &AlertInputs) -> Option<GridWarning> {
    let consumption = inputs.trend_adjusted_consumption;
    if inputs.tank_capacity <= 0. || consumption <= 0. {
        return None;
    }
    let laps_in_tank = inputs.fuel_level / consumption;
    let full_tank_laps = inputs.tank_capacity / consumption;

    if inputs.tank_capacity >= inputs.fuel_needed && inputs.fuel_level < inputs.fuel_needed {
        Some(GridWarning::CanFinishFill)
    } else if full_tank_laps > GRID_LOW_FUEL_LAPS
        && laps_in_tank < GRID_LOW_FUEL_LAPS
        && inputs.laps_remaining > GRID_LOW_FUEL_LAPS
    {
        Some(GridWarning::LowFuel)
    } else if inputs.tank_capacity < inputs.fuel_needed
        && inputs.fuel_level < inputs.tank_capacity - GRID_FILL_TOLERANCE
    {
        Some(GridWarning::FillTank)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FuelCalculatorConfig;

    fn settings() -> AlertSettings {
        FuelCalculatorConfig::default().alert_settings()
    }

    fn race_inputs(session_type: &SessionType, fuel: f32) -> AlertInputs<'_> {
        AlertInputs {
            session_type,
            session_state: Some(SessionState::Racing),
            fuel_level: fuel,
            fuel_level_pct: fuel / 60.,
            tank_capacity: 60.,
            trend_adjusted_consumption: 3.,
            last_lap_usage: Some(3.2),
            min_lap_usage: Some(2.8),
            max_lap_usage: Some(3.4),
            laps_remaining: 20.,
            fuel_needed: 61.,
        }
    }

    #[test]
    fn test_race_percentage_thresholds() {
        let race = SessionType::Race;
        assert_eq!(
            evaluate(&race_inputs(&race, 40.), &settings()).fuel_status,
            FuelStatus::Safe
        );
        assert_eq!(
            evaluate(&race_inputs(&race, 24.), &settings()).fuel_status,
            FuelStatus::Caution
        );
        assert_eq!(
            evaluate(&race_inputs(&race, 12.), &settings()).fuel_status,
            FuelStatus::Danger
        );
    }

    #[test]
    fn test_red_threshold_is_display_only() {
        let race = SessionType::Race;
        for red in [0., 15., 29.] {
            let mut with_red = settings();
            with_red.race_thresholds.red = red;
            assert_eq!(
                evaluate(&race_inputs(&race, 24.), &with_red).fuel_status,
                FuelStatus::Caution
            );
            assert_eq!(
                evaluate(&race_inputs(&race, 12.), &with_red).fuel_status,
                FuelStatus::Danger
            );
        }
    }

    #[test]
    fn test_red_laps_override() {
        let race = SessionType::Race;
        let mut inputs = race_inputs(&race, 8.);
        // 8L would be danger by percentage anyway, use a tiny tank
        inputs.fuel_level_pct = 0.9;
        let alerts = evaluate(&inputs, &settings());
        assert!((alerts.laps_on_basis - 8. / 3.).abs() < 1e-5);
        assert_eq!(alerts.fuel_status, FuelStatus::Danger);
    }

    #[test]
    fn test_basis_selection() {
        let race = SessionType::Race;
        let inputs = race_inputs(&race, 34.);
        let mut with_max = settings();
        with_max.basis = FuelStatusBasis::Max;
        assert!((evaluate(&inputs, &with_max).laps_on_basis - 10.).abs() < 1e-4);

        let mut with_min = settings();
        with_min.basis = FuelStatusBasis::Min;
        assert!((evaluate(&inputs, &with_min).laps_on_basis - 34. / 2.8).abs() < 1e-4);
    }

    #[test]
    fn test_qualifying_thresholds() {
        let qualify = SessionType::LoneQualify;
        // 15% is danger in a race but safe in qualifying
        let mut inputs = race_inputs(&qualify, 9.);
        inputs.fuel_level_pct = 0.21;
        assert_eq!(evaluate(&inputs, &settings()).fuel_status, FuelStatus::Safe);

        // under two laps is at least caution
        let mut inputs = race_inputs(&qualify, 5.);
        inputs.fuel_level_pct = 0.5;
        assert_eq!(
            evaluate(&inputs, &settings()).fuel_status,
            FuelStatus::Caution
        );

        // red laps capped at one lap
        let mut inputs = race_inputs(&qualify, 2.);
        inputs.fuel_level_pct = 0.5;
        assert_eq!(
            evaluate(&inputs, &settings()).fuel_status,
            FuelStatus::Danger
        );
    }

    #[test]
    fn test_grid_warnings() {
        let race = SessionType::Race;
        let grid = |fuel: f32, needed: f32, laps: f32| {
            let mut inputs = race_inputs(&race, fuel);
            inputs.session_state = Some(SessionState::ParadeLaps);
            inputs.fuel_needed = needed;
            inputs.laps_remaining = laps;
            evaluate(&inputs, &settings()).grid_warning
        };

        assert_eq!(grid(30., 46., 15.), Some(GridWarning::CanFinishFill));
        assert_eq!(grid(12., 91., 30.), Some(GridWarning::LowFuel));
        assert_eq!(grid(40., 91., 30.), Some(GridWarning::FillTank));
        assert_eq!(grid(59., 91., 30.), None);
        assert_eq!(grid(50., 46., 15.), None);
    }

    #[test]
    fn test_grid_warning_only_before_race() {
        let race = SessionType::Race;
        let inputs = race_inputs(&race, 30.);
        assert_eq!(evaluate(&inputs, &settings()).grid_warning, None);

        let practice = SessionType::Practice;
        let mut inputs = race_inputs(&practice, 30.);
        inputs.session_state = Some(SessionState::GetInCar);
        assert_eq!(evaluate(&inputs, &settings()).grid_warning, None);
    }
}
