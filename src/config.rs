use std::{
    fs::File,
    path::{Path, PathBuf},
};

use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    errors::FuelError,
    fuel::{LAP_HISTORY_CAPACITY, alerts::AlertSettings, units::FuelUnits},
};

pub const APP_DIR_NAME: &str = "pitfuel";
const CONFIG_FILE_NAME: &str = "config.json";
pub const DEFAULT_TICK_RATE_MS: u64 = 100;

/// Fuel level percentages separating the safe, caution and danger states.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FuelStatusThresholds {
    pub green: f32,
    pub amber: f32,
    /// Display-only critical marker. Status evaluation never reads it, anything under
    /// `amber` is already danger.
    pub red: f32,
}

impl FuelStatusThresholds {
    pub const RACE: Self = Self {
        green: 60.,
        amber: 30.,
        red: 10.,
    };
    pub const QUALIFY: Self = Self {
        green: 20.,
        amber: 10.,
        red: 5.,
    };

    fn validate(&self, field: &str) -> Result<(), FuelError> {
        let in_range = |v: f32| v.is_finite() && (0. ..=100.).contains(&v);
        if !(in_range(self.green) && in_range(self.amber) && in_range(self.red)) {
            return Err(invalid(field, "percentages must be between 0 and 100"));
        }
        if self.green < self.amber || self.amber < self.red {
            return Err(invalid(field, "expected green >= amber >= red"));
        }
        Ok(())
    }
}

/// Consumption the laps-left override of the fuel status is measured with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuelStatusBasis {
    Last,
    #[default]
    Avg,
    Min,
    Max,
}

/// Tuning of the lap crossing detector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Crossings closer than this are jitter
    pub min_lap_time_s: f64,
    /// Smallest fuel rise treated as a refuel (liters)
    pub refuel_threshold: f32,
    /// Fuel rises further apart than this start a new refuel
    pub refuel_debounce_s: f64,
    /// Lap distance the previous tick must exceed for a wrap to count
    pub crossing_high: f32,
    /// Lap distance the current tick must be under for a wrap to count
    pub crossing_low: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_lap_time_s: 10.,
            refuel_threshold: 0.05,
            refuel_debounce_s: 5.,
            crossing_high: 0.9,
            crossing_low: 0.1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuelCalculatorConfig {
    /// Display unit, also the unit of `safety_margin`
    pub fuel_units: FuelUnits,
    /// Laps in the base consumption average
    pub avg_laps_count: usize,
    /// Extra fuel carried to the finish
    pub safety_margin: f32,
    /// Persist laps and qualifying consumption per car and track
    pub enable_storage: bool,
    pub fuel_status_thresholds: FuelStatusThresholds,
    pub qualify_status_thresholds: FuelStatusThresholds,
    pub fuel_status_basis: FuelStatusBasis,
    /// Laps of fuel under which the status is always danger
    pub fuel_status_red_laps: f32,
    pub detector: DetectorConfig,
    pub tick_rate_ms: u64,
    /// Ticks between two session info refreshes
    pub session_info_refresh_ticks: u32,
}

impl Default for FuelCalculatorConfig {
    fn default() -> Self {
        Self {
            fuel_units: FuelUnits::Liters,
            avg_laps_count: 5,
            safety_margin: 1.,
            enable_storage: true,
            fuel_status_thresholds: FuelStatusThresholds::RACE,
            qualify_status_thresholds: FuelStatusThresholds::QUALIFY,
            fuel_status_basis: FuelStatusBasis::Avg,
            fuel_status_red_laps: 3.,
            detector: DetectorConfig::default(),
            tick_rate_ms: DEFAULT_TICK_RATE_MS,
            session_info_refresh_ticks: 10,
        }
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> FuelError {
    FuelError::InvalidConfig {
        field: field.to_string(),
        reason: reason.into(),
    }
}

impl FuelCalculatorConfig {
    pub fn default_path() -> Result<PathBuf, FuelError> {
        Ok(dirs::config_dir()
            .ok_or(FuelError::NoConfigDir)?
            .join(APP_DIR_NAME)
            .join(CONFIG_FILE_NAME))
    }

    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self, FuelError> {
        let file = File::open(path).map_err(|e| FuelError::ConfigIOError { source: e })?;
        let config: Self = serde_json::from_reader(file)
            .map_err(|e| FuelError::ConfigSerializeError { source: e })?;
        config.validate()?;
        Ok(config)
    }

    /// Load the config from the user config directory, defaults when there is none.
    pub fn load_default() -> Result<Self, FuelError> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load(&path)
        } else {
            info!("No config file at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), FuelError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| FuelError::ConfigIOError { source: e })?;
        }
        let file = File::create(path).map_err(|e| FuelError::ConfigIOError { source: e })?;
        serde_json::to_writer_pretty(file, self)
            .map_err(|e| FuelError::ConfigSerializeError { source: e })
    }

    pub fn validate(&self) -> Result<(), FuelError> {
        if !(1..=LAP_HISTORY_CAPACITY).contains(&self.avg_laps_count) {
            return Err(invalid(
                "avg_laps_count",
                format!("must be between 1 and {}", LAP_HISTORY_CAPACITY),
            ));
        }
        if !self.safety_margin.is_finite() || self.safety_margin < 0. {
            return Err(invalid("safety_margin", "must be a positive number"));
        }
        if !self.fuel_status_red_laps.is_finite() || self.fuel_status_red_laps < 0. {
            return Err(invalid("fuel_status_red_laps", "must be a positive number"));
        }
        self.fuel_status_thresholds
            .validate("fuel_status_thresholds")?;
        self.qualify_status_thresholds
            .validate("qualify_status_thresholds")?;

        let detector = &self.detector;
        if !(detector.min_lap_time_s >= 0.) {
            return Err(invalid("detector.min_lap_time_s", "must not be negative"));
        }
        if !(detector.refuel_threshold > 0.) {
            return Err(invalid("detector.refuel_threshold", "must be above zero"));
        }
        if !(detector.refuel_debounce_s >= 0.) {
            return Err(invalid("detector.refuel_debounce_s", "must not be negative"));
        }
        let crossing_ok = detector.crossing_low > 0.
            && detector.crossing_low < detector.crossing_high
            && detector.crossing_high < 1.;
        if !crossing_ok {
            return Err(invalid(
                "detector.crossing_low",
                "expected 0 < crossing_low < crossing_high < 1",
            ));
        }
        if self.tick_rate_ms == 0 {
            return Err(invalid("tick_rate_ms", "must be above zero"));
        }
        if self.session_info_refresh_ticks == 0 {
            return Err(invalid("session_info_refresh_ticks", "must be above zero"));
        }
        Ok(())
    }

    /// Safety margin in liters.
    pub fn safety_margin_liters(&self) -> f32 {
        self.fuel_units.to_liters(self.safety_margin)
    }

    pub fn alert_settings(&self) -> AlertSettings {
        AlertSettings {
            race_thresholds: self.fuel_status_thresholds,
            qualify_thresholds: self.qualify_status_thresholds,
            basis: self.fuel_status_basis,
            red_laps: self.fuel_status_red_laps,
        }
    }
}
