pub mod alerts;
pub mod detector;
pub mod engine;
pub mod history;
pub mod horizon;
pub mod projection;
pub mod stats;
pub mod strategy;
pub mod units;

pub use detector::{DetectorState, LapCrossingDetector, LapEvent};
pub use engine::FuelEngine;
pub use history::{CarTrackKey, LapHistoryStore};

use serde::{Deserialize, Serialize};

/// Maximum number of laps the history store keeps.
pub const LAP_HISTORY_CAPACITY: usize = 50;

/// A completed lap, created once at a confirmed crossing and never mutated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LapRecord {
    /// The lap that was driven, 1-based
    pub lap_number: u32,
    /// Fuel burnt over the lap, refuels included (liters)
    pub fuel_used: f32,
    /// Seconds between the two crossings
    pub lap_time: f32,
    /// No caution was shown at any point of the lap
    pub is_green_flag: bool,
    /// Lap can feed consumption averages
    pub is_valid_for_calc: bool,
    /// Lap started on pit road
    pub is_out_lap: bool,
    /// Lap touched pit road after the start
    pub is_in_lap: bool,
    pub was_towed: bool,
    /// Lap was loaded from the fuel database rather than driven this session
    #[serde(default)]
    pub is_historical: bool,
    /// Wall-clock creation time, milliseconds since epoch
    pub timestamp_ms: u64,
    pub session_num: Option<i32>,
}

impl LapRecord {
    /// Neither an out-lap nor an in-lap.
    pub fn is_full_lap(&self) -> bool {
        !self.is_out_lap && !self.is_in_lap
    }
}

/// How much the consumption estimate can be trusted, from the number of valid laps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Confidence {
    #[default]
    VeryLow,
    Low,
    Medium,
    High,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuelStatus {
    Safe,
    Caution,
    Danger,
}

/// Pre-race advisory about the fill level on the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridWarning {
    /// The tank can hold the full race but is not filled that far
    CanFinishFill,
    /// Fewer than 5 laps of fuel while the tank could carry more
    LowFuel,
    /// The race needs a stop and the tank is not full
    FillTank,
}

/// A lap target shown to the driver: how much fuel per lap to reach `laps` laps.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetScenario {
    pub laps: u32,
    pub fuel_per_lap: f32,
    pub is_current_target: bool,
}

/// Everything the fuel engine derives from one telemetry tick.
///
/// Fuel quantities are liters, conversion to the display unit is left to the
/// consumer (see `units::format_fuel`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FuelCalculationResult {
    pub fuel_level: f32,
    pub tank_capacity: f32,

    // consumption
    pub last_lap_usage: Option<f32>,
    /// Base consumption: average of the last `avg_laps_count` valid laps or its fallback
    pub avg_lap_usage: f32,
    pub avg10_lap_usage: Option<f32>,
    pub avg_green_lap_usage: Option<f32>,
    pub weighted_avg_lap_usage: Option<f32>,
    pub min_lap_usage: Option<f32>,
    pub max_lap_usage: Option<f32>,
    pub max_qualify: Option<f32>,
    pub current_lap_usage: f32,
    pub projected_lap_usage: Option<f32>,
    /// Recent consumption change in percent, positive when consumption is rising
    pub trend_percent: f32,
    pub trend_adjusted_consumption: f32,

    // race horizon
    pub laps_with_fuel: f32,
    pub laps_remaining: f32,
    pub laps_range: (u32, u32),
    pub total_laps: f32,
    pub current_lap: i32,
    pub last_finished_lap: Option<u32>,
    pub avg_lap_time: Option<f32>,
    pub session_time_total: Option<f64>,
    pub race_finished: bool,

    // strategy
    pub fuel_to_finish: f32,
    pub fuel_to_add: f32,
    pub queued_fuel: f32,
    pub fuel_at_finish: f32,
    pub can_finish: bool,
    pub target_consumption: Option<f32>,
    pub stops_remaining: Option<u32>,
    pub laps_per_stint: Option<f32>,
    pub pit_window_open: i32,
    pub pit_window_close: i32,
    pub earliest_pit_lap: Option<i32>,
    pub target_scenarios: Vec<TargetScenario>,
    pub confidence: Confidence,

    // alerts
    pub fuel_status: FuelStatus,
    pub grid_warning: Option<GridWarning>,
}
