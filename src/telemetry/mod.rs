pub mod collector;
pub mod producer;

pub use collector::{FuelOutput, collect_fuel};
use serde::{Deserialize, Serialize};

/// `SessionLapsRemain` value reported for time-limited sessions without a lap cap.
pub const TIMED_RACE_LAPS_REMAINING: i32 = 32767;

// iRacing `SessionFlags` bits
pub const FLAG_CHECKERED: u32 = 0x0000_0001;
pub const FLAG_WHITE: u32 = 0x0000_0002;
pub const FLAG_GREEN: u32 = 0x0000_0004;
pub const FLAG_YELLOW: u32 = 0x0000_0008;
pub const FLAG_RED: u32 = 0x0000_0010;
pub const FLAG_YELLOW_WAVING: u32 = 0x0000_0100;
pub const FLAG_CAUTION: u32 = 0x0000_4000;
pub const FLAG_CAUTION_WAVING: u32 = 0x0000_8000;
pub const FLAG_BLACK: u32 = 0x0001_0000;

/// `PitSvFlags` bit set while a fuel fill is requested for the next stop.
pub const PIT_SV_FUEL_FILL: u32 = 0x0000_0010;

// Local yellow and red bits do not end a green lap
const NON_GREEN_FLAGS: u32 = FLAG_CAUTION | FLAG_CAUTION_WAVING | FLAG_BLACK;

/// True when no full-course caution condition is set.
pub fn is_green_flag(session_flags: u32) -> bool {
    session_flags & NON_GREEN_FLAGS == 0
}

pub fn is_white_flag(session_flags: u32) -> bool {
    session_flags & FLAG_WHITE != 0
}

pub fn is_checkered_flag(session_flags: u32) -> bool {
    session_flags & FLAG_CHECKERED != 0
}

/// White or checkered: the lap in progress is the last one.
pub fn is_final_lap(session_flags: u32) -> bool {
    is_white_flag(session_flags) || is_checkered_flag(session_flags)
}

/// Ordinal session state as reported by the simulator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SessionState {
    Invalid,
    GetInCar,
    Warmup,
    ParadeLaps,
    Racing,
    Checkered,
    CoolDown,
}

impl SessionState {
    pub fn from_raw(value: i32) -> Self {
        match value {
            1 => Self::GetInCar,
            2 => Self::Warmup,
            3 => Self::ParadeLaps,
            4 => Self::Racing,
            5 => Self::Checkered,
            v if v >= 6 => Self::CoolDown,
            _ => Self::Invalid,
        }
    }

    pub fn is_pre_race(&self) -> bool {
        *self < Self::Racing
    }

    pub fn is_post_race(&self) -> bool {
        *self >= Self::Checkered
    }
}

/// Kind of session the player is in, parsed from the session info `SessionType` string.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionType {
    Race,
    LoneQualify,
    OpenQualify,
    Practice,
    OfflineTesting,
    Other(String),
}

impl SessionType {
    pub fn from_name(name: &str) -> Self {
        match name {
            "Race" => Self::Race,
            "Lone Qualify" => Self::LoneQualify,
            "Open Qualify" => Self::OpenQualify,
            "Practice" => Self::Practice,
            "Offline Testing" => Self::OfflineTesting,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_qualifying(&self) -> bool {
        match self {
            Self::LoneQualify | Self::OpenQualify => true,
            Self::Other(name) => name.contains("Qualify"),
            _ => false,
        }
    }

    /// Sessions where the tighter fuel status thresholds apply.
    pub fn is_qualifying_or_practice(&self) -> bool {
        matches!(
            self,
            Self::LoneQualify | Self::OpenQualify | Self::Practice | Self::OfflineTesting
        )
    }
}

impl Default for SessionType {
    fn default() -> Self {
        Self::Other("Unknown".to_string())
    }
}

/// One tick of player-car telemetry.
///
/// Every simulator field is optional; the fuel engine decides per tick whether
/// enough of them are present to produce a result.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct TelemetrySnapshot {
    /// Wall-clock time the snapshot was taken, milliseconds since epoch
    pub timestamp_ms: u64,
    /// Fuel in the tank (liters)
    pub fuel_level: Option<f32>,
    /// Fuel in the tank as a fraction of tank capacity
    pub fuel_level_pct: Option<f32>,
    /// Lap counter
    pub lap: Option<i32>,
    /// Fraction of the current lap completed, [0, 1)
    pub lap_dist_pct: Option<f32>,
    /// Laps remaining in the session, `TIMED_RACE_LAPS_REMAINING` when time-limited
    pub session_laps_remain: Option<i32>,
    /// Seconds remaining in the session
    pub session_time_remain: Option<f64>,
    /// Seconds allocated to the session
    pub session_time_total: Option<f64>,
    /// `SessionFlags` bitmask
    pub session_flags: Option<u32>,
    /// Seconds since the session started
    pub session_time: Option<f64>,
    pub session_num: Option<i32>,
    /// Raw `SessionState` ordinal
    pub session_state: Option<i32>,
    pub on_pit_road: Option<bool>,
    /// Seconds left on a tow, > 0 while being recovered
    pub player_car_tow_time: Option<f32>,
    pub pit_sv_flags: Option<u32>,
    /// Fuel requested for the next pit stop (liters)
    pub pit_sv_fuel: Option<f32>,
}

impl TelemetrySnapshot {
    pub fn session_state(&self) -> Option<SessionState> {
        self.session_state.map(SessionState::from_raw)
    }

    /// Extract the fields every fuel calculation needs.
    ///
    /// Returns `None` when any of them is missing or when the snapshot is
    /// obviously malformed (negative fuel, non-finite values).
    pub fn required(&self) -> Option<RequiredFields> {
        let fields = RequiredFields {
            fuel_level: self.fuel_level?,
            fuel_level_pct: self.fuel_level_pct?,
            lap: self.lap?,
            lap_dist_pct: self.lap_dist_pct?,
            session_laps_remain: self.session_laps_remain?,
            session_time: self.session_time?,
        };

        let finite = fields.fuel_level.is_finite()
            && fields.fuel_level_pct.is_finite()
            && fields.lap_dist_pct.is_finite()
            && fields.session_time.is_finite();
        if !finite || fields.fuel_level < 0. || fields.fuel_level_pct < 0. {
            return None;
        }
        Some(fields)
    }
}

/// The subset of `TelemetrySnapshot` without which no tick is processed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RequiredFields {
    pub fuel_level: f32,
    pub fuel_level_pct: f32,
    pub lap: i32,
    pub lap_dist_pct: f32,
    pub session_laps_remain: i32,
    pub session_time: f64,
}

/// Static description of one session of the event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionDescriptor {
    pub session_num: i32,
    pub session_type: String,
    /// Official lap count, `None` for unlimited (time-limited) sessions
    pub session_laps: Option<u32>,
}

/// Session metadata, polled less frequently than telemetry.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionInfo {
    pub sessions: Vec<SessionDescriptor>,
    /// Player car tank size (liters)
    pub driver_car_fuel_max_ltr: Option<f32>,
    /// Fraction of the tank the session allows to be filled
    pub driver_car_max_fuel_pct: Option<f32>,
    /// Estimated lap time for the player's class (seconds)
    pub car_class_est_lap_time: Option<f32>,
    pub track_name: Option<String>,
    pub car_name: Option<String>,
}

impl SessionInfo {
    fn session(&self, session_num: Option<i32>) -> Option<&SessionDescriptor> {
        let session_num = session_num?;
        self.sessions.iter().find(|s| s.session_num == session_num)
    }

    pub fn session_type(&self, session_num: Option<i32>) -> SessionType {
        self.session(session_num)
            .map(|s| SessionType::from_name(&s.session_type))
            .unwrap_or_default()
    }

    pub fn official_laps(&self, session_num: Option<i32>) -> Option<u32> {
        self.session(session_num)
            .and_then(|s| s.session_laps)
            .filter(|laps| *laps > 0)
    }

    /// Tank capacity reported by the session, respecting any fuel percentage cap.
    pub fn tank_capacity(&self) -> Option<f32> {
        let max_ltr = self.driver_car_fuel_max_ltr.filter(|v| *v > 0.)?;
        match self.driver_car_max_fuel_pct {
            Some(pct) if pct > 0. => Some(max_ltr * pct),
            _ => Some(max_ltr),
        }
    }
}

/// A record in a telemetry replay stream.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum TelemetryOutput {
    SessionChange(SessionInfo),
    DataPoint(Box<TelemetrySnapshot>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_green_flag_detection() {
        assert!(is_green_flag(FLAG_GREEN));
        assert!(is_green_flag(0));
        assert!(!is_green_flag(FLAG_CAUTION));
        assert!(!is_green_flag(FLAG_CAUTION_WAVING));
        assert!(!is_green_flag(FLAG_BLACK));
        assert!(!is_green_flag(FLAG_CAUTION | FLAG_GREEN));
        // local yellows do not neutralise the race
        assert!(is_green_flag(FLAG_YELLOW | FLAG_GREEN));
        assert!(is_green_flag(FLAG_YELLOW_WAVING));
        assert!(is_green_flag(FLAG_RED));
    }

    #[test]
    fn test_final_lap_flags() {
        assert!(is_final_lap(FLAG_WHITE));
        assert!(is_final_lap(FLAG_CHECKERED));
        assert!(is_final_lap(FLAG_WHITE | FLAG_CHECKERED));
        assert!(!is_final_lap(0));
        assert!(!is_final_lap(FLAG_GREEN));
    }

    #[test]
    fn test_session_state_ordering() {
        assert!(SessionState::from_raw(3).is_pre_race());
        assert!(!SessionState::from_raw(4).is_pre_race());
        assert!(SessionState::from_raw(5).is_post_race());
        assert!(SessionState::from_raw(6).is_post_race());
        assert_eq!(SessionState::from_raw(-1), SessionState::Invalid);
    }

    #[test]
    fn test_session_type_parsing() {
        assert!(SessionType::from_name("Lone Qualify").is_qualifying());
        assert!(SessionType::from_name("Heat Qualify").is_qualifying());
        assert!(!SessionType::from_name("Race").is_qualifying());
        assert!(SessionType::from_name("Offline Testing").is_qualifying_or_practice());
        assert!(!SessionType::from_name("Race").is_qualifying_or_practice());
    }

    #[test]
    fn test_required_fields_missing_or_malformed() {
        let snapshot = TelemetrySnapshot {
            fuel_level: Some(10.),
            fuel_level_pct: Some(0.5),
            lap: Some(1),
            lap_dist_pct: Some(0.2),
            session_laps_remain: Some(10),
            session_time: Some(100.),
            ..TelemetrySnapshot::default()
        };
        assert!(snapshot.required().is_some());

        let missing = TelemetrySnapshot {
            session_time: None,
            ..snapshot.clone()
        };
        assert!(missing.required().is_none());

        let negative = TelemetrySnapshot {
            fuel_level: Some(-1.),
            ..snapshot
        };
        assert!(negative.required().is_none());
    }

    #[test]
    fn test_tank_capacity_from_session() {
        let info = SessionInfo {
            driver_car_fuel_max_ltr: Some(100.),
            driver_car_max_fuel_pct: Some(0.6),
            ..SessionInfo::default()
        };
        assert_eq!(info.tank_capacity(), Some(60.));
        assert_eq!(SessionInfo::default().tank_capacity(), None);
    }

    #[test]
    fn test_snapshot_uses_simulator_field_names() {
        let json = r#"{"FuelLevel": 12.5, "Lap": 3, "LapDistPct": 0.4, "OnPitRoad": true}"#;
        let snapshot: TelemetrySnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.fuel_level, Some(12.5));
        assert_eq!(snapshot.lap, Some(3));
        assert_eq!(snapshot.on_pit_road, Some(true));
        assert_eq!(snapshot.session_time, None);
    }
}
