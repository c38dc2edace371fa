use std::{cell::OnceCell, collections::HashMap, fmt::Display};

use serde::{Deserialize, Serialize};

use super::{LAP_HISTORY_CAPACITY, LapEvent, LapRecord};

/// Car and track pair the lap history belongs to. Only used to invalidate state.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CarTrackKey {
    pub track: String,
    pub car: String,
}

impl CarTrackKey {
    pub fn new(track: impl Into<String>, car: impl Into<String>) -> Self {
        Self {
            track: track.into(),
            car: car.into(),
        }
    }
}

impl Display for CarTrackKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.track, self.car)
    }
}

/// Where and when the current lap started.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CrossingMarker {
    /// Lap number being driven since the crossing
    pub lap: i32,
    /// Last lap distance seen by the detector
    pub lap_dist_pct: f32,
    /// Fuel level at the crossing
    pub lap_start_fuel: f32,
    /// Session time at the crossing
    pub crossing_time: f64,
    /// Fuel added since the crossing
    pub accumulated_refuel: f32,
    /// Car was on pit road at the crossing
    pub was_on_pit_road: bool,
}

/// Bounded lap history plus the lap-start markers the detector reads.
///
/// All writes go through `apply`, the only writer being the engine tick.
#[derive(Debug, Default)]
pub struct LapHistoryStore {
    laps: HashMap<u32, LapRecord>,
    min_lap: Option<u32>,
    // most recent first, dropped on every insertion
    sorted: OnceCell<Vec<LapRecord>>,
    historical: Vec<LapRecord>,
    marker: Option<CrossingMarker>,
    qualify_consumption: Option<f32>,
    context: Option<CarTrackKey>,
}

impl LapHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one detector event.
    pub fn apply(&mut self, event: &LapEvent) {
        match event {
            LapEvent::RefuelDetected { amount } => {
                if let Some(marker) = self.marker.as_mut() {
                    marker.accumulated_refuel += amount;
                }
            }
            LapEvent::LapCompleted(record) => self.insert(record.clone()),
            LapEvent::LapCrossing {
                lap_dist_pct,
                fuel_level,
                session_time,
                lap,
                on_pit_road,
            } => {
                self.marker = Some(CrossingMarker {
                    lap: *lap,
                    lap_dist_pct: *lap_dist_pct,
                    lap_start_fuel: *fuel_level,
                    crossing_time: *session_time,
                    accumulated_refuel: 0.,
                    was_on_pit_road: *on_pit_road,
                });
            }
            LapEvent::LapDistanceUpdated { lap_dist_pct } => {
                if let Some(marker) = self.marker.as_mut() {
                    marker.lap_dist_pct = *lap_dist_pct;
                }
            }
            LapEvent::QualifyConsumptionUpdated(value) => self.raise_qualify_consumption(*value),
        }
    }

    /// Upsert a lap by number, evicting the lowest lap number past capacity.
    pub fn insert(&mut self, record: LapRecord) {
        let lap_number = record.lap_number;
        self.laps.insert(lap_number, record);
        self.sorted.take();

        match self.min_lap {
            Some(min) if min <= lap_number => {}
            _ => self.min_lap = Some(lap_number),
        }

        if self.laps.len() > LAP_HISTORY_CAPACITY {
            if let Some(oldest) = self.min_lap {
                self.laps.remove(&oldest);
            }
            self.min_lap = self.laps.keys().min().copied();
        }
    }

    /// Laps of this session, most recent first.
    pub fn history(&self) -> &[LapRecord] {
        self.sorted.get_or_init(|| {
            let mut laps: Vec<LapRecord> = self.laps.values().cloned().collect();
            laps.sort_unstable_by(|a, b| b.lap_number.cmp(&a.lap_number));
            laps
        })
    }

    /// The `count` most recent laps, most recent first.
    pub fn recent(&self, count: usize) -> Vec<LapRecord> {
        if count >= self.laps.len() {
            // every lap is returned, only ordering is needed
            let mut laps: Vec<LapRecord> = self.laps.values().cloned().collect();
            laps.sort_unstable_by(|a, b| b.lap_number.cmp(&a.lap_number));
            return laps;
        }
        self.history()[..count].to_vec()
    }

    pub fn last_lap(&self) -> Option<&LapRecord> {
        self.history().first()
    }

    pub fn len(&self) -> usize {
        self.laps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.laps.is_empty()
    }

    /// Laps carried over from previous sessions with this car and track.
    pub fn historical(&self) -> &[LapRecord] {
        &self.historical
    }

    pub fn set_historical(&mut self, laps: Vec<LapRecord>) {
        self.historical = laps
            .into_iter()
            .map(|lap| LapRecord {
                is_historical: true,
                ..lap
            })
            .collect();
    }

    pub fn marker(&self) -> Option<&CrossingMarker> {
        self.marker.as_ref()
    }

    /// Forget the lap-start markers so the next tick starts a fresh lap.
    pub fn reset_marker(&mut self) {
        self.marker = None;
    }

    pub fn qualify_consumption(&self) -> Option<f32> {
        self.qualify_consumption
    }

    /// Raise the best qualifying consumption, lower values are ignored.
    pub fn raise_qualify_consumption(&mut self, value: f32) {
        if !value.is_finite() || value <= 0. {
            return;
        }
        match self.qualify_consumption {
            Some(current) if current >= value => {}
            _ => self.qualify_consumption = Some(value),
        }
    }

    pub fn context(&self) -> Option<&CarTrackKey> {
        self.context.as_ref()
    }

    /// Switch to another car and track, dropping everything recorded for the previous one.
    pub fn set_context(&mut self, context: Option<CarTrackKey>) {
        if self.context != context {
            self.clear();
            self.qualify_consumption = None;
            self.historical.clear();
            self.context = context;
        }
    }

    /// Drop laps and markers. The qualifying consumption is kept.
    pub fn clear(&mut self) {
        self.laps.clear();
        self.min_lap = None;
        self.sorted.take();
        self.marker = None;
    }
}
