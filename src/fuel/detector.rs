use log::{debug, info};

use crate::{
    config::DetectorConfig,
    telemetry::{
        RequiredFields, SessionType, TelemetrySnapshot, is_checkered_flag, is_green_flag,
    },
};

use super::{LapHistoryStore, LapRecord, history::CrossingMarker, stats};

/// Lap distance drop that marks a reset of the lap distance (teleport, reset to pits)
const LAP_DIST_RESET_DROP: f32 = 0.5;
/// Advance after a reset that marks the distance as moving normally again
const LAP_DIST_RESET_RECOVERY: f32 = 0.05;
/// A finish flag seen this close to the line means the car just crossed under it
const FINISH_LINE_DIST: f32 = 0.05;
/// Session time left after the race that identifies a long cool-down
const COOL_DOWN_TIME_S: f64 = 300.;

/// Discrete outcome of one detector tick, applied to the `LapHistoryStore` in order.
#[derive(Clone, Debug, PartialEq)]
pub enum LapEvent {
    /// Fuel went up during the lap
    RefuelDetected { amount: f32 },
    /// A lap boundary was confirmed and the lap passed the plausibility checks
    LapCompleted(LapRecord),
    /// A new lap starts here
    LapCrossing {
        lap_dist_pct: f32,
        fuel_level: f32,
        session_time: f64,
        lap: i32,
        on_pit_road: bool,
    },
    LapDistanceUpdated { lap_dist_pct: f32 },
    /// New best fuel use of a qualifying lap
    QualifyConsumptionUpdated(f32),
}

/// Per-session detector memory, carried from one tick to the next.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectorState {
    pub last_session_time: Option<f64>,
    pub last_refuel_time: Option<f64>,
    pub prev_fuel_level: Option<f32>,
    /// Lowest fuel level seen during the current pit road visit
    pub pit_fuel_base: Option<f32>,
    /// Fuel already counted as added during the current pit road visit
    pub pit_fuel_added: f32,
    pub towed_during_lap: bool,
    pub pit_road_during_lap: bool,
    pub lap_fully_green: bool,
    pub prev_lap_dist_pct: Option<f32>,
    pub lap_dist_reset: bool,
    pub race_finished: bool,
    pub check_flag_lap: Option<i32>,
}

impl Default for DetectorState {
    fn default() -> Self {
        Self {
            last_session_time: None,
            last_refuel_time: None,
            prev_fuel_level: None,
            pit_fuel_base: None,
            pit_fuel_added: 0.,
            towed_during_lap: false,
            pit_road_during_lap: false,
            lap_fully_green: true,
            prev_lap_dist_pct: None,
            lap_dist_reset: false,
            race_finished: false,
            check_flag_lap: None,
        }
    }
}

impl DetectorState {
    /// Clear the per-lap latches at the start of a new lap.
    fn start_lap(&mut self, session_flags: u32) {
        self.towed_during_lap = false;
        self.pit_road_during_lap = false;
        self.lap_fully_green = is_green_flag(session_flags);
        self.lap_dist_reset = false;
    }
}

/// True only when the lap distance wraps from the end of the lap to its start.
pub fn detect_lap_crossing(current: f32, previous: f32, high: f32, low: f32) -> bool {
    previous > high && previous < 1. && current < low && current >= 0.
}

/// Turns telemetry snapshots into lap events.
#[derive(Clone, Debug)]
pub struct LapCrossingDetector {
    config: DetectorConfig,
}

impl LapCrossingDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Process one snapshot.
    ///
    /// Never mutates its inputs: the returned events must be applied to the store and
    /// the returned state passed to the next call.
    pub fn process(
        &self,
        snapshot: &TelemetrySnapshot,
        session_type: &SessionType,
        state: &DetectorState,
        store: &LapHistoryStore,
    ) -> (Vec<LapEvent>, DetectorState) {
        let mut events = Vec::new();
        let mut next = state.clone();

        let Some(fields) = snapshot.required() else {
            return (events, next);
        };
        let lap = fields.lap;
        let lap_dist_pct = fields.lap_dist_pct;
        let fuel_level = fields.fuel_level;
        let session_time = fields.session_time;
        let session_flags = snapshot.session_flags.unwrap_or(0);
        let on_pit_road = snapshot.on_pit_road.unwrap_or(false);

        self.track_lap_dist_reset(lap_dist_pct, &mut next);

        if snapshot.player_car_tow_time.unwrap_or(0.) > 0. {
            next.towed_during_lap = true;
        }
        if on_pit_road {
            next.pit_road_during_lap = true;
        }
        if snapshot.session_flags.is_some() && !is_green_flag(session_flags) {
            next.lap_fully_green = false;
        }

        self.monitor_race_finish(snapshot, lap, lap_dist_pct, &mut next);

        let refuel = self.detect_refuel(fuel_level, session_time, on_pit_road, &mut next);
        if let Some(amount) = refuel {
            events.push(LapEvent::RefuelDetected { amount });
        }

        let crossing = LapEvent::LapCrossing {
            lap_dist_pct,
            fuel_level,
            session_time,
            lap,
            on_pit_road,
        };

        match store.marker() {
            None => {
                // first usable tick, the lap in progress starts here
                events.push(crossing);
            }
            Some(marker) if lap < marker.lap => {
                // without a previous session time (fresh state) the drop is taken as a re-sync
                let time_moved_on = state
                    .last_session_time
                    .is_some_and(|last| session_time > last);
                if time_moved_on {
                    debug!(
                        "Ignoring lap counter drop from {} to {}",
                        marker.lap, lap
                    );
                    events.push(LapEvent::LapDistanceUpdated { lap_dist_pct });
                } else {
                    debug!(
                        "Lap counter went back from {} to {}, re-synchronising",
                        marker.lap, lap
                    );
                    next.start_lap(session_flags);
                    events.push(crossing);
                }
            }
            Some(marker) if lap - marker.lap > 1 => {
                debug!(
                    "Lap counter jumped from {} to {}, re-synchronising without recording a lap",
                    marker.lap, lap
                );
                next.start_lap(session_flags);
                events.push(crossing);
            }
            Some(marker) => {
                let lap_incremented = lap == marker.lap + 1;
                let dist_crossing = detect_lap_crossing(
                    lap_dist_pct,
                    marker.lap_dist_pct,
                    self.config.crossing_high,
                    self.config.crossing_low,
                );
                let time_since_crossing = session_time - marker.crossing_time;

                if !(dist_crossing || lap_incremented) {
                    events.push(LapEvent::LapDistanceUpdated { lap_dist_pct });
                } else if !lap_incremented
                    && time_since_crossing > 0.
                    && time_since_crossing < self.config.min_lap_time_s
                {
                    debug!(
                        "Ignoring crossing {:.3}s after the previous one",
                        time_since_crossing
                    );
                    events.push(LapEvent::LapDistanceUpdated { lap_dist_pct });
                } else {
                    let refuel_total = marker.accumulated_refuel + refuel.unwrap_or(0.);
                    events.extend(self.complete_lap(
                        snapshot,
                        &fields,
                        session_type,
                        marker,
                        refuel_total,
                        &next,
                        store,
                    ));
                    next.start_lap(session_flags);
                    events.push(LapEvent::LapCrossing {
                        lap_dist_pct,
                        fuel_level,
                        session_time,
                        lap: lap.max(marker.lap + 1),
                        on_pit_road,
                    });
                }
            }
        }

        next.last_session_time = Some(session_time);
        (events, next)
    }

    fn track_lap_dist_reset(&self, lap_dist_pct: f32, next: &mut DetectorState) {
        if let Some(prev) = next.prev_lap_dist_pct {
            if lap_dist_pct < prev - LAP_DIST_RESET_DROP {
                next.lap_dist_reset = true;
            } else if next.lap_dist_reset && lap_dist_pct > prev + LAP_DIST_RESET_RECOVERY {
                next.lap_dist_reset = false;
            }
        }
        next.prev_lap_dist_pct = Some(lap_dist_pct);
    }

    fn monitor_race_finish(
        &self,
        snapshot: &TelemetrySnapshot,
        lap: i32,
        lap_dist_pct: f32,
        next: &mut DetectorState,
    ) {
        let checkered = is_checkered_flag(snapshot.session_flags.unwrap_or(0));
        let post_race = snapshot
            .session_state()
            .is_some_and(|state| state.is_post_race());

        if !(checkered || post_race) {
            next.check_flag_lap = None;
            next.race_finished = false;
            return;
        }

        let was_finished = next.race_finished;
        match next.check_flag_lap {
            None => {
                next.check_flag_lap = Some(lap);
                let long_cool_down = post_race
                    && snapshot
                        .session_time_remain
                        .is_some_and(|remain| remain > COOL_DOWN_TIME_S);
                if lap_dist_pct < FINISH_LINE_DIST || long_cool_down {
                    next.race_finished = true;
                }
            }
            Some(flag_lap) if lap > flag_lap => next.race_finished = true,
            Some(_) => {}
        }

        if next.race_finished && !was_finished {
            info!("Race finished on lap {}", lap);
        }
    }

    /// Returns the refuelled amount when fuel went up since the previous tick.
    ///
    /// On track a rise only counts when `refuel_debounce_s` have passed since the last
    /// counted refuel. On pit road the fill is measured against the lowest level of the
    /// visit, so a fill spread over several ticks is counted once in full and gauge
    /// jitter adds at most one threshold step.
    fn detect_refuel(
        &self,
        fuel_level: f32,
        session_time: f64,
        on_pit_road: bool,
        next: &mut DetectorState,
    ) -> Option<f32> {
        let previous = next.prev_fuel_level.replace(fuel_level);

        if !on_pit_road {
            next.pit_fuel_base = None;
            next.pit_fuel_added = 0.;
            let delta = fuel_level - previous?;
            let debounced = next
                .last_refuel_time
                .is_none_or(|last| session_time - last > self.config.refuel_debounce_s);
            if delta <= self.config.refuel_threshold || !debounced {
                return None;
            }
            debug!("Refuel detected on track: +{:.3}", delta);
            next.last_refuel_time = Some(session_time);
            return Some(delta);
        }

        let base = next
            .pit_fuel_base
            .into_iter()
            .chain(previous)
            .fold(fuel_level, f32::min);
        next.pit_fuel_base = Some(base);
        let delta = (fuel_level - base) - next.pit_fuel_added;
        if delta <= self.config.refuel_threshold {
            return None;
        }
        if next.pit_fuel_added == 0. {
            debug!("Refuel detected in the pits: +{:.3}", delta);
        }
        next.pit_fuel_added += delta;
        next.last_refuel_time = Some(session_time);
        Some(delta)
    }

    #[allow(clippy::too_many_arguments)]
    fn complete_lap(
        &self,
        snapshot: &TelemetrySnapshot,
        fields: &RequiredFields,
        session_type: &SessionType,
        marker: &CrossingMarker,
        refuel_total: f32,
        next: &DetectorState,
        store: &LapHistoryStore,
    ) -> Vec<LapEvent> {
        let mut events = Vec::new();
        let completed_lap = marker.lap;
        let fuel_used = marker.lap_start_fuel + refuel_total - fields.fuel_level;
        let lap_time = (fields.session_time - marker.crossing_time) as f32;

        if completed_lap < 1 || fuel_used <= 0. || lap_time < self.config.min_lap_time_s as f32 {
            debug!(
                "Not recording lap {}: fuel used {:.3}, lap time {:.2}s",
                completed_lap, fuel_used, lap_time
            );
            return events;
        }

        let recent_valid: Vec<LapRecord> = store
            .history()
            .iter()
            .filter(|l| l.is_valid_for_calc)
            .take(stats::OUTLIER_WINDOW)
            .cloned()
            .collect();
        let is_outlier = !stats::is_valid_lap(fuel_used, lap_time, &recent_valid);
        let qualifying = session_type.is_qualifying();
        let is_valid = !next.towed_during_lap
            && (next.lap_fully_green || qualifying)
            && !is_outlier;

        let record = LapRecord {
            lap_number: completed_lap as u32,
            fuel_used,
            lap_time,
            is_green_flag: next.lap_fully_green,
            is_valid_for_calc: is_valid,
            is_out_lap: marker.was_on_pit_road,
            is_in_lap: next.pit_road_during_lap,
            was_towed: next.towed_during_lap,
            is_historical: false,
            timestamp_ms: snapshot.timestamp_ms,
            session_num: snapshot.session_num,
        };
        debug!(
            "Lap {} complete: used {:.3}, time {:.2}s, valid {}, green {}, outlier {}",
            record.lap_number,
            record.fuel_used,
            record.lap_time,
            record.is_valid_for_calc,
            record.is_green_flag,
            is_outlier
        );

        let qualify_candidate = qualifying && !record.was_towed && !record.is_out_lap;
        let raises_qualify = store
            .qualify_consumption()
            .is_none_or(|current| fuel_used > current);
        events.push(LapEvent::LapCompleted(record));
        if qualify_candidate && raises_qualify {
            events.push(LapEvent::QualifyConsumptionUpdated(fuel_used));
        }
        events
    }
}
