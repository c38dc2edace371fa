use log::{debug, info, warn};

use crate::{
    config::FuelCalculatorConfig,
    storage::FuelPersistence,
    telemetry::{SessionInfo, SessionType, TelemetrySnapshot},
};

use super::{
    CarTrackKey, DetectorState, FuelCalculationResult, FuelStatus, LapCrossingDetector, LapEvent,
    LapHistoryStore,
    alerts::{self, AlertInputs, Alerts},
    horizon::{self, HorizonInputs},
    projection::{LapProjector, ProjectionInputs},
    stats::{self, SummaryInputs},
    strategy::{self, StrategyInputs},
};

/// Runs the whole fuel pipeline once per telemetry tick.
///
/// Owns the detector state, the lap history and the projection state; nothing
/// else writes to them.
pub struct FuelEngine {
    config: FuelCalculatorConfig,
    detector: LapCrossingDetector,
    detector_state: DetectorState,
    store: LapHistoryStore,
    projector: LapProjector,
    persistence: Option<Box<dyn FuelPersistence + Send>>,
    session_info: SessionInfo,
    session_num: Option<i32>,
}

impl FuelEngine {
    pub fn new(config: FuelCalculatorConfig) -> Self {
        let detector = LapCrossingDetector::new(config.detector.clone());
        Self {
            config,
            detector,
            detector_state: DetectorState::default(),
            store: LapHistoryStore::new(),
            projector: LapProjector::new(),
            persistence: None,
            session_info: SessionInfo::default(),
            session_num: None,
        }
    }

    /// Attach a persistence backend, only used when `enable_storage` is set.
    pub fn with_persistence(mut self, persistence: Box<dyn FuelPersistence + Send>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn config(&self) -> &FuelCalculatorConfig {
        &self.config
    }

    pub fn store(&self) -> &LapHistoryStore {
        &self.store
    }

    pub fn detector_state(&self) -> &DetectorState {
        &self.detector_state
    }

    pub fn session_info(&self) -> &SessionInfo {
        &self.session_info
    }

    /// Forget the detector state, keeping the lap history.
    pub fn restart(&mut self) {
        self.detector_state = DetectorState::default();
        self.projector.reset();
    }

    fn storage(&mut self) -> Option<&mut (dyn FuelPersistence + Send + 'static)> {
        if self.config.enable_storage {
            self.persistence.as_deref_mut()
        } else {
            None
        }
    }

    /// Take new session metadata, switching the car and track context when it changed.
    pub fn update_session_info(&mut self, session_info: SessionInfo) {
        let key = match (&session_info.track_name, &session_info.car_name) {
            (Some(track), Some(car)) => Some(CarTrackKey::new(track.as_str(), car.as_str())),
            _ => None,
        };
        self.session_info = session_info;

        if key.is_none() || key.as_ref() == self.store.context() {
            return;
        }
        info!(
            "Car and track changed to {}",
            key.as_ref().map(|k| k.to_string()).unwrap_or_default()
        );
        self.store.set_context(key.clone());
        self.projector.reset();
        self.detector_state = DetectorState::default();

        let Some(key) = key else {
            return;
        };
        let Some(storage) = self.storage() else {
            return;
        };
        let historical = match storage.historical_laps(&key) {
            Ok(laps) => laps,
            Err(e) => {
                warn!("Could not load fuel history for {}: {}", key, e);
                Vec::new()
            }
        };
        let qualify_max = match storage.qualify_max(&key) {
            Ok(value) => value,
            Err(e) => {
                warn!("Could not load qualifying consumption for {}: {}", key, e);
                None
            }
        };
        info!(
            "Loaded {} historical laps for {}, qualifying max {:?}",
            historical.len(),
            key,
            qualify_max
        );
        self.store.set_historical(historical);
        if let Some(value) = qualify_max {
            self.store.raise_qualify_consumption(value);
        }
    }

    fn session_type(&self, snapshot: &TelemetrySnapshot) -> SessionType {
        self.session_info.session_type(snapshot.session_num)
    }

    fn track_session_change(&mut self, snapshot: &TelemetrySnapshot) {
        let Some(session_num) = snapshot.session_num else {
            return;
        };
        match self.session_num.replace(session_num) {
            Some(previous) if previous != session_num => {
                info!("Session changed from {} to {}", previous, session_num);
                self.store.reset_marker();
                self.detector_state = DetectorState::default();
                self.projector.reset();
            }
            _ => {}
        }
    }

    fn apply_events(&mut self, events: &[LapEvent]) {
        for event in events {
            self.store.apply(event);
            let Some(key) = self.store.context().cloned() else {
                continue;
            };
            match event {
                LapEvent::LapCompleted(record) if record.is_valid_for_calc => {
                    if let Some(storage) = self.storage()
                        && let Err(e) = storage.save_lap(&key, record)
                    {
                        warn!("Could not save lap {}: {}", record.lap_number, e);
                    }
                }
                LapEvent::QualifyConsumptionUpdated(_) => {
                    let value = self.store.qualify_consumption();
                    if let (Some(value), Some(storage)) = (value, self.storage())
                        && let Err(e) = storage.save_qualify_max(&key, value)
                    {
                        warn!("Could not save qualifying consumption: {}", e);
                    }
                }
                _ => {}
            }
        }
    }

    /// Process one snapshot, `None` when it carries too little data for a result.
    pub fn tick(&mut self, snapshot: &TelemetrySnapshot) -> Option<FuelCalculationResult> {
        let fields = snapshot.required()?;
        self.track_session_change(snapshot);
        let session_type = self.session_type(snapshot);

        let (events, next_state) =
            self.detector
                .process(snapshot, &session_type, &self.detector_state, &self.store);
        self.apply_events(&events);
        self.detector_state = next_state;

        let fuel_level = fields.fuel_level;
        let lap_dist_pct = fields.lap_dist_pct.clamp(0., 1.);
        let lap_start_fuel = self
            .store
            .marker()
            .map_or(fuel_level, |marker| marker.lap_start_fuel);
        let current_lap_usage = (lap_start_fuel - fuel_level).max(0.);

        let summary = stats::summarize(
            self.store.history(),
            self.store.historical(),
            SummaryInputs {
                avg_laps_count: self.config.avg_laps_count,
                qualify_consumption: self.store.qualify_consumption(),
                current_lap_usage,
                lap_dist_pct,
            },
        );

        let projected_lap_usage = self.projector.update(&ProjectionInputs {
            lap: fields.lap,
            lap_dist_pct,
            fuel_level,
            lap_start_fuel,
            lap_dist_reset: self.detector_state.lap_dist_reset,
            last_lap_usage: summary.last_lap_usage,
            avg_lap_usage: summary.avg_laps,
            qualify_consumption: self.store.qualify_consumption(),
        });

        let Some(base_consumption) = summary.base_consumption else {
            debug!("No consumption estimate yet");
            return None;
        };

        let tank_capacity = strategy::tank_capacity(
            fuel_level,
            fields.fuel_level_pct,
            self.session_info.tank_capacity(),
        );
        let adjusted = strategy::trend_adjusted(base_consumption, summary.trend_percent);
        let laps_with_fuel = if adjusted > 0. {
            fuel_level / adjusted
        } else {
            0.
        };

        let avg_lap_time = summary.avg_lap_time.or(self
            .session_info
            .car_class_est_lap_time
            .filter(|t| *t > 0.));
        let race = horizon::estimate(&HorizonInputs {
            lap: fields.lap,
            lap_dist_pct,
            session_laps_remain: fields.session_laps_remain,
            session_time_remain: snapshot.session_time_remain,
            session_time_total: snapshot.session_time_total,
            session_flags: snapshot.session_flags.unwrap_or(0),
            official_laps: self.session_info.official_laps(snapshot.session_num),
            avg_lap_time,
            laps_with_fuel,
        });

        let race_finished = self.detector_state.race_finished;
        let laps_remaining = if race_finished {
            (1. - lap_dist_pct).max(0.)
        } else {
            race.laps_remaining
        };

        let mut plan = strategy::plan(&StrategyInputs {
            fuel_level,
            tank_capacity,
            base_consumption,
            trend_percent: summary.trend_percent,
            laps_remaining,
            lap: fields.lap,
            safety_margin: self.config.safety_margin_liters(),
            pit_sv_flags: snapshot.pit_sv_flags.unwrap_or(0),
            pit_sv_fuel: snapshot.pit_sv_fuel,
        });

        let mut alerts = alerts::evaluate(
            &AlertInputs {
                session_type: &session_type,
                session_state: snapshot.session_state(),
                fuel_level,
                fuel_level_pct: fields.fuel_level_pct,
                tank_capacity,
                trend_adjusted_consumption: plan.trend_adjusted_consumption,
                last_lap_usage: summary.last_lap_usage,
                min_lap_usage: summary.min_lap_usage,
                max_lap_usage: summary.max_lap_usage,
                laps_remaining,
                fuel_needed: plan.fuel_to_finish,
            },
            &self.config.alert_settings(),
        );

        if race_finished {
            plan.can_finish = true;
            plan.stops_remaining = Some(0);
            plan.fuel_to_add = 0.;
            plan.fuel_to_finish = 0.;
            plan.earliest_pit_lap = None;
            alerts = Alerts {
                fuel_status: FuelStatus::Safe,
                grid_warning: None,
                ..alerts
            };
        }

        Some(FuelCalculationResult {
            fuel_level,
            tank_capacity,
            last_lap_usage: summary.last_lap_usage,
            avg_lap_usage: base_consumption,
            avg10_lap_usage: summary.avg10_laps,
            avg_green_lap_usage: summary.avg_green_laps,
            weighted_avg_lap_usage: summary.weighted_avg,
            min_lap_usage: summary.min_lap_usage,
            max_lap_usage: summary.max_lap_usage,
            max_qualify: self.store.qualify_consumption(),
            current_lap_usage,
            projected_lap_usage: Some(projected_lap_usage),
            trend_percent: summary.trend_percent,
            trend_adjusted_consumption: plan.trend_adjusted_consumption,
            laps_with_fuel: plan.laps_with_fuel,
            laps_remaining,
            laps_range: horizon::laps_range(laps_remaining),
            total_laps: race.total_laps,
            current_lap: fields.lap,
            last_finished_lap: self.store.last_lap().map(|l| l.lap_number),
            avg_lap_time,
            session_time_total: snapshot.session_time_total,
            race_finished,
            fuel_to_finish: plan.fuel_to_finish,
            fuel_to_add: plan.fuel_to_add,
            queued_fuel: plan.queued_fuel,
            fuel_at_finish: plan.fuel_at_finish,
            can_finish: plan.can_finish,
            target_consumption: plan.target_consumption,
            stops_remaining: plan.stops_remaining,
            laps_per_stint: plan.laps_per_stint,
            pit_window_open: plan.pit_window_open,
            pit_window_close: plan.pit_window_close,
            earliest_pit_lap: plan.earliest_pit_lap,
            target_scenarios: plan.target_scenarios,
            confidence: summary.confidence,
            fuel_status: alerts.fuel_status,
            grid_warning: alerts.grid_warning,
        })
    }
}
