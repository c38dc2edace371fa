// Fuel history surviving between engine instances through the file database

use pitfuel::storage::{FileFuelDatabase, FuelPersistence};
use pitfuel::telemetry::{FLAG_GREEN, SessionDescriptor};
use pitfuel::fuel::CarTrackKey;
use pitfuel::{FuelCalculatorConfig, FuelEngine, SessionInfo, TelemetrySnapshot};
use tempfile::tempdir;

fn session_info(kind: &str, laps: Option<u32>) -> SessionInfo {
    SessionInfo {
        sessions: vec![SessionDescriptor {
            session_num: 0,
            session_type: kind.to_string(),
            session_laps: laps,
        }],
        driver_car_fuel_max_ltr: Some(60.),
        driver_car_max_fuel_pct: Some(1.),
        car_class_est_lap_time: Some(90.),
        track_name: Some("monza".to_string()),
        car_name: Some("bmwm4gt3".to_string()),
    }
}

fn snapshot(lap: i32, d: f32, fuel: f32, time: f64) -> TelemetrySnapshot {
    TelemetrySnapshot {
        fuel_level: Some(fuel),
        fuel_level_pct: Some(fuel / 60.),
        lap: Some(lap),
        lap_dist_pct: Some(d),
        session_laps_remain: Some(30 - lap + 1),
        session_time_remain: Some(3600. - time),
        session_time_total: Some(3600.),
        session_flags: Some(FLAG_GREEN),
        session_time: Some(time),
        session_num: Some(0),
        session_state: Some(4),
        on_pit_road: Some(false),
        player_car_tow_time: Some(0.),
        ..TelemetrySnapshot::default()
    }
}

/// Drive `laps` laps burning `usage` each, ten ticks per lap, then cross the line once more.
fn drive(engine: &mut FuelEngine, laps: i32, usage: f32, start_fuel: f32) {
    let mut time = 0.;
    for lap in 1..=laps {
        let lap_start = start_fuel - usage * (lap - 1) as f32;
        for step in 0..10 {
            let d = step as f32 / 10.;
            engine.tick(&snapshot(lap, d, lap_start - usage * d, time));
            time += 9.;
        }
    }
    engine.tick(&snapshot(laps + 1, 0., start_fuel - usage * laps as f32, time));
}

fn file_engine(path: std::path::PathBuf, kind: &str, laps: Option<u32>) -> FuelEngine {
    let database = FileFuelDatabase::open(path).unwrap();
    let mut engine =
        FuelEngine::new(FuelCalculatorConfig::default()).with_persistence(Box::new(database));
    engine.update_session_info(session_info(kind, laps));
    engine
}

#[test]
fn test_history_reloaded_by_next_engine() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("pitfuel").join("fuel_data.json");

    let mut first = file_engine(path.clone(), "Race", Some(30));
    drive(&mut first, 3, 2.5, 50.);
    assert_eq!(first.store().len(), 3);
    drop(first);
    assert!(path.is_file());

    let mut second = file_engine(path.clone(), "Race", Some(30));
    assert_eq!(second.store().historical().len(), 3);
    assert!(second.store().historical().iter().all(|l| l.is_historical));

    // no lap driven yet, the estimate comes from the stored laps
    let result = second
        .tick(&snapshot(1, 0.05, 60., 0.))
        .expect("estimate from history");
    assert!((result.avg_lap_usage - 2.5).abs() < 1e-3);
    assert_eq!(result.last_finished_lap, None);
    assert_eq!(result.avg_lap_time, Some(90.));
}

#[test]
fn test_qualifying_max_reloaded_by_next_engine() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("fuel_data.json");

    let mut qualifying = file_engine(path.clone(), "Lone Qualify", None);
    drive(&mut qualifying, 2, 2.8, 20.);
    let qualify_max = qualifying.store().qualify_consumption().unwrap();
    assert!((qualify_max - 2.8).abs() < 1e-3);
    drop(qualifying);

    let database = FileFuelDatabase::open(path.clone()).unwrap();
    let key = CarTrackKey::new("monza", "bmwm4gt3");
    assert_eq!(database.qualify_max(&key).unwrap(), Some(qualify_max));

    let race = file_engine(path, "Race", Some(30));
    assert_eq!(race.store().qualify_consumption(), Some(qualify_max));
}

#[test]
fn test_cleared_laps_are_not_reloaded() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("fuel_data.json");

    let mut first = file_engine(path.clone(), "Race", Some(30));
    drive(&mut first, 2, 2.5, 50.);
    drop(first);

    let mut database = FileFuelDatabase::open(path.clone()).unwrap();
    let key = CarTrackKey::new("monza", "bmwm4gt3");
    assert_eq!(database.historical_laps(&key).unwrap().len(), 2);
    database.clear_laps(&key).unwrap();

    let second = file_engine(path, "Race", Some(30));
    assert!(second.store().historical().is_empty());
}

#[test]
fn test_storage_disabled_skips_database() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("fuel_data.json");
    let config = FuelCalculatorConfig {
        enable_storage: false,
        ..FuelCalculatorConfig::default()
    };
    let database = FileFuelDatabase::open(path.clone()).unwrap();
    let mut engine = FuelEngine::new(config).with_persistence(Box::new(database));
    engine.update_session_info(session_info("Race", Some(30)));
    drive(&mut engine, 2, 2.5, 50.);

    assert_eq!(engine.store().len(), 2);
    assert!(!path.exists());
}
