use criterion::{Criterion, black_box, criterion_group, criterion_main};
use pitfuel::fuel::LapRecord;
use pitfuel::fuel::stats::{SummaryInputs, summarize};
use pitfuel::telemetry::{FLAG_GREEN, SessionDescriptor};
use pitfuel::{FuelCalculatorConfig, FuelEngine, SessionInfo, TelemetrySnapshot};
use std::time::Duration;

const TICKS_PER_LAP: usize = 100;

fn session_info() -> SessionInfo {
    SessionInfo {
        sessions: vec![SessionDescriptor {
            session_num: 0,
            session_type: "Race".to_string(),
            session_laps: Some(100),
        }],
        driver_car_fuel_max_ltr: Some(120.),
        driver_car_max_fuel_pct: Some(1.),
        car_class_est_lap_time: Some(100.),
        track_name: Some("nurburgring".to_string()),
        car_name: Some("ferrari296gt3".to_string()),
    }
}

fn create_sample_telemetry(point_no: usize) -> TelemetrySnapshot {
    let lap = point_no / TICKS_PER_LAP + 1;
    let d = (point_no % TICKS_PER_LAP) as f32 / TICKS_PER_LAP as f32;
    let fuel = 120. - 1.1 * (point_no as f32 / TICKS_PER_LAP as f32);
    TelemetrySnapshot {
        timestamp_ms: (point_no * 100) as u64,
        fuel_level: Some(fuel),
        fuel_level_pct: Some(fuel / 120.),
        lap: Some(lap as i32),
        lap_dist_pct: Some(d),
        session_laps_remain: Some(100 - lap as i32 + 1),
        session_flags: Some(FLAG_GREEN),
        session_time: Some(point_no as f64),
        session_num: Some(0),
        session_state: Some(4),
        on_pit_road: Some(false),
        ..Default::default()
    }
}

fn sample_laps(count: u32) -> Vec<LapRecord> {
    (1..=count)
        .rev()
        .map(|lap_number| LapRecord {
            lap_number,
            fuel_used: 3. + (lap_number % 4) as f32 * 0.05,
            lap_time: 100.,
            is_green_flag: true,
            is_valid_for_calc: true,
            is_out_lap: false,
            is_in_lap: false,
            was_towed: false,
            is_historical: false,
            timestamp_ms: 0,
            session_num: Some(0),
        })
        .collect()
}

fn bench_engine_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("fuel_engine");

    group.bench_function("tick_mid_race", |b| {
        let mut engine = FuelEngine::new(FuelCalculatorConfig::default());
        engine.update_session_info(session_info());
        for i in 0..(20 * TICKS_PER_LAP) {
            engine.tick(&create_sample_telemetry(i));
        }
        let telemetry = create_sample_telemetry(20 * TICKS_PER_LAP + 50);
        b.iter(|| black_box(engine.tick(black_box(&telemetry))));
    });

    group.bench_function("process_10_laps", |b| {
        let points: Vec<TelemetrySnapshot> =
            (0..(10 * TICKS_PER_LAP)).map(create_sample_telemetry).collect();
        b.iter(|| {
            let mut engine = FuelEngine::new(FuelCalculatorConfig::default());
            engine.update_session_info(session_info());
            for point in &points {
                black_box(engine.tick(point));
            }
        });
    });

    group.finish();
}

fn bench_summarize(c: &mut Criterion) {
    let mut group = c.benchmark_group("consumption_statistics");

    let history = sample_laps(50);
    let historical = sample_laps(10);
    let inputs = SummaryInputs {
        avg_laps_count: 5,
        qualify_consumption: Some(3.2),
        current_lap_usage: 1.5,
        lap_dist_pct: 0.5,
    };

    group.bench_function("summarize_full_history", |b| {
        b.iter(|| black_box(summarize(black_box(&history), &historical, inputs)));
    });

    group.finish();
}

fn bench_serialization(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialization");

    let telemetry = create_sample_telemetry(0);
    let json = serde_json::to_string(&telemetry).unwrap();
    group.bench_function("deserialize_telemetry", |b| {
        b.iter(|| black_box(serde_json::from_str::<TelemetrySnapshot>(&json).unwrap()));
    });

    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(10))
        .sample_size(100);
    targets = bench_engine_tick, bench_summarize, bench_serialization
}
criterion_main!(benches);
