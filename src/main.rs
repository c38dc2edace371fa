use std::{
    path::{Path, PathBuf},
    sync::mpsc,
    thread,
};

use clap::{Parser, Subcommand};
use log::{error, info, warn};

use pitfuel::{
    FuelCalculatorConfig, FuelEngine, FuelError, FuelOutput,
    fuel::units::format_fuel,
    scheduler::{FixedRateTicker, ManualTicker, Ticker},
    storage::FileFuelDatabase,
    telemetry::{collect_fuel, producer::MockTelemetryProducer},
    writer,
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the fuel calculator over a recorded telemetry file
    Replay {
        #[arg(short, long)]
        input: PathBuf,

        /// Write every calculation to a JSON Lines file
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Replay at the configured tick rate instead of as fast as possible
        #[arg(short, long, default_value_t = false)]
        realtime: bool,
    },
    /// Write the default configuration file
    InitConfig {
        #[arg(short, long)]
        path: Option<PathBuf>,
    },
}

fn load_config(path: Option<&Path>) -> Result<FuelCalculatorConfig, FuelError> {
    match path {
        Some(path) => FuelCalculatorConfig::load(path),
        None => FuelCalculatorConfig::load_default(),
    }
}

fn build_engine(config: FuelCalculatorConfig) -> FuelEngine {
    if !config.enable_storage {
        return FuelEngine::new(config);
    }
    match FileFuelDatabase::open_default() {
        Ok(database) => {
            info!("Using fuel database at {}", database.path().display());
            FuelEngine::new(config).with_persistence(Box::new(database))
        }
        Err(e) => {
            warn!("Fuel database unavailable, running without history: {}", e);
            FuelEngine::new(config)
        }
    }
}

fn replay(
    input: &Path,
    output: Option<PathBuf>,
    config: Option<&Path>,
    realtime: bool,
) -> Result<(), FuelError> {
    let config = load_config(config)?;
    let units = config.fuel_units;
    let ticker: Box<dyn Ticker + Send> = if realtime {
        Box::new(FixedRateTicker::from_millis(config.tick_rate_ms))
    } else {
        Box::new(ManualTicker::unlimited())
    };
    let producer = MockTelemetryProducer::from_file(input)?;
    let engine = build_engine(config);

    let (fuel_tx, fuel_rx) = mpsc::channel::<FuelOutput>();

    // when an output file is requested the collector sends to both the console and the writer
    let writer_handle = output.map(|output_file| {
        let (writer_tx, writer_rx) = mpsc::channel::<FuelOutput>();
        let handle = thread::spawn(move || writer::write_fuel_output(&output_file, writer_rx));
        (writer_tx, handle)
    });
    let (writer_tx, writer_handle) = match writer_handle {
        Some((tx, handle)) => (Some(tx), Some(handle)),
        None => (None, None),
    };

    let collector_handle =
        thread::spawn(move || collect_fuel(producer, ticker, engine, fuel_tx, writer_tx));

    let mut last_reported_lap = None;
    for output in &fuel_rx {
        match output {
            FuelOutput::SessionChange(session) => info!(
                "Session: {} in {}",
                session.car_name.as_deref().unwrap_or("unknown car"),
                session.track_name.as_deref().unwrap_or("unknown track")
            ),
            FuelOutput::Calculation(result) => {
                if result.last_finished_lap == last_reported_lap {
                    continue;
                }
                last_reported_lap = result.last_finished_lap;
                println!(
                    "Lap {:>3} | fuel {} | avg {} | laps left {:.2} | to finish {} | add {} | {:?}",
                    result.current_lap,
                    format_fuel(Some(result.fuel_level), units, 2),
                    format_fuel(Some(result.avg_lap_usage), units, 3),
                    result.laps_remaining,
                    format_fuel(Some(result.fuel_to_finish), units, 2),
                    format_fuel(Some(result.fuel_to_add), units, 2),
                    result.fuel_status,
                );
            }
            FuelOutput::NoResult => {}
        }
    }

    let collected = collector_handle
        .join()
        .map_err(|_| FuelError::TelemetryProducerError {
            description: "Collector thread panicked".to_string(),
        })?;
    if let Some(handle) = writer_handle {
        handle.join().map_err(|_| FuelError::TelemetryProducerError {
            description: "Writer thread panicked".to_string(),
        })??;
    }
    collected
}

fn init_config(path: Option<PathBuf>) -> Result<(), FuelError> {
    let path = match path {
        Some(path) => path,
        None => FuelCalculatorConfig::default_path()?,
    };
    FuelCalculatorConfig::default().save(&path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

fn main() {
    #[cfg(debug_assertions)]
    colog::init();

    let cli = Args::parse();
    if let Err(e) = ctrlc::set_handler(move || {
        println!("Exiting...");
        std::process::exit(0);
    }) {
        warn!("Could not set Ctrl-C handler: {}", e);
    }

    let result = match cli.command {
        Commands::Replay {
            input,
            output,
            config,
            realtime,
        } => replay(&input, output, config.as_deref(), realtime),
        Commands::InitConfig { path } => init_config(path),
    };
    if let Err(e) = result {
        error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
