use std::sync::mpsc::Sender;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    errors::FuelError,
    fuel::{FuelCalculationResult, FuelEngine},
    scheduler::Ticker,
};

use super::{SessionInfo, producer::TelemetryProducer};

/// What the collector publishes for every tick.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum FuelOutput {
    SessionChange(SessionInfo),
    Calculation(Box<FuelCalculationResult>),
    /// The tick carried too little data for a result
    NoResult,
}

fn send(
    output: FuelOutput,
    sender: &Sender<FuelOutput>,
    writer_sender: Option<&Sender<FuelOutput>>,
) -> Result<(), FuelError> {
    if let Some(writer_sender) = writer_sender {
        writer_sender.send(output.clone())?;
    }
    sender.send(output)?;
    Ok(())
}

/// Drive the fuel engine from a telemetry producer until the producer runs dry or the
/// ticker stops.
pub fn collect_fuel(
    mut producer: impl TelemetryProducer,
    mut ticker: impl Ticker,
    mut engine: FuelEngine,
    sender: Sender<FuelOutput>,
    writer_sender: Option<Sender<FuelOutput>>,
) -> Result<(), FuelError> {
    producer.start()?;
    let refresh_ticks = engine.config().session_info_refresh_ticks.max(1) as u64;
    let mut tick: u64 = 0;
    let mut last_session_info: Option<SessionInfo> = None;

    while ticker.wait_next() {
        let snapshot = match producer.telemetry() {
            Ok(snapshot) => snapshot,
            Err(FuelError::TelemetryExhausted) => {
                info!("Telemetry exhausted after {} ticks", tick);
                break;
            }
            Err(e) => return Err(e),
        };

        if tick % refresh_ticks == 0 {
            let session_info = producer.session_info()?;
            if last_session_info.as_ref() != Some(&session_info) {
                debug!("Session info changed");
                engine.update_session_info(session_info.clone());
                send(
                    FuelOutput::SessionChange(session_info.clone()),
                    &sender,
                    writer_sender.as_ref(),
                )?;
                last_session_info = Some(session_info);
            }
        }

        let output = match engine.tick(&snapshot) {
            Some(result) => FuelOutput::Calculation(Box::new(result)),
            None => FuelOutput::NoResult,
        };
        send(output, &sender, writer_sender.as_ref())?;
        tick += 1;
    }
    Ok(())
}
