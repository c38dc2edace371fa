// Error types for pitfuel

use crate::telemetry::collector::FuelOutput;
use snafu::Snafu;
use std::{io, sync::mpsc::SendError};

#[derive(Debug, Snafu)]
pub enum FuelError {
    // Errors while reading telemetry
    #[snafu(display("Telemetry producer error: {description}"))]
    TelemetryProducerError { description: String },
    #[snafu(display("No more telemetry available from the producer"))]
    TelemetryExhausted,

    // Errors while broadcasting fuel calculations
    #[snafu(display("Error broadcasting fuel calculation"))]
    FuelBroadcastError { source: Box<SendError<FuelOutput>> },

    // Errors for the output writer
    #[snafu(display("Error writing fuel output file"))]
    WriterError { source: io::Error },

    // Config management errors
    #[snafu(display("Could not find application data directory to save config file"))]
    NoConfigDir,
    #[snafu(display("Error reading or writing config file"))]
    ConfigIOError { source: io::Error },
    #[snafu(display("Error serializing config file"))]
    ConfigSerializeError { source: serde_json::Error },
    #[snafu(display("Invalid configuration: {field} - {reason}"))]
    InvalidConfig { field: String, reason: String },

    // Fuel history storage errors
    #[snafu(display("Fuel history storage error: {reason}"))]
    StorageError { reason: String },

    // Replay input errors
    #[snafu(display("Invalid telemetry file: {path}"))]
    InvalidTelemetryFile { path: String },
    #[snafu(display("Error loading telemetry file"))]
    TelemetryLoaderError { source: io::Error },
}

impl From<SendError<FuelOutput>> for FuelError {
    fn from(value: SendError<FuelOutput>) -> Self {
        FuelError::FuelBroadcastError {
            source: Box::new(value),
        }
    }
}
