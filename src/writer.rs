use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
    sync::mpsc::Receiver,
};

use log::warn;

use crate::{errors::FuelError, telemetry::FuelOutput};

/// Write every received output as one JSON line until the channel closes.
pub fn write_fuel_output(file: &Path, receiver: Receiver<FuelOutput>) -> Result<(), FuelError> {
    let output_file = File::create(file).map_err(|e| FuelError::WriterError { source: e })?;
    let mut output_writer = BufWriter::new(output_file);
    for output in &receiver {
        let line = match serde_json::to_string(&output) {
            Ok(line) => line,
            Err(e) => {
                warn!("Could not serialize fuel output: {}", e);
                continue;
            }
        };
        writeln!(output_writer, "{}", line).map_err(|e| FuelError::WriterError { source: e })?;
    }
    output_writer
        .flush()
        .map_err(|e| FuelError::WriterError { source: e })?;
    Ok(())
}
