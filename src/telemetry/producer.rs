use std::path::Path;

use log::{debug, info};

use crate::FuelError;

use super::{SessionInfo, TelemetryOutput, TelemetrySnapshot};

/// Source of telemetry snapshots and session metadata.
///
/// Live simulator connections and recorded replays both implement this trait so the
/// collector loop can drive the fuel engine without knowing where data comes from.
pub trait TelemetryProducer {
    /// Initialize the producer and establish a connection to the data source.
    ///
    /// # Errors
    ///
    /// Returns an error if the data source cannot be opened.
    fn start(&mut self) -> Result<(), FuelError>;

    /// Retrieve the latest session metadata.
    ///
    /// Session information changes rarely, callers are expected to poll it at a lower
    /// frequency than `telemetry`.
    fn session_info(&mut self) -> Result<SessionInfo, FuelError>;

    /// Get the next telemetry snapshot.
    ///
    /// # Errors
    ///
    /// Returns `FuelError::TelemetryExhausted` when a recorded source has no more data.
    fn telemetry(&mut self) -> Result<TelemetrySnapshot, FuelError>;
}

/// Replays pre-recorded or programmatically generated telemetry.
///
/// Session changes found in a recording are replayed in order: `session_info` returns
/// the most recent `SessionInfo` that precedes the last snapshot handed out.
#[derive(Default)]
pub struct MockTelemetryProducer {
    cur_tick: usize,
    points: Vec<TelemetrySnapshot>,
    /// Session info changes, indexed by the first snapshot they apply to
    sessions: Vec<(usize, SessionInfo)>,
}

impl MockTelemetryProducer {
    pub fn from_points(points: Vec<TelemetrySnapshot>) -> Self {
        Self {
            cur_tick: 0,
            points,
            sessions: Vec::new(),
        }
    }

    pub fn with_session_info(mut self, session_info: SessionInfo) -> Self {
        self.sessions.insert(0, (0, session_info));
        self
    }

    /// Build a producer from a sequence of recorded telemetry outputs.
    pub fn from_outputs(outputs: impl IntoIterator<Item = TelemetryOutput>) -> Self {
        let mut producer = Self::default();
        for output in outputs {
            match output {
                TelemetryOutput::DataPoint(snapshot) => producer.points.push(*snapshot),
                TelemetryOutput::SessionChange(session) => {
                    producer.sessions.push((producer.points.len(), session))
                }
            }
        }
        producer
    }

    /// Load telemetry from a JSON Lines file of `TelemetryOutput` records.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or a line is not a valid
    /// `TelemetryOutput`.
    pub fn from_file(file: &Path) -> Result<Self, FuelError> {
        if !file.is_file() {
            return Err(FuelError::InvalidTelemetryFile {
                path: file.display().to_string(),
            });
        }

        let outputs = serde_jsonlines::json_lines(file)
            .map_err(|e| FuelError::TelemetryLoaderError { source: e })?
            .collect::<Result<Vec<TelemetryOutput>, std::io::Error>>()
            .map_err(|e| FuelError::TelemetryLoaderError { source: e })?;

        let producer = Self::from_outputs(outputs);
        info!(
            "Loaded {} telemetry points and {} session changes from {}",
            producer.points.len(),
            producer.sessions.len(),
            file.display()
        );
        Ok(producer)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl TelemetryProducer for MockTelemetryProducer {
    fn start(&mut self) -> Result<(), FuelError> {
        // Nothing to connect to
        debug!("Starting mock telemetry producer");
        Ok(())
    }

    fn session_info(&mut self) -> Result<SessionInfo, FuelError> {
        let current = self.cur_tick.saturating_sub(1);
        Ok(self
            .sessions
            .iter()
            .rev()
            .find(|(first_tick, _)| *first_tick <= current)
            .map(|(_, session)| session.clone())
            .unwrap_or_default())
    }

    fn telemetry(&mut self) -> Result<TelemetrySnapshot, FuelError> {
        let point = self
            .points
            .get(self.cur_tick)
            .cloned()
            .ok_or(FuelError::TelemetryExhausted)?;
        self.cur_tick += 1;
        Ok(point)
    }
}
