// Persistence of lap history and qualifying consumption per car and track

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{
    config::APP_DIR_NAME,
    errors::FuelError,
    fuel::{CarTrackKey, LapRecord},
};

const DATABASE_FILE_NAME: &str = "fuel_data.json";
/// Laps kept per car and track
pub const HISTORICAL_LAPS_PER_KEY: usize = 10;

/// Storage of fuel data across sessions.
pub trait FuelPersistence {
    /// Store a valid lap, most recent first
    fn save_lap(&mut self, key: &CarTrackKey, lap: &LapRecord) -> Result<(), FuelError>;

    /// Store the best qualifying lap consumption
    fn save_qualify_max(&mut self, key: &CarTrackKey, value: f32) -> Result<(), FuelError>;

    /// Laps stored in earlier sessions, most recent first
    fn historical_laps(&self, key: &CarTrackKey) -> Result<Vec<LapRecord>, FuelError>;

    fn qualify_max(&self, key: &CarTrackKey) -> Result<Option<f32>, FuelError>;
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CarTrackSettings {
    pub qualify_max: Option<f32>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct FuelDatabase {
    laps: HashMap<String, Vec<LapRecord>>,
    settings: HashMap<String, CarTrackSettings>,
}

impl FuelDatabase {
    fn push_lap(&mut self, key: &CarTrackKey, lap: &LapRecord) {
        let laps = self.laps.entry(key.to_string()).or_default();
        laps.insert(
            0,
            LapRecord {
                is_historical: true,
                ..lap.clone()
            },
        );
        laps.truncate(HISTORICAL_LAPS_PER_KEY);
    }

    fn set_qualify_max(&mut self, key: &CarTrackKey, value: f32) {
        self.settings.entry(key.to_string()).or_default().qualify_max = Some(value);
    }

    fn laps(&self, key: &CarTrackKey) -> Vec<LapRecord> {
        self.laps.get(&key.to_string()).cloned().unwrap_or_default()
    }

    fn qualify_max(&self, key: &CarTrackKey) -> Option<f32> {
        self.settings
            .get(&key.to_string())
            .and_then(|s| s.qualify_max)
    }
}

/// `FuelPersistence` backed by a single JSON file.
pub struct FileFuelDatabase {
    path: PathBuf,
    data: FuelDatabase,
}

impl FileFuelDatabase {
    /// Open the database at `path`, starting empty when the file is missing or unreadable.
    pub fn open(path: PathBuf) -> Result<Self, FuelError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| FuelError::StorageError {
                reason: format!("Cannot create {}: {}", parent.display(), e),
            })?;
        }
        let data = Self::read(&path);
        Ok(Self { path, data })
    }

    pub fn open_default() -> Result<Self, FuelError> {
        Self::open(Self::default_path()?)
    }

    pub fn default_path() -> Result<PathBuf, FuelError> {
        let data_dir = dirs::data_dir().ok_or(FuelError::NoConfigDir)?;
        Ok(data_dir.join(APP_DIR_NAME).join(DATABASE_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove every stored lap of a car and track.
    pub fn clear_laps(&mut self, key: &CarTrackKey) -> Result<(), FuelError> {
        if self.data.laps.remove(&key.to_string()).is_some() {
            self.flush()?;
        }
        Ok(())
    }

    fn read(path: &Path) -> FuelDatabase {
        if !path.exists() {
            debug!("No fuel database at {}, starting empty", path.display());
            return FuelDatabase::default();
        }
        let parsed = fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|content| serde_json::from_str(&content).map_err(|e| e.to_string()));
        match parsed {
            Ok(data) => data,
            Err(e) => {
                warn!(
                    "Fuel database {} is unreadable, starting empty: {}",
                    path.display(),
                    e
                );
                FuelDatabase::default()
            }
        }
    }

    /// Write the whole database through a temporary file.
    fn flush(&self) -> Result<(), FuelError> {
        let content = serde_json::to_string_pretty(&self.data).map_err(|e| {
            FuelError::StorageError {
                reason: format!("Failed to serialize fuel database: {}", e),
            }
        })?;
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, content).map_err(|e| FuelError::StorageError {
            reason: format!("Failed to write {}: {}", temp_path.display(), e),
        })?;
        fs::rename(&temp_path, &self.path).map_err(|e| FuelError::StorageError {
            reason: format!("Failed to replace {}: {}", self.path.display(), e),
        })
    }
}

impl FuelPersistence for FileFuelDatabase {
    fn save_lap(&mut self, key: &CarTrackKey, lap: &LapRecord) -> Result<(), FuelError> {
        self.data.push_lap(key, lap);
        self.flush()
    }

    fn save_qualify_max(&mut self, key: &CarTrackKey, value: f32) -> Result<(), FuelError> {
        self.data.set_qualify_max(key, value);
        self.flush()
    }

    fn historical_laps(&self, key: &CarTrackKey) -> Result<Vec<LapRecord>, FuelError> {
        Ok(self.data.laps(key))
    }

    fn qualify_max(&self, key: &CarTrackKey) -> Result<Option<f32>, FuelError> {
        Ok(self.data.qualify_max(key))
    }
}

/// Keeps everything in memory for the lifetime of the process.
#[derive(Clone, Debug, Default)]
pub struct InMemoryFuelDatabase {
    data: FuelDatabase,
}

impl FuelPersistence for InMemoryFuelDatabase {
    fn save_lap(&mut self, key: &CarTrackKey, lap: &LapRecord) -> Result<(), FuelError> {
        self.data.push_lap(key, lap);
        Ok(())
    }

    fn save_qualify_max(&mut self, key: &CarTrackKey, value: f32) -> Result<(), FuelError> {
        self.data.set_qualify_max(key, value);
        Ok(())
    }

    fn historical_laps(&self, key: &CarTrackKey) -> Result<Vec<LapRecord>, FuelError> {
        Ok(self.data.laps(key))
    }

    fn qualify_max(&self, key: &CarTrackKey) -> Result<Option<f32>, FuelError> {
        Ok(self.data.qualify_max(key))
    }
}
