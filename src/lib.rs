// Library interface for pitfuel
// The binary and the integration tests both go through these modules

pub mod config;
pub mod errors;
pub mod fuel;
pub mod scheduler;
pub mod storage;
pub mod telemetry;
pub mod writer;

// Re-export commonly used types
pub use config::FuelCalculatorConfig;
pub use errors::FuelError;
pub use fuel::{FuelCalculationResult, FuelEngine, LapRecord};
pub use telemetry::{FuelOutput, SessionInfo, TelemetryOutput, TelemetrySnapshot};
