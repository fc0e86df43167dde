//! Grid carbon-intensity telemetry for GreenHop.
//!
//! A `CarbonSource` answers "what is the intensity of region X right now"
//! from some upstream feed. `TelemetryProvider` wraps a source with a
//! timeout, a per-region cache, a fallback constant and the rolling history
//! of the local region, so callers always get an answer.

pub mod error;
pub mod history;
pub mod provider;
pub mod source;

pub use error::{TelemetryError, TelemetryResult};
pub use history::History;
pub use provider::TelemetryProvider;
pub use source::{CarbonSource, ElectricityMapSource, StaticSource, WattTimeSource, from_config};
