//! KDL configuration parsing for GreenHop.
//!
//! A single `greenhop.kdl` file configures the HTTP server, the scheduler
//! tick, the decision thresholds and the telemetry provider. Credentials for
//! upstream feeds are read from the environment, never from the file.

pub mod error;
pub mod system;

pub use error::{ConfigError, ConfigResult};
pub use system::{
    ProviderKind, SchedulerConfig, ServerConfig, SystemConfig, TelemetryConfig, load,
    parse_system_config,
};
