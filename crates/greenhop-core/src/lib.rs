//! Core domain types for the GreenHop carbon-aware scheduler.
//!
//! This crate contains:
//! - Job identifiers and common error types
//! - The job record and its status state machine
//! - Carbon-intensity value types shared with the telemetry layer
//! - The pure decision engine mapping telemetry to scheduling decisions
//! - Dashboard statistics types

pub mod decision;
pub mod error;
pub mod id;
pub mod job;
pub mod stats;
pub mod telemetry;

pub use decision::{Decision, DecisionPolicy, classify};
pub use error::{Error, Result};
pub use id::JobId;
pub use job::{Job, JobRequest, JobStatus, JobUpdate, NewJob, Priority};
pub use stats::{RegionExtreme, StatsSnapshot};
pub use telemetry::{HistorySample, IntensityReading, ReadingSource, RegionIntensity};
