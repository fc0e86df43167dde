//! Carbon-aware job scheduling for GreenHop.
//!
//! A single background loop re-evaluates pending and delayed jobs on a fixed
//! tick and applies decisions through the store's compare-and-set, so a
//! client's stop or delete always wins over an in-flight transition.

pub mod scheduler;
pub mod stats;

pub use scheduler::{Scheduler, TickReport};
pub use stats::StatsAggregator;
