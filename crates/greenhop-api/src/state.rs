//! Application state.

use greenhop_scheduler::StatsAggregator;
use greenhop_store::JobStore;
use greenhop_telemetry::TelemetryProvider;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn JobStore>,
    pub telemetry: Arc<TelemetryProvider>,
    pub stats: StatsAggregator,
    /// Region assigned to submissions that name none.
    pub default_region: String,
}

impl AppState {
    pub fn new(store: Arc<dyn JobStore>, telemetry: Arc<TelemetryProvider>) -> Self {
        let stats = StatsAggregator::new(store.clone(), telemetry.clone());
        let default_region = telemetry.local_region().to_string();

        Self {
            store,
            telemetry,
            stats,
            default_region,
        }
    }
}
