//! Dashboard statistics.

use greenhop_core::StatsSnapshot;
use greenhop_core::stats::{extremes, summarize};
use greenhop_store::{JobStore, StoreResult};
use greenhop_telemetry::TelemetryProvider;
use std::sync::Arc;

/// Builds `StatsSnapshot`s from the store and the telemetry cache. Reading
/// stats never triggers an upstream fetch.
#[derive(Clone)]
pub struct StatsAggregator {
    store: Arc<dyn JobStore>,
    telemetry: Arc<TelemetryProvider>,
}

impl StatsAggregator {
    pub fn new(store: Arc<dyn JobStore>, telemetry: Arc<TelemetryProvider>) -> Self {
        Self { store, telemetry }
    }

    pub async fn snapshot(&self) -> StoreResult<StatsSnapshot> {
        let jobs = self.store.list().await?;
        let totals = summarize(&jobs);
        let (highest_region, lowest_region) = extremes(&self.telemetry.rank_regions().await);

        Ok(StatsSnapshot {
            total_carbon_saved: totals.carbon_saved,
            current_intensity: self.telemetry.latest_local().await.unwrap_or(0.0),
            total_jobs_processed: totals.processed,
            highest_region,
            lowest_region,
            history: self.telemetry.history().await,
        })
    }
}
