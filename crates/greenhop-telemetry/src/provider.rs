//! Cached, timeout-bounded access to a carbon source.

use chrono::Utc;
use futures::future::join_all;
use greenhop_config::TelemetryConfig;
use greenhop_core::telemetry::rank;
use greenhop_core::{HistorySample, IntensityReading, ReadingSource, RegionIntensity};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::{CarbonSource, History, TelemetryError};

/// Answers intensity queries without ever failing or blocking past its
/// timeout. Live answers refresh the cache; failures fall back to the cached
/// value, then to a constant.
pub struct TelemetryProvider {
    source: Arc<dyn CarbonSource>,
    local_region: String,
    regions: Vec<String>,
    timeout: Duration,
    fallback_intensity: f64,
    cache: RwLock<HashMap<String, RegionIntensity>>,
    history: RwLock<History>,
}

impl TelemetryProvider {
    pub fn new(source: Arc<dyn CarbonSource>, config: &TelemetryConfig) -> Self {
        Self {
            source,
            local_region: config.local_region.clone(),
            regions: config.regions.clone(),
            timeout: config.timeout,
            fallback_intensity: config.fallback_intensity,
            cache: RwLock::new(HashMap::new()),
            history: RwLock::new(History::new(config.history_capacity)),
        }
    }

    pub fn local_region(&self) -> &str {
        &self.local_region
    }

    pub fn regions(&self) -> &[String] {
        &self.regions
    }

    /// Current intensity of `region`, degrading to cached or fallback data
    /// when the source fails or exceeds the timeout.
    pub async fn current_intensity(&self, region: &str) -> IntensityReading {
        let outcome = match tokio::time::timeout(self.timeout, self.source.fetch(region)).await {
            Ok(Ok(intensity)) if intensity.is_finite() && intensity >= 0.0 => Ok(intensity),
            Ok(Ok(intensity)) => Err(TelemetryError::Parse(format!(
                "intensity {} is not a valid reading",
                intensity
            ))),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(TelemetryError::Timeout(self.timeout)),
        };

        match outcome {
            Ok(intensity) => self.record(region, intensity).await,
            Err(e) => {
                let reading = self.degraded(region).await;
                warn!(
                    source = self.source.name(),
                    region = %region,
                    error = %e,
                    fallback = ?reading.source,
                    intensity = reading.intensity,
                    "Carbon intensity unavailable, using degraded reading"
                );
                reading
            }
        }
    }

    /// Fetch every configured region concurrently. Returns how many answered live.
    pub async fn refresh(&self) -> usize {
        let readings = self.sample(self.regions.iter().map(String::as_str)).await;
        readings.values().filter(|r| !r.is_degraded()).count()
    }

    /// Configured regions plus `extra`, each fetched once and concurrently.
    /// The local region is therefore recorded in the history at most once
    /// per call, however many callers ask about it.
    pub async fn sample<'a>(
        &self,
        extra: impl IntoIterator<Item = &'a str>,
    ) -> HashMap<String, IntensityReading> {
        let regions: BTreeSet<&str> = self
            .regions
            .iter()
            .map(String::as_str)
            .chain(extra.into_iter().map(|r: &str| r))
            .collect();

        let readings = join_all(regions.iter().map(|region| async move {
            (region.to_string(), self.current_intensity(region).await)
        }))
        .await;

        let live = readings.iter().filter(|(_, r)| !r.is_degraded()).count();
        debug!(live, total = readings.len(), "Sampled carbon intensity");
        readings.into_iter().collect()
    }

    /// Configured regions with known intensity, greenest first. No I/O.
    pub async fn rank_regions(&self) -> Vec<RegionIntensity> {
        let cache = self.cache.read().await;
        let mut ranked: Vec<RegionIntensity> = self
            .regions
            .iter()
            .filter_map(|r| cache.get(r).cloned())
            .collect();
        rank(&mut ranked);
        ranked
    }

    /// Last cached intensity of a region.
    pub async fn cached(&self, region: &str) -> Option<RegionIntensity> {
        self.cache.read().await.get(region).cloned()
    }

    /// Most recent local intensity: newest history sample, else the cache.
    pub async fn latest_local(&self) -> Option<f64> {
        if let Some(sample) = self.history.read().await.latest() {
            return Some(sample.intensity);
        }
        self.cached(&self.local_region).await.map(|r| r.intensity)
    }

    /// Rolling history of the local region, oldest first.
    pub async fn history(&self) -> Vec<HistorySample> {
        self.history.read().await.to_vec()
    }

    async fn record(&self, region: &str, intensity: f64) -> IntensityReading {
        let now = Utc::now();
        self.cache.write().await.insert(
            region.to_string(),
            RegionIntensity::new(region, intensity, now),
        );

        if region == self.local_region {
            self.history.write().await.push(HistorySample {
                timestamp: now,
                intensity,
            });
        }

        IntensityReading {
            intensity,
            source: ReadingSource::Live,
            sampled_at: now,
        }
    }

    async fn degraded(&self, region: &str) -> IntensityReading {
        match self.cached(region).await {
            Some(cached) => IntensityReading {
                intensity: cached.intensity,
                source: ReadingSource::Cached,
                sampled_at: cached.sampled_at,
            },
            None => IntensityReading {
                intensity: self.fallback_intensity,
                source: ReadingSource::Fallback,
                sampled_at: Utc::now(),
            },
        }
    }
}
