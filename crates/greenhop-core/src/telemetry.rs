//! Carbon-intensity value types shared by the telemetry provider, the
//! decision engine and the statistics view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Latest known carbon intensity of one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionIntensity {
    /// Region code (e.g. "CAISO_NORTH", "NO1").
    pub region: String,
    /// Grid carbon intensity in gCO2/kWh.
    pub intensity: f64,
    pub sampled_at: DateTime<Utc>,
}

impl RegionIntensity {
    pub fn new(region: impl Into<String>, intensity: f64, sampled_at: DateTime<Utc>) -> Self {
        Self {
            region: region.into(),
            intensity,
            sampled_at,
        }
    }

    /// Ranking order: lowest intensity first, ties by region code.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        self.intensity
            .total_cmp(&other.intensity)
            .then_with(|| self.region.cmp(&other.region))
    }
}

/// Sort regions into ranking order (greenest first).
pub fn rank(regions: &mut [RegionIntensity]) {
    regions.sort_by(RegionIntensity::rank_cmp);
}

/// One point of the local region's rolling intensity history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySample {
    pub timestamp: DateTime<Utc>,
    pub intensity: f64,
}

/// Where an intensity reading came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingSource {
    /// Fresh answer from the upstream feed.
    Live,
    /// Upstream failed; last cached value for the region.
    Cached,
    /// Upstream failed and nothing was cached.
    Fallback,
}

/// An intensity answer from the telemetry provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntensityReading {
    pub intensity: f64,
    pub source: ReadingSource,
    pub sampled_at: DateTime<Utc>,
}

impl IntensityReading {
    pub fn is_degraded(&self) -> bool {
        self.source != ReadingSource::Live
    }
}
