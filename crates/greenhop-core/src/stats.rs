//! Dashboard statistics types.

use serde::{Deserialize, Serialize};

use crate::job::{Job, JobStatus};
use crate::telemetry::{HistorySample, RegionIntensity};

/// A region at one end of the intensity ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionExtreme {
    pub region: String,
    pub intensity: f64,
}

impl From<&RegionIntensity> for RegionExtreme {
    fn from(r: &RegionIntensity) -> Self {
        Self {
            region: r.region.clone(),
            intensity: r.intensity,
        }
    }
}

/// Summary served to the dashboard. Derived on every request, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total_carbon_saved: f64,
    pub current_intensity: f64,
    pub total_jobs_processed: u64,
    pub highest_region: Option<RegionExtreme>,
    pub lowest_region: Option<RegionExtreme>,
    pub history: Vec<HistorySample>,
}

/// Totals folded from the job list.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct JobTotals {
    pub carbon_saved: f64,
    pub processed: u64,
}

/// Single pass over the jobs: savings of completed jobs, count of terminal ones.
pub fn summarize<'a>(jobs: impl IntoIterator<Item = &'a Job>) -> JobTotals {
    jobs.into_iter().fold(JobTotals::default(), |mut acc, job| {
        if job.status == JobStatus::Completed {
            acc.carbon_saved += job.carbon_saved;
        }
        if job.status.is_terminal() {
            acc.processed += 1;
        }
        acc
    })
}

/// Greenest and dirtiest regions of a ranking. Ties go to the smallest code.
pub fn extremes(regions: &[RegionIntensity]) -> (Option<RegionExtreme>, Option<RegionExtreme>) {
    let lowest = regions.iter().min_by(|a, b| a.rank_cmp(b));
    let highest = regions.iter().min_by(|a, b| {
        b.intensity
            .total_cmp(&a.intensity)
            .then_with(|| a.region.cmp(&b.region))
    });
    (highest.map(Into::into), lowest.map(Into::into))
}
