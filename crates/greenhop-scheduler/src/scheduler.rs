//! Scheduler loop - re-evaluates undecided jobs on every tick.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use greenhop_config::SystemConfig;
use greenhop_core::{
    Decision, DecisionPolicy, IntensityReading, Job, JobStatus, JobUpdate, RegionIntensity,
    classify,
};
use greenhop_store::{JobStore, StoreResult};
use greenhop_telemetry::TelemetryProvider;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// What happened to one job during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Ran,
    Hopped,
    Delayed,
    /// Still inside its delay window.
    Waiting,
    /// Lost a compare-and-set to a concurrent stop or delete.
    Skipped,
}

/// Counters for a single tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub evaluated: usize,
    pub ran: usize,
    pub hopped: usize,
    pub delayed: usize,
    pub skipped: usize,
    /// Decisions taken on cached or fallback telemetry.
    pub degraded: usize,
}

/// Drives automatic job transitions.
pub struct Scheduler {
    store: Arc<dyn JobStore>,
    telemetry: Arc<TelemetryProvider>,
    policy: DecisionPolicy,
    tick_interval: Duration,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn JobStore>,
        telemetry: Arc<TelemetryProvider>,
        policy: DecisionPolicy,
        tick_interval: Duration,
    ) -> Self {
        Self {
            store,
            telemetry,
            policy,
            tick_interval,
        }
    }

    pub fn from_config(
        store: Arc<dyn JobStore>,
        telemetry: Arc<TelemetryProvider>,
        config: &SystemConfig,
    ) -> Self {
        Self::new(
            store,
            telemetry,
            config.policy.clone(),
            config.scheduler.tick_interval,
        )
    }

    /// Run the scheduler loop until `shutdown` turns true or its sender drops.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(interval = ?self.tick_interval, "Starting scheduler");

        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let report = self.tick().await;
                    if report.evaluated > 0 {
                        info!(
                            evaluated = report.evaluated,
                            ran = report.ran,
                            hopped = report.hopped,
                            delayed = report.delayed,
                            skipped = report.skipped,
                            degraded = report.degraded,
                            "Scheduler tick"
                        );
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Stopping scheduler");
                        break;
                    }
                }
            }
        }
    }

    pub async fn tick(&self) -> TickReport {
        self.tick_at(Utc::now()).await
    }

    /// One pass over the store as of `now`. Every region is fetched at most
    /// once per tick, so the local history gains one sample per tick.
    pub async fn tick_at(&self, now: DateTime<Utc>) -> TickReport {
        let jobs = match self.store.list().await {
            Ok(jobs) => jobs,
            Err(e) => {
                warn!(error = %e, "Failed to list jobs");
                self.telemetry.refresh().await;
                return TickReport::default();
            }
        };

        let due: Vec<Job> = jobs.into_iter().filter(|j| j.is_due(now)).collect();
        let readings = self
            .telemetry
            .sample(due.iter().map(|j| j.requested_region.as_str()))
            .await;
        if due.is_empty() {
            return TickReport::default();
        }

        let ranking = self.telemetry.rank_regions().await;
        let results = join_all(due.iter().filter_map(|job| {
            readings
                .get(&job.requested_region)
                .map(|reading| self.evaluate(job, reading, &ranking, now))
        }))
        .await;

        let mut report = TickReport {
            evaluated: results.len(),
            ..Default::default()
        };
        for (outcome, degraded) in results {
            match outcome {
                Outcome::Ran => report.ran += 1,
                Outcome::Hopped => report.hopped += 1,
                Outcome::Delayed => report.delayed += 1,
                Outcome::Skipped => report.skipped += 1,
                Outcome::Waiting => {}
            }
            if degraded {
                report.degraded += 1;
            }
        }
        report
    }

    async fn evaluate(
        &self,
        job: &Job,
        reading: &IntensityReading,
        ranking: &[RegionIntensity],
        now: DateTime<Utc>,
    ) -> (Outcome, bool) {
        let decision = classify(job, reading.intensity, ranking, now, &self.policy);

        debug!(
            job_id = %job.id,
            region = %job.requested_region,
            intensity = reading.intensity,
            decision = decision.label(),
            "Classified job"
        );

        let outcome = match self.apply(job, &decision, reading).await {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!(job_id = %job.id, error = %e, "Skipping job this tick");
                Outcome::Skipped
            }
        };
        (outcome, reading.is_degraded())
    }

    async fn apply(
        &self,
        job: &Job,
        decision: &Decision,
        reading: &IntensityReading,
    ) -> StoreResult<Outcome> {
        let degraded = Some(reading.is_degraded());

        if let Decision::DelayUntil(deadline) = decision {
            if job.status == JobStatus::Delayed {
                return Ok(Outcome::Waiting);
            }
            self.store
                .update_status(
                    job.id,
                    job.status,
                    JobStatus::Delayed,
                    JobUpdate {
                        decision_deadline: Some(*deadline),
                        degraded,
                        ..Default::default()
                    },
                )
                .await?;
            info!(job_id = %job.id, deadline = %deadline, intensity = reading.intensity, "Delayed job");
            return Ok(Outcome::Delayed);
        }

        let carbon_saved = decision.carbon_saved(job, reading.intensity);
        let running = self
            .store
            .update_status(
                job.id,
                job.status,
                JobStatus::Running,
                JobUpdate {
                    execution_region: decision.execution_region(job),
                    carbon_intensity_used: decision.execution_intensity(reading.intensity),
                    carbon_saved: Some(carbon_saved),
                    degraded,
                    ..Default::default()
                },
            )
            .await?;

        // Execution is simulated: the job finishes as soon as it starts.
        self.store
            .update_status(
                job.id,
                JobStatus::Running,
                JobStatus::Completed,
                JobUpdate::default(),
            )
            .await?;

        info!(
            job_id = %job.id,
            decision = decision.label(),
            region = running.execution_region.as_deref().unwrap_or_default(),
            carbon_saved,
            "Completed job"
        );

        Ok(match decision {
            Decision::Hop { .. } => Outcome::Hopped,
            _ => Outcome::Ran,
        })
    }
}
