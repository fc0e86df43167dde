//! In-memory job store.

use async_trait::async_trait;
use chrono::Utc;
use greenhop_core::{Job, JobId, JobStatus, JobUpdate, NewJob};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{JobStore, StoreError, StoreResult};

/// Job store backed by a map behind an async `RwLock`. Each operation holds
/// the lock only for its own check-and-write, so operations are atomic with
/// respect to one another.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, spec: NewJob) -> StoreResult<Job> {
        let job = Job::new(spec, Utc::now());
        self.jobs.write().await.insert(job.id, job.clone());
        debug!(job_id = %job.id, name = %job.name, "Stored new job");
        Ok(job)
    }

    async fn get(&self, id: JobId) -> StoreResult<Job> {
        self.jobs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn list(&self) -> StoreResult<Vec<Job>> {
        let mut jobs: Vec<Job> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(jobs)
    }

    async fn update_status(
        &self,
        id: JobId,
        expected: JobStatus,
        next: JobStatus,
        update: JobUpdate,
    ) -> StoreResult<Job> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        if job.status != expected {
            return Err(StoreError::Conflict {
                id,
                expected,
                actual: job.status,
            });
        }
        if !expected.can_transition_to(next) {
            return Err(StoreError::InvalidTransition {
                id,
                from: expected,
                to: next,
            });
        }

        job.apply(update);
        job.status = next;
        if next.is_terminal() {
            job.completed_at = Some(Utc::now());
        }
        Ok(job.clone())
    }

    async fn stop(&self, id: JobId) -> StoreResult<Job> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        if job.status.is_terminal() {
            return Ok(job.clone());
        }

        job.status = JobStatus::Stopped;
        job.completed_at = Some(Utc::now());
        debug!(job_id = %id, "Stopped job");
        Ok(job.clone())
    }

    async fn delete(&self, id: JobId) -> StoreResult<bool> {
        Ok(self.jobs.write().await.remove(&id).is_some())
    }
}
