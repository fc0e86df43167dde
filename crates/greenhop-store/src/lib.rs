//! Job storage for GreenHop.
//!
//! Provides the `JobStore` trait and an in-memory implementation. Every
//! automatic transition goes through `update_status`, a compare-and-set on
//! the job's current status.

pub mod error;
pub mod memory;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryJobStore;

use async_trait::async_trait;
use greenhop_core::{Job, JobId, JobStatus, JobUpdate, NewJob};

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new `Pending` job.
    async fn create(&self, spec: NewJob) -> StoreResult<Job>;

    async fn get(&self, id: JobId) -> StoreResult<Job>;

    /// All jobs, most recent first.
    async fn list(&self) -> StoreResult<Vec<Job>>;

    /// A window of `list()`.
    async fn list_page(&self, skip: usize, limit: usize) -> StoreResult<Vec<Job>> {
        Ok(self.list().await?.into_iter().skip(skip).take(limit).collect())
    }

    /// Move `id` from `expected` to `next`, writing `update`. Fails with
    /// `Conflict` if the job is no longer in `expected`.
    async fn update_status(
        &self,
        id: JobId,
        expected: JobStatus,
        next: JobStatus,
        update: JobUpdate,
    ) -> StoreResult<Job>;

    /// Stop a non-terminal job. Already terminal jobs are returned unchanged.
    async fn stop(&self, id: JobId) -> StoreResult<Job>;

    /// Remove a job in any state. Returns whether anything was removed.
    async fn delete(&self, id: JobId) -> StoreResult<bool>;
}
