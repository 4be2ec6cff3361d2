//! # Job Ledger Service
//!
//! Thin service over the job repository that is the write entry point for
//! external callers: creating jobs, retrying failed ones, and cancelling
//! pending ones. Publishes `job.created` so observers see new work the
//! moment it is appended.
//!
//! Deduplication against existing pending/running jobs for the same
//! (item, language) is deliberately left to the caller.

use crate::repository::JobRepository;
use crate::{Job, JobError, JobId, JobStatus, Result};
use core_catalog::{ItemId, Page, PageRequest};
use core_runtime::events::{EventBus, EventType};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Entry point for appending to and querying the job ledger.
pub struct JobLedger {
    repository: Arc<dyn JobRepository>,
    event_bus: Arc<EventBus>,
}

impl JobLedger {
    pub fn new(repository: Arc<dyn JobRepository>, event_bus: Arc<EventBus>) -> Self {
        Self {
            repository,
            event_bus,
        }
    }

    /// Append a pending job for (item, language).
    ///
    /// Does not start execution; the dispatcher picks the job up on its next
    /// pass. Publishes `job.created`.
    pub async fn create(&self, item_id: ItemId, language: impl Into<String>) -> Result<Job> {
        let job = Job::new(item_id, language);
        self.repository.insert(&job).await?;

        info!(job_id = %job.id, item_id = %job.item_id, language = %job.language, "Job created");
        self.event_bus.publish(
            EventType::JobCreated,
            json!({
                "job_id": job.id.as_str(),
                "item_id": job.item_id.as_str(),
                "language": job.language,
            }),
        );

        Ok(job)
    }

    /// Fetch a job by id.
    ///
    /// # Errors
    ///
    /// `JobError::NotFound` if the id is absent.
    pub async fn get(&self, id: &JobId) -> Result<Job> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| JobError::NotFound {
                job_id: id.to_string(),
            })
    }

    /// List jobs by status, newest first.
    pub async fn list_by_status(
        &self,
        status: JobStatus,
        request: PageRequest,
    ) -> Result<Page<Job>> {
        self.repository.list_by_status(status, request).await
    }

    /// List all jobs targeting an item.
    pub async fn list_by_item(&self, item_id: &ItemId) -> Result<Vec<Job>> {
        self.repository.list_by_item(item_id).await
    }

    /// Count jobs by status.
    pub async fn count_by_status(&self, status: JobStatus) -> Result<u64> {
        self.repository.count_by_status(status).await
    }

    /// Reset a failed job to pending so the dispatcher can execute it again.
    pub async fn retry(&self, id: &JobId) -> Result<Job> {
        let job = self.repository.retry(id).await?;
        info!(job_id = %id, "Job reset for retry");
        Ok(job)
    }

    /// Cancel a job that has not been claimed yet; the row is deleted.
    pub async fn cancel(&self, id: &JobId) -> Result<()> {
        self.repository.delete_pending(id).await?;
        info!(job_id = %id, "Pending job cancelled");
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
