//! # Job Ledger Repository
//!
//! Database persistence for the job ledger.
//!
//! ## Overview
//!
//! The jobs table is the sole source of truth for scheduling: the dispatcher
//! claims work from it rather than from an in-memory queue, so pending jobs
//! survive a restart. Status changes go through `update_status`, which
//! enforces the transition table inside a transaction; an illegal request
//! leaves the row untouched.
//!
//! `item_id` intentionally carries no foreign key: a job whose item is
//! deleted mid-flight still reaches its terminal state and the row is
//! retained as history.

use crate::{Job, JobError, JobId, JobStatus, Result};
use async_trait::async_trait;
use core_catalog::{ItemId, Page, PageRequest};
use sqlx::{FromRow, Sqlite, SqlitePool, Transaction};

// ============================================================================
// Repository Trait
// ============================================================================

/// Repository trait for job persistence
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert a new job row.
    async fn insert(&self, job: &Job) -> Result<()>;

    /// Find a job by ID.
    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>>;

    /// List jobs with a given status, newest first, paginated.
    async fn list_by_status(&self, status: JobStatus, request: PageRequest) -> Result<Page<Job>>;

    /// List all jobs for an item, newest first.
    async fn list_by_item(&self, item_id: &ItemId) -> Result<Vec<Job>>;

    /// Count jobs with a given status.
    async fn count_by_status(&self, status: JobStatus) -> Result<u64>;

    /// Apply a status transition, stamping timestamps on the way.
    ///
    /// Sets `started_at` on entry to `Running` and `completed_at` on entry
    /// to a terminal state. The error text is stored when provided.
    ///
    /// # Errors
    ///
    /// `JobError::InvalidTransition` if the transition table forbids the
    /// change; the row is left unchanged.
    async fn update_status(
        &self,
        id: &JobId,
        status: JobStatus,
        error: Option<&str>,
    ) -> Result<Job>;

    /// Reset a failed job to pending, clearing error and timestamps.
    ///
    /// # Errors
    ///
    /// `JobError::InvalidTransition` unless the job is `Failed`.
    async fn retry(&self, id: &JobId) -> Result<Job>;

    /// Delete a job that is still pending (cancellation).
    ///
    /// # Errors
    ///
    /// `JobError::InvalidTransition` once a worker has claimed the job;
    /// cancellation is only accepted pre-dispatch.
    async fn delete_pending(&self, id: &JobId) -> Result<()>;

    /// Atomically claim the oldest pending job for execution.
    ///
    /// The claimed job is moved to `Running` with `started_at` stamped
    /// before it is returned. `None` when the queue is empty.
    async fn claim_next_pending(&self) -> Result<Option<Job>>;
}

// ============================================================================
// SQLite Implementation
// ============================================================================

/// SQLite implementation of `JobRepository`
pub struct SqliteJobRepository {
    pool: SqlitePool,
}

impl SqliteJobRepository {
    /// Create a new SQLite job repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the jobs table and its indexes if they don't exist.
    pub async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY NOT NULL,
                item_id TEXT NOT NULL,
                language TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                error TEXT,
                created_at INTEGER NOT NULL,
                started_at INTEGER,
                completed_at INTEGER,
                CONSTRAINT jobs_status_check CHECK (
                    status IN ('pending', 'running', 'completed', 'failed')
                )
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| JobError::Database(e.to_string()))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_item ON jobs(item_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| JobError::Database(e.to_string()))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status, created_at)")
            .execute(&self.pool)
            .await
            .map_err(|e| JobError::Database(e.to_string()))?;

        Ok(())
    }

    async fn fetch_in_tx(tx: &mut Transaction<'_, Sqlite>, id: &JobId) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM jobs WHERE id = ?"
        ))
        .bind(id.as_str())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| JobError::Database(e.to_string()))?;

        row.map(Job::try_from).transpose()
    }
}

/// Database row representation of a job
#[derive(Debug, FromRow)]
struct JobRow {
    id: String,
    item_id: String,
    language: String,
    status: String,
    error: Option<String>,
    created_at: i64,
    started_at: Option<i64>,
    completed_at: Option<i64>,
}

impl TryFrom<JobRow> for Job {
    type Error = JobError;

    fn try_from(row: JobRow) -> Result<Self> {
        Ok(Job {
            id: JobId::from_string(&row.id)?,
            item_id: ItemId::new(row.item_id),
            language: row.language,
            status: row.status.parse()?,
            error: row.error,
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}

const SELECT_COLUMNS: &str =
    "id, item_id, language, status, error, created_at, started_at, completed_at";

#[async_trait]
impl JobRepository for SqliteJobRepository {
    async fn insert(&self, job: &Job) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, item_id, language, status, error,
                created_at, started_at, completed_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(job.id.as_str())
        .bind(job.item_id.as_str())
        .bind(&job.language)
        .bind(job.status.as_str())
        .bind(&job.error)
        .bind(job.created_at)
        .bind(job.started_at)
        .bind(job.completed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| JobError::Database(e.to_string()))?;

        Ok(())
    }

    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM jobs WHERE id = ?"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| JobError::Database(e.to_string()))?;

        row.map(Job::try_from).transpose()
    }

    async fn list_by_status(&self, status: JobStatus, request: PageRequest) -> Result<Page<Job>> {
        let total = self.count_by_status(status).await?;

        let rows = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM jobs WHERE status = ? \
             ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        ))
        .bind(status.as_str())
        .bind(request.limit() as i64)
        .bind(request.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| JobError::Database(e.to_string()))?;

        let jobs = rows
            .into_iter()
            .map(Job::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(Page::new(jobs, total, request))
    }

    async fn list_by_item(&self, item_id: &ItemId) -> Result<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM jobs WHERE item_id = ? ORDER BY created_at DESC, id DESC"
        ))
        .bind(item_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| JobError::Database(e.to_string()))?;

        rows.into_iter().map(Job::try_from).collect()
    }

    async fn count_by_status(&self, status: JobStatus) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| JobError::Database(e.to_string()))?;

        Ok(count as u64)
    }

    async fn update_status(
        &self,
        id: &JobId,
        status: JobStatus,
        error: Option<&str>,
    ) -> Result<Job> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| JobError::Database(e.to_string()))?;

        let job = Self::fetch_in_tx(&mut tx, id)
            .await?
            .ok_or_else(|| JobError::NotFound {
                job_id: id.to_string(),
            })?;

        if !job.status.can_transition(status) {
            return Err(JobError::InvalidTransition {
                from: job.status.to_string(),
                to: status.to_string(),
            });
        }

        let now = chrono::Utc::now().timestamp();
        let started_at = if status == JobStatus::Running {
            Some(now)
        } else {
            job.started_at
        };
        let completed_at = if status.is_terminal() {
            Some(now)
        } else {
            job.completed_at
        };
        let error = error.map(str::to_owned).or(job.error);

        sqlx::query(
            r#"
            UPDATE jobs SET status = ?, error = ?, started_at = ?, completed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(&error)
        .bind(started_at)
        .bind(completed_at)
        .bind(id.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| JobError::Database(e.to_string()))?;

        let updated = Self::fetch_in_tx(&mut tx, id)
            .await?
            .ok_or_else(|| JobError::NotFound {
                job_id: id.to_string(),
            })?;

        tx.commit()
            .await
            .map_err(|e| JobError::Database(e.to_string()))?;

        Ok(updated)
    }

    async fn retry(&self, id: &JobId) -> Result<Job> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| JobError::Database(e.to_string()))?;

        let job = Self::fetch_in_tx(&mut tx, id)
            .await?
            .ok_or_else(|| JobError::NotFound {
                job_id: id.to_string(),
            })?;

        if job.status != JobStatus::Failed {
            return Err(JobError::InvalidTransition {
                from: job.status.to_string(),
                to: JobStatus::Pending.to_string(),
            });
        }

        sqlx::query(
            r#"
            UPDATE jobs SET status = 'pending', error = NULL,
                            started_at = NULL, completed_at = NULL
            WHERE id = ?
            "#,
        )
        .bind(id.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| JobError::Database(e.to_string()))?;

        let updated = Self::fetch_in_tx(&mut tx, id)
            .await?
            .ok_or_else(|| JobError::NotFound {
                job_id: id.to_string(),
            })?;

        tx.commit()
            .await
            .map_err(|e| JobError::Database(e.to_string()))?;

        Ok(updated)
    }

    async fn delete_pending(&self, id: &JobId) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| JobError::Database(e.to_string()))?;

        let job = Self::fetch_in_tx(&mut tx, id)
            .await?
            .ok_or_else(|| JobError::NotFound {
                job_id: id.to_string(),
            })?;

        if job.status != JobStatus::Pending {
            return Err(JobError::InvalidTransition {
                from: job.status.to_string(),
                to: "cancelled".to_string(),
            });
        }

        sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| JobError::Database(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| JobError::Database(e.to_string()))?;

        Ok(())
    }

    async fn claim_next_pending(&self) -> Result<Option<Job>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| JobError::Database(e.to_string()))?;

        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM jobs WHERE status = 'pending' \
             ORDER BY created_at ASC, id ASC LIMIT 1"
        ))
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| JobError::Database(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let job = Job::try_from(row)?;

        sqlx::query("UPDATE jobs SET status = 'running', started_at = ? WHERE id = ?")
            .bind(chrono::Utc::now().timestamp())
            .bind(job.id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| JobError::Database(e.to_string()))?;

        let claimed = Self::fetch_in_tx(&mut tx, &job.id)
            .await?
            .ok_or_else(|| JobError::NotFound {
                job_id: job.id.to_string(),
            })?;

        tx.commit()
            .await
            .map_err(|e| JobError::Database(e.to_string()))?;

        Ok(Some(claimed))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use core_catalog::db::{create_pool, DatabaseConfig};

    async fn create_test_repo() -> SqliteJobRepository {
        let pool = create_pool(DatabaseConfig::in_memory()).await.unwrap();
        let repo = SqliteJobRepository::new(pool);
        repo.initialize().await.unwrap();
        repo
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let repo = create_test_repo().await;

        let job = Job::new(ItemId::new("item-1"), "es");
        repo.insert(&job).await.unwrap();

        let found = repo.find_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(found, job);
    }

    #[tokio::test]
    async fn test_full_lifecycle_stamps_timestamps() {
        let repo = create_test_repo().await;

        let job = Job::new(ItemId::new("item-1"), "es");
        repo.insert(&job).await.unwrap();

        let running = repo
            .update_status(&job.id, JobStatus::Running, None)
            .await
            .unwrap();
        assert_eq!(running.status, JobStatus::Running);
        assert!(running.started_at.is_some());
        assert!(running.completed_at.is_none());

        let completed = repo
            .update_status(&job.id, JobStatus::Completed, None)
            .await
            .unwrap();
        assert_eq!(completed.status, JobStatus::Completed);
        assert!(completed.completed_at.is_some());
        assert_eq!(completed.started_at, running.started_at);
    }

    #[tokio::test]
    async fn test_illegal_transition_leaves_row_unchanged() {
        let repo = create_test_repo().await;

        let job = Job::new(ItemId::new("item-1"), "es");
        repo.insert(&job).await.unwrap();

        // pending → completed skips running.
        let result = repo
            .update_status(&job.id, JobStatus::Completed, None)
            .await;
        assert!(matches!(result, Err(JobError::InvalidTransition { .. })));

        let unchanged = repo.find_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(unchanged.status, JobStatus::Pending);
        assert!(unchanged.completed_at.is_none());
    }

    #[tokio::test]
    async fn test_no_transition_out_of_completed() {
        let repo = create_test_repo().await;

        let job = Job::new(ItemId::new("item-1"), "es");
        repo.insert(&job).await.unwrap();
        repo.update_status(&job.id, JobStatus::Running, None)
            .await
            .unwrap();
        repo.update_status(&job.id, JobStatus::Completed, None)
            .await
            .unwrap();

        for status in [JobStatus::Pending, JobStatus::Running, JobStatus::Failed] {
            let result = repo.update_status(&job.id, status, None).await;
            assert!(matches!(result, Err(JobError::InvalidTransition { .. })));
        }
    }

    #[tokio::test]
    async fn test_failure_captures_error_text() {
        let repo = create_test_repo().await;

        let job = Job::new(ItemId::new("item-1"), "es");
        repo.insert(&job).await.unwrap();
        repo.update_status(&job.id, JobStatus::Running, None)
            .await
            .unwrap();

        let failed = repo
            .update_status(&job.id, JobStatus::Failed, Some("model crashed"))
            .await
            .unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("model crashed"));
    }

    #[tokio::test]
    async fn test_retry_resets_failed_job() {
        let repo = create_test_repo().await;

        let job = Job::new(ItemId::new("item-1"), "es");
        repo.insert(&job).await.unwrap();
        repo.update_status(&job.id, JobStatus::Running, None)
            .await
            .unwrap();
        repo.update_status(&job.id, JobStatus::Failed, Some("boom"))
            .await
            .unwrap();

        let reset = repo.retry(&job.id).await.unwrap();
        assert_eq!(reset.status, JobStatus::Pending);
        assert!(reset.error.is_none());
        assert!(reset.started_at.is_none());
        assert!(reset.completed_at.is_none());
        assert_eq!(reset.created_at, job.created_at);
    }

    #[tokio::test]
    async fn test_retry_only_from_failed() {
        let repo = create_test_repo().await;

        let job = Job::new(ItemId::new("item-1"), "es");
        repo.insert(&job).await.unwrap();

        let result = repo.retry(&job.id).await;
        assert!(matches!(result, Err(JobError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn test_cancel_only_while_pending() {
        let repo = create_test_repo().await;

        let job = Job::new(ItemId::new("item-1"), "es");
        repo.insert(&job).await.unwrap();
        repo.update_status(&job.id, JobStatus::Running, None)
            .await
            .unwrap();

        let result = repo.delete_pending(&job.id).await;
        assert!(matches!(result, Err(JobError::InvalidTransition { .. })));
        assert!(repo.find_by_id(&job.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_cancel_pending_deletes_row() {
        let repo = create_test_repo().await;

        let job = Job::new(ItemId::new("item-1"), "es");
        repo.insert(&job).await.unwrap();

        repo.delete_pending(&job.id).await.unwrap();
        assert!(repo.find_by_id(&job.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_job_is_not_found() {
        let repo = create_test_repo().await;
        let id = JobId::new();

        assert!(repo.find_by_id(&id).await.unwrap().is_none());
        assert!(matches!(
            repo.update_status(&id, JobStatus::Running, None).await,
            Err(JobError::NotFound { .. })
        ));
        assert!(matches!(
            repo.retry(&id).await,
            Err(JobError::NotFound { .. })
        ));
        assert!(matches!(
            repo.delete_pending(&id).await,
            Err(JobError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_by_status_newest_first() {
        let repo = create_test_repo().await;

        for i in 0..3i64 {
            let mut job = Job::new(ItemId::new(format!("item-{i}")), "es");
            // Distinct creation times without sleeping.
            job.created_at += i;
            repo.insert(&job).await.unwrap();
        }

        let page = repo
            .list_by_status(JobStatus::Pending, PageRequest::new(0, 2))
            .await
            .unwrap();

        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total, 3);
        assert!(page.items[0].created_at >= page.items[1].created_at);
        assert_eq!(page.items[0].item_id.as_str(), "item-2");
    }

    #[tokio::test]
    async fn test_list_by_item_and_count() {
        let repo = create_test_repo().await;

        let job_a = Job::new(ItemId::new("item-a"), "es");
        let job_b = Job::new(ItemId::new("item-a"), "fr");
        let job_c = Job::new(ItemId::new("item-b"), "es");
        for job in [&job_a, &job_b, &job_c] {
            repo.insert(job).await.unwrap();
        }

        assert_eq!(repo.list_by_item(&ItemId::new("item-a")).await.unwrap().len(), 2);
        assert_eq!(repo.count_by_status(JobStatus::Pending).await.unwrap(), 3);
        assert_eq!(repo.count_by_status(JobStatus::Running).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_claim_next_pending_oldest_first() {
        let repo = create_test_repo().await;

        let mut first = Job::new(ItemId::new("item-1"), "es");
        first.created_at -= 10;
        let second = Job::new(ItemId::new("item-2"), "es");
        repo.insert(&second).await.unwrap();
        repo.insert(&first).await.unwrap();

        let claimed = repo.claim_next_pending().await.unwrap().unwrap();
        assert_eq!(claimed.id, first.id);
        assert_eq!(claimed.status, JobStatus::Running);
        assert!(claimed.started_at.is_some());

        let claimed = repo.claim_next_pending().await.unwrap().unwrap();
        assert_eq!(claimed.id, second.id);

        assert!(repo.claim_next_pending().await.unwrap().is_none());
    }
}
