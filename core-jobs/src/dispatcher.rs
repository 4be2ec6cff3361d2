//! # Job Dispatcher / Worker Pool
//!
//! Consumes pending jobs from the ledger and executes the externally supplied
//! long-running operation on a bounded pool of workers.
//!
//! ## Overview
//!
//! Workers coordinate through the persisted job state, not in-memory queues:
//! each worker claims the oldest pending row (moving it to `Running` inside a
//! transaction) before executing. At most `max_workers` jobs run at once;
//! excess pending jobs simply wait for the next free permit.
//!
//! Per job the wrapper publishes `job.started`, runs the operation, then
//! records the outcome: `Completed` plus an upserted generated subtitle and
//! `job.completed`, or `Failed` with the captured error text and
//! `job.failed`. A failing operation never tears down the dispatcher or
//! other workers, and nothing here retries automatically: retry is always an
//! explicit external action through the ledger.

use crate::repository::JobRepository;
use crate::{Job, JobError, JobStatus, Result};
use async_trait::async_trait;
use core_catalog::{ItemId, NewSubtitle, SubtitleRepository, SubtitleSource};
use core_runtime::events::{EventBus, EventType};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

/// The external long-running operation executed per job.
///
/// Opaque to the dispatcher: transcription, translation and synchronization
/// engines all plug in here. Success returns the path of the generated
/// subtitle file; failure is an error whose rendered message is recorded on
/// the job.
#[async_trait]
pub trait JobOperation: Send + Sync {
    async fn execute(&self, item_id: &ItemId, language: &str) -> anyhow::Result<PathBuf>;
}

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Upper bound on concurrently running jobs.
    pub max_workers: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self { max_workers: 4 }
    }
}

/// Outcome counts of one dispatch pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub completed: u64,
    pub failed: u64,
}

/// Bounded worker pool draining the job ledger.
pub struct JobDispatcher {
    repository: Arc<dyn JobRepository>,
    subtitles: Arc<dyn SubtitleRepository>,
    event_bus: Arc<EventBus>,
    operation: Arc<dyn JobOperation>,
    semaphore: Arc<Semaphore>,
}

impl JobDispatcher {
    pub fn new(
        config: DispatcherConfig,
        repository: Arc<dyn JobRepository>,
        subtitles: Arc<dyn SubtitleRepository>,
        event_bus: Arc<EventBus>,
        operation: Arc<dyn JobOperation>,
    ) -> Self {
        Self {
            repository,
            subtitles,
            event_bus,
            operation,
            semaphore: Arc::new(Semaphore::new(config.max_workers)),
        }
    }

    /// Drain the pending queue, executing every claimable job.
    ///
    /// Returns once all jobs claimed by this pass have reached a terminal
    /// state. Jobs appended while the pass is still claiming are picked up
    /// too; anything later waits for the next pass.
    pub async fn run_pending(&self) -> Result<DispatchStats> {
        let mut handles = Vec::new();

        loop {
            let permit = self
                .semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| JobError::Dispatch("Worker semaphore closed".to_string()))?;

            match self.repository.claim_next_pending().await? {
                Some(job) => {
                    let repository = Arc::clone(&self.repository);
                    let subtitles = Arc::clone(&self.subtitles);
                    let event_bus = Arc::clone(&self.event_bus);
                    let operation = Arc::clone(&self.operation);

                    handles.push(tokio::spawn(async move {
                        let succeeded =
                            Self::run_job(repository, subtitles, event_bus, operation, job).await;
                        drop(permit);
                        succeeded
                    }));
                }
                None => {
                    drop(permit);
                    break;
                }
            }
        }

        let mut stats = DispatchStats::default();
        for handle in handles {
            match handle.await {
                Ok(true) => stats.completed += 1,
                Ok(false) => stats.failed += 1,
                Err(join_error) => {
                    // A panicking worker loses its job outcome but must not
                    // take the dispatcher down with it.
                    error!(%join_error, "Job worker panicked");
                    stats.failed += 1;
                }
            }
        }

        info!(
            completed = stats.completed,
            failed = stats.failed,
            "Dispatch pass finished"
        );
        Ok(stats)
    }

    /// Execute one already-claimed job to its terminal state.
    async fn run_job(
        repository: Arc<dyn JobRepository>,
        subtitles: Arc<dyn SubtitleRepository>,
        event_bus: Arc<EventBus>,
        operation: Arc<dyn JobOperation>,
        job: Job,
    ) -> bool {
        info!(job_id = %job.id, item_id = %job.item_id, language = %job.language, "Job started");
        event_bus.publish(
            EventType::JobStarted,
            json!({
                "job_id": job.id.as_str(),
                "item_id": job.item_id.as_str(),
                "language": job.language,
            }),
        );

        match operation.execute(&job.item_id, &job.language).await {
            Ok(output_path) => {
                if let Err(error) = repository
                    .update_status(&job.id, JobStatus::Completed, None)
                    .await
                {
                    error!(job_id = %job.id, %error, "Failed to record job completion");
                    return false;
                }

                // The item may have been deleted while the job ran; the job
                // still completes and the orphaned output is only logged.
                let subtitle = NewSubtitle {
                    item_id: job.item_id.clone(),
                    language: job.language.clone(),
                    source: SubtitleSource::Generated,
                    path: output_path.display().to_string(),
                };
                if let Err(error) = subtitles.upsert(&subtitle).await {
                    warn!(
                        job_id = %job.id,
                        item_id = %job.item_id,
                        %error,
                        "Could not record generated subtitle"
                    );
                }

                info!(job_id = %job.id, output = %output_path.display(), "Job completed");
                event_bus.publish(
                    EventType::JobCompleted,
                    json!({
                        "job_id": job.id.as_str(),
                        "item_id": job.item_id.as_str(),
                        "language": job.language,
                        "subtitle_path": output_path.display().to_string(),
                    }),
                );
                true
            }
            Err(operation_error) => {
                let message = format!("{operation_error:#}");
                if let Err(error) = repository
                    .update_status(&job.id, JobStatus::Failed, Some(&message))
                    .await
                {
                    error!(job_id = %job.id, %error, "Failed to record job failure");
                }

                warn!(job_id = %job.id, error = %message, "Job failed");
                event_bus.publish(
                    EventType::JobFailed,
                    json!({
                        "job_id": job.id.as_str(),
                        "item_id": job.item_id.as_str(),
                        "language": job.language,
                        "error": message,
                    }),
                );
                false
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::JobLedger;
    use crate::repository::SqliteJobRepository;
    use core_catalog::db::{create_pool, initialize_catalog, DatabaseConfig};
    use core_catalog::{
        ItemKind, ItemRepository, ItemUpsert, LibraryId, LibraryKind, LibraryRepository,
        LibraryUpsert, SqliteItemRepository, SqliteLibraryRepository, SqliteSubtitleRepository,
    };
    use sqlx::SqlitePool;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct SucceedingOperation;

    #[async_trait]
    impl JobOperation for SucceedingOperation {
        async fn execute(&self, item_id: &ItemId, language: &str) -> anyhow::Result<PathBuf> {
            Ok(PathBuf::from(format!("/subs/{item_id}.{language}.srt")))
        }
    }

    struct FailingOperation;

    #[async_trait]
    impl JobOperation for FailingOperation {
        async fn execute(&self, _item_id: &ItemId, _language: &str) -> anyhow::Result<PathBuf> {
            anyhow::bail!("whisper model exploded")
        }
    }

    /// Tracks the highest number of simultaneously running executions.
    struct ConcurrencyProbe {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    impl ConcurrencyProbe {
        fn new() -> Self {
            Self {
                current: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl JobOperation for ConcurrencyProbe {
        async fn execute(&self, item_id: &ItemId, language: &str) -> anyhow::Result<PathBuf> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(PathBuf::from(format!("/subs/{item_id}.{language}.srt")))
        }
    }

    async fn create_test_pool() -> SqlitePool {
        let pool = create_pool(DatabaseConfig::in_memory()).await.unwrap();
        initialize_catalog(&pool).await.unwrap();

        SqliteLibraryRepository::new(pool.clone())
            .upsert(&LibraryUpsert {
                id: LibraryId::new("lib-1"),
                name: "Movies".to_string(),
                kind: LibraryKind::Movies,
                target_languages: vec!["es".to_string()],
            })
            .await
            .unwrap();

        SqliteItemRepository::new(pool.clone())
            .upsert(&ItemUpsert {
                id: ItemId::new("m-1"),
                library_id: LibraryId::new("lib-1"),
                kind: ItemKind::Movie,
                title: "Arrival".to_string(),
                path: "/m/arrival.mkv".to_string(),
                series_id: None,
                series_name: None,
                season_num: None,
                episode_num: None,
            })
            .await
            .unwrap();

        pool
    }

    struct Fixture {
        ledger: JobLedger,
        repository: Arc<SqliteJobRepository>,
        subtitles: Arc<SqliteSubtitleRepository>,
        event_bus: Arc<EventBus>,
    }

    async fn create_fixture(pool: &SqlitePool) -> Fixture {
        let repository = Arc::new(SqliteJobRepository::new(pool.clone()));
        repository.initialize().await.unwrap();

        let subtitles = Arc::new(SqliteSubtitleRepository::new(pool.clone()));
        let event_bus = Arc::new(EventBus::new());

        Fixture {
            ledger: JobLedger::new(repository.clone(), Arc::clone(&event_bus)),
            repository,
            subtitles,
            event_bus,
        }
    }

    fn dispatcher(fixture: &Fixture, max_workers: usize, operation: Arc<dyn JobOperation>) -> JobDispatcher {
        JobDispatcher::new(
            DispatcherConfig { max_workers },
            fixture.repository.clone(),
            fixture.subtitles.clone(),
            Arc::clone(&fixture.event_bus),
            operation,
        )
    }

    #[tokio::test]
    async fn test_successful_job_end_to_end() {
        let pool = create_test_pool().await;
        let fixture = create_fixture(&pool).await;

        let events = Arc::new(Mutex::new(Vec::new()));
        for event_type in [EventType::JobStarted, EventType::JobCompleted] {
            let events = Arc::clone(&events);
            fixture.event_bus.subscribe(event_type, move |event| {
                events.lock().unwrap().push(event.event_type);
                Ok(())
            });
        }

        let job = fixture
            .ledger
            .create(ItemId::new("m-1"), "es")
            .await
            .unwrap();

        let stats = dispatcher(&fixture, 2, Arc::new(SucceedingOperation))
            .run_pending()
            .await
            .unwrap();
        assert_eq!(stats, DispatchStats { completed: 1, failed: 0 });

        let done = fixture.ledger.get(&job.id).await.unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert!(done.started_at.is_some());
        assert!(done.completed_at.is_some());

        // job.started strictly before job.completed.
        assert_eq!(
            *events.lock().unwrap(),
            vec![EventType::JobStarted, EventType::JobCompleted]
        );

        // The generated subtitle landed in the catalog.
        let subtitle = fixture
            .subtitles
            .find_by_item_and_language(&ItemId::new("m-1"), "es")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(subtitle.source, SubtitleSource::Generated);
        assert_eq!(subtitle.path, "/subs/m-1.es.srt");
    }

    #[tokio::test]
    async fn test_failed_job_records_error_and_event() {
        let pool = create_test_pool().await;
        let fixture = create_fixture(&pool).await;

        let failures = Arc::new(Mutex::new(Vec::new()));
        let failures_clone = Arc::clone(&failures);
        fixture
            .event_bus
            .subscribe(EventType::JobFailed, move |event| {
                failures_clone
                    .lock()
                    .unwrap()
                    .push(event.payload["error"].as_str().unwrap().to_string());
                Ok(())
            });

        let job = fixture
            .ledger
            .create(ItemId::new("m-1"), "es")
            .await
            .unwrap();

        let stats = dispatcher(&fixture, 2, Arc::new(FailingOperation))
            .run_pending()
            .await
            .unwrap();
        assert_eq!(stats, DispatchStats { completed: 0, failed: 1 });

        let failed = fixture.ledger.get(&job.id).await.unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert!(failed.error.as_deref().unwrap().contains("whisper model exploded"));
        assert_eq!(failures.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_then_retry_then_success() {
        let pool = create_test_pool().await;
        let fixture = create_fixture(&pool).await;

        let job = fixture
            .ledger
            .create(ItemId::new("m-1"), "es")
            .await
            .unwrap();

        dispatcher(&fixture, 1, Arc::new(FailingOperation))
            .run_pending()
            .await
            .unwrap();
        assert_eq!(
            fixture.ledger.get(&job.id).await.unwrap().status,
            JobStatus::Failed
        );

        // No automatic retry: a second pass finds nothing pending.
        let stats = dispatcher(&fixture, 1, Arc::new(FailingOperation))
            .run_pending()
            .await
            .unwrap();
        assert_eq!(stats, DispatchStats::default());

        fixture.ledger.retry(&job.id).await.unwrap();

        dispatcher(&fixture, 1, Arc::new(SucceedingOperation))
            .run_pending()
            .await
            .unwrap();
        let done = fixture.ledger.get(&job.id).await.unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert!(done.error.is_none());
    }

    #[tokio::test]
    async fn test_one_failing_job_does_not_stop_others() {
        let pool = create_test_pool().await;
        let fixture = create_fixture(&pool).await;

        struct FailOnFrench;

        #[async_trait]
        impl JobOperation for FailOnFrench {
            async fn execute(&self, item_id: &ItemId, language: &str) -> anyhow::Result<PathBuf> {
                if language == "fr" {
                    anyhow::bail!("no french model");
                }
                Ok(PathBuf::from(format!("/subs/{item_id}.{language}.srt")))
            }
        }

        for language in ["es", "fr", "de"] {
            fixture
                .ledger
                .create(ItemId::new("m-1"), language)
                .await
                .unwrap();
        }

        let stats = dispatcher(&fixture, 2, Arc::new(FailOnFrench))
            .run_pending()
            .await
            .unwrap();
        assert_eq!(stats, DispatchStats { completed: 2, failed: 1 });

        assert_eq!(
            fixture
                .repository
                .count_by_status(JobStatus::Completed)
                .await
                .unwrap(),
            2
        );
        assert_eq!(
            fixture
                .repository
                .count_by_status(JobStatus::Failed)
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_worker_pool_is_bounded() {
        let pool = create_test_pool().await;
        let fixture = create_fixture(&pool).await;

        for i in 0..5 {
            fixture
                .ledger
                .create(ItemId::new("m-1"), format!("l{i}"))
                .await
                .unwrap();
        }

        let probe = Arc::new(ConcurrencyProbe::new());
        let stats = dispatcher(&fixture, 2, probe.clone())
            .run_pending()
            .await
            .unwrap();

        assert_eq!(stats.completed, 5);
        assert!(probe.peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(
            fixture
                .repository
                .count_by_status(JobStatus::Pending)
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_claimed_job_rejects_cancellation() {
        let pool = create_test_pool().await;
        let fixture = create_fixture(&pool).await;

        let job = fixture
            .ledger
            .create(ItemId::new("m-1"), "es")
            .await
            .unwrap();

        // Simulate a worker having claimed the job.
        let claimed = fixture.repository.claim_next_pending().await.unwrap().unwrap();
        assert_eq!(claimed.id, job.id);

        let result = fixture.ledger.cancel(&job.id).await;
        assert!(matches!(result, Err(JobError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn test_vanished_item_still_reaches_terminal_state() {
        let pool = create_test_pool().await;
        let fixture = create_fixture(&pool).await;

        let job = fixture
            .ledger
            .create(ItemId::new("m-1"), "es")
            .await
            .unwrap();

        // Item disappears before the dispatcher runs.
        SqliteItemRepository::new(pool.clone())
            .delete(&ItemId::new("m-1"))
            .await
            .unwrap();

        let stats = dispatcher(&fixture, 1, Arc::new(SucceedingOperation))
            .run_pending()
            .await
            .unwrap();
        assert_eq!(stats.completed, 1);

        // The dangling job row is retained as history; the subtitle upsert
        // was rejected by the catalog and only logged.
        let done = fixture.ledger.get(&job.id).await.unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert!(fixture
            .subtitles
            .find_by_item_and_language(&ItemId::new("m-1"), "es")
            .await
            .unwrap()
            .is_none());
    }
}
