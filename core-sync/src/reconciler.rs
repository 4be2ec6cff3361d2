//! # Catalog Reconciler
//!
//! Orchestrates the idempotent merge of the remote catalog into the local
//! store.
//!
//! ## Workflow
//!
//! 1. `sync_libraries` upserts the remote collection list; unsupported
//!    collection kinds are skipped before any write
//! 2. `sync_library_items` paginates one library's items, upserting each
//!    page in a single transaction and scanning each media path for
//!    already-present subtitle files
//! 3. series libraries additionally walk every series and upsert its
//!    episodes with the inherited library id and series linkage
//! 4. `sync_all` composes the two and publishes `sync.completed`
//!
//! Only one reconciliation runs at a time: a concurrent `sync_all` call is
//! rejected immediately with `SyncError::SyncInProgress`. A network failure
//! mid-pagination aborts that library's sync; pages committed before the
//! failure remain valid and are simply refreshed on the next run.

use crate::client::{CollectionKind, MediaServerClient, RemoteItem, RemoteItemKind};
use crate::{Result, SyncError};
use core_catalog::{
    ItemKind, ItemRepository, ItemUpsert, Library, LibraryId, LibraryRepository, LibraryUpsert,
    NewSubtitle, SubtitleRepository, SubtitleSource,
};
use core_runtime::events::{EventBus, EventType};
use serde::Serialize;
use serde_json::json;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Reconciler configuration
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Remote items fetched per pagination request.
    pub page_size: u64,

    /// Target languages assigned to newly discovered libraries.
    pub default_languages: Vec<String>,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            default_languages: vec!["en".to_string()],
        }
    }
}

/// Result of a full reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    /// Libraries touched.
    pub libraries: u64,
    /// Items upserted across all libraries.
    pub items: u64,
    /// Unix timestamp of completion.
    pub timestamp: i64,
}

/// Clears the in-progress flag when a run finishes, error paths included.
struct SyncGuard<'a>(&'a AtomicBool);

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Pulls the remote catalog and merges it into the catalog store.
pub struct CatalogReconciler {
    client: Arc<dyn MediaServerClient>,
    libraries: Arc<dyn LibraryRepository>,
    items: Arc<dyn ItemRepository>,
    subtitles: Arc<dyn SubtitleRepository>,
    event_bus: Arc<EventBus>,
    config: ReconcilerConfig,
    sync_in_progress: AtomicBool,
}

impl CatalogReconciler {
    pub fn new(
        config: ReconcilerConfig,
        client: Arc<dyn MediaServerClient>,
        libraries: Arc<dyn LibraryRepository>,
        items: Arc<dyn ItemRepository>,
        subtitles: Arc<dyn SubtitleRepository>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            client,
            libraries,
            items,
            subtitles,
            event_bus,
            config,
            sync_in_progress: AtomicBool::new(false),
        }
    }

    /// Upsert library rows from the remote collection list.
    ///
    /// Unsupported collection kinds are skipped silently. Returns the
    /// libraries that were synced.
    pub async fn sync_libraries(&self) -> Result<Vec<Library>> {
        info!("Syncing libraries from remote server");
        let collections = self.client.list_collections().await?;

        let mut synced = Vec::new();
        for collection in collections {
            let Some(kind) = CollectionKind::resolve(&collection.kind).library_kind() else {
                debug!(
                    name = %collection.name,
                    kind = %collection.kind,
                    "Skipping unsupported collection kind"
                );
                continue;
            };

            let library = self
                .libraries
                .upsert(&LibraryUpsert {
                    id: LibraryId::new(collection.id),
                    name: collection.name,
                    kind,
                    target_languages: self.config.default_languages.clone(),
                })
                .await?;

            debug!(library_id = %library.id, name = %library.name, "Synced library");
            synced.push(library);
        }

        info!(count = synced.len(), "Synced libraries");
        Ok(synced)
    }

    /// Paginate one library's remote items, upsert them and their scanned
    /// subtitles. Returns the number of items upserted.
    ///
    /// # Errors
    ///
    /// `SyncError::LibraryNotFound` for an unknown id;
    /// `SyncError::RemoteFetch` when the remote fails mid-pagination (pages
    /// committed before the failure stay in the store).
    pub async fn sync_library_items(&self, library_id: &LibraryId) -> Result<u64> {
        let library = self
            .libraries
            .find_by_id(library_id)
            .await?
            .ok_or_else(|| SyncError::LibraryNotFound {
                library_id: library_id.to_string(),
            })?;

        info!(library_id = %library.id, kind = %library.kind, "Syncing library items");

        let items_synced = match library.kind {
            core_catalog::LibraryKind::Movies => {
                self.sync_paged_items(&library, RemoteItemKind::Movie).await?
            }
            core_catalog::LibraryKind::Series => self.sync_series_library(&library).await?,
        };

        self.libraries
            .touch_last_synced(&library.id, chrono::Utc::now().timestamp())
            .await?;

        info!(library_id = %library.id, items = items_synced, "Library sync finished");
        Ok(items_synced)
    }

    /// Full reconciliation: libraries, then every library's items, then a
    /// `sync.completed` event carrying the counts.
    ///
    /// # Errors
    ///
    /// `SyncError::SyncInProgress` when another run is already active.
    pub async fn sync_all(&self) -> Result<SyncSummary> {
        if self
            .sync_in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SyncError::SyncInProgress);
        }
        let _guard = SyncGuard(&self.sync_in_progress);

        info!("Starting full catalog reconciliation");
        let libraries = self.sync_libraries().await?;

        let mut total_items = 0;
        for library in &libraries {
            total_items += self.sync_library_items(&library.id).await?;
        }

        let summary = SyncSummary {
            libraries: libraries.len() as u64,
            items: total_items,
            timestamp: chrono::Utc::now().timestamp(),
        };

        let library_summaries: Vec<_> = libraries
            .iter()
            .map(|library| {
                json!({
                    "id": library.id.as_str(),
                    "name": library.name,
                    "kind": library.kind.as_str(),
                })
            })
            .collect();

        self.event_bus.publish(
            EventType::SyncCompleted,
            json!({
                "libraries": library_summaries,
                "total_items": summary.items,
                "timestamp": summary.timestamp,
            }),
        );

        info!(
            libraries = summary.libraries,
            items = summary.items,
            "Full reconciliation completed"
        );
        Ok(summary)
    }

    /// Page through one item kind in a library, upserting page by page.
    async fn sync_paged_items(&self, library: &Library, kind: RemoteItemKind) -> Result<u64> {
        let mut total_synced = 0;
        let mut start_index = 0u64;

        loop {
            let page = self
                .client
                .list_items(library.id.as_str(), kind, start_index, self.config.page_size)
                .await?;

            if page.items.is_empty() {
                break;
            }
            let fetched = page.items.len() as u64;

            total_synced += self.ingest_page(library, &page.items, None).await?;

            start_index += fetched;
            if start_index >= page.total {
                break;
            }
        }

        Ok(total_synced)
    }

    /// Sync a series library: the series rows themselves, then every
    /// series' episodes.
    async fn sync_series_library(&self, library: &Library) -> Result<u64> {
        let mut total_synced = 0;
        let mut start_index = 0u64;

        loop {
            let page = self
                .client
                .list_items(
                    library.id.as_str(),
                    RemoteItemKind::Series,
                    start_index,
                    self.config.page_size,
                )
                .await?;

            if page.items.is_empty() {
                break;
            }
            let fetched = page.items.len() as u64;

            total_synced += self.ingest_page(library, &page.items, None).await?;

            for series in &page.items {
                debug!(series = %series.name, "Syncing series episodes");
                let episodes = self.client.list_episodes(&series.id).await?;
                total_synced += self
                    .ingest_page(library, &episodes.items, Some(series))
                    .await?;
            }

            start_index += fetched;
            if start_index >= page.total {
                break;
            }
        }

        Ok(total_synced)
    }

    /// Upsert one page of remote items (a single transaction) and scan each
    /// ingested media path for external subtitles.
    ///
    /// `series` supplies the linkage for episode listings whose rows don't
    /// carry it themselves.
    async fn ingest_page(
        &self,
        library: &Library,
        remote_items: &[RemoteItem],
        series: Option<&RemoteItem>,
    ) -> Result<u64> {
        let mut upserts = Vec::new();

        for remote in remote_items {
            let kind = match remote.kind.as_str() {
                "Movie" => ItemKind::Movie,
                "Series" => ItemKind::Series,
                "Episode" => ItemKind::Episode,
                other => {
                    debug!(item = %remote.name, kind = %other, "Skipping unsupported item kind");
                    continue;
                }
            };

            let Some(path) = remote.path.as_deref().filter(|p| !p.is_empty()) else {
                debug!(item = %remote.name, "Skipping item without a path");
                continue;
            };

            let series_id = remote
                .series_id
                .clone()
                .or_else(|| series.map(|s| s.id.clone()));
            let series_name = remote
                .series_name
                .clone()
                .or_else(|| series.map(|s| s.name.clone()));

            upserts.push(ItemUpsert {
                id: core_catalog::ItemId::new(remote.id.clone()),
                library_id: library.id.clone(),
                kind,
                title: remote.name.clone(),
                path: path.to_string(),
                series_id: series_id.map(core_catalog::ItemId::new),
                series_name,
                season_num: remote.season_number,
                episode_num: remote.episode_number,
            });
        }

        if upserts.is_empty() {
            return Ok(0);
        }

        self.items.upsert_many(&upserts).await?;

        for upsert in &upserts {
            // Series rows point at folders; only real media files are scanned.
            if upsert.kind == ItemKind::Series {
                continue;
            }
            self.scan_and_record_subtitles(upsert).await?;
        }

        Ok(upserts.len() as u64)
    }

    /// Scan one item's media path and upsert whatever external subtitles are
    /// sitting next to it.
    async fn scan_and_record_subtitles(&self, item: &ItemUpsert) -> Result<()> {
        let discovered = core_scanner::scan_for_media(Path::new(&item.path));
        if discovered.is_empty() {
            return Ok(());
        }

        let subtitles: Vec<NewSubtitle> = discovered
            .into_iter()
            .map(|found| NewSubtitle {
                item_id: item.id.clone(),
                language: found.language,
                source: SubtitleSource::External,
                path: found.path.display().to_string(),
            })
            .collect();

        debug!(
            item_id = %item.id,
            count = subtitles.len(),
            "Recording scanned subtitles"
        );

        self.subtitles.upsert_many(&subtitles).await?;
        Ok(())
    }
}
