//! Media item repository.
//!
//! Items are remote-keyed and cascade-deleted with their library. Listing is
//! paginated with a stable ordering (title, then season/episode, then id) so
//! repeated queries over unchanged data return identical pages.

use crate::error::{CatalogError, Result};
use crate::models::{Item, ItemId, ItemUpsert, LibraryId};
use crate::repositories::pagination::{Page, PageRequest};
use async_trait::async_trait;
use sqlx::{FromRow, Sqlite, SqlitePool};

/// Repository trait for media item persistence
#[async_trait]
pub trait ItemRepository: Send + Sync {
    /// Insert or refresh an item keyed by its remote id.
    async fn upsert(&self, item: &ItemUpsert) -> Result<Item>;

    /// Upsert a batch of items inside a single transaction.
    ///
    /// A failure anywhere rolls the whole batch back.
    async fn upsert_many(&self, items: &[ItemUpsert]) -> Result<u64>;

    /// Find an item by id.
    async fn find_by_id(&self, id: &ItemId) -> Result<Option<Item>>;

    /// List items in a library, paginated, ordered by title then
    /// season/episode.
    async fn list_by_library(
        &self,
        library_id: &LibraryId,
        request: PageRequest,
    ) -> Result<Page<Item>>;

    /// List all episodes linked to a series.
    async fn list_by_series(&self, series_id: &ItemId) -> Result<Vec<Item>>;

    /// Count items in a library.
    async fn count_by_library(&self, library_id: &LibraryId) -> Result<u64>;

    /// Delete an item; its subtitles cascade.
    ///
    /// # Errors
    ///
    /// `CatalogError::NotFound` if the id is absent.
    async fn delete(&self, id: &ItemId) -> Result<()>;
}

/// SQLite implementation of `ItemRepository`
pub struct SqliteItemRepository {
    pool: SqlitePool,
}

impl SqliteItemRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the items table and its indexes if they don't exist.
    pub async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS items (
                id TEXT PRIMARY KEY NOT NULL,
                library_id TEXT NOT NULL REFERENCES libraries(id) ON DELETE CASCADE,
                kind TEXT NOT NULL,
                title TEXT NOT NULL,
                path TEXT NOT NULL UNIQUE,
                series_id TEXT,
                series_name TEXT,
                season_num INTEGER,
                episode_num INTEGER,
                last_synced INTEGER NOT NULL,
                CONSTRAINT items_kind_check CHECK (
                    kind IN ('movie', 'series', 'episode')
                )
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CatalogError::Database(e.to_string()))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_items_library ON items(library_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_items_series ON items(series_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        Ok(())
    }

    fn upsert_query(item: &ItemUpsert, now: i64) -> sqlx::query::Query<'_, Sqlite, sqlx::sqlite::SqliteArguments<'_>> {
        sqlx::query(
            r#"
            INSERT INTO items (
                id, library_id, kind, title, path,
                series_id, series_name, season_num, episode_num, last_synced
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                library_id = excluded.library_id,
                kind = excluded.kind,
                title = excluded.title,
                path = excluded.path,
                series_id = excluded.series_id,
                series_name = excluded.series_name,
                season_num = excluded.season_num,
                episode_num = excluded.episode_num,
                last_synced = excluded.last_synced
            "#,
        )
        .bind(item.id.as_str())
        .bind(item.library_id.as_str())
        .bind(item.kind.as_str())
        .bind(&item.title)
        .bind(&item.path)
        .bind(item.series_id.as_ref().map(ItemId::as_str))
        .bind(&item.series_name)
        .bind(item.season_num)
        .bind(item.episode_num)
        .bind(now)
    }
}

/// Database row representation of an item
#[derive(Debug, FromRow)]
struct ItemRow {
    id: String,
    library_id: String,
    kind: String,
    title: String,
    path: String,
    series_id: Option<String>,
    series_name: Option<String>,
    season_num: Option<i64>,
    episode_num: Option<i64>,
    last_synced: i64,
}

impl TryFrom<ItemRow> for Item {
    type Error = CatalogError;

    fn try_from(row: ItemRow) -> Result<Self> {
        Ok(Item {
            id: ItemId::new(row.id),
            library_id: LibraryId::new(row.library_id),
            kind: row.kind.parse()?,
            title: row.title,
            path: row.path,
            series_id: row.series_id.map(ItemId::new),
            series_name: row.series_name,
            season_num: row.season_num,
            episode_num: row.episode_num,
            last_synced: row.last_synced,
        })
    }
}

const SELECT_COLUMNS: &str = "id, library_id, kind, title, path, \
     series_id, series_name, season_num, episode_num, last_synced";

const STABLE_ORDER: &str = "title ASC, season_num ASC, episode_num ASC, id ASC";

#[async_trait]
impl ItemRepository for SqliteItemRepository {
    async fn upsert(&self, item: &ItemUpsert) -> Result<Item> {
        let now = chrono::Utc::now().timestamp();
        Self::upsert_query(item, now)
            .execute(&self.pool)
            .await
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        self.find_by_id(&item.id)
            .await?
            .ok_or_else(|| CatalogError::not_found("Item", item.id.as_str()))
    }

    async fn upsert_many(&self, items: &[ItemUpsert]) -> Result<u64> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        for item in items {
            Self::upsert_query(item, now)
                .execute(&mut *tx)
                .await
                .map_err(|e| CatalogError::Database(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        Ok(items.len() as u64)
    }

    async fn find_by_id(&self, id: &ItemId) -> Result<Option<Item>> {
        let row = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM items WHERE id = ?"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CatalogError::Database(e.to_string()))?;

        row.map(Item::try_from).transpose()
    }

    async fn list_by_library(
        &self,
        library_id: &LibraryId,
        request: PageRequest,
    ) -> Result<Page<Item>> {
        let total = self.count_by_library(library_id).await?;

        let rows = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM items WHERE library_id = ? \
             ORDER BY {STABLE_ORDER} LIMIT ? OFFSET ?"
        ))
        .bind(library_id.as_str())
        .bind(request.limit() as i64)
        .bind(request.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CatalogError::Database(e.to_string()))?;

        let items = rows
            .into_iter()
            .map(Item::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(Page::new(items, total, request))
    }

    async fn list_by_series(&self, series_id: &ItemId) -> Result<Vec<Item>> {
        let rows = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM items WHERE series_id = ? ORDER BY {STABLE_ORDER}"
        ))
        .bind(series_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CatalogError::Database(e.to_string()))?;

        rows.into_iter().map(Item::try_from).collect()
    }

    async fn count_by_library(&self, library_id: &LibraryId) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items WHERE library_id = ?")
            .bind(library_id.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        Ok(count as u64)
    }

    async fn delete(&self, id: &ItemId) -> Result<()> {
        let result = sqlx::query("DELETE FROM items WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::not_found("Item", id.as_str()));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
