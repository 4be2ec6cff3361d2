//! Subtitle repository.
//!
//! One row per `(item_id, language)` pair. Rows are written from two sides:
//! the reconciler upserts scan results (source=external) and job completion
//! upserts generated output (source=generated); the later write wins.

use crate::error::{CatalogError, Result};
use crate::models::{ItemId, NewSubtitle, Subtitle, SubtitleId, SubtitleSource};
use async_trait::async_trait;
use sqlx::{FromRow, Sqlite, SqlitePool};

/// Repository trait for subtitle persistence
#[async_trait]
pub trait SubtitleRepository: Send + Sync {
    /// Insert or refresh a subtitle keyed by `(item_id, language)`.
    ///
    /// The first-discovery timestamp is preserved across upserts.
    async fn upsert(&self, subtitle: &NewSubtitle) -> Result<Subtitle>;

    /// Upsert a batch inside a single transaction.
    async fn upsert_many(&self, subtitles: &[NewSubtitle]) -> Result<u64>;

    /// Find the subtitle for an item in a given language.
    async fn find_by_item_and_language(
        &self,
        item_id: &ItemId,
        language: &str,
    ) -> Result<Option<Subtitle>>;

    /// List all subtitles for an item, ordered by language.
    async fn list_by_item(&self, item_id: &ItemId) -> Result<Vec<Subtitle>>;

    /// Delete a subtitle row.
    ///
    /// # Errors
    ///
    /// `CatalogError::NotFound` if the id is absent.
    async fn delete(&self, id: SubtitleId) -> Result<()>;
}

/// SQLite implementation of `SubtitleRepository`
pub struct SqliteSubtitleRepository {
    pool: SqlitePool,
}

impl SqliteSubtitleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the subtitles table and its index if they don't exist.
    pub async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS subtitles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                item_id TEXT NOT NULL REFERENCES items(id) ON DELETE CASCADE,
                language TEXT NOT NULL,
                source TEXT NOT NULL,
                path TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                UNIQUE (item_id, language),
                CONSTRAINT subtitles_source_check CHECK (
                    source IN ('external', 'generated')
                )
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CatalogError::Database(e.to_string()))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_subtitles_item ON subtitles(item_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        Ok(())
    }

    fn upsert_query(
        subtitle: &NewSubtitle,
        now: i64,
    ) -> sqlx::query::Query<'_, Sqlite, sqlx::sqlite::SqliteArguments<'_>> {
        sqlx::query(
            r#"
            INSERT INTO subtitles (item_id, language, source, path, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(item_id, language) DO UPDATE SET
                source = excluded.source,
                path = excluded.path
            "#,
        )
        .bind(subtitle.item_id.as_str())
        .bind(&subtitle.language)
        .bind(subtitle.source.as_str())
        .bind(&subtitle.path)
        .bind(now)
    }
}

/// Database row representation of a subtitle
#[derive(Debug, FromRow)]
struct SubtitleRow {
    id: i64,
    item_id: String,
    language: String,
    source: String,
    path: String,
    created_at: i64,
}

impl TryFrom<SubtitleRow> for Subtitle {
    type Error = CatalogError;

    fn try_from(row: SubtitleRow) -> Result<Self> {
        Ok(Subtitle {
            id: SubtitleId(row.id),
            item_id: ItemId::new(row.item_id),
            language: row.language,
            source: row.source.parse()?,
            path: row.path,
            created_at: row.created_at,
        })
    }
}

const SELECT_COLUMNS: &str = "id, item_id, language, source, path, created_at";

#[async_trait]
impl SubtitleRepository for SqliteSubtitleRepository {
    async fn upsert(&self, subtitle: &NewSubtitle) -> Result<Subtitle> {
        let now = chrono::Utc::now().timestamp();
        Self::upsert_query(subtitle, now)
            .execute(&self.pool)
            .await
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        self.find_by_item_and_language(&subtitle.item_id, &subtitle.language)
            .await?
            .ok_or_else(|| CatalogError::not_found("Subtitle", subtitle.item_id.as_str()))
    }

    async fn upsert_many(&self, subtitles: &[NewSubtitle]) -> Result<u64> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        for subtitle in subtitles {
            Self::upsert_query(subtitle, now)
                .execute(&mut *tx)
                .await
                .map_err(|e| CatalogError::Database(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        Ok(subtitles.len() as u64)
    }

    async fn find_by_item_and_language(
        &self,
        item_id: &ItemId,
        language: &str,
    ) -> Result<Option<Subtitle>> {
        let row = sqlx::query_as::<_, SubtitleRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM subtitles WHERE item_id = ? AND language = ?"
        ))
        .bind(item_id.as_str())
        .bind(language)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CatalogError::Database(e.to_string()))?;

        row.map(Subtitle::try_from).transpose()
    }

    async fn list_by_item(&self, item_id: &ItemId) -> Result<Vec<Subtitle>> {
        let rows = sqlx::query_as::<_, SubtitleRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM subtitles WHERE item_id = ? ORDER BY language ASC"
        ))
        .bind(item_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CatalogError::Database(e.to_string()))?;

        rows.into_iter().map(Subtitle::try_from).collect()
    }

    async fn delete(&self, id: SubtitleId) -> Result<()> {
        let result = sqlx::query("DELETE FROM subtitles WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::not_found("Subtitle", id.to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
