//! Library repository.
//!
//! Libraries are created and refreshed exclusively by the reconciler; the
//! operator-owned settings (target languages, skip-existing, enabled) are
//! updated through `update_settings` and survive reconciler upserts.

use crate::error::{CatalogError, Result};
use crate::models::{Library, LibraryId, LibrarySettings, LibraryUpsert};
use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};

/// Repository trait for library persistence
#[async_trait]
pub trait LibraryRepository: Send + Sync {
    /// Insert or refresh a library keyed by its remote id.
    ///
    /// A new row gets the payload's target languages and default settings;
    /// an existing row only has its name, kind and last-synced refreshed.
    async fn upsert(&self, library: &LibraryUpsert) -> Result<Library>;

    /// Find a library by id.
    async fn find_by_id(&self, id: &LibraryId) -> Result<Option<Library>>;

    /// List every library, ordered by name.
    async fn list_all(&self) -> Result<Vec<Library>>;

    /// Replace the operator-mutable settings of a library.
    ///
    /// # Errors
    ///
    /// `CatalogError::NotFound` if the id is absent.
    async fn update_settings(&self, id: &LibraryId, settings: &LibrarySettings)
        -> Result<Library>;

    /// Stamp the last-synced timestamp.
    async fn touch_last_synced(&self, id: &LibraryId, timestamp: i64) -> Result<()>;

    /// Delete a library; items and subtitles cascade.
    ///
    /// # Errors
    ///
    /// `CatalogError::NotFound` if the id is absent.
    async fn delete(&self, id: &LibraryId) -> Result<()>;
}

/// SQLite implementation of `LibraryRepository`
pub struct SqliteLibraryRepository {
    pool: SqlitePool,
}

impl SqliteLibraryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the libraries table if it doesn't exist.
    pub async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS libraries (
                id TEXT PRIMARY KEY NOT NULL,
                name TEXT NOT NULL,
                kind TEXT NOT NULL,
                target_languages TEXT NOT NULL DEFAULT '[]',
                skip_existing INTEGER NOT NULL DEFAULT 1,
                enabled INTEGER NOT NULL DEFAULT 1,
                last_synced INTEGER,
                CONSTRAINT libraries_kind_check CHECK (
                    kind IN ('movies', 'series')
                )
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CatalogError::Database(e.to_string()))?;

        Ok(())
    }
}

/// Database row representation of a library
#[derive(Debug, FromRow)]
struct LibraryRow {
    id: String,
    name: String,
    kind: String,
    target_languages: String,
    skip_existing: bool,
    enabled: bool,
    last_synced: Option<i64>,
}

impl TryFrom<LibraryRow> for Library {
    type Error = CatalogError;

    fn try_from(row: LibraryRow) -> Result<Self> {
        let target_languages: Vec<String> =
            serde_json::from_str(&row.target_languages).map_err(|e| {
                CatalogError::Database(format!("Corrupt target_languages for {}: {e}", row.id))
            })?;

        Ok(Library {
            id: LibraryId::new(row.id),
            name: row.name,
            kind: row.kind.parse()?,
            target_languages,
            skip_existing: row.skip_existing,
            enabled: row.enabled,
            last_synced: row.last_synced,
        })
    }
}

const SELECT_COLUMNS: &str =
    "id, name, kind, target_languages, skip_existing, enabled, last_synced";

#[async_trait]
impl LibraryRepository for SqliteLibraryRepository {
    async fn upsert(&self, library: &LibraryUpsert) -> Result<Library> {
        let target_languages = serde_json::to_string(&library.target_languages)
            .map_err(|e| CatalogError::Database(e.to_string()))?;
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO libraries (id, name, kind, target_languages, last_synced)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                kind = excluded.kind,
                last_synced = excluded.last_synced
            "#,
        )
        .bind(library.id.as_str())
        .bind(&library.name)
        .bind(library.kind.as_str())
        .bind(&target_languages)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| CatalogError::Database(e.to_string()))?;

        self.find_by_id(&library.id)
            .await?
            .ok_or_else(|| CatalogError::not_found("Library", library.id.as_str()))
    }

    async fn find_by_id(&self, id: &LibraryId) -> Result<Option<Library>> {
        let row = sqlx::query_as::<_, LibraryRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM libraries WHERE id = ?"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CatalogError::Database(e.to_string()))?;

        row.map(Library::try_from).transpose()
    }

    async fn list_all(&self) -> Result<Vec<Library>> {
        let rows = sqlx::query_as::<_, LibraryRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM libraries ORDER BY name ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CatalogError::Database(e.to_string()))?;

        rows.into_iter().map(Library::try_from).collect()
    }

    async fn update_settings(
        &self,
        id: &LibraryId,
        settings: &LibrarySettings,
    ) -> Result<Library> {
        let target_languages = serde_json::to_string(&settings.target_languages)
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        let result = sqlx::query(
            r#"
            UPDATE libraries SET
                target_languages = ?,
                skip_existing = ?,
                enabled = ?
            WHERE id = ?
            "#,
        )
        .bind(&target_languages)
        .bind(settings.skip_existing)
        .bind(settings.enabled)
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| CatalogError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::not_found("Library", id.as_str()));
        }

        self.find_by_id(id)
            .await?
            .ok_or_else(|| CatalogError::not_found("Library", id.as_str()))
    }

    async fn touch_last_synced(&self, id: &LibraryId, timestamp: i64) -> Result<()> {
        let result = sqlx::query("UPDATE libraries SET last_synced = ? WHERE id = ?")
            .bind(timestamp)
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::not_found("Library", id.as_str()));
        }
        Ok(())
    }

    async fn delete(&self, id: &LibraryId) -> Result<()> {
        let result = sqlx::query("DELETE FROM libraries WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::not_found("Library", id.as_str()));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
