//! # Catalog Store Module
//!
//! Durable storage for the mirrored media catalog: libraries, media items and
//! their subtitle coverage.
//!
//! ## Overview
//!
//! This crate owns the Library/Item/Subtitle tables and exposes them through
//! repository traits with idempotent upserts keyed by natural identity
//! (remote id for libraries and items, `(item_id, language)` for subtitles).
//! Reconciliation runs on every sync and on every single-item webhook update,
//! so repeated identical upserts must be safe.
//!
//! ## Components
//!
//! - **Connection Pool** (`db`): SQLite pool with WAL mode and schema setup
//! - **Domain Models** (`models`): Library/Item/Subtitle with typed ids
//! - **Repositories** (`repositories`): CRUD + upsert with pagination

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use db::{create_pool, initialize_catalog, DatabaseConfig};
pub use error::{CatalogError, Result};
pub use models::{
    Item, ItemKind, ItemId, ItemUpsert, Library, LibraryId, LibraryKind, LibrarySettings,
    LibraryUpsert, NewSubtitle, Subtitle, SubtitleId, SubtitleSource,
};
pub use repositories::{
    ItemRepository, LibraryRepository, Page, PageRequest, SqliteItemRepository,
    SqliteLibraryRepository, SqliteSubtitleRepository, SubtitleRepository,
};
