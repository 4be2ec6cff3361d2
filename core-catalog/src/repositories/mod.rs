//! Repository layer for catalog persistence.
//!
//! Each repository exposes a trait for the operations the rest of the system
//! needs plus a SQLite implementation over the shared pool. Upserts are keyed
//! by natural identity and safe under repeated identical calls; batch
//! variants run inside one transaction and roll back as a unit.

mod item;
mod library;
mod pagination;
mod subtitle;

pub use item::{ItemRepository, SqliteItemRepository};
pub use library::{LibraryRepository, SqliteLibraryRepository};
pub use pagination::{Page, PageRequest};
pub use subtitle::{SqliteSubtitleRepository, SubtitleRepository};
