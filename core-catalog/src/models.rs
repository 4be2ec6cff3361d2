//! Domain models for the mirrored media catalog
//!
//! Library and Item ids are remote-keyed: they carry the media server's own
//! identifiers so reconciliation can upsert by natural identity. Subtitles use
//! a local surrogate id and are unique on `(item_id, language)`.

use crate::error::CatalogError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// ID Types
// =============================================================================

/// Remote-keyed identifier for a library.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct LibraryId(pub String);

impl LibraryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LibraryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for LibraryId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Remote-keyed identifier for a media item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct ItemId(pub String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Surrogate identifier for a subtitle row.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(transparent)]
pub struct SubtitleId(pub i64);

impl fmt::Display for SubtitleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Kind Enums
// =============================================================================

/// What a library holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibraryKind {
    Movies,
    Series,
}

impl LibraryKind {
    /// String representation for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            LibraryKind::Movies => "movies",
            LibraryKind::Series => "series",
        }
    }
}

impl FromStr for LibraryKind {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movies" => Ok(LibraryKind::Movies),
            "series" => Ok(LibraryKind::Series),
            _ => Err(CatalogError::InvalidValue {
                field: "library kind",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for LibraryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a media item is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Movie,
    Series,
    Episode,
}

impl ItemKind {
    /// String representation for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Movie => "movie",
            ItemKind::Series => "series",
            ItemKind::Episode => "episode",
        }
    }
}

impl FromStr for ItemKind {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(ItemKind::Movie),
            "series" => Ok(ItemKind::Series),
            "episode" => Ok(ItemKind::Episode),
            _ => Err(CatalogError::InvalidValue {
                field: "item kind",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a subtitle came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleSource {
    /// Found on disk next to the media file.
    External,
    /// Produced by a completed job.
    Generated,
}

impl SubtitleSource {
    /// String representation for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubtitleSource::External => "external",
            SubtitleSource::Generated => "generated",
        }
    }
}

impl FromStr for SubtitleSource {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "external" => Ok(SubtitleSource::External),
            "generated" => Ok(SubtitleSource::Generated),
            _ => Err(CatalogError::InvalidValue {
                field: "subtitle source",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for SubtitleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Entities
// =============================================================================

/// A mirrored remote library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Library {
    pub id: LibraryId,
    pub name: String,
    pub kind: LibraryKind,
    /// Ordered set of target language codes for subtitle generation.
    pub target_languages: Vec<String>,
    /// Skip items that already have a subtitle in the target language.
    pub skip_existing: bool,
    /// Whether the library participates in job generation.
    pub enabled: bool,
    /// Unix timestamp of the last successful reconciliation touch.
    pub last_synced: Option<i64>,
}

/// Reconciler-side payload for a library upsert.
///
/// `target_languages` only applies when the row is first inserted; upserting
/// an existing library never clobbers operator-owned settings.
#[derive(Debug, Clone)]
pub struct LibraryUpsert {
    pub id: LibraryId,
    pub name: String,
    pub kind: LibraryKind,
    pub target_languages: Vec<String>,
}

/// Operator-mutable library settings.
#[derive(Debug, Clone)]
pub struct LibrarySettings {
    pub target_languages: Vec<String>,
    pub skip_existing: bool,
    pub enabled: bool,
}

/// A mirrored media item (movie or episode; series rows carry no media path
/// of their own but keep the linkage for episodes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub library_id: LibraryId,
    pub kind: ItemKind,
    pub title: String,
    /// Unique filesystem path of the media file.
    pub path: String,
    pub series_id: Option<ItemId>,
    pub series_name: Option<String>,
    pub season_num: Option<i64>,
    pub episode_num: Option<i64>,
    /// Unix timestamp of the last reconciliation touch.
    pub last_synced: i64,
}

/// Payload for an item upsert.
#[derive(Debug, Clone)]
pub struct ItemUpsert {
    pub id: ItemId,
    pub library_id: LibraryId,
    pub kind: ItemKind,
    pub title: String,
    pub path: String,
    pub series_id: Option<ItemId>,
    pub series_name: Option<String>,
    pub season_num: Option<i64>,
    pub episode_num: Option<i64>,
}

/// A known subtitle file for an item, unique on `(item_id, language)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtitle {
    pub id: SubtitleId,
    pub item_id: ItemId,
    pub language: String,
    pub source: SubtitleSource,
    pub path: String,
    /// Unix timestamp of first discovery.
    pub created_at: i64,
}

/// Payload for a subtitle upsert.
#[derive(Debug, Clone)]
pub struct NewSubtitle {
    pub item_id: ItemId,
    pub language: String,
    pub source: SubtitleSource,
    pub path: String,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips() {
        assert_eq!("movies".parse::<LibraryKind>().unwrap(), LibraryKind::Movies);
        assert_eq!("series".parse::<LibraryKind>().unwrap(), LibraryKind::Series);
        assert!("music".parse::<LibraryKind>().is_err());

        assert_eq!("movie".parse::<ItemKind>().unwrap(), ItemKind::Movie);
        assert_eq!("episode".parse::<ItemKind>().unwrap(), ItemKind::Episode);
        assert!("song".parse::<ItemKind>().is_err());

        assert_eq!(
            "external".parse::<SubtitleSource>().unwrap(),
            SubtitleSource::External
        );
        assert_eq!(
            "generated".parse::<SubtitleSource>().unwrap(),
            SubtitleSource::Generated
        );
        assert!("embedded".parse::<SubtitleSource>().is_err());
    }

    #[test]
    fn test_id_display() {
        assert_eq!(LibraryId::new("lib-1").to_string(), "lib-1");
        assert_eq!(ItemId::from("item-1").as_str(), "item-1");
        assert_eq!(SubtitleId(7).to_string(), "7");
    }
}
