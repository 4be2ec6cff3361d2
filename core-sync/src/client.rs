//! Remote media-server client interface.
//!
//! The reconciler consumes the remote catalog through this narrow trait so
//! the HTTP implementation stays swappable (and mockable in tests).

use async_trait::async_trait;
use core_catalog::LibraryKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the remote catalog client.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Unexpected status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Malformed response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(error: reqwest::Error) -> Self {
        ClientError::Request(error.to_string())
    }
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// A remote top-level collection (library).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCollection {
    pub id: String,
    pub name: String,
    /// The server's collection type string, resolved via [`CollectionKind`].
    pub kind: String,
}

/// The remote collection kind, resolved once at sync time.
///
/// Unsupported kinds short-circuit before any write happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    Movies,
    Series,
    Unsupported,
}

impl CollectionKind {
    /// Resolve a remote collection type string.
    pub fn resolve(kind: &str) -> Self {
        match kind {
            "movies" => CollectionKind::Movies,
            "tvshows" => CollectionKind::Series,
            _ => CollectionKind::Unsupported,
        }
    }

    /// The catalog library kind this maps to, if supported.
    pub fn library_kind(&self) -> Option<LibraryKind> {
        match self {
            CollectionKind::Movies => Some(LibraryKind::Movies),
            CollectionKind::Series => Some(LibraryKind::Series),
            CollectionKind::Unsupported => None,
        }
    }
}

/// Server-side item type filter for listing requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteItemKind {
    Movie,
    Series,
    Episode,
}

impl RemoteItemKind {
    /// The type name the server uses in requests and responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteItemKind::Movie => "Movie",
            RemoteItemKind::Series => "Series",
            RemoteItemKind::Episode => "Episode",
        }
    }
}

/// A single remote media item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteItem {
    pub id: String,
    pub name: String,
    /// Remote type name: "Movie", "Series", "Episode", ...
    pub kind: String,
    pub path: Option<String>,
    pub series_id: Option<String>,
    pub series_name: Option<String>,
    pub season_number: Option<i64>,
    pub episode_number: Option<i64>,
}

/// One page of a remote item listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePage {
    pub items: Vec<RemoteItem>,
    /// Total matching items on the server, across all pages.
    pub total: u64,
}

/// The narrow interface the reconciler needs from a media server.
#[async_trait]
pub trait MediaServerClient: Send + Sync {
    /// List the server's top-level collections.
    async fn list_collections(&self) -> ClientResult<Vec<RemoteCollection>>;

    /// List one page of items of a given kind inside a collection.
    async fn list_items(
        &self,
        collection_id: &str,
        kind: RemoteItemKind,
        start_index: u64,
        limit: u64,
    ) -> ClientResult<RemotePage>;

    /// List all episodes of a series.
    async fn list_episodes(&self, series_id: &str) -> ClientResult<RemotePage>;
}

// ============================================================================
// Tests
// ============================================================================
