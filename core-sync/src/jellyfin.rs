//! # Jellyfin Client
//!
//! Implements [`MediaServerClient`] against the Jellyfin HTTP API:
//! `/Library/VirtualFolders` for collections, `/Items` for paginated item
//! listings and `/Shows/{id}/Episodes` for episodes. Authentication uses the
//! `X-MediaBrowser-Token` header.

use crate::client::{
    ClientError, ClientResult, MediaServerClient, RemoteCollection, RemoteItem, RemoteItemKind,
    RemotePage,
};
use async_trait::async_trait;
use core_runtime::config::MediaServerConfig;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const AUTH_HEADER: &str = "X-MediaBrowser-Token";

/// HTTP client for a Jellyfin media server.
pub struct JellyfinClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl JellyfinClient {
    /// Create a client for the given server.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Create a client from the core configuration.
    pub fn from_config(config: &MediaServerConfig) -> ClientResult<Self> {
        Self::new(config.base_url.clone(), config.api_key.clone())
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> ClientResult<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "Jellyfin request");

        let response = self
            .http
            .get(&url)
            .header(AUTH_HEADER, &self.api_key)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                url,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }
}

// ============================================================================
// Wire DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct VirtualFolderDto {
    item_id: String,
    name: String,
    #[serde(default)]
    collection_type: Option<String>,
}

impl From<VirtualFolderDto> for RemoteCollection {
    fn from(dto: VirtualFolderDto) -> Self {
        RemoteCollection {
            id: dto.item_id,
            name: dto.name,
            kind: dto.collection_type.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ItemDto {
    id: String,
    name: String,
    #[serde(rename = "Type")]
    kind: String,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    series_id: Option<String>,
    #[serde(default)]
    series_name: Option<String>,
    /// Season number for episodes.
    #[serde(default)]
    parent_index_number: Option<i64>,
    /// Episode number for episodes.
    #[serde(default)]
    index_number: Option<i64>,
}

impl From<ItemDto> for RemoteItem {
    fn from(dto: ItemDto) -> Self {
        RemoteItem {
            id: dto.id,
            name: dto.name,
            kind: dto.kind,
            path: dto.path,
            series_id: dto.series_id,
            series_name: dto.series_name,
            season_number: dto.parent_index_number,
            episode_number: dto.index_number,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ItemsPageDto {
    #[serde(default)]
    items: Vec<ItemDto>,
    #[serde(default)]
    total_record_count: u64,
}

impl From<ItemsPageDto> for RemotePage {
    fn from(dto: ItemsPageDto) -> Self {
        RemotePage {
            items: dto.items.into_iter().map(RemoteItem::from).collect(),
            total: dto.total_record_count,
        }
    }
}

// ============================================================================
// Trait Implementation
// ============================================================================

#[async_trait]
impl MediaServerClient for JellyfinClient {
    async fn list_collections(&self) -> ClientResult<Vec<RemoteCollection>> {
        let folders: Vec<VirtualFolderDto> =
            self.get_json("/Library/VirtualFolders", &[]).await?;

        Ok(folders.into_iter().map(RemoteCollection::from).collect())
    }

    async fn list_items(
        &self,
        collection_id: &str,
        kind: RemoteItemKind,
        start_index: u64,
        limit: u64,
    ) -> ClientResult<RemotePage> {
        let query = [
            ("ParentId", collection_id.to_string()),
            ("IncludeItemTypes", kind.as_str().to_string()),
            ("Recursive", "true".to_string()),
            ("StartIndex", start_index.to_string()),
            ("Limit", limit.to_string()),
            ("Fields", "Path".to_string()),
            ("SortBy", "SortName".to_string()),
            ("SortOrder", "Ascending".to_string()),
        ];

        let page: ItemsPageDto = self.get_json("/Items", &query).await?;
        Ok(page.into())
    }

    async fn list_episodes(&self, series_id: &str) -> ClientResult<RemotePage> {
        let query = [("Fields", "Path".to_string())];
        let page: ItemsPageDto = self
            .get_json(&format!("/Shows/{series_id}/Episodes"), &query)
            .await?;
        Ok(page.into())
    }
}

// ============================================================================
// Tests
// ============================================================================
