//! # Catalog Reconciliation Module
//!
//! Mirrors a remote media-library server's catalog into the local store.
//!
//! ## Overview
//!
//! This crate pulls the remote collection list and per-collection item pages,
//! merges them idempotently into the catalog, and folds in a local filesystem
//! scan for subtitle files already sitting next to each media file. Running a
//! sync twice against an unchanged remote catalog changes nothing but
//! timestamps.
//!
//! ## Components
//!
//! - **Client** (`client`): the narrow interface to the remote server, plus
//!   the kind-resolution that routes movie/series collections and skips
//!   everything else before any write happens
//! - **Jellyfin** (`jellyfin`): HTTP implementation of the client
//! - **Reconciler** (`reconciler`): `sync_libraries` / `sync_library_items` /
//!   `sync_all` orchestration, one run at a time

pub mod client;
pub mod error;
pub mod jellyfin;
pub mod reconciler;

pub use client::{
    ClientError, CollectionKind, MediaServerClient, RemoteCollection, RemoteItem, RemoteItemKind,
    RemotePage,
};
pub use error::{Result, SyncError};
pub use jellyfin::JellyfinClient;
pub use reconciler::{CatalogReconciler, ReconcilerConfig, SyncSummary};
