use crate::client::ClientError;
use core_catalog::CatalogError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Sync already in progress")]
    SyncInProgress,

    #[error("Library {library_id} not found")]
    LibraryNotFound { library_id: String },

    #[error("Remote fetch failed: {0}")]
    RemoteFetch(#[from] ClientError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

pub type Result<T> = std::result::Result<T, SyncError>;
