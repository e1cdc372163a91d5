mod local;

pub use local::LocalStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncSeek};

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Server error ({status}) {code}: {message}")]
    Server {
        status: u16,
        code: String,
        message: String,
    },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

/// A listed object. Produced by [`ObjectClient::list`], never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageObject {
    pub key: String,
    pub modified_at: DateTime<Utc>,
}

/// Directory-like grouping returned by a delimited listing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct StorageCommonPrefix(pub String);

impl AsRef<str> for StorageCommonPrefix {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Streamed object content. The caller owns it and closes it by dropping.
pub type ObjectReader = Box<dyn AsyncRead + Send + Unpin>;

/// Seekable upload body. Implemented for anything that can be read and
/// rewound, e.g. `tokio::fs::File` or `std::io::Cursor<Vec<u8>>`.
pub trait ObjectSource: AsyncRead + AsyncSeek + Send + Unpin {}

impl<T: AsyncRead + AsyncSeek + Send + Unpin> ObjectSource for T {}

/// The bucket client contract the chunk storage layer depends on.
/// Any backend that can store, fetch, delete and enumerate keys in a single
/// bucket can sit behind it.
#[async_trait]
pub trait ObjectClient: Send + Sync {
    async fn get_object(&self, key: &str) -> Result<ObjectReader, ObjectStoreError>;
    async fn put_object(
        &self,
        key: &str,
        object: Box<dyn ObjectSource>,
    ) -> Result<(), ObjectStoreError>;
    async fn delete_object(&self, key: &str) -> Result<(), ObjectStoreError>;
    /// Enumerate every key starting with `prefix`. With a non-empty
    /// `delimiter`, keys are grouped into common prefixes at the first
    /// delimiter after the prefix.
    async fn list(
        &self,
        prefix: &str,
        delimiter: &str,
    ) -> Result<(Vec<StorageObject>, Vec<StorageCommonPrefix>), ObjectStoreError>;
    fn stop(&self);
}
