//! Content-store access for the document summary pipeline.
//!
//! Streams raw document bytes out of an object store and reassembles them into
//! one contiguous buffer. Backends cover S3-compatible services, a local
//! directory tree, and an in-memory store used by tests and demos.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use thiserror::Error;

mod chunk;
mod fetcher;
mod filesystem;
mod memory;
mod s3;
mod sigv4;

pub use chunk::{assemble_chunks, ContentChunk};
pub use fetcher::{default_url_prefix, object_key_from_location, ContentFetcher};
pub use filesystem::FilesystemContentStore;
pub use memory::InMemoryContentStore;
pub use s3::{S3ContentStore, S3Credentials, S3StoreConfig};

/// Stream of chunks produced by an opened object.
pub type ChunkStream = BoxStream<'static, Result<ContentChunk, ContentError>>;

/// Errors raised while resolving or reading stored content.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("object '{key}' not found in bucket '{bucket}'")]
    ObjectNotFound { bucket: String, key: String },
    #[error("cannot derive an object key from location '{0}'")]
    InvalidLocation(String),
    #[error("invalid object key '{0}'")]
    InvalidKey(String),
    #[error("content store returned non-success status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("content store transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("content store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("request signing failed: {0}")]
    Signing(String),
    #[error("content stream interrupted: {0}")]
    Interrupted(String),
}

/// Object store that can open a streamed read of one object.
#[async_trait]
pub trait ContentStore: Send + Sync {
    fn backend_name(&self) -> &'static str;

    async fn open(&self, bucket: &str, key: &str) -> Result<ChunkStream, ContentError>;
}

/// Rejects keys that are empty, could escape their bucket, or carry
/// segments (`.`, `..`, empty) that URL or path normalization would rewrite.
pub(crate) fn validate_object_key(key: &str) -> Result<(), ContentError> {
    if key.trim().is_empty()
        || key.contains('\\')
        || key
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(ContentError::InvalidKey(key.to_string()));
    }
    Ok(())
}
