use std::sync::Arc;

use crate::{assemble_chunks, validate_object_key, ContentError, ContentStore};

const HOST_SUFFIX_MARKER: &str = ".com/";

/// Default prefix of stored object URLs for `bucket`.
pub fn default_url_prefix(bucket: &str) -> String {
    format!("https://{bucket}.s3.amazonaws.com/")
}

/// Derives an object key from a stored location reference.
///
/// Accepted forms, in order: `url_prefix` followed by the key, a bare key
/// without a scheme, and any URL whose key follows the first `.com/`.
pub fn object_key_from_location(location: &str, url_prefix: &str) -> Result<String, ContentError> {
    let trimmed = location.trim();
    if trimmed.is_empty() {
        return Err(ContentError::InvalidLocation(location.to_string()));
    }

    let key = if let Some(key) = (!url_prefix.is_empty())
        .then(|| trimmed.strip_prefix(url_prefix))
        .flatten()
    {
        key
    } else if !trimmed.contains("://") {
        trimmed.trim_start_matches('/')
    } else if let Some((_, key)) = trimmed.split_once(HOST_SUFFIX_MARKER) {
        key
    } else {
        return Err(ContentError::InvalidLocation(location.to_string()));
    };

    if key.is_empty() {
        return Err(ContentError::InvalidLocation(location.to_string()));
    }
    Ok(key.to_string())
}

/// Resolves document locations to object keys and reads them in full.
#[derive(Clone)]
pub struct ContentFetcher {
    store: Arc<dyn ContentStore>,
    bucket: String,
    url_prefix: String,
}

impl ContentFetcher {
    pub fn new(store: Arc<dyn ContentStore>, bucket: impl Into<String>) -> Self {
        let bucket = bucket.into();
        let url_prefix = default_url_prefix(&bucket);
        Self {
            store,
            bucket,
            url_prefix,
        }
    }

    pub fn with_url_prefix(mut self, url_prefix: impl Into<String>) -> Self {
        self.url_prefix = url_prefix.into();
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    pub fn object_key(&self, location: &str) -> Result<String, ContentError> {
        object_key_from_location(location, &self.url_prefix)
    }

    /// Streams the object behind `location` into one contiguous buffer.
    #[tracing::instrument(
        level = "debug",
        skip(self),
        fields(bucket = %self.bucket, backend = self.store.backend_name())
    )]
    pub async fn fetch(&self, location: &str) -> Result<Vec<u8>, ContentError> {
        let key = self.object_key(location)?;
        validate_object_key(&key)?;
        let stream = self.store.open(&self.bucket, &key).await?;
        let bytes = assemble_chunks(stream).await?;
        tracing::debug!(key = %key, total_bytes = bytes.len(), "document content fetched");
        Ok(bytes)
    }
}

impl std::fmt::Debug for ContentFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentFetcher")
            .field("backend", &self.store.backend_name())
            .field("bucket", &self.bucket)
            .field("url_prefix", &self.url_prefix)
            .finish()
    }
}
