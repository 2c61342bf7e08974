use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};

use crate::{ChunkStream, ContentChunk, ContentError, ContentStore};

#[derive(Debug, Clone)]
struct StoredObject {
    chunks: Vec<ContentChunk>,
    fail_after: Option<usize>,
}

/// Object store held in process memory.
///
/// Objects keep their chunk boundaries so readers see the same multi-chunk
/// delivery a network store would produce.
#[derive(Debug, Clone, Default)]
pub struct InMemoryContentStore {
    objects: Arc<Mutex<HashMap<(String, String), StoredObject>>>,
    opens: Arc<AtomicUsize>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_object(&self, bucket: &str, key: &str, chunks: Vec<ContentChunk>) {
        self.put(bucket, key, chunks, None);
    }

    pub fn insert_bytes(&self, bucket: &str, key: &str, bytes: impl Into<Vec<u8>>) {
        self.put(bucket, key, vec![ContentChunk::Bytes(bytes.into())], None);
    }

    /// Stores an object whose stream fails after yielding `fail_after` chunks.
    pub fn insert_interrupted_object(
        &self,
        bucket: &str,
        key: &str,
        chunks: Vec<ContentChunk>,
        fail_after: usize,
    ) {
        self.put(bucket, key, chunks, Some(fail_after));
    }

    pub fn remove_object(&self, bucket: &str, key: &str) -> bool {
        self.lock_objects()
            .remove(&(bucket.to_string(), key.to_string()))
            .is_some()
    }

    /// Number of `open` calls served so far, including misses.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    fn put(&self, bucket: &str, key: &str, chunks: Vec<ContentChunk>, fail_after: Option<usize>) {
        self.lock_objects().insert(
            (bucket.to_string(), key.to_string()),
            StoredObject { chunks, fail_after },
        );
    }

    fn lock_objects(&self) -> std::sync::MutexGuard<'_, HashMap<(String, String), StoredObject>> {
        self.objects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn open(&self, bucket: &str, key: &str) -> Result<ChunkStream, ContentError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let object = self
            .lock_objects()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| ContentError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })?;

        let StoredObject { chunks, fail_after } = object;
        let items: Vec<Result<ContentChunk, ContentError>> = match fail_after {
            Some(limit) => chunks
                .into_iter()
                .take(limit)
                .map(Ok)
                .chain(std::iter::once(Err(ContentError::Interrupted(format!(
                    "stream for '{key}' closed after {limit} chunks"
                )))))
                .collect(),
            None => chunks.into_iter().map(Ok).collect(),
        };
        Ok(stream::iter(items).boxed())
    }
}
