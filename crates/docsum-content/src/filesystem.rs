use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use tokio::io::AsyncReadExt;

use crate::{validate_object_key, ChunkStream, ContentChunk, ContentError, ContentStore};

const READ_CHUNK_BYTES: usize = 64 * 1024;

/// Object store backed by a directory tree laid out as `<root>/<bucket>/<key>`.
#[derive(Debug, Clone)]
pub struct FilesystemContentStore {
    root: PathBuf,
}

impl FilesystemContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, ContentError> {
        if bucket.is_empty() || bucket.contains(['/', '\\']) || bucket == ".." {
            return Err(ContentError::InvalidKey(format!("{bucket}/{key}")));
        }
        validate_object_key(key)?;
        let mut path = self.root.join(bucket);
        for segment in key.split('/').filter(|segment| !segment.is_empty()) {
            path.push(segment);
        }
        Ok(path)
    }
}

#[async_trait]
impl ContentStore for FilesystemContentStore {
    fn backend_name(&self) -> &'static str {
        "filesystem"
    }

    async fn open(&self, bucket: &str, key: &str) -> Result<ChunkStream, ContentError> {
        let path = self.object_path(bucket, key)?;
        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Err(ContentError::ObjectNotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                });
            }
            Err(error) => return Err(ContentError::Io(error)),
        };
        tracing::trace!(path = %path.display(), "opened filesystem object");

        let chunks = stream::try_unfold(file, |mut file| async move {
            let mut buffer = vec![0u8; READ_CHUNK_BYTES];
            let read = match file.read(&mut buffer).await {
                Ok(read) => read,
                Err(error) => return Err(ContentError::Io(error)),
            };
            if read == 0 {
                return Ok(None);
            }
            buffer.truncate(read);
            Ok(Some((ContentChunk::Bytes(buffer), file)))
        });
        Ok(chunks.boxed())
    }
}
