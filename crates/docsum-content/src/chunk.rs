use futures_util::{Stream, StreamExt};

use crate::ContentError;

/// One piece of a streamed object body.
///
/// Store clients do not agree on a chunk representation, so each chunk is
/// normalized to bytes before it is appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentChunk {
    Bytes(Vec<u8>),
    Text(String),
}

impl ContentChunk {
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Bytes(bytes) => bytes,
            Self::Text(text) => text.into_bytes(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Bytes(bytes) => bytes.len(),
            Self::Text(text) => text.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn append_to(self, buffer: &mut Vec<u8>) {
        match self {
            Self::Bytes(bytes) => buffer.extend_from_slice(&bytes),
            Self::Text(text) => buffer.extend_from_slice(text.as_bytes()),
        }
    }
}

impl From<Vec<u8>> for ContentChunk {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<&[u8]> for ContentChunk {
    fn from(value: &[u8]) -> Self {
        Self::Bytes(value.to_vec())
    }
}

impl From<String> for ContentChunk {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for ContentChunk {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Drains `stream` into one buffer in arrival order.
///
/// The first chunk error aborts the read; no partial buffer is returned.
pub async fn assemble_chunks<S>(mut stream: S) -> Result<Vec<u8>, ContentError>
where
    S: Stream<Item = Result<ContentChunk, ContentError>> + Unpin,
{
    let mut buffer = Vec::new();
    let mut chunk_count = 0usize;
    while let Some(chunk) = stream.next().await {
        chunk?.append_to(&mut buffer);
        chunk_count += 1;
    }
    tracing::trace!(chunk_count, total_bytes = buffer.len(), "content stream drained");
    Ok(buffer)
}
