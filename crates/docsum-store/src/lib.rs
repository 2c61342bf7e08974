//! Result store abstractions and in-memory backend.

use async_trait::async_trait;
use docsum_types::{AnalysisRecord, AnalysisView, DocumentId, DocumentRecord};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

mod sqlite;

pub use sqlite::SqliteResultStore;

/// Result type for result store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document '{0}' already exists")]
    DocumentAlreadyExists(DocumentId),
    #[error("document '{0}' is not registered")]
    UnknownDocument(DocumentId),
    #[error("invalid persisted value for '{field}': {value}")]
    InvalidPersistedValue { field: &'static str, value: String },
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Chrono(#[from] chrono::ParseError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Outcome of a conditional analysis insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The record was written and is now the stored analysis.
    Inserted(AnalysisRecord),
    /// Another writer got there first; carries the record already stored.
    AlreadyExists(AnalysisRecord),
}

impl InsertOutcome {
    pub fn record(&self) -> &AnalysisRecord {
        match self {
            Self::Inserted(record) | Self::AlreadyExists(record) => record,
        }
    }

    pub fn into_record(self) -> AnalysisRecord {
        match self {
            Self::Inserted(record) | Self::AlreadyExists(record) => record,
        }
    }

    pub fn was_inserted(&self) -> bool {
        matches!(self, Self::Inserted(_))
    }
}

/// Durable mapping from document identity to its single analysis.
///
/// Analyses can only be inserted; there is no update or delete path.
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn register_document(&self, document: DocumentRecord) -> StoreResult<()>;
    async fn lookup_document(&self, id: &DocumentId) -> StoreResult<Option<DocumentRecord>>;
    /// All documents, newest upload first.
    async fn list_documents(&self) -> StoreResult<Vec<DocumentRecord>>;

    async fn lookup_analysis(&self, id: &DocumentId) -> StoreResult<Option<AnalysisRecord>>;
    /// The analysis joined with its document's name. `None` when either side is missing.
    async fn lookup_analysis_with_document_name(
        &self,
        id: &DocumentId,
    ) -> StoreResult<Option<AnalysisView>>;
    /// Writes `record` only if no analysis exists for its document yet.
    async fn insert_analysis_if_absent(&self, record: AnalysisRecord)
        -> StoreResult<InsertOutcome>;
}

/// In-memory implementation for tests and local experimentation.
#[derive(Debug, Default)]
pub struct InMemoryResultStore {
    inner: RwLock<StoreInner>,
}

#[derive(Debug, Default)]
struct StoreInner {
    documents: HashMap<DocumentId, DocumentRecord>,
    analyses: HashMap<DocumentId, AnalysisRecord>,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn analysis_count(&self) -> usize {
        self.inner.read().await.analyses.len()
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn register_document(&self, document: DocumentRecord) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.documents.contains_key(&document.id) {
            return Err(StoreError::DocumentAlreadyExists(document.id));
        }
        inner.documents.insert(document.id.clone(), document);
        Ok(())
    }

    async fn lookup_document(&self, id: &DocumentId) -> StoreResult<Option<DocumentRecord>> {
        Ok(self.inner.read().await.documents.get(id).cloned())
    }

    async fn list_documents(&self) -> StoreResult<Vec<DocumentRecord>> {
        let inner = self.inner.read().await;
        let mut documents = inner.documents.values().cloned().collect::<Vec<_>>();
        documents.sort_by(|left, right| {
            right
                .uploaded_at
                .cmp(&left.uploaded_at)
                .then_with(|| right.id.cmp(&left.id))
        });
        Ok(documents)
    }

    async fn lookup_analysis(&self, id: &DocumentId) -> StoreResult<Option<AnalysisRecord>> {
        Ok(self.inner.read().await.analyses.get(id).cloned())
    }

    async fn lookup_analysis_with_document_name(
        &self,
        id: &DocumentId,
    ) -> StoreResult<Option<AnalysisView>> {
        let inner = self.inner.read().await;
        let (Some(record), Some(document)) = (inner.analyses.get(id), inner.documents.get(id))
        else {
            return Ok(None);
        };
        Ok(Some(AnalysisView {
            record: record.clone(),
            file_name: document.file_name.clone(),
        }))
    }

    async fn insert_analysis_if_absent(
        &self,
        record: AnalysisRecord,
    ) -> StoreResult<InsertOutcome> {
        let mut inner = self.inner.write().await;
        if !inner.documents.contains_key(&record.document_id) {
            return Err(StoreError::UnknownDocument(record.document_id));
        }
        if let Some(existing) = inner.analyses.get(&record.document_id) {
            return Ok(InsertOutcome::AlreadyExists(existing.clone()));
        }
        inner
            .analyses
            .insert(record.document_id.clone(), record.clone());
        Ok(InsertOutcome::Inserted(record))
    }
}
