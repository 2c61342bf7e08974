//! The idempotent analysis pipeline: cache check, then fetch, summarize and
//! persist exactly once per document identity.

mod locks;

use std::sync::Arc;
use std::time::Duration;

use docsum_ai::{Analyzer, AnalyzerError};
use docsum_content::{ContentError, ContentFetcher};
use docsum_store::{InsertOutcome, ResultStore, StoreError};
use docsum_types::{
    AnalysisEnvelope, AnalysisLifecycle, AnalysisRecord, AnalysisStatus, DocumentId,
    DocumentIdError,
};
use thiserror::Error;

pub use locks::{IdentityLockGuard, IdentityLocks};

pub const DEFAULT_ANALYZER_TIMEOUT: Duration = Duration::from_secs(120);

/// Failure kinds surfaced to callers of `AnalysisOrchestrator::analyze`.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("invalid document id: {0}")]
    InvalidIdentity(#[from] DocumentIdError),
    #[error("document '{0}' not found")]
    NotFound(DocumentId),
    #[error("document content unavailable: {0}")]
    SourceUnavailable(#[from] ContentError),
    #[error("summarization backend failed: {0}")]
    BackendError(#[from] AnalyzerError),
    #[error("result store failure: {0}")]
    StoreError(#[from] StoreError),
}

impl AnalysisError {
    /// Stable snake_case label for logs and counters.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidIdentity(_) => "invalid_identity",
            Self::NotFound(_) => "not_found",
            Self::SourceUnavailable(_) => "source_unavailable",
            Self::BackendError(_) => "backend_error",
            Self::StoreError(_) => "store_error",
        }
    }

    /// True when the caller, not the pipeline, is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidIdentity(_) | Self::NotFound(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Upper bound on one analyzer call, on top of the backend's own HTTP timeout.
    pub analyzer_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            analyzer_timeout: DEFAULT_ANALYZER_TIMEOUT,
        }
    }
}

/// Drives a document identity from lookup to a stored summary.
///
/// Concurrent calls for one identity are serialized by `IdentityLocks`; the
/// store's insert-if-absent covers writers in other processes.
#[derive(Clone)]
pub struct AnalysisOrchestrator {
    store: Arc<dyn ResultStore>,
    fetcher: ContentFetcher,
    analyzer: Arc<dyn Analyzer>,
    locks: IdentityLocks,
    config: OrchestratorConfig,
}

impl std::fmt::Debug for AnalysisOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisOrchestrator")
            .field("fetcher", &self.fetcher)
            .field("analyzer", &self.analyzer.backend_name())
            .field("in_flight", &self.locks.len())
            .field("config", &self.config)
            .finish()
    }
}

impl AnalysisOrchestrator {
    pub fn new(
        store: Arc<dyn ResultStore>,
        fetcher: ContentFetcher,
        analyzer: Arc<dyn Analyzer>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            store,
            fetcher,
            analyzer,
            locks: IdentityLocks::new(),
            config,
        }
    }

    pub fn analyzer_backend(&self) -> &'static str {
        self.analyzer.backend_name()
    }

    pub fn content_backend(&self) -> &'static str {
        self.fetcher.backend_name()
    }

    pub fn store(&self) -> &Arc<dyn ResultStore> {
        &self.store
    }

    pub fn in_flight(&self) -> usize {
        self.locks.len()
    }

    /// Parses `raw_id` and analyzes it. Malformed ids fail before any lookup.
    pub async fn analyze(&self, raw_id: &str) -> Result<AnalysisEnvelope, AnalysisError> {
        let id = DocumentId::parse(raw_id)?;
        self.analyze_id(&id).await
    }

    #[tracing::instrument(level = "info", skip(self, id), fields(document_id = %id))]
    pub async fn analyze_id(&self, id: &DocumentId) -> Result<AnalysisEnvelope, AnalysisError> {
        let result = self.run_pipeline(id).await;
        match &result {
            Ok(envelope) => tracing::info!(status = ?envelope.status, "analysis resolved"),
            Err(error) if error.is_client_error() => {
                tracing::info!(kind = error.kind(), "analysis rejected")
            }
            Err(error) => tracing::warn!(kind = error.kind(), error = %error, "analysis failed"),
        }
        result
    }

    /// Current lifecycle state of `id` as seen by this process.
    pub async fn lifecycle(&self, id: &DocumentId) -> Result<AnalysisLifecycle, AnalysisError> {
        if self.store.lookup_analysis(id).await?.is_some() {
            return Ok(AnalysisLifecycle::Analyzed);
        }
        if self.locks.is_held(id) {
            return Ok(AnalysisLifecycle::Analyzing);
        }
        Ok(AnalysisLifecycle::Unanalyzed)
    }

    async fn run_pipeline(&self, id: &DocumentId) -> Result<AnalysisEnvelope, AnalysisError> {
        if let Some(view) = self.store.lookup_analysis_with_document_name(id).await? {
            tracing::debug!("cache hit");
            return Ok(AnalysisEnvelope::already_analyzed(view));
        }

        let _guard = self.locks.acquire(id).await;
        // Another holder may have finished while this call waited.
        if let Some(view) = self.store.lookup_analysis_with_document_name(id).await? {
            tracing::debug!("cache hit after waiting for in-flight analysis");
            return Ok(AnalysisEnvelope::already_analyzed(view));
        }

        let document = self
            .store
            .lookup_document(id)
            .await?
            .ok_or_else(|| AnalysisError::NotFound(id.clone()))?;

        let mut state = AnalysisLifecycle::Unanalyzed;
        advance(&mut state, AnalysisLifecycle::Analyzing);

        let summary = match self.fetch_and_summarize(&document.location).await {
            Ok(summary) => summary,
            Err(error) => {
                advance(&mut state, AnalysisLifecycle::Unanalyzed);
                return Err(error);
            }
        };

        let outcome = match self
            .store
            .insert_analysis_if_absent(AnalysisRecord::new(id.clone(), summary))
            .await
        {
            Ok(outcome) => outcome,
            Err(error) => {
                advance(&mut state, AnalysisLifecycle::Unanalyzed);
                return Err(error.into());
            }
        };
        advance(&mut state, AnalysisLifecycle::Analyzed);

        Ok(match outcome {
            InsertOutcome::Inserted(record) => AnalysisEnvelope::analyzed(record, document.file_name),
            InsertOutcome::AlreadyExists(record) => {
                tracing::debug!("insert lost to a concurrent writer");
                AnalysisEnvelope::new(
                    AnalysisStatus::AlreadyAnalyzed,
                    record,
                    document.file_name,
                )
            }
        })
    }

    async fn fetch_and_summarize(&self, location: &str) -> Result<String, AnalysisError> {
        let bytes = self.fetcher.fetch(location).await?;
        let text = String::from_utf8_lossy(&bytes);
        tracing::debug!(
            content_bytes = bytes.len(),
            backend = self.analyzer.backend_name(),
            "content fetched, summarizing"
        );

        let timeout = self.config.analyzer_timeout;
        match tokio::time::timeout(timeout, self.analyzer.summarize(&text)).await {
            Ok(summary) => Ok(summary?),
            Err(_) => Err(AnalyzerError::Timeout {
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }
            .into()),
        }
    }
}

fn advance(state: &mut AnalysisLifecycle, next: AnalysisLifecycle) {
    debug_assert!(state.can_transition_to(next));
    tracing::debug!(from = ?*state, to = ?next, "lifecycle transition");
    *state = next;
}
