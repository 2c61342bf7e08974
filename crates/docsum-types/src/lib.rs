//! Shared data types for the document summary pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Longest accepted document identity, in bytes.
pub const MAX_DOCUMENT_ID_LEN: usize = 64;

static DOCUMENT_ID_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Error returned when a raw identity cannot be used as a `DocumentId`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentIdError {
    #[error("document id is missing")]
    Missing,
    #[error("document id '{0}' must be 1-64 characters of [A-Za-z0-9_-]")]
    Malformed(String),
}

fn is_identity_character(character: char) -> bool {
    character.is_ascii_alphanumeric() || matches!(character, '-' | '_')
}

/// Opaque document identity shared by document and analysis records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentId(String);

impl DocumentId {
    /// Parses a raw identity after trimming surrounding whitespace.
    ///
    /// Identities are compared exactly as given; no case folding is applied.
    pub fn parse(raw: &str) -> Result<Self, DocumentIdError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DocumentIdError::Missing);
        }
        if trimmed.len() > MAX_DOCUMENT_ID_LEN || !trimmed.chars().all(is_identity_character) {
            return Err(DocumentIdError::Malformed(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Generates a fresh 24-character hex identity: unix seconds, process id,
    /// then a counter.
    pub fn generate() -> Self {
        let seconds = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as u32;
        let process = std::process::id();
        let count = DOCUMENT_ID_COUNTER.fetch_add(1, Ordering::Relaxed) & 0x00ff_ffff;
        Self(format!("{seconds:08x}{process:010x}{count:06x}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DocumentId {
    type Err = DocumentIdError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<String> for DocumentId {
    type Error = DocumentIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DocumentId> for String {
    fn from(value: DocumentId) -> Self {
        value.0
    }
}

/// Metadata registered by the upload path for one stored document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    #[serde(rename = "_id")]
    pub id: DocumentId,
    pub file_name: String,
    /// Absolute reference into the content store, e.g. an object URL.
    #[serde(rename = "fileUrl")]
    pub location: String,
    #[serde(rename = "fileSize", skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    pub uploaded_at: DateTime<Utc>,
}

impl DocumentRecord {
    pub fn new(
        id: DocumentId,
        file_name: impl Into<String>,
        location: impl Into<String>,
        size_bytes: Option<u64>,
    ) -> Self {
        Self {
            id,
            file_name: file_name.into(),
            location: location.into(),
            size_bytes,
            uploaded_at: Utc::now(),
        }
    }
}

/// The single summary stored for a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub document_id: DocumentId,
    pub summary: String,
    pub analyzed_at: DateTime<Utc>,
}

impl AnalysisRecord {
    pub fn new(document_id: DocumentId, summary: impl Into<String>) -> Self {
        Self {
            document_id,
            summary: summary.into(),
            analyzed_at: Utc::now(),
        }
    }
}

/// An analysis joined with its document's display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisView {
    pub record: AnalysisRecord,
    pub file_name: String,
}

/// Distinguishes a freshly computed summary from one already on record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Analyzed,
    AlreadyAnalyzed,
}

impl AnalysisStatus {
    pub fn status_text(self) -> &'static str {
        match self {
            Self::Analyzed => "File analyzed successfully",
            Self::AlreadyAnalyzed => "File already analyzed",
        }
    }
}

/// Uniform result returned to callers of the analysis pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisEnvelope {
    pub status: AnalysisStatus,
    pub status_text: String,
    pub file_id: DocumentId,
    pub file_name: String,
    pub summary: String,
    pub analyzed_at: DateTime<Utc>,
}

impl AnalysisEnvelope {
    pub fn new(status: AnalysisStatus, record: AnalysisRecord, file_name: String) -> Self {
        Self {
            status,
            status_text: status.status_text().to_string(),
            file_id: record.document_id,
            file_name,
            summary: record.summary,
            analyzed_at: record.analyzed_at,
        }
    }

    pub fn analyzed(record: AnalysisRecord, file_name: String) -> Self {
        Self::new(AnalysisStatus::Analyzed, record, file_name)
    }

    pub fn already_analyzed(view: AnalysisView) -> Self {
        Self::new(AnalysisStatus::AlreadyAnalyzed, view.record, view.file_name)
    }

    pub fn is_cached(&self) -> bool {
        self.status == AnalysisStatus::AlreadyAnalyzed
    }
}

/// Error returned when a lifecycle transition is invalid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid analysis lifecycle transition: {from:?} -> {to:?}")]
pub struct LifecycleTransitionError {
    pub from: AnalysisLifecycle,
    pub to: AnalysisLifecycle,
}

/// Analysis state of a single document identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisLifecycle {
    #[default]
    Unanalyzed,
    Analyzing,
    Analyzed,
}

impl AnalysisLifecycle {
    /// Returns true when this state can transition to `next`.
    ///
    /// `Analyzing -> Unanalyzed` covers a failed attempt: nothing was
    /// persisted, so the identity is still a cache miss.
    pub fn can_transition_to(self, next: Self) -> bool {
        if self == next {
            return true;
        }

        matches!(
            (self, next),
            (Self::Unanalyzed, Self::Analyzing)
                | (Self::Analyzing, Self::Analyzed)
                | (Self::Analyzing, Self::Unanalyzed)
        )
    }

    /// Returns an error if transitioning to `next` is not allowed.
    pub fn ensure_transition(self, next: Self) -> Result<(), LifecycleTransitionError> {
        if self.can_transition_to(next) {
            return Ok(());
        }
        Err(LifecycleTransitionError {
            from: self,
            to: next,
        })
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Analyzed)
    }
}
