//! Summarization backends behind one `Analyzer` contract.
mod hosted;
mod local;
mod stub;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

pub use hosted::{HostedAnalyzer, HostedAnalyzerConfig};
pub use local::{LocalModelAnalyzer, LocalModelConfig};
pub use stub::{StubAnalyzer, STUB_SUMMARY};

pub const DEFAULT_LOCAL_API_BASE: &str = "http://127.0.0.1:11434";
pub const DEFAULT_LOCAL_MODEL: &str = "llama3";
pub const DEFAULT_HOSTED_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_HOSTED_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_HOSTED_MAX_TOKENS: u32 = 500;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 120_000;

const SUMMARY_PROMPT_PREFIX: &str = "Please analyze this document and provide a summary: ";

/// Errors raised by a summarization backend.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("missing API key")]
    MissingApiKey,
    #[error("invalid analyzer configuration: {0}")]
    InvalidConfig(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backend returned non-success status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("backend did not respond within {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// A summarization backend: document text in, one summary string out.
#[async_trait]
pub trait Analyzer: Send + Sync {
    fn backend_name(&self) -> &'static str;

    async fn summarize(&self, text: &str) -> Result<String, AnalyzerError>;
}

/// Backend selection made once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalyzerConfig {
    Stub,
    Local(LocalModelConfig),
    Hosted(HostedAnalyzerConfig),
}

impl AnalyzerConfig {
    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Stub => "stub",
            Self::Local(_) => "local",
            Self::Hosted(_) => "hosted",
        }
    }
}

pub fn build_analyzer(config: AnalyzerConfig) -> Result<Arc<dyn Analyzer>, AnalyzerError> {
    let analyzer: Arc<dyn Analyzer> = match config {
        AnalyzerConfig::Stub => Arc::new(StubAnalyzer),
        AnalyzerConfig::Local(config) => Arc::new(LocalModelAnalyzer::new(config)?),
        AnalyzerConfig::Hosted(config) => Arc::new(HostedAnalyzer::new(config)?),
    };
    tracing::debug!(backend = analyzer.backend_name(), "analyzer configured");
    Ok(analyzer)
}

/// Prompt shared by the model-backed variants.
pub fn summary_prompt(text: &str) -> String {
    format!("{SUMMARY_PROMPT_PREFIX}{text}")
}

pub(crate) fn trimmed_base(api_base: &str) -> &str {
    api_base.trim().trim_end_matches('/')
}
