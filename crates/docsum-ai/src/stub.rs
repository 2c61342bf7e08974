use async_trait::async_trait;

use crate::{Analyzer, AnalyzerError};

pub const STUB_SUMMARY: &str = "Api response placeholder for file analysis";

/// Placeholder backend used when no model is configured. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubAnalyzer;

#[async_trait]
impl Analyzer for StubAnalyzer {
    fn backend_name(&self) -> &'static str {
        "stub"
    }

    async fn summarize(&self, text: &str) -> Result<String, AnalyzerError> {
        tracing::trace!(input_bytes = text.len(), "stub analyzer invoked");
        Ok(STUB_SUMMARY.to_string())
    }
}
