use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::{
    summary_prompt, trimmed_base, Analyzer, AnalyzerError, DEFAULT_LOCAL_API_BASE,
    DEFAULT_LOCAL_MODEL, DEFAULT_REQUEST_TIMEOUT_MS,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalModelConfig {
    pub api_base: String,
    pub model: String,
    pub request_timeout_ms: u64,
}

impl Default for LocalModelConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_LOCAL_API_BASE.to_string(),
            model: DEFAULT_LOCAL_MODEL.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

/// Calls a locally hosted inference server's non-streaming generate endpoint.
#[derive(Debug, Clone)]
pub struct LocalModelAnalyzer {
    client: reqwest::Client,
    config: LocalModelConfig,
}

impl LocalModelAnalyzer {
    pub fn new(config: LocalModelConfig) -> Result<Self, AnalyzerError> {
        if config.model.trim().is_empty() {
            return Err(AnalyzerError::InvalidConfig(
                "local model name cannot be empty".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()?;
        Ok(Self { client, config })
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", trimmed_base(&self.config.api_base))
    }
}

#[async_trait]
impl Analyzer for LocalModelAnalyzer {
    fn backend_name(&self) -> &'static str {
        "local"
    }

    #[tracing::instrument(level = "debug", skip(self, text), fields(model = %self.config.model))]
    async fn summarize(&self, text: &str) -> Result<String, AnalyzerError> {
        let body = json!({
            "model": self.config.model.trim(),
            "prompt": summary_prompt(text),
            "stream": false,
        });
        let response = self
            .client
            .post(self.generate_url())
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let raw = response.text().await?;
        if !status.is_success() {
            return Err(AnalyzerError::HttpStatus {
                status: status.as_u16(),
                body: raw,
            });
        }

        let parsed: GenerateResponse = serde_json::from_str(&raw)?;
        match parsed.response {
            Some(summary) if !summary.trim().is_empty() => Ok(summary.trim().to_string()),
            _ => Err(AnalyzerError::InvalidResponse(
                "local model response contained no text".to_string(),
            )),
        }
    }
}
