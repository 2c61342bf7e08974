use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    summary_prompt, trimmed_base, Analyzer, AnalyzerError, DEFAULT_HOSTED_API_BASE,
    DEFAULT_HOSTED_MAX_TOKENS, DEFAULT_HOSTED_MODEL, DEFAULT_REQUEST_TIMEOUT_MS,
};

const SYSTEM_PROMPT: &str =
    "You are a helpful assistant that analyzes documents and provides summaries.";

#[derive(Clone, PartialEq, Eq)]
pub struct HostedAnalyzerConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub request_timeout_ms: u64,
}

impl Default for HostedAnalyzerConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_HOSTED_API_BASE.to_string(),
            api_key: String::new(),
            model: DEFAULT_HOSTED_MODEL.to_string(),
            max_tokens: DEFAULT_HOSTED_MAX_TOKENS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl std::fmt::Debug for HostedAnalyzerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostedAnalyzerConfig")
            .field("api_base", &self.api_base)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Value,
}

/// Calls an OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone)]
pub struct HostedAnalyzer {
    client: reqwest::Client,
    config: HostedAnalyzerConfig,
}

impl HostedAnalyzer {
    pub fn new(config: HostedAnalyzerConfig) -> Result<Self, AnalyzerError> {
        if config.api_key.trim().is_empty() {
            return Err(AnalyzerError::MissingApiKey);
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let bearer = format!("Bearer {}", config.api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&bearer).map_err(|e| {
                AnalyzerError::InvalidConfig(format!("invalid API key header: {e}"))
            })?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()?;
        Ok(Self { client, config })
    }

    fn chat_completions_url(&self) -> String {
        let base = trimmed_base(&self.config.api_base);
        if base.ends_with("/chat/completions") {
            return base.to_string();
        }
        format!("{base}/chat/completions")
    }

    fn request_body(&self, text: &str) -> Value {
        json!({
            "model": self.config.model.trim(),
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": summary_prompt(text) },
            ],
            "max_tokens": self.config.max_tokens,
        })
    }
}

fn parse_chat_completion(raw: &str) -> Result<String, AnalyzerError> {
    let parsed: ChatCompletionResponse = serde_json::from_str(raw)?;
    let choice = parsed.choices.into_iter().next().ok_or_else(|| {
        AnalyzerError::InvalidResponse("response contained no choices".to_string())
    })?;

    let text = match choice.message.content {
        Value::String(text) => text,
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(""),
        _ => String::new(),
    };
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(AnalyzerError::InvalidResponse(
            "completion contained no text".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

#[async_trait]
impl Analyzer for HostedAnalyzer {
    fn backend_name(&self) -> &'static str {
        "hosted"
    }

    #[tracing::instrument(level = "debug", skip(self, text), fields(model = %self.config.model))]
    async fn summarize(&self, text: &str) -> Result<String, AnalyzerError> {
        let response = self
            .client
            .post(self.chat_completions_url())
            .json(&self.request_body(text))
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
        parse_chat_completion(&raw)
    }
}
