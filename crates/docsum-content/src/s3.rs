use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{StatusCode, Url};

use crate::sigv4::{encode_key_path, sign, SigningRequest};
use crate::{validate_object_key, ChunkStream, ContentChunk, ContentError, ContentStore};

const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Static credentials used to sign S3 requests.
#[derive(Clone, PartialEq, Eq)]
pub struct S3Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl std::fmt::Debug for S3Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct S3StoreConfig {
    pub region: String,
    /// Custom endpoint for S3-compatible services. Requests use path-style
    /// addressing when set.
    pub endpoint: Option<String>,
    /// Requests are sent unsigned when no credentials are configured.
    pub credentials: Option<S3Credentials>,
    pub request_timeout_ms: u64,
}

impl Default for S3StoreConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            endpoint: None,
            credentials: None,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

/// Reads objects from S3 or an S3-compatible service with streamed GETs.
#[derive(Debug, Clone)]
pub struct S3ContentStore {
    client: reqwest::Client,
    config: S3StoreConfig,
}

impl S3ContentStore {
    pub fn new(config: S3StoreConfig) -> Result<Self, ContentError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &S3StoreConfig {
        &self.config
    }

    pub fn object_url(&self, bucket: &str, key: &str) -> Result<Url, ContentError> {
        validate_object_key(key)?;
        let encoded_key = encode_key_path(key);
        let raw = match self.config.endpoint.as_deref() {
            Some(endpoint) => format!(
                "{}/{bucket}/{encoded_key}",
                endpoint.trim().trim_end_matches('/')
            ),
            None => format!(
                "https://{bucket}.s3.{}.amazonaws.com/{encoded_key}",
                self.config.region.trim()
            ),
        };
        Url::parse(&raw).map_err(|error| ContentError::InvalidKey(format!("{raw}: {error}")))
    }

    fn signed_headers(&self, url: &Url) -> Result<HeaderMap, ContentError> {
        let mut headers = HeaderMap::new();
        let Some(credentials) = &self.config.credentials else {
            return Ok(headers);
        };

        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => return Err(ContentError::Signing(format!("url '{url}' has no host"))),
        };
        let signed = sign(&SigningRequest {
            method: "GET",
            host: &host,
            canonical_uri: url.path(),
            region: self.config.region.trim(),
            access_key_id: credentials.access_key_id.trim(),
            secret_access_key: credentials.secret_access_key.trim(),
            session_token: credentials.session_token.as_deref(),
            timestamp: Utc::now(),
        })?;

        headers.insert(AUTHORIZATION, header_value(&signed.authorization)?);
        headers.insert("x-amz-date", header_value(&signed.amz_date)?);
        headers.insert(
            "x-amz-content-sha256",
            HeaderValue::from_static(signed.content_sha256),
        );
        if let Some(token) = signed.security_token {
            headers.insert("x-amz-security-token", header_value(&token)?);
        }
        Ok(headers)
    }
}

fn header_value(raw: &str) -> Result<HeaderValue, ContentError> {
    HeaderValue::from_str(raw).map_err(|error| ContentError::Signing(error.to_string()))
}

fn truncate_body(body: String) -> String {
    if body.chars().count() <= MAX_ERROR_BODY_CHARS {
        return body;
    }
    body.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

#[async_trait]
impl ContentStore for S3ContentStore {
    fn backend_name(&self) -> &'static str {
        "s3"
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn open(&self, bucket: &str, key: &str) -> Result<ChunkStream, ContentError> {
        let url = self.object_url(bucket, key)?;
        let headers = self.signed_headers(&url)?;
        let response = self.client.get(url).headers(headers).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ContentError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "content store rejected object read");
            return Err(ContentError::HttpStatus {
                status: status.as_u16(),
                body: truncate_body(body),
            });
        }

        let chunks = response.bytes_stream().map(|item| {
            item.map(|bytes| ContentChunk::Bytes(bytes.to_vec()))
                .map_err(ContentError::from)
        });
        Ok(chunks.boxed())
    }
}
