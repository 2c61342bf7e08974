use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use docsum_ai::{
    DEFAULT_HOSTED_API_BASE, DEFAULT_HOSTED_MAX_TOKENS, DEFAULT_HOSTED_MODEL,
    DEFAULT_LOCAL_API_BASE, DEFAULT_LOCAL_MODEL,
};
use docsum_gateway::DEFAULT_GATEWAY_BIND;

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u32(value: &str) -> Result<u32, String> {
    let parsed = value
        .parse::<u32>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliContentBackend {
    S3,
    Filesystem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliAnalyzerBackend {
    Stub,
    Local,
    Hosted,
}

#[derive(Debug, Parser)]
#[command(
    name = "docsum",
    about = "Summarize uploaded documents with a pluggable language model backend",
    version
)]
pub struct Cli {
    #[command(flatten)]
    pub runtime: RuntimeArgs,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Serve the HTTP API.
    Serve {
        #[arg(
            long,
            env = "DOCSUM_BIND",
            default_value = DEFAULT_GATEWAY_BIND,
            help = "Socket address the gateway listens on"
        )]
        bind: String,
    },
    /// Analyze one document and print the result envelope as JSON.
    Analyze {
        #[arg(help = "Document id to analyze")]
        id: String,
    },
}

/// Flags shared by every subcommand.
#[derive(Debug, Args)]
pub struct RuntimeArgs {
    #[arg(
        long = "database-path",
        env = "DOCSUM_DATABASE_PATH",
        default_value = ".docsum/docsum.sqlite",
        global = true,
        help = "SQLite database holding document and analysis records"
    )]
    pub database_path: PathBuf,

    #[arg(
        long = "content-backend",
        env = "DOCSUM_CONTENT_BACKEND",
        value_enum,
        default_value_t = CliContentBackend::S3,
        global = true,
        help = "Where document bytes are read from"
    )]
    pub content_backend: CliContentBackend,

    #[arg(
        long = "content-root",
        env = "DOCSUM_CONTENT_ROOT",
        default_value = ".docsum/objects",
        global = true,
        help = "Root directory for --content-backend filesystem; objects live at <root>/<bucket>/<key>"
    )]
    pub content_root: PathBuf,

    #[arg(
        long = "s3-bucket",
        env = "AWS_S3_BUCKET_NAME",
        global = true,
        help = "Bucket holding uploaded documents"
    )]
    pub s3_bucket: Option<String>,

    #[arg(
        long = "s3-region",
        env = "AWS_REGION",
        default_value = "us-east-1",
        global = true,
        help = "Region used for virtual-hosted URLs and request signing"
    )]
    pub s3_region: String,

    #[arg(
        long = "s3-endpoint",
        env = "DOCSUM_S3_ENDPOINT",
        global = true,
        help = "Custom endpoint for S3-compatible services (path-style addressing)"
    )]
    pub s3_endpoint: Option<String>,

    #[arg(
        long = "s3-access-key-id",
        env = "AWS_ACCESS_KEY_ID",
        hide_env_values = true,
        global = true,
        help = "Access key id; requests are unsigned when omitted"
    )]
    pub s3_access_key_id: Option<String>,

    #[arg(
        long = "s3-secret-access-key",
        env = "AWS_SECRET_ACCESS_KEY",
        hide_env_values = true,
        global = true,
        help = "Secret access key paired with --s3-access-key-id"
    )]
    pub s3_secret_access_key: Option<String>,

    #[arg(
        long = "s3-session-token",
        env = "AWS_SESSION_TOKEN",
        hide_env_values = true,
        global = true,
        help = "Optional session token for temporary credentials"
    )]
    pub s3_session_token: Option<String>,

    #[arg(
        long = "content-url-prefix",
        env = "DOCSUM_CONTENT_URL_PREFIX",
        global = true,
        help = "Public URL prefix stripped from stored locations (default https://<bucket>.s3.amazonaws.com/)"
    )]
    pub content_url_prefix: Option<String>,

    #[arg(
        long,
        env = "DOCSUM_ANALYZER",
        value_enum,
        default_value_t = CliAnalyzerBackend::Stub,
        global = true,
        help = "Summary backend"
    )]
    pub analyzer: CliAnalyzerBackend,

    #[arg(
        long = "local-model-api-base",
        env = "DOCSUM_LOCAL_MODEL_API_BASE",
        default_value = DEFAULT_LOCAL_API_BASE,
        global = true,
        help = "Base URL of the local inference server"
    )]
    pub local_model_api_base: String,

    #[arg(
        long = "local-model",
        env = "DOCSUM_LOCAL_MODEL",
        default_value = DEFAULT_LOCAL_MODEL,
        global = true,
        help = "Model name sent to the local inference server"
    )]
    pub local_model: String,

    #[arg(
        long = "hosted-api-base",
        env = "DOCSUM_HOSTED_API_BASE",
        default_value = DEFAULT_HOSTED_API_BASE,
        global = true,
        help = "Base URL for the OpenAI-compatible chat completions API"
    )]
    pub hosted_api_base: String,

    #[arg(
        long = "hosted-api-key",
        env = "OPENAI_API_KEY",
        hide_env_values = true,
        global = true,
        help = "API key for the hosted backend"
    )]
    pub hosted_api_key: Option<String>,

    #[arg(
        long = "hosted-model",
        env = "DOCSUM_HOSTED_MODEL",
        default_value = DEFAULT_HOSTED_MODEL,
        global = true,
        help = "Chat model used by the hosted backend"
    )]
    pub hosted_model: String,

    #[arg(
        long = "hosted-max-tokens",
        env = "DOCSUM_HOSTED_MAX_TOKENS",
        default_value_t = DEFAULT_HOSTED_MAX_TOKENS,
        value_parser = parse_positive_u32,
        global = true,
        help = "Completion token cap for the hosted backend"
    )]
    pub hosted_max_tokens: u32,

    #[arg(
        long = "analyzer-timeout-ms",
        env = "DOCSUM_ANALYZER_TIMEOUT_MS",
        default_value_t = 120_000,
        value_parser = parse_positive_u64,
        global = true,
        help = "Upper bound on a single summary call in milliseconds"
    )]
    pub analyzer_timeout_ms: u64,
}
