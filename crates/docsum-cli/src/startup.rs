use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use docsum_ai::{build_analyzer, AnalyzerConfig, HostedAnalyzerConfig, LocalModelConfig};
use docsum_content::{
    ContentFetcher, ContentStore, FilesystemContentStore, S3ContentStore, S3Credentials,
    S3StoreConfig,
};
use docsum_gateway::{run_gateway_server, GatewayServerConfig};
use docsum_orchestrator::{AnalysisOrchestrator, OrchestratorConfig};
use docsum_store::{ResultStore, SqliteResultStore};
use docsum_types::AnalysisEnvelope;

use crate::cli_args::{Cli, CliAnalyzerBackend, CliCommand, CliContentBackend, RuntimeArgs};

pub(crate) async fn run_cli(cli: Cli) -> Result<()> {
    let orchestrator = Arc::new(build_orchestrator(&cli.runtime)?);
    match cli.command {
        CliCommand::Serve { bind } => {
            run_gateway_server(GatewayServerConfig { bind, orchestrator }).await
        }
        CliCommand::Analyze { id } => {
            let envelope = run_analyze(&orchestrator, &id).await?;
            let rendered = serde_json::to_string_pretty(&envelope)
                .context("failed to render analysis envelope")?;
            println!("{rendered}");
            Ok(())
        }
    }
}

pub(crate) async fn run_analyze(
    orchestrator: &AnalysisOrchestrator,
    id: &str,
) -> Result<AnalysisEnvelope> {
    orchestrator
        .analyze(id)
        .await
        .with_context(|| format!("failed to analyze document '{id}'"))
}

pub(crate) fn build_orchestrator(args: &RuntimeArgs) -> Result<AnalysisOrchestrator> {
    let store: Arc<dyn ResultStore> = Arc::new(
        SqliteResultStore::new(&args.database_path).with_context(|| {
            format!(
                "failed to open result store at {}",
                args.database_path.display()
            )
        })?,
    );
    let fetcher = build_content_fetcher(args)?;
    let analyzer = build_analyzer(build_analyzer_config(args)?)
        .context("failed to configure analyzer backend")?;

    tracing::info!(
        database = %args.database_path.display(),
        content = fetcher.backend_name(),
        bucket = fetcher.bucket(),
        analyzer = analyzer.backend_name(),
        "runtime configured"
    );

    Ok(AnalysisOrchestrator::new(
        store,
        fetcher,
        analyzer,
        OrchestratorConfig {
            analyzer_timeout: Duration::from_millis(args.analyzer_timeout_ms),
        },
    ))
}

pub(crate) fn build_content_fetcher(args: &RuntimeArgs) -> Result<ContentFetcher> {
    let bucket = args
        .s3_bucket
        .as_deref()
        .map(str::trim)
        .filter(|bucket| !bucket.is_empty())
        .ok_or_else(|| anyhow!("--s3-bucket (or AWS_S3_BUCKET_NAME) is required"))?;

    let store: Arc<dyn ContentStore> = match args.content_backend {
        CliContentBackend::Filesystem => {
            Arc::new(FilesystemContentStore::new(args.content_root.clone()))
        }
        CliContentBackend::S3 => Arc::new(
            S3ContentStore::new(build_s3_config(args)?)
                .context("failed to build object storage client")?,
        ),
    };

    let fetcher = ContentFetcher::new(store, bucket);
    Ok(match args.content_url_prefix.as_deref() {
        Some(prefix) if !prefix.trim().is_empty() => fetcher.with_url_prefix(prefix.trim()),
        _ => fetcher,
    })
}

fn build_s3_config(args: &RuntimeArgs) -> Result<S3StoreConfig> {
    let credentials = match (&args.s3_access_key_id, &args.s3_secret_access_key) {
        (Some(access_key_id), Some(secret_access_key)) => Some(S3Credentials {
            access_key_id: access_key_id.clone(),
            secret_access_key: secret_access_key.clone(),
            session_token: args.s3_session_token.clone(),
        }),
        (None, None) => None,
        _ => bail!("--s3-access-key-id and --s3-secret-access-key must be set together"),
    };
    Ok(S3StoreConfig {
        region: args.s3_region.clone(),
        endpoint: args.s3_endpoint.clone(),
        credentials,
        ..S3StoreConfig::default()
    })
}

pub(crate) fn build_analyzer_config(args: &RuntimeArgs) -> Result<AnalyzerConfig> {
    Ok(match args.analyzer {
        CliAnalyzerBackend::Stub => AnalyzerConfig::Stub,
        CliAnalyzerBackend::Local => AnalyzerConfig::Local(LocalModelConfig {
            api_base: args.local_model_api_base.clone(),
            model: args.local_model.clone(),
            request_timeout_ms: args.analyzer_timeout_ms,
        }),
        CliAnalyzerBackend::Hosted => {
            let api_key = args
                .hosted_api_key
                .clone()
                .filter(|key| !key.trim().is_empty())
                .ok_or_else(|| {
                    anyhow!("--analyzer hosted requires --hosted-api-key (or OPENAI_API_KEY)")
                })?;
            AnalyzerConfig::Hosted(HostedAnalyzerConfig {
                api_base: args.hosted_api_base.clone(),
                api_key,
                model: args.hosted_model.clone(),
                max_tokens: args.hosted_max_tokens,
                request_timeout_ms: args.analyzer_timeout_ms,
            })
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use docsum_types::{AnalysisStatus, DocumentId, DocumentRecord};
    use std::path::Path;
    use tempfile::tempdir;

    fn runtime_args(extra: &[&str]) -> RuntimeArgs {
        let mut argv = vec!["docsum", "serve"];
        argv.extend_from_slice(extra);
        Cli::try_parse_from(argv).expect("parse cli").runtime
    }

    fn filesystem_args(root: &Path, database: &Path) -> RuntimeArgs {
        runtime_args(&[
            "--content-backend",
            "filesystem",
            "--content-root",
            root.to_str().expect("utf8 root"),
            "--database-path",
            database.to_str().expect("utf8 database"),
            "--s3-bucket",
            "docs",
            "--content-url-prefix",
            "https://docs.s3.amazonaws.com/",
            "--analyzer",
            "stub",
        ])
    }

    #[test]
    fn unit_analyzer_config_follows_selected_backend() {
        let local = build_analyzer_config(&runtime_args(&[
            "--analyzer",
            "local",
            "--local-model-api-base",
            "http://127.0.0.1:9999",
            "--local-model",
            "phi3",
            "--analyzer-timeout-ms",
            "1500",
        ]))
        .expect("local config");
        assert_eq!(
            local,
            AnalyzerConfig::Local(LocalModelConfig {
                api_base: "http://127.0.0.1:9999".to_string(),
                model: "phi3".to_string(),
                request_timeout_ms: 1500,
            })
        );

        let hosted = build_analyzer_config(&runtime_args(&[
            "--analyzer",
            "hosted",
            "--hosted-api-key",
            "sk-test",
            "--hosted-max-tokens",
            "64",
        ]))
        .expect("hosted config");
        match hosted {
            AnalyzerConfig::Hosted(config) => {
                assert_eq!(config.api_key, "sk-test");
                assert_eq!(config.max_tokens, 64);
            }
            other => panic!("expected hosted config, got {other:?}"),
        }
    }

    #[test]
    fn regression_hosted_backend_requires_api_key() {
        let error = build_analyzer_config(&runtime_args(&[
            "--analyzer",
            "hosted",
            "--hosted-api-key",
            "   ",
        ]))
        .expect_err("blank key");
        assert!(error.to_string().contains("--hosted-api-key"));
    }

    #[test]
    fn regression_partial_s3_credentials_are_rejected() {
        if std::env::var_os("AWS_SECRET_ACCESS_KEY").is_some() {
            return;
        }
        let args = runtime_args(&["--s3-access-key-id", "AKIDEXAMPLE"]);
        let error = build_s3_config(&args).expect_err("partial credentials");
        assert!(error.to_string().contains("must be set together"));
    }

    #[tokio::test]
    async fn functional_filesystem_runtime_analyzes_then_serves_cached_result() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("objects");
        let database = temp.path().join("state").join("docsum.sqlite");
        std::fs::create_dir_all(root.join("docs")).expect("bucket dir");
        std::fs::write(root.join("docs").join("1700000000000-notes.txt"), "meeting notes")
            .expect("write object");

        let args = filesystem_args(&root, &database);
        let orchestrator = build_orchestrator(&args).expect("orchestrator");
        assert_eq!(orchestrator.content_backend(), "filesystem");
        assert_eq!(orchestrator.analyzer_backend(), "stub");

        let id = DocumentId::generate();
        orchestrator
            .store()
            .register_document(DocumentRecord::new(
                id.clone(),
                "notes.txt",
                "https://docs.s3.amazonaws.com/1700000000000-notes.txt",
                Some(13),
            ))
            .await
            .expect("register");

        let first = run_analyze(&orchestrator, id.as_str())
            .await
            .expect("first analysis");
        assert_eq!(first.status, AnalysisStatus::Analyzed);
        assert_eq!(first.file_name, "notes.txt");

        let second = run_analyze(&orchestrator, id.as_str())
            .await
            .expect("second analysis");
        assert_eq!(second.status, AnalysisStatus::AlreadyAnalyzed);
        assert_eq!(second.summary, first.summary);
        assert!(database.exists());
    }

    #[test]
    fn regression_missing_bucket_is_a_startup_error() {
        if std::env::var_os("AWS_S3_BUCKET_NAME").is_some() {
            return;
        }
        let error = build_content_fetcher(&runtime_args(&[])).expect_err("missing bucket");
        assert!(error.to_string().contains("--s3-bucket"));
    }
}
