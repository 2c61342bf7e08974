use std::{net::SocketAddr, path::Path, sync::Arc, time::Duration};

use docsum_ai::{build_analyzer, Analyzer, AnalyzerConfig, HostedAnalyzerConfig, LocalModelConfig};
use docsum_content::{
    ContentFetcher, FilesystemContentStore, S3ContentStore, S3Credentials, S3StoreConfig,
};
use docsum_gateway::{build_gateway_router, GatewayServerState};
use docsum_orchestrator::{AnalysisError, AnalysisOrchestrator, OrchestratorConfig};
use docsum_store::{ResultStore, SqliteResultStore};
use docsum_types::{AnalysisStatus, DocumentId, DocumentRecord};
use httpmock::prelude::*;
use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;

const BUCKET: &str = "uploads";
const URL_PREFIX: &str = "https://uploads.s3.amazonaws.com/";

/// Scratch directory with an object root and a SQLite database path.
struct Workspace {
    _temp: TempDir,
    objects: std::path::PathBuf,
    database: std::path::PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let temp = tempfile::tempdir().expect("create workspace");
        let objects = temp.path().join("objects");
        let database = temp.path().join("state").join("docsum.sqlite");
        std::fs::create_dir_all(objects.join(BUCKET)).expect("create bucket dir");
        Self {
            _temp: temp,
            objects,
            database,
        }
    }

    fn write_object(&self, key: &str, body: &str) {
        std::fs::write(self.objects.join(BUCKET).join(key), body).expect("write object");
    }

    fn store(&self) -> Arc<dyn ResultStore> {
        Arc::new(SqliteResultStore::new(&self.database).expect("open sqlite store"))
    }

    fn orchestrator(&self, analyzer: Arc<dyn Analyzer>) -> AnalysisOrchestrator {
        filesystem_orchestrator(self.store(), &self.objects, analyzer)
    }
}

fn filesystem_orchestrator(
    store: Arc<dyn ResultStore>,
    objects: &Path,
    analyzer: Arc<dyn Analyzer>,
) -> AnalysisOrchestrator {
    let fetcher = ContentFetcher::new(Arc::new(FilesystemContentStore::new(objects)), BUCKET)
        .with_url_prefix(URL_PREFIX);
    AnalysisOrchestrator::new(store, fetcher, analyzer, OrchestratorConfig::default())
}

fn local_analyzer(server: &MockServer) -> Arc<dyn Analyzer> {
    build_analyzer(AnalyzerConfig::Local(LocalModelConfig {
        api_base: server.base_url(),
        model: "llama3".to_string(),
        request_timeout_ms: 5_000,
    }))
    .expect("build local analyzer")
}

async fn register(store: &Arc<dyn ResultStore>, name: &str, key: &str) -> DocumentId {
    let id = DocumentId::generate();
    store
        .register_document(DocumentRecord::new(
            id.clone(),
            name,
            format!("{URL_PREFIX}{key}"),
            None,
        ))
        .await
        .expect("register document");
    id
}

async fn spawn_gateway(
    orchestrator: AnalysisOrchestrator,
) -> (SocketAddr, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral listener");
    let addr = listener.local_addr().expect("listener addr");
    let app = build_gateway_router(Arc::new(GatewayServerState::new(Arc::new(orchestrator))));
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    (addr, handle)
}

#[tokio::test]
async fn integration_gateway_analyzes_once_and_survives_restart() {
    let workspace = Workspace::new();
    workspace.write_object("1700000000000-minutes.txt", "Quarterly planning minutes.");
    let model = MockServer::start();
    let generate = model.mock(|when, then| {
        when.method(POST).path("/api/generate").json_body(json!({
            "model": "llama3",
            "prompt": "Please analyze this document and provide a summary: Quarterly planning minutes.",
            "stream": false
        }));
        then.status(200)
            .json_body(json!({ "response": "  Planning summary.  ", "done": true }));
    });

    let orchestrator = workspace.orchestrator(local_analyzer(&model));
    let id = register(orchestrator.store(), "minutes.txt", "1700000000000-minutes.txt").await;
    let (addr, handle) = spawn_gateway(orchestrator).await;
    let client = Client::new();

    let first = client
        .get(format!("http://{addr}/analyze/{id}"))
        .send()
        .await
        .expect("first request");
    assert_eq!(first.status().as_u16(), 200);
    let first: Value = first.json().await.expect("first body");
    assert_eq!(first["status"], "analyzed");
    assert_eq!(first["fileName"], "minutes.txt");
    assert_eq!(first["summary"], "Planning summary.");

    let second = client
        .get(format!("http://{addr}/analyze/{id}"))
        .send()
        .await
        .expect("second request");
    assert_eq!(second.status().as_u16(), 208);
    let second: Value = second.json().await.expect("second body");
    assert_eq!(second["status"], "already_analyzed");
    assert_eq!(second["summary"], first["summary"]);
    handle.abort();

    let restarted = workspace.orchestrator(local_analyzer(&model));
    let cached = restarted.analyze(id.as_str()).await.expect("cached after restart");
    assert_eq!(cached.status, AnalysisStatus::AlreadyAnalyzed);
    assert_eq!(cached.summary, "Planning summary.");

    generate.assert_calls(1);
}

#[tokio::test]
async fn integration_concurrent_requests_invoke_the_model_once() {
    let workspace = Workspace::new();
    workspace.write_object("1700000000001-spec.md", "# Design");
    let model = MockServer::start();
    let generate = model.mock(|when, then| {
        when.method(POST).path("/api/generate");
        then.status(200)
            .delay(Duration::from_millis(150))
            .json_body(json!({ "response": "Design summary." }));
    });

    let orchestrator = workspace.orchestrator(local_analyzer(&model));
    let id = register(orchestrator.store(), "spec.md", "1700000000001-spec.md").await;
    let (addr, handle) = spawn_gateway(orchestrator).await;
    let client = Client::new();

    let mut tasks = Vec::new();
    for _ in 0..6 {
        let client = client.clone();
        let url = format!("http://{addr}/analyze/{id}");
        tasks.push(tokio::spawn(async move {
            let response = client.get(url).send().await.expect("send request");
            let status = response.status().as_u16();
            let body: Value = response.json().await.expect("json body");
            (status, body)
        }));
    }

    let mut fresh = 0;
    let mut summaries = Vec::new();
    for task in tasks {
        let (status, body) = task.await.expect("join request");
        match status {
            200 => fresh += 1,
            208 => {}
            other => panic!("unexpected status {other}: {body}"),
        }
        summaries.push(body["summary"].clone());
    }
    assert_eq!(fresh, 1);
    assert!(summaries.iter().all(|summary| summary == "Design summary."));
    generate.assert_calls(1);

    handle.abort();
}

#[tokio::test]
async fn integration_shared_database_keeps_first_summary_across_processes() {
    let workspace = Workspace::new();
    workspace.write_object("1700000000002-a.txt", "alpha");
    let first_model = MockServer::start();
    first_model.mock(|when, then| {
        when.method(POST).path("/api/generate");
        then.status(200)
            .delay(Duration::from_millis(100))
            .json_body(json!({ "response": "first" }));
    });
    let second_model = MockServer::start();
    second_model.mock(|when, then| {
        when.method(POST).path("/api/generate");
        then.status(200)
            .delay(Duration::from_millis(100))
            .json_body(json!({ "response": "second" }));
    });

    // Two orchestrators with independent lock maps over one database file.
    let left = workspace.orchestrator(local_analyzer(&first_model));
    let right = workspace.orchestrator(local_analyzer(&second_model));
    let id = register(left.store(), "a.txt", "1700000000002-a.txt").await;

    let (a, b) = tokio::join!(left.analyze(id.as_str()), right.analyze(id.as_str()));
    let a = a.expect("left analysis");
    let b = b.expect("right analysis");

    assert_eq!(a.summary, b.summary);
    let statuses = [a.status, b.status];
    assert!(statuses.contains(&AnalysisStatus::Analyzed));
    assert!(statuses.contains(&AnalysisStatus::AlreadyAnalyzed));

    let stored = workspace
        .store()
        .lookup_analysis(&id)
        .await
        .expect("lookup")
        .expect("stored analysis");
    assert_eq!(stored.summary, a.summary);
}

#[tokio::test]
async fn integration_model_failure_leaves_document_retryable() {
    let workspace = Workspace::new();
    workspace.write_object("1700000000003-b.txt", "beta");
    let model = MockServer::start();
    let mut failing = model.mock(|when, then| {
        when.method(POST).path("/api/generate");
        then.status(503).body("model loading");
    });

    let orchestrator = workspace.orchestrator(local_analyzer(&model));
    let id = register(orchestrator.store(), "b.txt", "1700000000003-b.txt").await;

    let error = orchestrator
        .analyze(id.as_str())
        .await
        .expect_err("backend failure");
    assert!(matches!(error, AnalysisError::BackendError(_)));
    assert!(orchestrator
        .store()
        .lookup_analysis(&id)
        .await
        .expect("lookup")
        .is_none());
    failing.assert_calls(1);
    failing.delete();

    model.mock(|when, then| {
        when.method(POST).path("/api/generate");
        then.status(200).json_body(json!({ "response": "beta summary" }));
    });
    let envelope = orchestrator.analyze(id.as_str()).await.expect("retry");
    assert_eq!(envelope.status, AnalysisStatus::Analyzed);
    assert_eq!(envelope.summary, "beta summary");
}

#[tokio::test]
async fn integration_s3_content_and_hosted_model_pipeline() {
    let workspace = Workspace::new();
    let object_store = MockServer::start();
    let object = object_store.mock(|when, then| {
        when.method(GET)
            .path("/uploads/1700000000004-report.txt")
            .header("x-amz-content-sha256", "UNSIGNED-PAYLOAD")
            .header_exists("authorization")
            .header_exists("x-amz-date");
        then.status(200).body("Revenue grew in every region.");
    });
    let hosted = MockServer::start();
    let completion = hosted.mock(|when, then| {
        when.method(POST)
            .path("/v1/chat/completions")
            .header("authorization", "Bearer sk-integration")
            .json_body_includes(
                json!({
                    "model": "gpt-3.5-turbo",
                    "max_tokens": 500
                })
                .to_string(),
            );
        then.status(200).json_body(json!({
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": "Revenue is up." },
                "finish_reason": "stop"
            }]
        }));
    });

    let content = S3ContentStore::new(S3StoreConfig {
        region: "us-east-1".to_string(),
        endpoint: Some(object_store.base_url()),
        credentials: Some(S3Credentials {
            access_key_id: "AKIDEXAMPLE".to_string(),
            secret_access_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string(),
            session_token: None,
        }),
        ..S3StoreConfig::default()
    })
    .expect("s3 store");
    let analyzer = build_analyzer(AnalyzerConfig::Hosted(HostedAnalyzerConfig {
        api_base: format!("{}/v1", hosted.base_url()),
        api_key: "sk-integration".to_string(),
        ..HostedAnalyzerConfig::default()
    }))
    .expect("hosted analyzer");

    let store = workspace.store();
    let orchestrator = AnalysisOrchestrator::new(
        Arc::clone(&store),
        ContentFetcher::new(Arc::new(content), BUCKET),
        analyzer,
        OrchestratorConfig::default(),
    );
    assert_eq!(orchestrator.content_backend(), "s3");
    assert_eq!(orchestrator.analyzer_backend(), "hosted");

    let id = register(&store, "report.txt", "1700000000004-report.txt").await;
    let envelope = orchestrator.analyze(id.as_str()).await.expect("analysis");
    assert_eq!(envelope.status, AnalysisStatus::Analyzed);
    assert_eq!(envelope.summary, "Revenue is up.");
    assert_eq!(envelope.file_name, "report.txt");

    object.assert_calls(1);
    completion.assert_calls(1);
}

#[tokio::test]
async fn integration_missing_object_is_reported_without_caching() {
    let workspace = Workspace::new();
    let model = MockServer::start();
    let generate = model.mock(|when, then| {
        when.method(POST).path("/api/generate");
        then.status(200).json_body(json!({ "response": "unused" }));
    });

    let orchestrator = workspace.orchestrator(local_analyzer(&model));
    let id = register(orchestrator.store(), "gone.txt", "1700000000005-gone.txt").await;

    let error = orchestrator
        .analyze(id.as_str())
        .await
        .expect_err("missing object");
    assert!(matches!(error, AnalysisError::SourceUnavailable(_)));
    generate.assert_calls(0);
}
