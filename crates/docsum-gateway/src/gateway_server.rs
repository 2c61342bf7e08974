use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use docsum_orchestrator::{AnalysisError, AnalysisOrchestrator};
use docsum_types::{AnalysisEnvelope, DocumentIdError};
use serde::Serialize;
use serde_json::json;
use tokio::net::TcpListener;

mod analyze_runtime;
mod server_bootstrap;
mod status_runtime;
mod types;

use analyze_runtime::{handle_analyze, handle_analyze_missing_id, handle_list_files};
use status_runtime::handle_gateway_status;
use types::{GatewayApiError, GatewayRequestCounters};

pub use server_bootstrap::{build_gateway_router, run_gateway_server};

const ANALYZE_ENDPOINT: &str = "/analyze/{id}";
const ANALYZE_COLLECTION_ENDPOINT: &str = "/analyze";
const FILES_ENDPOINT: &str = "/files";
const GATEWAY_STATUS_ENDPOINT: &str = "/gateway/status";

pub const DEFAULT_GATEWAY_BIND: &str = "127.0.0.1:8787";

/// Settings for `run_gateway_server`.
#[derive(Debug, Clone)]
pub struct GatewayServerConfig {
    pub bind: String,
    pub orchestrator: Arc<AnalysisOrchestrator>,
}

/// Shared state behind every route.
#[derive(Debug)]
pub struct GatewayServerState {
    orchestrator: Arc<AnalysisOrchestrator>,
    counters: Mutex<GatewayRequestCounters>,
}

impl GatewayServerState {
    pub fn new(orchestrator: Arc<AnalysisOrchestrator>) -> Self {
        Self {
            orchestrator,
            counters: Mutex::new(GatewayRequestCounters::default()),
        }
    }

    fn record(&self, update: impl FnOnce(&mut GatewayRequestCounters)) {
        if let Ok(mut counters) = self.counters.lock() {
            update(&mut counters);
        }
    }

    fn counters_snapshot(&self) -> GatewayRequestCounters {
        self.counters
            .lock()
            .map(|counters| counters.clone())
            .unwrap_or_default()
    }
}
