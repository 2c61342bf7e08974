//! Gateway server bootstrap and router wiring.

use super::*;

/// Binds `config.bind` and serves until Ctrl-C.
pub async fn run_gateway_server(config: GatewayServerConfig) -> Result<()> {
    let bind_addr = config
        .bind
        .parse::<SocketAddr>()
        .with_context(|| format!("invalid --bind '{}'", config.bind))?;

    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind gateway server on {bind_addr}"))?;
    let local_addr = listener
        .local_addr()
        .context("failed to resolve bound gateway server address")?;

    tracing::info!(
        addr = %local_addr,
        analyzer = config.orchestrator.analyzer_backend(),
        content = config.orchestrator.content_backend(),
        "gateway server listening"
    );

    let state = Arc::new(GatewayServerState::new(config.orchestrator));
    let app = build_gateway_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("gateway server exited unexpectedly")?;

    tracing::info!("gateway server stopped");
    Ok(())
}

pub fn build_gateway_router(state: Arc<GatewayServerState>) -> Router {
    Router::new()
        .route(ANALYZE_ENDPOINT, get(handle_analyze))
        .route(ANALYZE_COLLECTION_ENDPOINT, get(handle_analyze_missing_id))
        .route("/analyze/", get(handle_analyze_missing_id))
        .route(FILES_ENDPOINT, get(handle_list_files))
        .route(GATEWAY_STATUS_ENDPOINT, get(handle_gateway_status))
        .with_state(state)
}
