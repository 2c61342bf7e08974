use super::*;

pub(super) async fn handle_gateway_status(
    State(state): State<Arc<GatewayServerState>>,
) -> Response {
    (
        StatusCode::OK,
        Json(json!({
            "service": "docsum",
            "analyzer_backend": state.orchestrator.analyzer_backend(),
            "content_backend": state.orchestrator.content_backend(),
            "in_flight": state.orchestrator.in_flight(),
            "endpoints": {
                "analyze": ANALYZE_ENDPOINT,
                "files": FILES_ENDPOINT,
            },
            "counters": state.counters_snapshot(),
        })),
    )
        .into_response()
}
