use super::*;

fn envelope_status_code(envelope: &AnalysisEnvelope) -> StatusCode {
    if envelope.is_cached() {
        StatusCode::ALREADY_REPORTED
    } else {
        StatusCode::OK
    }
}

pub(super) async fn handle_analyze(
    State(state): State<Arc<GatewayServerState>>,
    Path(id): Path<String>,
) -> Response {
    state.record(|counters| {
        counters.analyze_requests = counters.analyze_requests.saturating_add(1);
    });

    match state.orchestrator.analyze(&id).await {
        Ok(envelope) => {
            state.record(|counters| {
                if envelope.is_cached() {
                    counters.already_analyzed = counters.already_analyzed.saturating_add(1);
                } else {
                    counters.analyzed = counters.analyzed.saturating_add(1);
                }
            });
            (envelope_status_code(&envelope), Json(envelope)).into_response()
        }
        Err(error) => {
            let client_error = error.is_client_error();
            state.record(|counters| {
                if client_error {
                    counters.client_errors = counters.client_errors.saturating_add(1);
                } else {
                    counters.failures = counters.failures.saturating_add(1);
                }
            });
            GatewayApiError::from(error).into_response()
        }
    }
}

pub(super) async fn handle_analyze_missing_id(
    State(state): State<Arc<GatewayServerState>>,
) -> Response {
    state.record(|counters| {
        counters.analyze_requests = counters.analyze_requests.saturating_add(1);
        counters.client_errors = counters.client_errors.saturating_add(1);
    });
    GatewayApiError::missing_file_id().into_response()
}

pub(super) async fn handle_list_files(State(state): State<Arc<GatewayServerState>>) -> Response {
    state.record(|counters| {
        counters.file_list_requests = counters.file_list_requests.saturating_add(1);
    });

    match state.orchestrator.store().list_documents().await {
        Ok(documents) => (StatusCode::OK, Json(documents)).into_response(),
        Err(error) => {
            tracing::warn!(error = %error, "failed to list documents");
            state.record(|counters| {
                counters.failures = counters.failures.saturating_add(1);
            });
            GatewayApiError::internal("file_list_failed", format!("Failed to fetch files: {error}"))
                .into_response()
        }
    }
}
