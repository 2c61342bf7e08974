use super::*;

/// JSON error returned by every route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct GatewayApiError {
    pub(super) status: StatusCode,
    pub(super) code: &'static str,
    pub(super) message: String,
}

impl GatewayApiError {
    pub(super) fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub(super) fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }

    pub(super) fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, code, message)
    }

    pub(super) fn internal(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, code, message)
    }

    pub(super) fn missing_file_id() -> Self {
        Self::bad_request("invalid_file_id", "File ID missing")
    }
}

impl From<AnalysisError> for GatewayApiError {
    fn from(error: AnalysisError) -> Self {
        match error {
            AnalysisError::InvalidIdentity(DocumentIdError::Missing) => Self::missing_file_id(),
            AnalysisError::InvalidIdentity(inner) => {
                Self::bad_request("invalid_file_id", inner.to_string())
            }
            AnalysisError::NotFound(_) => Self::not_found("file_not_found", "File not found"),
            other => Self::internal("analysis_failed", format!("Analysis failed: {other}")),
        }
    }
}

impl IntoResponse for GatewayApiError {
    fn into_response(self) -> Response {
        let error_type = if self.status.is_client_error() {
            "invalid_request_error"
        } else {
            "server_error"
        };
        (
            self.status,
            Json(json!({
                "error": {
                    "type": error_type,
                    "code": self.code,
                    "message": self.message,
                }
            })),
        )
            .into_response()
    }
}

/// Per-process request counters reported by `/gateway/status`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub(super) struct GatewayRequestCounters {
    pub(super) analyze_requests: u64,
    pub(super) analyzed: u64,
    pub(super) already_analyzed: u64,
    pub(super) client_errors: u64,
    pub(super) failures: u64,
    pub(super) file_list_requests: u64,
}
