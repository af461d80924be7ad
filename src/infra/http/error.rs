use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use gatehouse_api_types::{ApiErrorBody, ApiErrorMessage};

use crate::application::backend::BackendError;
use crate::application::error::{ErrorReport, EvaluationError};

pub mod codes {
    pub const INVALID_IDENTITY: &str = "invalid_identity";
    pub const NOT_INITIALIZED: &str = "not_initialized";
    pub const SHUT_DOWN: &str = "shut_down";
    pub const BACKEND_UNAVAILABLE: &str = "backend_unavailable";
    pub const EVALUATION_FAILED: &str = "evaluation_failed";
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
    report: ErrorReport,
}

const REPORT_SOURCE: &str = "infra::http";

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        let report = ErrorReport::from_message(
            REPORT_SOURCE,
            status,
            format!("{code}: {}", hint.as_deref().unwrap_or(message)),
        );
        Self {
            status,
            code,
            message,
            hint,
            report,
        }
    }

    fn with_cause(mut self, cause: &EvaluationError) -> Self {
        self.report = ErrorReport::from_error(REPORT_SOURCE, self.status, cause);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl From<EvaluationError> for ApiError {
    fn from(err: EvaluationError) -> Self {
        let hint = Some(err.to_string());
        let api = match &err {
            EvaluationError::InvalidIdentity(_) => Self::new(
                StatusCode::BAD_REQUEST,
                codes::INVALID_IDENTITY,
                "Identity input is invalid",
                hint,
            ),
            EvaluationError::NotInitialized => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                codes::NOT_INITIALIZED,
                "Evaluation service is starting",
                None,
            ),
            EvaluationError::ShutDown => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                codes::SHUT_DOWN,
                "Evaluation service has shut down",
                None,
            ),
            EvaluationError::Backend(BackendError::Unavailable { .. }) => Self::new(
                StatusCode::BAD_GATEWAY,
                codes::BACKEND_UNAVAILABLE,
                "Evaluation backend unavailable",
                hint,
            ),
            EvaluationError::Backend(BackendError::EvaluationFailed { .. }) => Self::new(
                StatusCode::BAD_GATEWAY,
                codes::EVALUATION_FAILED,
                "Evaluation failed",
                hint,
            ),
        };
        api.with_cause(&err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        self.report.attach(&mut response);
        response
    }
}
