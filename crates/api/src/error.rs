use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dealflow_core::error::CoreError;
use dealflow_workflow::WorkflowError;
use serde::Serialize;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors; `BadRequest` carries request
/// bodies, paths and query strings that could not be parsed.
/// Every variant renders as `{ "error": message, "code": CODE }`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<WorkflowError> for AppError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::Core(core) => AppError::Core(core),
            WorkflowError::Persistence(db) => AppError::Database(db),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Core(CoreError::Validation(errors.to_string()))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

impl ErrorBody {
    fn new(code: &'static str, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code,
        }
    }

    /// A 500 whose details stay in the server log.
    fn internal(detail: &dyn std::fmt::Display) -> (StatusCode, Self) {
        tracing::error!(error = %detail, "Internal error");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Self::new("INTERNAL_ERROR", "An internal error occurred"),
        )
    }
}

fn classify_core(core: &CoreError) -> (StatusCode, ErrorBody) {
    let message = core.to_string();
    match core {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            ErrorBody::new("NOT_FOUND", format!("{entity} with id {id} not found")),
        ),
        CoreError::InvalidTransition { .. } => (
            StatusCode::BAD_REQUEST,
            ErrorBody::new("INVALID_TRANSITION", message),
        ),
        CoreError::ScoringRequired { .. } => (
            StatusCode::BAD_REQUEST,
            ErrorBody::new("SCORING_REQUIRED", message),
        ),
        CoreError::DealRejected { .. } => (
            StatusCode::BAD_REQUEST,
            ErrorBody::new("DEAL_REJECTED", message),
        ),
        CoreError::PartnerNotFound { .. } => (
            StatusCode::NOT_FOUND,
            ErrorBody::new("PARTNER_NOT_FOUND", message),
        ),
        CoreError::Validation(msg) => (
            StatusCode::BAD_REQUEST,
            ErrorBody::new("VALIDATION_ERROR", msg.as_str()),
        ),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, ErrorBody::new("CONFLICT", msg.as_str())),
        CoreError::Unauthorized(msg) => (
            StatusCode::UNAUTHORIZED,
            ErrorBody::new("UNAUTHORIZED", msg.as_str()),
        ),
        CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, ErrorBody::new("FORBIDDEN", msg.as_str())),
        CoreError::Internal(msg) => ErrorBody::internal(msg),
    }
}

/// `RowNotFound` is a 404 and a unique violation on a `uq_*` constraint is
/// a 409. Anything else from the database is a sanitized 500.
fn classify_sqlx(err: &sqlx::Error) -> (StatusCode, ErrorBody) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            ErrorBody::new("NOT_FOUND", "Resource not found"),
        ),
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
            match db_err.constraint().filter(|c| c.starts_with("uq_")) {
                Some(constraint) => (
                    StatusCode::CONFLICT,
                    ErrorBody::new(
                        "CONFLICT",
                        format!("Duplicate value violates unique constraint: {constraint}"),
                    ),
                ),
                None => ErrorBody::internal(db_err),
            }
        }
        other => ErrorBody::internal(other),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::Core(core) => classify_core(core),
            AppError::Database(err) => classify_sqlx(err),
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody::new("BAD_REQUEST", msg.as_str()),
            ),
        };
        (status, Json(body)).into_response()
    }
}
