use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The attempt or section is in the wrong status for the requested
    /// operation (e.g. pausing a timer that is not running).
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A prerequisite section has not been completed yet. The message names
    /// the first incomplete prerequisite.
    #[error("Section locked: {0}")]
    SectionLocked(String),

    #[error("Incomplete submission: {0}")]
    IncompleteSubmission(String),

    #[error("Duplicate submission: {0}")]
    DuplicateSubmission(String),

    #[error("Invalid question: {0}")]
    InvalidQuestion(String),

    /// Mutation attempted on data that has already been finalized.
    #[error("Already finalized: {0}")]
    Finalized(String),

    #[error("Interpretation unavailable: {0}")]
    InterpretationUnavailable(String),

    /// Scoring or persistence failure during completion; the completion
    /// transaction is rolled back and the attempt stays IN_PROGRESS.
    #[error("Dependency failure: {0}")]
    DependencyFailure(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),

    #[error("HTTP error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let (status, error_message) = match self {
            Error::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Error::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            Error::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Error::InvalidState(msg) => (StatusCode::BAD_REQUEST, msg),
            Error::SectionLocked(msg) => (StatusCode::FORBIDDEN, msg),
            Error::IncompleteSubmission(msg) => (StatusCode::BAD_REQUEST, msg),
            Error::DuplicateSubmission(msg) => (StatusCode::BAD_REQUEST, msg),
            Error::InvalidQuestion(msg) => (StatusCode::BAD_REQUEST, msg),
            Error::Finalized(msg) => (StatusCode::CONFLICT, msg),
            Error::InterpretationUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            Error::DependencyFailure(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            Error::Validation(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Error::Database(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            Error::Json(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Error::Reqwest(err) => (
                StatusCode::BAD_GATEWAY,
                format!("External service error: {}", err),
            ),
            Error::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            Error::Io(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            Error::Anyhow(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An unexpected error occurred".to_string(),
            ),
        };

        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::NotFound("Resource not found".to_string()),
            other => Error::Database(other),
        }
    }
}
