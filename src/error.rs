use axum::{
    extract::rejection::JsonRejection,
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

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid quiz definition: {0}")]
    InvalidQuiz(String),

    #[error("Quiz unavailable: {0}")]
    QuizUnavailable(String),

    #[error("Submission failed: {0}")]
    Submission(String),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid request body: {0}")]
    JsonBody(#[from] JsonRejection),

    #[error("HTTP error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let (status, code, error_message) = match self {
            Error::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            Error::Validation(err) => (StatusCode::BAD_REQUEST, "validation", err.to_string()),
            Error::Json(err) => (StatusCode::BAD_REQUEST, "bad_request", err.to_string()),
            Error::JsonBody(rejection) => (rejection.status(), "bad_request", rejection.body_text()),
            Error::InvalidQuiz(msg) => (StatusCode::BAD_GATEWAY, "invalid_quiz", msg),
            Error::QuizUnavailable(msg) => (StatusCode::BAD_GATEWAY, "quiz_unavailable", msg),
            Error::Submission(msg) => (StatusCode::BAD_GATEWAY, "submission_failed", msg),
            Error::Reqwest(err) => (
                StatusCode::BAD_GATEWAY,
                "upstream",
                format!("External service error: {}", err),
            ),
            Error::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", msg),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
                "An unexpected error occurred".to_string(),
            ),
        };

        let body = Json(json!({ "error": error_message, "code": code }));
        (status, body).into_response()
    }
}
