use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

/// Itemized validation messages keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errs = Self::new();
        errs.add(field, message);
        errs
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Malformed, missing or out-of-policy input.
    #[error("{message}")]
    Validation { message: String, errors: FieldErrors },
    /// Bad credentials or token.
    #[error("{0}")]
    Auth(String),
    #[error("permission denied")]
    Forbidden,
    #[error("{0}")]
    NotFound(String),
    /// External fetch/decode failure while deriving image metadata.
    #[error("{0}")]
    Processing(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(message: impl Into<String>, errors: FieldErrors) -> Self {
        AppError::Validation {
            message: message.into(),
            errors,
        }
    }

    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        Self::validation("Validation failed.", FieldErrors::single(field, message))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } | AppError::Processing(_) => StatusCode::BAD_REQUEST,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(err.into())
    }
}

/// Body returned for every failed request.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (message, errors) = match self {
            AppError::Validation { message, errors } => {
                let errors = (!errors.is_empty()).then_some(errors);
                (message, errors)
            }
            AppError::Internal(e) => {
                error!(error = ?e, "internal error");
                ("An unexpected error occurred.".to_string(), None)
            }
            AppError::Forbidden => ("You do not have permission to perform this action.".into(), None),
            AppError::Auth(msg) | AppError::NotFound(msg) | AppError::Processing(msg) => {
                (msg, None)
            }
        };
        let body = ErrorBody {
            status: "error",
            message,
            errors,
        };
        (status, Json(body)).into_response()
    }
}
