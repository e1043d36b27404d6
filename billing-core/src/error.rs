use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::api::ApiError;
use crate::draft::state_machine::TransitionError;
use crate::draft::DraftError;

/// Problem with a single input field, addressed by its form path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// HTTP-facing error of the console API.
///
/// Every variant carries a message meant for the end user; underlying causes
/// are logged, not returned.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid data")]
    Validation(Vec<FieldError>),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {message}")]
    Conflict {
        message: String,
        field_errors: Vec<FieldError>,
    },

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn conflict(message: impl Into<String>) -> Self {
        AppError::Conflict {
            message: message.into(),
            field_errors: Vec::new(),
        }
    }

    pub fn field_conflict(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        AppError::Conflict {
            field_errors: vec![FieldError::new(field, message.clone())],
            message,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                let field = field.to_string();
                errs.iter().map(move |e| {
                    let message = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid value ({})", e.code));
                    FieldError::new(field.clone(), message)
                })
            })
            .collect();
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        AppError::Validation(fields)
    }
}

impl From<DraftError> for AppError {
    fn from(err: DraftError) -> Self {
        match err {
            DraftError::Validation(fields) => AppError::Validation(fields),
            DraftError::NoClientSelected => {
                AppError::Validation(vec![FieldError::new("header.id_cliente", err.to_string())])
            }
            DraftError::UnknownClient(_) => {
                AppError::Validation(vec![FieldError::new("header.id_cliente", err.to_string())])
            }
            DraftError::Amount(_) => {
                AppError::Validation(vec![FieldError::new("detalles", "The invoice amount is too large.")])
            }
            DraftError::ClientChanged { .. } => {
                AppError::conflict("The selected client changed during the credit check. Please run it again.")
            }
            DraftError::LineOutOfRange(_) => AppError::NotFound(err.to_string()),
            DraftError::Transition(TransitionError::Invalid { .. }) => AppError::BadRequest(err.to_string()),
            DraftError::Transition(_) | DraftError::LastLine | DraftError::TooManyLines | DraftError::EmptyTotal => {
                AppError::conflict(err.to_string())
            }
        }
    }
}

impl From<ApiError> for AppError {
    fn from(err: ApiError) -> Self {
        error!("Remote call failed: {}", err);
        match err.status() {
            Some(404) => AppError::NotFound("The requested record does not exist".to_string()),
            _ => AppError::Upstream("A remote service request failed. Please try again.".to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
            #[serde(skip_serializing_if = "Vec::is_empty")]
            field_errors: Vec<FieldError>,
        }

        let (status, message, field_errors) = match self {
            AppError::Validation(fields) => (StatusCode::UNPROCESSABLE_ENTITY, "Invalid data".to_string(), fields),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, Vec::new()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, Vec::new()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, Vec::new()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, Vec::new()),
            AppError::Conflict { message, field_errors } => (StatusCode::CONFLICT, message, field_errors),
            AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg, Vec::new()),
            AppError::Internal(err) => {
                error!("Internal error: {:#}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    Vec::new(),
                )
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: message,
                field_errors,
            }),
        )
            .into_response()
    }
}
