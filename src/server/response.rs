//! JSON error responses

use crate::ItemError;
use crate::error::{FieldError, ValidationErrors};
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::any::Any;
use tracing::{debug, error};

pub mod codes {
    pub const VALIDATION: &str = "validation_error";
    pub const MALFORMED: &str = "malformed_request";
    pub const NOT_FOUND: &str = "not_found";
    pub const INTERNAL: &str = "internal_error";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldError>,
}

/// Every non-success outcome an HTTP handler can produce
#[derive(Debug)]
pub enum ApiError {
    Validation(ValidationErrors),
    Malformed { status: StatusCode, message: String },
    NotFound(String),
    /// Details are logged, never returned
    Internal,
}

impl ApiError {
    /// Log the cause against the current request span and hide it from the client
    pub fn internal(cause: impl std::fmt::Display) -> Self {
        error!(error = %cause, "Internal error");
        Self::Internal
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Malformed { status, .. } => *status,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ItemError> for ApiError {
    fn from(err: ItemError) -> Self {
        match err {
            ItemError::Validation(errors) => Self::Validation(errors),
            ItemError::NotFound(id) => Self::NotFound(format!("Item {id} not found")),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::Validation(errors) => ApiErrorMessage {
                code: codes::VALIDATION,
                message: "Request validation failed".to_string(),
                fields: errors.errors().to_vec(),
            },
            Self::Malformed { status, message } => ApiErrorMessage {
                code: if status == StatusCode::UNPROCESSABLE_ENTITY {
                    codes::VALIDATION
                } else {
                    codes::MALFORMED
                },
                message,
                fields: Vec::new(),
            },
            Self::NotFound(message) => {
                debug!(%message, "Not found");
                ApiErrorMessage {
                    code: codes::NOT_FOUND,
                    message,
                    fields: Vec::new(),
                }
            }
            Self::Internal => ApiErrorMessage {
                code: codes::INTERNAL,
                message: "Internal server error".to_string(),
                fields: Vec::new(),
            },
        };
        (status, Json(ApiErrorBody { error: message })).into_response()
    }
}

/// Response for a handler that panicked; the payload is logged, not returned
pub fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");
    ApiError::internal(format!("handler panicked: {detail}")).into_response()
}
