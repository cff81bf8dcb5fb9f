//! Error taxonomy shared by every layer and its mapping onto HTTP responses.

use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Coarse classification every domain error falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Validation,
    PermissionDenied,
    Unavailable,
}

impl ErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NotFound",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::Validation => "BadRequest",
            ErrorKind::PermissionDenied => "Forbidden",
            ErrorKind::Unavailable => "InternalServerError",
        }
    }

    pub fn status_code(self) -> StatusCode {
        match self {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
            ErrorKind::Unavailable => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_type: &str, message: &str) -> Self {
        Self {
            error: error_type.to_string(),
            message: message.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn not_found(message: &str) -> Self {
        Self::new("NotFound", message)
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new("BadRequest", message)
    }

    pub fn internal_error(message: &str) -> Self {
        Self::new("InternalServerError", message)
    }
}

/// Build the JSON error body for a classified error.
///
/// Backend failures are logged in full but only a generic message leaves the server.
pub fn error_response(kind: ErrorKind, message: &str) -> HttpResponse {
    let body = match kind {
        ErrorKind::Unavailable => {
            log::error!("request failed: {}", message);
            ErrorResponse::internal_error("The service could not complete the request")
        }
        other => ErrorResponse::new(other.label(), message),
    };
    HttpResponse::build(kind.status_code()).json(body)
}

/// Implements `actix_web::ResponseError` for an error type exposing `kind()`.
macro_rules! impl_response_error {
    ($ty:ty) => {
        impl actix_web::ResponseError for $ty {
            fn status_code(&self) -> actix_web::http::StatusCode {
                self.kind().status_code()
            }

            fn error_response(&self) -> actix_web::HttpResponse {
                $crate::error::error_response(self.kind(), &self.to_string())
            }
        }
    };
}

pub(crate) use impl_response_error;
