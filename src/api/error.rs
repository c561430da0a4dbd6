use crate::errors::{DomainError, ServiceError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// One entry of the `{"errors": [...]}` body
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope<'a> {
    errors: &'a [ErrorBody],
}

/// Error returned by every handler
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    errors: Vec<ErrorBody>,
    validation: bool,
}

impl ApiError {
    fn single(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            errors: vec![ErrorBody {
                code: code.to_string(),
                message: message.into(),
                field: None,
            }],
            validation: false,
        }
    }

    pub fn bad_request(code: &str, message: impl Into<String>) -> Self {
        Self::single(StatusCode::BAD_REQUEST, code, message)
    }

    /// Validation failures answer 422 by default; some routes report them as 400
    pub fn with_validation_status(mut self, status: StatusCode) -> Self {
        if self.validation {
            self.status = status;
        }
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn errors(&self) -> &[ErrorBody] {
        &self.errors
    }
}

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::EntityNotFound(entity, id) => Self::single(
                StatusCode::NOT_FOUND,
                "not_found",
                format!("{} {} not found", entity, id),
            ),
            DomainError::InvalidIdentifier(id) => Self::single(
                StatusCode::NOT_FOUND,
                "not_found",
                format!("{} not found", id),
            ),
            DomainError::InvalidFilter(msg) => {
                Self::single(StatusCode::BAD_REQUEST, "invalid_filter", msg)
            }
            DomainError::ValidationFailed(errors) => Self {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                errors: errors
                    .iter()
                    .map(|e| ErrorBody {
                        code: e.code().to_string(),
                        message: e.to_string(),
                        field: Some(e.field().to_string()),
                    })
                    .collect(),
                validation: true,
            },
            DomainError::Rejected(msg) => Self::single(StatusCode::BAD_REQUEST, "rejected", msg),
            DomainError::Database(e) => {
                log::error!("[HTTP] Database error: {}", e);
                Self::single(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "Internal server error")
            }
            DomainError::Internal(msg) => {
                log::error!("[HTTP] Internal error: {}", msg);
                Self::single(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "Internal server error")
            }
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::Domain(e) => e.into(),
            ServiceError::Authentication(msg) => Self::single(StatusCode::UNAUTHORIZED, "unauthorized", msg),
            ServiceError::SessionExpired => {
                Self::single(StatusCode::UNAUTHORIZED, "unauthorized", "Session expired")
            }
            ServiceError::Configuration(msg) => {
                log::error!("[HTTP] Configuration error: {}", msg);
                Self::single(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "Internal server error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorEnvelope { errors: &self.errors });
        (self.status, body).into_response()
    }
}
