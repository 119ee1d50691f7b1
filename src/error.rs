// HTTP API Error Types
use axum::{
    extract::rejection::{FormRejection, JsonRejection, PathRejection},
    http::{header, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};

use crate::api::FieldErrors;
use crate::services::ServiceError;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 404 Not Found
    NotFound(String),

    // 415 Unsupported Media Type
    UnsupportedMediaType(String),

    // 422 Unprocessable Entity (well-formed body, values out of bounds)
    UnprocessableEntity {
        message: String,
        field_errors: FieldErrors,
    },

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::UnprocessableEntity { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::Unauthorized(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::UnsupportedMediaType(msg) => msg,
            ApiError::UnprocessableEntity { message, .. } => message,
            ApiError::InternalServerError(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::UnsupportedMediaType(_) => "UNSUPPORTED_MEDIA_TYPE",
            ApiError::UnprocessableEntity { .. } => "VALIDATION_ERROR",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "error": true,
            "message": self.message(),
            "code": self.error_code()
        });
        if let ApiError::UnprocessableEntity { field_errors, .. } = self {
            body["field_errors"] = json!(field_errors);
        }
        body
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn validation(field_errors: FieldErrors) -> Self {
        ApiError::UnprocessableEntity {
            message: "Request validation failed".to_string(),
            field_errors,
        }
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound => ApiError::not_found("Note not found"),
            ServiceError::Validation(field_errors) => ApiError::validation(field_errors),
            ServiceError::DuplicateUsername(_) => ApiError::bad_request("Username already registered"),
            ServiceError::AuthenticationFailed => ApiError::unauthorized("Incorrect username or password"),
            ServiceError::Storage { operation, source } => {
                // Log the real error but return generic message
                tracing::error!("Error in {}: {}", operation, source);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
            ServiceError::Credential { operation, source } => {
                tracing::error!("Error in {}: {}", operation, source);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
        }
    }
}

fn body_error(detail: String) -> ApiError {
    let mut field_errors = FieldErrors::new();
    field_errors.insert("body".to_string(), detail);
    ApiError::validation(field_errors)
}

// Malformed request bodies: shape and type errors are 422, broken syntax 400
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(e) => body_error(e.body_text()),
            JsonRejection::JsonSyntaxError(e) => ApiError::bad_request(e.body_text()),
            JsonRejection::MissingJsonContentType(e) => ApiError::UnsupportedMediaType(e.body_text()),
            other => ApiError::bad_request(other.body_text()),
        }
    }
}

impl From<FormRejection> for ApiError {
    fn from(rejection: FormRejection) -> Self {
        match rejection {
            FormRejection::FailedToDeserializeForm(e) => body_error(e.body_text()),
            FormRejection::FailedToDeserializeFormBody(e) => body_error(e.body_text()),
            FormRejection::InvalidFormContentType(e) => ApiError::UnsupportedMediaType(e.body_text()),
            other => ApiError::bad_request(other.body_text()),
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let mut response = (self.status_code(), Json(self.to_json())).into_response();
        if matches!(self, ApiError::Unauthorized(_)) {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}
