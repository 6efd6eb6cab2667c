/// Error handling for the urtest server
///
/// Every handler returns [`ApiResult`]. Failures from the shared crate
/// convert into [`ApiError`] with `?`, which maps them to a status code and
/// a JSON body:
///
/// ```json
/// { "error": "validation_error", "message": "...", "details": [{ "field": "name", "message": "..." }] }
/// ```
///
/// `details` carries the field-level messages a form re-renders next to the
/// offending inputs.
///
/// # Example
///
/// ```
/// use urtest_api::error::{ApiError, ApiResult};
///
/// fn parse_size(raw: &str) -> ApiResult<i64> {
///     raw.trim()
///         .parse()
///         .map_err(|_| ApiError::field("size", "Enter a whole number."))
/// }
///
/// assert!(parse_size("12").is_ok());
/// assert!(parse_size("twelve").is_err());
/// ```

use axum::{
    extract::{multipart::MultipartError, rejection::FormRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use urtest_shared::{
    auth::{authorization::AuthzError, jwt::JwtError, password::PasswordError},
    models::{
        attachment::{BUG_FILE_NAME_CONSTRAINT, PROJECT_FILE_NAME_CONSTRAINT},
        project::PROJECT_NAME_CONSTRAINT,
        user::USERNAME_CONSTRAINT,
    },
    storage::StorageError,
};

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400), e.g. an unreadable multipart body
    BadRequest(String),

    /// Unauthorized (401), e.g. wrong username or password
    Unauthorized(String),

    /// Forbidden (403)
    Forbidden(String),

    /// Not found (404)
    NotFound(String),

    /// Conflict (409)
    Conflict(String),

    /// Unprocessable entity (422) with per-field messages
    ValidationError(Vec<ValidationErrorDetail>),

    /// Internal server error (500)
    InternalError(String),
}

/// Validation error detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Form field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "not_found", "forbidden")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl ApiError {
    /// Validation error for a single field
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        ApiError::ValidationError(vec![ValidationErrorDetail {
            field: field.to_string(),
            message: message.into(),
        }])
    }

    pub fn not_found(what: &str) -> Self {
        ApiError::NotFound(format!("{} not found", what))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::ValidationError(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                "Please correct the errors below".to_string(),
                Some(errors),
            ),
            ApiError::InternalError(msg) => {
                // Logged here, never shown to the client
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

/// Maps a unique-constraint name to the form field it protects
fn constraint_field(constraint: &str) -> Option<(&'static str, &'static str)> {
    match constraint {
        PROJECT_NAME_CONSTRAINT => Some(("name", "Project with this name already exists.")),
        USERNAME_CONSTRAINT => Some(("username", "User with this username already exists.")),
        PROJECT_FILE_NAME_CONSTRAINT | BUG_FILE_NAME_CONSTRAINT => {
            Some(("file", "A file with this name is already attached."))
        }
        _ => None,
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() {
                    if let Some((field, message)) = db_err.constraint().and_then(constraint_field) {
                        return ApiError::field(field, message);
                    }
                }

                if let Some(constraint) = db_err.constraint() {
                    return ApiError::Conflict(format!("Constraint violation: {}", constraint));
                }

                ApiError::InternalError(format!("Database error: {}", db_err))
            }
            _ => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

/// Field-level messages of a failed derive validation, ordered by field
pub fn validation_details(errors: &validator::ValidationErrors) -> Vec<ValidationErrorDetail> {
    let mut details: Vec<ValidationErrorDetail> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| ValidationErrorDetail {
                field: field.to_string(),
                message: error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "Invalid value.".to_string()),
            })
        })
        .collect();

    // HashMap order is unstable
    details.sort_by(|a, b| a.field.cmp(&b.field));
    details
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(validation_details(&errors))
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::DatabaseError(err) => ApiError::from(err),
            other => ApiError::Forbidden(other.to_string()),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}

/// Only token creation reaches handlers; invalid sessions are anonymous
impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        ApiError::InternalError(format!("Session token error: {}", err))
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(_) => ApiError::NotFound("File content is missing".to_string()),
            StorageError::AlreadyExists(_) => {
                ApiError::field("file", "A file with this name is already stored.")
            }
            StorageError::InvalidName(msg) => ApiError::field("file", msg),
            StorageError::Io(e) => ApiError::InternalError(format!("Storage error: {}", e)),
        }
    }
}

impl From<FormRejection> for ApiError {
    fn from(rejection: FormRejection) -> Self {
        ApiError::BadRequest(format!("Invalid form: {}", rejection.body_text()))
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::BadRequest(format!("Invalid upload: {}", err.body_text()))
    }
}
