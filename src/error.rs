use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

/// One failed check on one request field.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Every failure the API can report, with its wire code and status.
///
/// Validation and ownership failures are resolved locally; collaborator
/// failures keep the collaborator's own code so callers can tell transient
/// unavailability from a permanent rejection.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("validation failed")]
    Validation(Vec<FieldError>),
    #[error("email already registered")]
    DuplicateEmail,
    #[error("invalid credentials")]
    InvalidCredentials { attempts_left: Option<i32> },
    #[error("account locked for {minutes_left} more minute(s)")]
    AccountLocked { minutes_left: i64 },
    #[error("invalid session token")]
    TokenInvalid,
    #[error("expired session token")]
    TokenExpired,
    #[error("invalid reset token")]
    InvalidResetToken,
    #[error("expired reset token")]
    ResetTokenExpired,
    #[error("password confirmation does not match")]
    PasswordMismatch,
    #[error("item not found")]
    ItemNotFound,
    #[error("image service unavailable: {0}")]
    CollaboratorUnavailable(String),
    #[error("image processing failed: {message}")]
    ProcessingFailed { code: String, message: String },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_)
            | ApiError::InvalidResetToken
            | ApiError::ResetTokenExpired
            | ApiError::PasswordMismatch
            | ApiError::ProcessingFailed { .. } => StatusCode::BAD_REQUEST,
            ApiError::InvalidCredentials { .. }
            | ApiError::TokenInvalid
            | ApiError::TokenExpired => StatusCode::UNAUTHORIZED,
            ApiError::AccountLocked { .. } => StatusCode::FORBIDDEN,
            ApiError::ItemNotFound => StatusCode::NOT_FOUND,
            ApiError::DuplicateEmail => StatusCode::CONFLICT,
            ApiError::CollaboratorUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::DuplicateEmail => "DUPLICATE_EMAIL",
            ApiError::InvalidCredentials { .. } => "INVALID_CREDENTIALS",
            ApiError::AccountLocked { .. } => "ACCOUNT_LOCKED",
            ApiError::TokenInvalid => "TOKEN_INVALID",
            ApiError::TokenExpired | ApiError::ResetTokenExpired => "TOKEN_EXPIRED",
            ApiError::InvalidResetToken => "INVALID_TOKEN",
            ApiError::PasswordMismatch => "PASSWORD_MISMATCH",
            ApiError::ItemNotFound => "ITEM_NOT_FOUND",
            ApiError::CollaboratorUnavailable(_) => "SERVICE_UNAVAILABLE",
            ApiError::ProcessingFailed { code, .. } => code,
            ApiError::Internal(_) => "SERVER_ERROR",
        }
    }

    /// Message exposed to the client. Internal errors are logged but never
    /// echoed back.
    fn public_message(&self) -> String {
        match self {
            ApiError::Validation(_) => "Validation failed".into(),
            ApiError::DuplicateEmail => "Email already registered".into(),
            ApiError::InvalidCredentials {
                attempts_left: Some(n),
            } => format!("Invalid email or password. {n} attempt(s) remaining before lockout"),
            ApiError::InvalidCredentials { attempts_left: None } => {
                "Invalid email or password".into()
            }
            ApiError::AccountLocked { minutes_left } => format!(
                "Account locked due to repeated failed logins. Try again in {minutes_left} minute(s)"
            ),
            ApiError::TokenInvalid => "Invalid or missing session token".into(),
            ApiError::TokenExpired => "Session token expired".into(),
            ApiError::InvalidResetToken => "Invalid or already used reset token".into(),
            ApiError::ResetTokenExpired => "Reset token expired. Please request a new one".into(),
            ApiError::PasswordMismatch => "Passwords do not match".into(),
            ApiError::ItemNotFound => "Item not found".into(),
            ApiError::CollaboratorUnavailable(detail) => {
                format!("Failed to connect to image processing service: {detail}")
            }
            ApiError::ProcessingFailed { message, .. } => message.clone(),
            ApiError::Internal(_) => "Internal server error".into(),
        }
    }
}

/// Wire shape of a failure. Validation reports every failing field in one
/// batched `fields` array, even when only one field failed; non-validation
/// codes omit the key entirely.
#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<Vec<FieldError>>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: ErrorDetail,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(e) = &self {
            error!(error = %e, "internal error");
        }
        let fields = match &self {
            ApiError::Validation(fields) => Some(fields.clone()),
            _ => None,
        };
        let body = ErrorBody {
            success: false,
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.public_message(),
                fields,
            },
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Standard success envelope: `{"success": true, "data": ...}` or
/// `{"success": true, "message": ...}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> Envelope<T> {
    pub fn data(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }
}

impl Envelope<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_the_contract() {
        assert_eq!(
            ApiError::Validation(vec![]).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::DuplicateEmail.status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::InvalidCredentials { attempts_left: None }.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::AccountLocked { minutes_left: 3 }.status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(ApiError::ItemNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::CollaboratorUnavailable("timeout".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::Internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn processing_failed_keeps_collaborator_code() {
        let err = ApiError::ProcessingFailed {
            code: "FILE_TOO_LARGE".into(),
            message: "File exceeds maximum size of 5MB".into(),
        };
        assert_eq!(err.code(), "FILE_TOO_LARGE");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.public_message(), "File exceeds maximum size of 5MB");
    }

    #[test]
    fn internal_error_message_is_not_leaked() {
        let err = ApiError::Internal(anyhow::anyhow!("db password wrong"));
        assert_eq!(err.public_message(), "Internal server error");
    }

    #[test]
    fn validation_envelope_carries_all_fields() {
        let err = ApiError::Validation(vec![
            FieldError::new("email", "Invalid email format"),
            FieldError::new("password", "Password must contain an uppercase letter"),
        ]);
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn envelope_serializes_without_empty_keys() {
        let json = serde_json::to_value(Envelope::data(42)).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"], 42);
        assert!(json.get("message").is_none());

        let json = serde_json::to_value(Envelope::message("done")).unwrap();
        assert_eq!(json["message"], "done");
        assert!(json.get("data").is_none());
    }
}
