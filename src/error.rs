use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use sqlx::Error as SqlxError;
use std::path::PathBuf;
use thiserror::Error as ThisError;

/// Why a device failed to authenticate. Logged server-side only; callers
/// see one indistinguishable 401 for every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    UnknownDevice,
    CredentialMismatch,
}

impl std::fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthFailure::UnknownDevice => f.write_str("unknown device"),
            AuthFailure::CredentialMismatch => f.write_str("credential mismatch"),
        }
    }
}

#[derive(Debug, ThisError)]
pub enum MonitorError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Device authentication failed: {0}")]
    Authentication(AuthFailure),

    #[error("Device {0} is not active")]
    DeviceInactive(String),

    #[error("Device {0} is not assigned to a patient")]
    DeviceUnbound(String),

    #[error("Device {0} disappeared after authentication")]
    DeviceNotFound(String),

    #[error("Request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("Operator key missing or invalid")]
    OperatorUnauthorized,

    #[error("{resource} {id} not found")]
    NotFound { resource: &'static str, id: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] SqlxError),

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Failed to load model {name} from {path}: {reason}")]
    ModelLoad {
        name: &'static str,
        path: PathBuf,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Delivery to {recipient} failed: {reason}")]
    Delivery { recipient: String, reason: String },
}

impl MonitorError {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        MonitorError::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            MonitorError::Http(e) => {
                e.is_connect()
                    || e.is_timeout()
                    || e.status().is_some_and(|s| s.is_server_error())
            }
            MonitorError::Database(SqlxError::PoolTimedOut | SqlxError::Io(_)) => true,
            _ => false,
        }
    }
}

impl From<figment::Error> for MonitorError {
    fn from(e: figment::Error) -> Self {
        MonitorError::Config(Box::new(e))
    }
}

impl IntoResponse for MonitorError {
    fn into_response(self) -> axum::response::Response {
        let (status, code, message) = match &self {
            MonitorError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "INVALID_INPUT", msg.clone())
            }
            MonitorError::Authentication(_) => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Invalid device ID or API key.".to_string(),
            ),
            MonitorError::PayloadTooLarge { .. } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "PAYLOAD_TOO_LARGE",
                self.to_string(),
            ),
            MonitorError::OperatorUnauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Invalid or missing operator key.".to_string(),
            ),
            MonitorError::DeviceInactive(_) => (
                StatusCode::FORBIDDEN,
                "DEVICE_INACTIVE",
                "Device is not active.".to_string(),
            ),
            MonitorError::DeviceNotFound(_) => (
                StatusCode::NOT_FOUND,
                "DEVICE_NOT_FOUND",
                "Device not found.".to_string(),
            ),
            MonitorError::DeviceUnbound(_) => (
                StatusCode::CONFLICT,
                "DEVICE_UNBOUND",
                "Device is not assigned to a patient.".to_string(),
            ),
            MonitorError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string()),
            MonitorError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            MonitorError::Database(_)
            | MonitorError::Config(_)
            | MonitorError::ModelLoad { .. }
            | MonitorError::Io(_)
            | MonitorError::Json(_)
            | MonitorError::Http(_)
            | MonitorError::Delivery { .. } => {
                tracing::error!(error = %self, "request failed with internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred.".to_string(),
                )
            }
        };
        let body = ApiErrorBody {
            code: code.to_string(),
            message,
        };
        (status, Json(ApiErrorResponse { error: body })).into_response()
    }
}

/// Standardized API error response body
#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}
