//! Error types for web handlers.
//!
//! Bridges domain errors and HTTP responses through Axum's `IntoResponse`.
//!
//! | Domain error                         | Status |
//! |--------------------------------------|--------|
//! | `AdmissionError::Rejected`           | 409    |
//! | missing event or reservation         | 404    |
//! | `StoreError`, `LockError`            | 503    |
//! | request validation                   | 422    |

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use boxoffice_core::{AdmissionError, ErrorKind, StoreError};
use serde::Serialize;
use std::fmt;

/// Application error type for web handlers.
///
/// # Examples
///
/// ```ignore
/// async fn handler(Path(id): Path<Uuid>) -> Result<Json<Reservation>, AppError> {
///     let reservation = service.get_reservation(id).await?
///         .ok_or_else(|| AppError::not_found("Reservation", id))?;
///     Ok(Json(reservation))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Error code (for client error handling)
    code: &'static str,
    /// Internal error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(status: StatusCode, message: String, code: &'static str) -> Self {
        Self {
            status,
            message,
            code,
            source: None,
        }
    }

    /// Attach the underlying error for logging.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// HTTP status of this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }

    /// Create a 404 Not Found error.
    #[must_use]
    pub fn not_found(resource: impl fmt::Display, id: impl fmt::Display) -> Self {
        let (status, code) = status_for(ErrorKind::NotFound);
        Self::new(status, format!("{resource} with id {id} not found"), code)
    }

    /// Create a 422 Unprocessable Entity error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            message.into(),
            "VALIDATION_ERROR",
        )
    }

    /// Create a 503 Service Unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        let (status, code) = status_for(ErrorKind::TransientInfrastructureFailure);
        Self::new(status, message.into(), code)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            match &self.source {
                Some(source) => tracing::error!(
                    status = %self.status,
                    code = self.code,
                    message = %self.message,
                    error = %source,
                    "Request failed on infrastructure"
                ),
                None => tracing::error!(
                    status = %self.status,
                    code = self.code,
                    message = %self.message,
                    "Request failed on infrastructure"
                ),
            }
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
        };

        (self.status, Json(body)).into_response()
    }
}

/// HTTP status and error code for each externally observable kind.
const fn status_for(kind: ErrorKind) -> (StatusCode, &'static str) {
    match kind {
        ErrorKind::Rejected => (StatusCode::CONFLICT, "REJECTED"),
        ErrorKind::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        ErrorKind::TransientInfrastructureFailure => {
            (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE")
        }
    }
}

impl From<AdmissionError> for AppError {
    fn from(err: AdmissionError) -> Self {
        match err.kind() {
            ErrorKind::TransientInfrastructureFailure => {
                Self::unavailable("Reservation backend temporarily unavailable, retry later")
                    .with_source(err)
            }
            kind => {
                let (status, code) = status_for(kind);
                Self::new(status, err.to_string(), code)
            }
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        Self::unavailable("Storage temporarily unavailable, retry later").with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boxoffice_core::ResourceId;
    use boxoffice_core::lock::LockError;

    #[test]
    fn rejections_map_to_conflict_whatever_the_reason() {
        let id = ResourceId::new();
        for err in [AdmissionError::sold_out(id), AdmissionError::lock_unavailable(id)] {
            let app: AppError = err.into();
            assert_eq!(app.status(), StatusCode::CONFLICT);
            assert_eq!(app.code(), "REJECTED");
        }
    }

    #[test]
    fn missing_event_maps_to_not_found() {
        let id = ResourceId::new();
        let app = AppError::not_found("Event", id);
        assert_eq!(app.status(), StatusCode::NOT_FOUND);
        assert_eq!(app.to_string(), format!("[NOT_FOUND] Event with id {id} not found"));
    }

    #[test]
    fn infrastructure_failures_map_to_unavailable() {
        let lock: AppError = AdmissionError::Lock(LockError::Backend("down".into())).into();
        let store: AppError = StoreError::Unavailable("pool timed out".into()).into();
        assert_eq!(lock.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(store.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(std::error::Error::source(&store).is_some());
    }

    #[test]
    fn validation_is_unprocessable() {
        let err = AppError::validation("capacity must be at least 1");
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }
}
