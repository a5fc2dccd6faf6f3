//! HTTP transport for Box Office.
//!
//! Thin axum layer over [`boxoffice_runtime::ReservationService`]. Handlers
//! parse and validate input, call the service, and map domain errors onto
//! status codes through [`AppError`].
//!
//! # Example
//!
//! ```ignore
//! use boxoffice_web::{AppState, build_router};
//!
//! let app = build_router(AppState::new(service));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::AppError;
pub use routes::build_router;
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
