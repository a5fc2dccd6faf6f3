//! HTTP request handlers, organized by domain.

pub mod bookings;
pub mod events;
pub mod health;
pub mod reports;

pub use health::health_check;
