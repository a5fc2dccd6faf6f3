//! Box Office binaries: configuration and process wiring.
//!
//! - `boxoffice-server`: HTTP API, optionally with an embedded finalization
//!   worker and pending sweeper
//! - `boxoffice-worker`: finalization worker and sweeper only
//!
//! Both binaries share [`config::Config`], [`wiring`] and [`shutdown`].

pub mod config;
pub mod shutdown;
pub mod telemetry;
pub mod wiring;

pub use config::Config;
