//! Application state shared by the handlers.

use boxoffice_runtime::ReservationService;

/// State handed to every handler through `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    /// Admission, dispatch and read-side facade
    pub service: ReservationService,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub const fn new(service: ReservationService) -> Self {
        Self { service }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_is_clone_send_sync() {
        fn assert_bounds<T: Clone + Send + Sync + 'static>() {}
        assert_bounds::<AppState>();
    }
}
