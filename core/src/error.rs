//! Error taxonomy for admission control.
//!
//! Callers see three kinds of failure (see [`ErrorKind`]):
//!
//! - **Rejected**: no capacity, or the admission lock could not be obtained in
//!   time. Retry later or surface "sold out".
//! - **NotFound**: a looked-up resource or reservation does not exist. Not
//!   retryable. Admission never reports it: reserving an absent resource is
//!   indistinguishable from reserving a full one.
//! - **TransientInfrastructureFailure**: store or lock backend unreachable.
//!   Retry with backoff; never conflated with "no capacity".

use crate::lock::LockError;
use crate::types::ResourceId;
use thiserror::Error;

/// Errors raised by persistence collaborators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached (pool exhausted, connection refused)
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A statement failed
    #[error("Query failed: {0}")]
    Query(String),

    /// A row could not be mapped onto a domain type
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Why an admission attempt was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// `reserved_count` already equals `capacity`
    SoldOut,
    /// The admission lock was not obtained within the wait timeout
    LockUnavailable,
}

impl RejectReason {
    /// Stable label for logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SoldOut => "sold_out",
            Self::LockUnavailable => "lock_unavailable",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SoldOut => f.write_str("resource is sold out"),
            Self::LockUnavailable => f.write_str("could not acquire admission lock, please try again"),
        }
    }
}

/// Externally observable failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Capacity exhausted or lock unavailable
    Rejected,
    /// Referenced entity absent
    NotFound,
    /// Backend unreachable
    TransientInfrastructureFailure,
}

/// Errors returned by the admission controller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    /// The reservation was not admitted
    #[error("Reservation rejected for resource {resource_id}: {reason}")]
    Rejected {
        /// Resource that was asked for
        resource_id: ResourceId,
        /// Why it was rejected
        reason: RejectReason,
    },

    /// Persistence failure inside the critical section
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Lock backend failure (not a timeout)
    #[error(transparent)]
    Lock(#[from] LockError),
}

impl AdmissionError {
    /// Shorthand for a sold-out rejection.
    #[must_use]
    pub const fn sold_out(resource_id: ResourceId) -> Self {
        Self::Rejected {
            resource_id,
            reason: RejectReason::SoldOut,
        }
    }

    /// Shorthand for a lock-timeout rejection.
    #[must_use]
    pub const fn lock_unavailable(resource_id: ResourceId) -> Self {
        Self::Rejected {
            resource_id,
            reason: RejectReason::LockUnavailable,
        }
    }

    /// The externally observable kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Rejected { .. } => ErrorKind::Rejected,
            Self::Store(_) | Self::Lock(_) => ErrorKind::TransientInfrastructureFailure,
        }
    }

    /// Whether the caller may retry the same request later.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

impl ErrorKind {
    /// Whether a request failing with this kind may succeed on retry.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        !matches!(self, Self::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejections_collapse_into_one_kind() {
        let id = ResourceId::new();
        assert_eq!(AdmissionError::sold_out(id).kind(), ErrorKind::Rejected);
        assert_eq!(AdmissionError::lock_unavailable(id).kind(), ErrorKind::Rejected);
    }

    #[test]
    fn infrastructure_failures_are_distinct_from_rejections() {
        let err = AdmissionError::from(StoreError::Unavailable("pool timed out".to_string()));
        assert_eq!(err.kind(), ErrorKind::TransientInfrastructureFailure);
        assert!(err.is_retryable());

        let err = AdmissionError::from(LockError::Backend("connection reset".to_string()));
        assert_eq!(err.kind(), ErrorKind::TransientInfrastructureFailure);
    }

    #[test]
    fn only_not_found_is_final() {
        assert!(!ErrorKind::NotFound.is_retryable());
        assert!(ErrorKind::Rejected.is_retryable());
        assert!(AdmissionError::sold_out(ResourceId::new()).is_retryable());
    }
}
