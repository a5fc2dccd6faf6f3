//! Domain types for admission control.
//!
//! Value objects and entities shared by every crate in the workspace: the
//! capacity-bearing [`Resource`], the [`Reservation`] it owns, and the
//! read-only stats projections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a capacity-bearing resource (an event).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceId(Uuid);

impl ResourceId {
    /// Creates a new random `ResourceId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `ResourceId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ResourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a reservation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReservationId(Uuid);

impl ReservationId {
    /// Creates a new random `ReservationId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `ReservationId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ReservationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of whoever asked for the reservation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequesterId(Uuid);

impl RequesterId {
    /// Creates a new random `RequesterId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `RequesterId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequesterId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequesterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Resource
// ============================================================================

/// A finite-capacity unit of inventory.
///
/// Invariant: `reserved_count <= capacity` in every committed read.
/// `reserved_count` only ever moves through the conditional update in
/// [`AdmissionTransaction::try_reserve`](crate::capacity::AdmissionTransaction::try_reserve).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Resource identifier
    pub id: ResourceId,
    /// Human-readable title
    pub title: String,
    /// Maximum number of reservations
    pub capacity: u32,
    /// Reservations accepted so far
    pub reserved_count: u32,
}

/// Input for creating a resource.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewResource {
    /// Human-readable title
    pub title: String,
    /// Maximum number of reservations
    pub capacity: u32,
}

impl NewResource {
    /// Largest capacity a store accepts (the column is a signed 32-bit integer).
    pub const MAX_CAPACITY: u32 = i32::MAX.unsigned_abs();

    /// Create a new resource definition.
    #[must_use]
    pub fn new(title: impl Into<String>, capacity: u32) -> Self {
        Self {
            title: title.into(),
            capacity,
        }
    }
}

// ============================================================================
// Reservation
// ============================================================================

/// Lifecycle state of a reservation.
///
/// ```text
/// PENDING ──(worker success)──► FINALIZED
/// ```
///
/// FINALIZED is terminal. A failed finalization leaves the reservation PENDING.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    /// Accepted, ticket not yet issued
    Pending,
    /// Ticket issued
    Finalized,
}

impl ReservationStatus {
    /// Convert status to its storage representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Finalized => "FINALIZED",
        }
    }

    /// Parse status from its storage representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "FINALIZED" => Some(Self::Finalized),
            _ => None,
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One accepted unit of demand against a [`Resource`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Reservation identifier
    pub id: ReservationId,
    /// Owning resource
    pub resource_id: ResourceId,
    /// Who asked for it
    pub requester_id: RequesterId,
    /// Lifecycle state
    pub status: ReservationStatus,
    /// When the reservation was accepted
    pub created_at: DateTime<Utc>,
    /// When the ticket was issued
    pub finalized_at: Option<DateTime<Utc>>,
}

impl Reservation {
    /// Whether the reservation reached its terminal state.
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.status == ReservationStatus::Finalized
    }
}

/// Input for the ledger insert.
///
/// The id and timestamp are chosen by the caller so the insert needs no
/// round-trip to learn them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewReservation {
    /// Reservation identifier
    pub id: ReservationId,
    /// Owning resource
    pub resource_id: ResourceId,
    /// Who asked for it
    pub requester_id: RequesterId,
    /// Acceptance time
    pub created_at: DateTime<Utc>,
}

impl NewReservation {
    /// Build the PENDING reservation this insert will produce.
    #[must_use]
    pub fn into_pending(self) -> Reservation {
        Reservation {
            id: self.id,
            resource_id: self.resource_id,
            requester_id: self.requester_id,
            status: ReservationStatus::Pending,
            created_at: self.created_at,
            finalized_at: None,
        }
    }
}

// ============================================================================
// Read models
// ============================================================================

/// Per-resource counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceStats {
    /// Resource identifier
    pub resource_id: ResourceId,
    /// Maximum number of reservations
    pub capacity: u32,
    /// Reservations accepted so far
    pub reserved_count: u32,
    /// Reservations whose ticket was issued
    pub finalized_count: u64,
}

/// Totals across all resources.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverallReport {
    /// Sum of capacities
    pub total_capacity: u64,
    /// Sum of reserved counts
    pub total_reserved: u64,
    /// Number of finalized reservations
    pub total_finalized: u64,
}
