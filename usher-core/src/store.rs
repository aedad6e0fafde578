use async_trait::async_trait;
use uuid::Uuid;

use crate::reservation::{Reservation, SeatKey};

/// Outcome of an insert-if-absent keyed by seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyExists,
}

/// Outcome of a delete conditioned on the stored reservation id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// A record exists under the key but carries a different reservation id.
    Mismatch,
    Absent,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed stored record at {key}: {detail}")]
    Corrupt { key: String, detail: String },
}

/// Durable key-value collaborator guarding seat ownership.
///
/// `conditional_insert` and `conditional_delete` must be linearizable per
/// seat key: for a fixed key, exactly one of any set of concurrent inserts
/// observes `Inserted`. Nothing here performs a blind overwrite; every
/// mutation is conditioned on absence or on an exact reservation-id match.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Insert the record under its seat key only if the key is absent.
    async fn conditional_insert(&self, reservation: &Reservation)
        -> Result<InsertOutcome, StoreError>;

    /// Delete the record under `key` only if its reservation id equals
    /// `expected`.
    async fn conditional_delete(
        &self,
        key: SeatKey,
        expected: Uuid,
    ) -> Result<DeleteOutcome, StoreError>;

    /// Point read of a seat key.
    async fn get(&self, key: SeatKey) -> Result<Option<Reservation>, StoreError>;

    /// Point read by reservation id.
    async fn find_reservation(
        &self,
        reservation_id: Uuid,
    ) -> Result<Option<Reservation>, StoreError>;

    /// All records currently held for a screening. Best-effort snapshot,
    /// not linearized with concurrent inserts.
    async fn scan_occupied(&self, screening_id: Uuid) -> Result<Vec<Reservation>, StoreError>;
}
