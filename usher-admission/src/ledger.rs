use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use usher_core::reservation::{Reservation, SeatKey};
use usher_core::store::{DeleteOutcome, InsertOutcome, ResourceStore, StoreError};

/// Outcome of a single claim attempt. Losing to an existing hold is a
/// normal outcome, not an error.
#[derive(Debug)]
pub enum ClaimAttempt {
    Won(Reservation),
    SeatTaken,
}

/// Outcome of a conditional release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseAttempt {
    Released,
    /// The seat is held, but under a different reservation id than the
    /// caller presented.
    NotHolder,
    AlreadyGone,
}

/// Single source of truth for seat ownership. Every mutation is one
/// conditional round trip to the store; uniqueness rests on the store's
/// per-key linearizability, never on an in-process lock or on a
/// read-then-write sequence.
#[derive(Clone)]
pub struct SeatLedger {
    store: Arc<dyn ResourceStore>,
}

impl SeatLedger {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self { store }
    }

    /// Attempt to claim a seat for a holder. Mints a fresh reservation and
    /// inserts it only if the seat key is currently absent.
    pub async fn try_claim(
        &self,
        screening_id: Uuid,
        seat_number: u32,
        holder_id: Uuid,
    ) -> Result<ClaimAttempt, StoreError> {
        let reservation = Reservation::new(holder_id, screening_id, seat_number);
        match self.store.conditional_insert(&reservation).await? {
            InsertOutcome::Inserted => {
                debug!(
                    "Seat {} of screening {} claimed as reservation {}",
                    seat_number, screening_id, reservation.id
                );
                Ok(ClaimAttempt::Won(reservation))
            }
            InsertOutcome::AlreadyExists => Ok(ClaimAttempt::SeatTaken),
        }
    }

    /// Release a seat only if it is still held under `reservation_id`,
    /// guarding against freeing a seat someone else re-claimed after the
    /// caller's view went stale.
    pub async fn try_release(
        &self,
        key: SeatKey,
        reservation_id: Uuid,
    ) -> Result<ReleaseAttempt, StoreError> {
        match self.store.conditional_delete(key, reservation_id).await? {
            DeleteOutcome::Deleted => {
                debug!(
                    "Seat {} of screening {} released from reservation {}",
                    key.seat_number, key.screening_id, reservation_id
                );
                Ok(ReleaseAttempt::Released)
            }
            DeleteOutcome::Mismatch => Ok(ReleaseAttempt::NotHolder),
            DeleteOutcome::Absent => Ok(ReleaseAttempt::AlreadyGone),
        }
    }

    pub async fn lookup(&self, reservation_id: Uuid) -> Result<Option<Reservation>, StoreError> {
        self.store.find_reservation(reservation_id).await
    }

    pub async fn get_seat(&self, key: SeatKey) -> Result<Option<Reservation>, StoreError> {
        self.store.get(key).await
    }

    /// Full records for a screening's occupied seats.
    pub async fn occupied_records(
        &self,
        screening_id: Uuid,
    ) -> Result<Vec<Reservation>, StoreError> {
        self.store.scan_occupied(screening_id).await
    }

    /// Occupied seat numbers for a screening. A best-effort snapshot: not
    /// linearized with concurrent claims, so callers treat it as advisory.
    pub async fn list_occupied(&self, screening_id: Uuid) -> Result<BTreeSet<u32>, StoreError> {
        let records = self.store.scan_occupied(screening_id).await?;
        Ok(records.into_iter().map(|r| r.seat_number).collect())
    }

    pub async fn count_active(&self, screening_id: Uuid) -> Result<usize, StoreError> {
        Ok(self.store.scan_occupied(screening_id).await?.len())
    }
}
