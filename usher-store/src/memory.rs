use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use usher_core::reservation::{Reservation, SeatKey};
use usher_core::store::{DeleteOutcome, InsertOutcome, ResourceStore, StoreError};

/// In-memory resource store for tests and the admission harness. A single
/// mutex over both maps gives the per-key linearizability the contract
/// requires; the seat map is only ever inserted-if-absent or
/// deleted-on-match, mirroring the durable implementation.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    seats: HashMap<SeatKey, Reservation>,
    by_id: HashMap<Uuid, SeatKey>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of active reservations across all screenings.
    pub fn len(&self) -> usize {
        self.inner.lock().seats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().seats.is_empty()
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn conditional_insert(
        &self,
        reservation: &Reservation,
    ) -> Result<InsertOutcome, StoreError> {
        let mut inner = self.inner.lock();
        let key = reservation.seat_key();
        if inner.seats.contains_key(&key) {
            return Ok(InsertOutcome::AlreadyExists);
        }
        inner.seats.insert(key, reservation.clone());
        inner.by_id.insert(reservation.id, key);
        Ok(InsertOutcome::Inserted)
    }

    async fn conditional_delete(
        &self,
        key: SeatKey,
        expected: Uuid,
    ) -> Result<DeleteOutcome, StoreError> {
        let mut inner = self.inner.lock();
        let matches = match inner.seats.get(&key) {
            None => return Ok(DeleteOutcome::Absent),
            Some(record) => record.id == expected,
        };
        if !matches {
            return Ok(DeleteOutcome::Mismatch);
        }
        inner.seats.remove(&key);
        inner.by_id.remove(&expected);
        Ok(DeleteOutcome::Deleted)
    }

    async fn get(&self, key: SeatKey) -> Result<Option<Reservation>, StoreError> {
        Ok(self.inner.lock().seats.get(&key).cloned())
    }

    async fn find_reservation(
        &self,
        reservation_id: Uuid,
    ) -> Result<Option<Reservation>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .by_id
            .get(&reservation_id)
            .and_then(|key| inner.seats.get(key))
            .cloned())
    }

    async fn scan_occupied(&self, screening_id: Uuid) -> Result<Vec<Reservation>, StoreError> {
        Ok(self
            .inner
            .lock()
            .seats
            .values()
            .filter(|r| r.screening_id == screening_id)
            .cloned()
            .collect())
    }
}
