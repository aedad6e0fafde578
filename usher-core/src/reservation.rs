use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The key space the ledger guards: one seat of one screening. Seats are
/// numbered from 1 up to the screening's capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeatKey {
    pub screening_id: Uuid,
    pub seat_number: u32,
}

impl SeatKey {
    pub fn new(screening_id: Uuid, seat_number: u32) -> Self {
        Self {
            screening_id,
            seat_number,
        }
    }
}

/// One active hold on a seat. A fresh id is minted for every successful
/// claim; moving seats retires this record and mints a new one. Ids are
/// never reused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub holder_id: Uuid,
    pub screening_id: Uuid,
    pub seat_number: u32,
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    pub fn new(holder_id: Uuid, screening_id: Uuid, seat_number: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            holder_id,
            screening_id,
            seat_number,
            created_at: Utc::now(),
        }
    }

    pub fn seat_key(&self) -> SeatKey {
        SeatKey::new(self.screening_id, self.seat_number)
    }
}
