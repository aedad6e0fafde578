use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::reservation::Reservation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeatEventKind {
    Claimed,
    Moved,
    Released,
}

/// Broadcast on every reservation lifecycle change; consumed by the SSE
/// stream in the command surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatEvent {
    pub kind: SeatEventKind,
    pub screening_id: Uuid,
    pub seat_number: u32,
    pub reservation_id: Uuid,
    pub holder_id: Uuid,
    pub occurred_at: i64,
}

impl SeatEvent {
    pub fn claimed(reservation: &Reservation) -> Self {
        Self::from_reservation(SeatEventKind::Claimed, reservation)
    }

    pub fn moved(reservation: &Reservation) -> Self {
        Self::from_reservation(SeatEventKind::Moved, reservation)
    }

    pub fn released(reservation: &Reservation) -> Self {
        Self::from_reservation(SeatEventKind::Released, reservation)
    }

    fn from_reservation(kind: SeatEventKind, reservation: &Reservation) -> Self {
        Self {
            kind,
            screening_id: reservation.screening_id,
            seat_number: reservation.seat_number,
            reservation_id: reservation.id,
            holder_id: reservation.holder_id,
            occurred_at: chrono::Utc::now().timestamp(),
        }
    }
}
