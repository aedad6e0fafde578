pub mod allocator;
pub mod harness;
pub mod ledger;
pub mod metrics;

pub use allocator::{
    ClaimOutcome, CompensationStatus, MoveOutcome, ReleaseOutcome, SeatAllocator,
};
pub use harness::{AdmissionHarness, HarnessConfig, ScreeningSlot};
pub use ledger::SeatLedger;
pub use metrics::AdmissionMetrics;

use uuid::Uuid;

use usher_core::catalog::CatalogError;
use usher_core::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    #[error("Screening not found: {0}")]
    ScreeningNotFound(Uuid),

    #[error("Seat {seat} is out of range for capacity {capacity}")]
    SeatOutOfRange { seat: u32, capacity: u32 },

    #[error("Reservation not found: {0}")]
    ReservationNotFound(Uuid),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("Malformed stored record: {0}")]
    CorruptRecord(String),
}

impl From<StoreError> for AdmissionError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(detail) => Self::StoreUnavailable(detail),
            StoreError::Corrupt { key, detail } => {
                Self::CorruptRecord(format!("{}: {}", key, detail))
            }
        }
    }
}

impl From<CatalogError> for AdmissionError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::Unavailable(detail) => Self::CatalogUnavailable(detail),
        }
    }
}
