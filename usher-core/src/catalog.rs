use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Screening details the command surface joins onto reservations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningSummary {
    pub screening_id: Uuid,
    pub room_name: String,
    pub starts_at: DateTime<Utc>,
    pub capacity: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Catalog unavailable: {0}")]
    Unavailable(String),
}

/// Read-only collaborator owning rooms and screenings. The admission core
/// consults it before touching the ledger and never mutates it.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn screening_exists(&self, screening_id: Uuid) -> Result<bool, CatalogError>;

    /// Seat capacity of the screening's room, or `None` if the screening
    /// does not exist.
    async fn seat_capacity(&self, screening_id: Uuid) -> Result<Option<u32>, CatalogError>;

    /// Resolve human-entered room name and start time to a screening id.
    async fn resolve_screening(
        &self,
        room_name: &str,
        starts_at: DateTime<Utc>,
    ) -> Result<Option<Uuid>, CatalogError>;

    async fn screening_summary(
        &self,
        screening_id: Uuid,
    ) -> Result<Option<ScreeningSummary>, CatalogError>;
}
