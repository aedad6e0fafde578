use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use usher_core::catalog::{Catalog, CatalogError, ScreeningSummary};

/// Postgres-backed catalog over the external rooms/screenings schema. The
/// admission core only reads from it.
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal struct for type-safe querying
#[derive(sqlx::FromRow)]
struct SummaryRow {
    id: Uuid,
    name: String,
    starts_at: DateTime<Utc>,
    capacity: i32,
}

impl SummaryRow {
    fn into_summary(self) -> ScreeningSummary {
        ScreeningSummary {
            screening_id: self.id,
            room_name: self.name,
            starts_at: self.starts_at,
            capacity: self.capacity.max(0) as u32,
        }
    }
}

fn unavailable(e: sqlx::Error) -> CatalogError {
    CatalogError::Unavailable(e.to_string())
}

#[async_trait]
impl Catalog for PgCatalog {
    async fn screening_exists(&self, screening_id: Uuid) -> Result<bool, CatalogError> {
        let row: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM screenings WHERE id = $1")
            .bind(screening_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(row.is_some())
    }

    async fn seat_capacity(&self, screening_id: Uuid) -> Result<Option<u32>, CatalogError> {
        let row: Option<(i32,)> = sqlx::query_as(
            "SELECT r.capacity FROM rooms r JOIN screenings s ON s.room_id = r.id WHERE s.id = $1",
        )
        .bind(screening_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(row.map(|(capacity,)| capacity.max(0) as u32))
    }

    async fn resolve_screening(
        &self,
        room_name: &str,
        starts_at: DateTime<Utc>,
    ) -> Result<Option<Uuid>, CatalogError> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            "SELECT s.id FROM screenings s JOIN rooms r ON s.room_id = r.id \
             WHERE r.name = $1 AND s.starts_at = $2",
        )
        .bind(room_name)
        .bind(starts_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(row.map(|(id,)| id))
    }

    async fn screening_summary(
        &self,
        screening_id: Uuid,
    ) -> Result<Option<ScreeningSummary>, CatalogError> {
        let row: Option<SummaryRow> = sqlx::query_as(
            "SELECT s.id, r.name, s.starts_at, r.capacity \
             FROM screenings s JOIN rooms r ON s.room_id = r.id WHERE s.id = $1",
        )
        .bind(screening_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(row.map(SummaryRow::into_summary))
    }
}

/// Fixed in-memory catalog for tests and the harness. Populate it up front,
/// then share it read-only behind an `Arc`.
#[derive(Default)]
pub struct MemoryCatalog {
    screenings: HashMap<Uuid, ScreeningSummary>,
    by_slot: HashMap<(String, DateTime<Utc>), Uuid>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_screening(
        &mut self,
        room_name: &str,
        starts_at: DateTime<Utc>,
        capacity: u32,
    ) -> Uuid {
        let screening_id = Uuid::new_v4();
        self.screenings.insert(
            screening_id,
            ScreeningSummary {
                screening_id,
                room_name: room_name.to_string(),
                starts_at,
                capacity,
            },
        );
        self.by_slot
            .insert((room_name.to_string(), starts_at), screening_id);
        screening_id
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn screening_exists(&self, screening_id: Uuid) -> Result<bool, CatalogError> {
        Ok(self.screenings.contains_key(&screening_id))
    }

    async fn seat_capacity(&self, screening_id: Uuid) -> Result<Option<u32>, CatalogError> {
        Ok(self.screenings.get(&screening_id).map(|s| s.capacity))
    }

    async fn resolve_screening(
        &self,
        room_name: &str,
        starts_at: DateTime<Utc>,
    ) -> Result<Option<Uuid>, CatalogError> {
        Ok(self
            .by_slot
            .get(&(room_name.to_string(), starts_at))
            .copied())
    }

    async fn screening_summary(
        &self,
        screening_id: Uuid,
    ) -> Result<Option<ScreeningSummary>, CatalogError> {
        Ok(self.screenings.get(&screening_id).cloned())
    }
}
