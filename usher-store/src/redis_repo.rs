use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use tokio::time::timeout;
use tracing::debug;
use uuid::Uuid;

use usher_core::reservation::{Reservation, SeatKey};
use usher_core::store::{DeleteOutcome, InsertOutcome, ResourceStore, StoreError};

// Insert-if-absent for a seat. The seat key is the uniqueness authority;
// the resv index rides in the same script so a point read by reservation id
// never observes a half-written claim.
const CLAIM_SCRIPT: &str = r#"
if redis.call("EXISTS", KEYS[1]) == 1 then
    return 0
end
redis.call("SET", KEYS[1], ARGV[1])
redis.call("SET", KEYS[2], ARGV[1])
return 1
"#;

// Delete-if-matching on the stored reservation id. Removes the index entry
// together with the seat key.
const RELEASE_SCRIPT: &str = r#"
local current = redis.call("GET", KEYS[1])
if not current then
    return -1
end
local record = cjson.decode(current)
if record.id ~= ARGV[1] then
    return 0
end
redis.call("DEL", KEYS[1])
redis.call("DEL", KEYS[2])
return 1
"#;

/// Redis-backed resource store. Seat ownership lives under
/// `seat:{screening_id}:{seat_number}` with the flat reservation record as
/// the value; `resv:{reservation_id}` carries the same record for point
/// reads by id. Redis executes commands single-threaded, which gives the
/// per-key linearizability the contract requires.
pub struct RedisStore {
    client: redis::Client,
    op_timeout: Duration,
}

impl RedisStore {
    pub fn new(connection_string: &str, op_timeout: Duration) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client, op_timeout })
    }

    fn seat_key(key: SeatKey) -> String {
        format!("seat:{}:{}", key.screening_id, key.seat_number)
    }

    fn resv_key(reservation_id: Uuid) -> String {
        format!("resv:{}", reservation_id)
    }

    /// Bound a store round trip; expiry resolves to `Unavailable` rather
    /// than hanging, with the write outcome unknown to the caller.
    async fn bounded<T>(
        &self,
        fut: impl Future<Output = redis::RedisResult<T>>,
    ) -> Result<T, StoreError> {
        match timeout(self.op_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(StoreError::Unavailable(e.to_string())),
            Err(_) => Err(StoreError::Unavailable(format!(
                "call exceeded {}ms",
                self.op_timeout.as_millis()
            ))),
        }
    }

    async fn connection(&self) -> Result<MultiplexedConnection, StoreError> {
        self.bounded(self.client.get_multiplexed_async_connection())
            .await
    }

    fn decode(key: &str, raw: &str) -> Result<Reservation, StoreError> {
        serde_json::from_str(raw).map_err(|e| StoreError::Corrupt {
            key: key.to_string(),
            detail: e.to_string(),
        })
    }
}

#[async_trait]
impl ResourceStore for RedisStore {
    async fn conditional_insert(
        &self,
        reservation: &Reservation,
    ) -> Result<InsertOutcome, StoreError> {
        let seat_key = Self::seat_key(reservation.seat_key());
        let payload = serde_json::to_string(reservation).map_err(|e| StoreError::Corrupt {
            key: seat_key.clone(),
            detail: e.to_string(),
        })?;

        let mut conn = self.connection().await?;
        let script = redis::Script::new(CLAIM_SCRIPT);
        let inserted: i64 = self
            .bounded(
                script
                    .key(&seat_key)
                    .key(Self::resv_key(reservation.id))
                    .arg(&payload)
                    .invoke_async(&mut conn),
            )
            .await?;

        if inserted == 1 {
            debug!("Claimed {}", seat_key);
            Ok(InsertOutcome::Inserted)
        } else {
            Ok(InsertOutcome::AlreadyExists)
        }
    }

    async fn conditional_delete(
        &self,
        key: SeatKey,
        expected: Uuid,
    ) -> Result<DeleteOutcome, StoreError> {
        let seat_key = Self::seat_key(key);
        let mut conn = self.connection().await?;
        let script = redis::Script::new(RELEASE_SCRIPT);
        let deleted: i64 = self
            .bounded(
                script
                    .key(&seat_key)
                    .key(Self::resv_key(expected))
                    .arg(expected.to_string())
                    .invoke_async(&mut conn),
            )
            .await?;

        match deleted {
            1 => {
                debug!("Released {}", seat_key);
                Ok(DeleteOutcome::Deleted)
            }
            0 => Ok(DeleteOutcome::Mismatch),
            _ => Ok(DeleteOutcome::Absent),
        }
    }

    async fn get(&self, key: SeatKey) -> Result<Option<Reservation>, StoreError> {
        let seat_key = Self::seat_key(key);
        let mut conn = self.connection().await?;
        let raw: Option<String> = self
            .bounded(redis::cmd("GET").arg(&seat_key).query_async(&mut conn))
            .await?;

        raw.map(|raw| Self::decode(&seat_key, &raw)).transpose()
    }

    async fn find_reservation(
        &self,
        reservation_id: Uuid,
    ) -> Result<Option<Reservation>, StoreError> {
        let resv_key = Self::resv_key(reservation_id);
        let mut conn = self.connection().await?;
        let raw: Option<String> = self
            .bounded(redis::cmd("GET").arg(&resv_key).query_async(&mut conn))
            .await?;

        raw.map(|raw| Self::decode(&resv_key, &raw)).transpose()
    }

    async fn scan_occupied(&self, screening_id: Uuid) -> Result<Vec<Reservation>, StoreError> {
        let pattern = format!("seat:{}:*", screening_id);
        let mut conn = self.connection().await?;

        let mut keys: Vec<String> = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = self
                .bounded(
                    redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(&pattern)
                        .arg("COUNT")
                        .arg(100)
                        .query_async(&mut conn),
                )
                .await?;
            keys.extend(batch);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let values: Vec<Option<String>> = self
            .bounded(redis::cmd("MGET").arg(&keys).query_async(&mut conn))
            .await?;

        let mut records = Vec::with_capacity(keys.len());
        for (key, raw) in keys.iter().zip(values) {
            // A key can vanish between SCAN and MGET; skip the hole.
            if let Some(raw) = raw {
                records.push(Self::decode(key, &raw)?);
            }
        }
        Ok(records)
    }
}
