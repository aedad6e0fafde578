use std::sync::Arc;

use tokio::time::sleep;
use tracing::{error, info, warn};
use uuid::Uuid;

use usher_core::catalog::Catalog;
use usher_core::policy::AdmissionPolicy;
use usher_core::reservation::Reservation;
use usher_core::store::StoreError;

use crate::ledger::{ClaimAttempt, ReleaseAttempt, SeatLedger};
use crate::metrics::AdmissionMetrics;
use crate::AdmissionError;

#[derive(Debug)]
pub enum ClaimOutcome {
    Won(Reservation),
    SeatTaken,
}

/// What happened to the old seat of a successful move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompensationStatus {
    /// Old seat released in-line.
    Released,
    /// The old record no longer matched; a concurrent actor superseded it.
    /// Surfaced as an anomaly, the new seat stands.
    Superseded,
    /// Store was unavailable; the release was handed to the bounded
    /// background retry loop.
    PendingRetry,
}

#[derive(Debug)]
pub enum MoveOutcome {
    Moved {
        reservation: Reservation,
        compensation: CompensationStatus,
    },
    SeatTaken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Released,
    /// The id was no longer active; releasing it again is a no-op success.
    AlreadyReleased,
}

/// Operation surface for callers. Orchestrates the ledger, validates
/// against the catalog, and owns the compensation policy for moves. Never
/// caches reservation state across calls: every decision is a fresh
/// read or conditional write.
pub struct SeatAllocator {
    ledger: SeatLedger,
    catalog: Arc<dyn Catalog>,
    policy: AdmissionPolicy,
    metrics: Arc<AdmissionMetrics>,
}

impl SeatAllocator {
    pub fn new(
        ledger: SeatLedger,
        catalog: Arc<dyn Catalog>,
        policy: AdmissionPolicy,
        metrics: Arc<AdmissionMetrics>,
    ) -> Self {
        Self {
            ledger,
            catalog,
            policy,
            metrics,
        }
    }

    pub fn ledger(&self) -> &SeatLedger {
        &self.ledger
    }

    /// Attempt to claim a seat. Returns a definitive outcome; losing the
    /// seat is not an error, and retrying with a different seat is the
    /// caller's decision, never done internally.
    pub async fn claim(
        &self,
        screening_id: Uuid,
        seat_number: u32,
        holder_id: Uuid,
    ) -> Result<ClaimOutcome, AdmissionError> {
        self.validate_seat(screening_id, seat_number).await?;

        match self
            .ledger
            .try_claim(screening_id, seat_number, holder_id)
            .await
            .map_err(|e| self.store_err(e))?
        {
            ClaimAttempt::Won(reservation) => {
                self.metrics.claims_won.inc();
                Ok(ClaimOutcome::Won(reservation))
            }
            ClaimAttempt::SeatTaken => {
                self.metrics.seat_conflicts.inc();
                Ok(ClaimOutcome::SeatTaken)
            }
        }
    }

    /// Move an active reservation to a new seat of the same screening.
    ///
    /// Claim-then-release: the new seat is claimed first, so no instant
    /// exists where the holder has given up the old seat without having won
    /// the new one. If the new claim loses, the move aborts with the old
    /// reservation untouched. The holder may transiently hold both seats
    /// until the old one is released.
    pub async fn move_to(
        &self,
        reservation_id: Uuid,
        new_seat_number: u32,
    ) -> Result<MoveOutcome, AdmissionError> {
        let current = self
            .ledger
            .lookup(reservation_id)
            .await
            .map_err(|e| self.store_err(e))?
            .ok_or(AdmissionError::ReservationNotFound(reservation_id))?;

        self.validate_seat(current.screening_id, new_seat_number)
            .await?;

        let new_reservation = match self
            .ledger
            .try_claim(current.screening_id, new_seat_number, current.holder_id)
            .await
            .map_err(|e| self.store_err(e))?
        {
            ClaimAttempt::Won(reservation) => reservation,
            ClaimAttempt::SeatTaken => {
                self.metrics.seat_conflicts.inc();
                return Ok(MoveOutcome::SeatTaken);
            }
        };

        self.metrics.claims_won.inc();
        let compensation = self.release_old_seat(&current).await;
        Ok(MoveOutcome::Moved {
            reservation: new_reservation,
            compensation,
        })
    }

    /// Release a reservation by id. Idempotent: releasing an id that is no
    /// longer active is a no-op success, not an error.
    pub async fn release(&self, reservation_id: Uuid) -> Result<ReleaseOutcome, AdmissionError> {
        let current = match self
            .ledger
            .lookup(reservation_id)
            .await
            .map_err(|e| self.store_err(e))?
        {
            Some(r) => r,
            None => return Ok(ReleaseOutcome::AlreadyReleased),
        };

        match self
            .ledger
            .try_release(current.seat_key(), reservation_id)
            .await
            .map_err(|e| self.store_err(e))?
        {
            ReleaseAttempt::Released => Ok(ReleaseOutcome::Released),
            // The seat key moved on without us; the id is inactive either way.
            ReleaseAttempt::NotHolder | ReleaseAttempt::AlreadyGone => {
                Ok(ReleaseOutcome::AlreadyReleased)
            }
        }
    }

    pub async fn get(&self, reservation_id: Uuid) -> Result<Reservation, AdmissionError> {
        self.ledger
            .lookup(reservation_id)
            .await
            .map_err(|e| self.store_err(e))?
            .ok_or(AdmissionError::ReservationNotFound(reservation_id))
    }

    /// Seat numbers currently free. A point-in-time snapshot, explicitly
    /// not a reservation guarantee: a claim issued afterwards can still
    /// report the seat taken.
    pub async fn list_available(&self, screening_id: Uuid) -> Result<Vec<u32>, AdmissionError> {
        let capacity = self
            .catalog
            .seat_capacity(screening_id)
            .await?
            .ok_or(AdmissionError::ScreeningNotFound(screening_id))?;
        let occupied = self
            .ledger
            .list_occupied(screening_id)
            .await
            .map_err(|e| self.store_err(e))?;
        Ok((1..=capacity).filter(|n| !occupied.contains(n)).collect())
    }

    pub async fn count_active(&self, screening_id: Uuid) -> Result<usize, AdmissionError> {
        self.ledger
            .count_active(screening_id)
            .await
            .map_err(|e| self.store_err(e))
    }

    async fn validate_seat(
        &self,
        screening_id: Uuid,
        seat_number: u32,
    ) -> Result<(), AdmissionError> {
        if !self.catalog.screening_exists(screening_id).await? {
            return Err(AdmissionError::ScreeningNotFound(screening_id));
        }
        let capacity = self
            .catalog
            .seat_capacity(screening_id)
            .await?
            .ok_or(AdmissionError::ScreeningNotFound(screening_id))?;
        if seat_number < 1 || seat_number > capacity {
            return Err(AdmissionError::SeatOutOfRange {
                seat: seat_number,
                capacity,
            });
        }
        Ok(())
    }

    async fn release_old_seat(&self, old: &Reservation) -> CompensationStatus {
        match self.ledger.try_release(old.seat_key(), old.id).await {
            Ok(ReleaseAttempt::Released) => CompensationStatus::Released,
            Ok(ReleaseAttempt::NotHolder) | Ok(ReleaseAttempt::AlreadyGone) => {
                warn!(
                    "Old reservation {} at seat {} of screening {} was superseded before release",
                    old.id, old.seat_number, old.screening_id
                );
                self.metrics.compensation_superseded.inc();
                CompensationStatus::Superseded
            }
            Err(e) => {
                if matches!(e, StoreError::Unavailable(_)) {
                    self.metrics.store_unavailable.inc();
                }
                warn!(
                    "Releasing old reservation {} failed ({}), scheduling deferred release",
                    old.id, e
                );
                self.spawn_release_retry(old.clone());
                CompensationStatus::PendingRetry
            }
        }
    }

    /// Bounded background retries for an old seat whose release hit an
    /// unavailable store. Exhaustion is surfaced as an anomaly, never
    /// swallowed: an unreleased old seat is a latent double-occupancy bug.
    fn spawn_release_retry(&self, old: Reservation) {
        let ledger = self.ledger.clone();
        let metrics = self.metrics.clone();
        let attempts = self.policy.release_retry_attempts;
        let backoff = self.policy.release_retry_backoff;

        tokio::spawn(async move {
            for attempt in 1..=attempts {
                sleep(backoff * attempt).await;
                metrics.compensation_retries.inc();
                match ledger.try_release(old.seat_key(), old.id).await {
                    Ok(ReleaseAttempt::Released) => {
                        info!(
                            "Deferred release of reservation {} succeeded on attempt {}",
                            old.id, attempt
                        );
                        return;
                    }
                    Ok(_) => {
                        // Superseded while we were retrying; no longer ours
                        // to free.
                        metrics.compensation_superseded.inc();
                        warn!(
                            "Old reservation {} was superseded during deferred release",
                            old.id
                        );
                        return;
                    }
                    Err(e) => {
                        warn!(
                            "Deferred release attempt {} for reservation {} failed: {}",
                            attempt, old.id, e
                        );
                    }
                }
            }
            metrics.compensation_failed.inc();
            error!(
                "Could not release old reservation {} after {} attempts; seat {} of screening {} may stay occupied",
                old.id, attempts, old.seat_number, old.screening_id
            );
        });
    }

    fn store_err(&self, e: StoreError) -> AdmissionError {
        if matches!(e, StoreError::Unavailable(_)) {
            self.metrics.store_unavailable.inc();
        }
        AdmissionError::from(e)
    }
}
