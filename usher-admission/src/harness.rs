use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;
use uuid::Uuid;

use usher_core::reservation::Reservation;

use crate::allocator::{ClaimOutcome, CompensationStatus, MoveOutcome, SeatAllocator};
use crate::AdmissionError;

/// One screening the harness hammers on.
#[derive(Debug, Clone, Copy)]
pub struct ScreeningSlot {
    pub screening_id: Uuid,
    pub capacity: u32,
}

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub workers: usize,
    pub iterations_per_worker: usize,
    /// Probability an iteration attempts a move of a held reservation.
    pub move_ratio: f64,
    /// Probability an iteration releases a held reservation.
    pub release_ratio: f64,
    pub seed: u64,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            iterations_per_worker: 200,
            move_ratio: 0.3,
            release_ratio: 0.1,
            seed: 42,
        }
    }
}

/// Tally kept privately by one worker and merged after join; workers never
/// share a mutable counter.
#[derive(Debug, Clone, Default)]
pub struct WorkerReport {
    pub holder_id: Uuid,
    pub claims_won: usize,
    pub claims_lost: usize,
    pub moves_won: usize,
    pub moves_lost: usize,
    pub releases: usize,
    pub compensation_anomalies: usize,
    pub store_errors: usize,
}

#[derive(Debug)]
pub struct HarnessOutcome {
    pub reports: Vec<WorkerReport>,
    /// Every reservation the workers still believe they hold.
    pub held: Vec<Reservation>,
}

impl HarnessOutcome {
    pub fn total_claims_won(&self) -> usize {
        self.reports.iter().map(|r| r.claims_won).sum()
    }

    pub fn total_releases(&self) -> usize {
        self.reports.iter().map(|r| r.releases).sum()
    }

    /// Per-holder count of reservations still held, the replacement for the
    /// original shared tally map.
    pub fn held_by_holder(&self) -> HashMap<Uuid, usize> {
        let mut counts = HashMap::new();
        for r in &self.held {
            *counts.entry(r.holder_id).or_insert(0) += 1;
        }
        counts
    }

    /// True when no worker saw a store fault or compensation anomaly, which
    /// makes the strict bookkeeping cross-checks valid.
    pub fn clean(&self) -> bool {
        self.reports
            .iter()
            .all(|r| r.store_errors == 0 && r.compensation_anomalies == 0)
    }
}

#[derive(Debug)]
pub struct VerificationReport {
    pub violations: Vec<String>,
    pub active_total: usize,
}

/// Concurrent driver that exercises the uniqueness invariant: N independent
/// workers issuing randomized claim/move/release traffic over a shared
/// screening set, followed by invariant checks at quiescence. A validation
/// tool, not a production dependency.
pub struct AdmissionHarness {
    allocator: Arc<SeatAllocator>,
}

impl AdmissionHarness {
    pub fn new(allocator: Arc<SeatAllocator>) -> Self {
        Self { allocator }
    }

    pub async fn run(
        &self,
        screenings: &[ScreeningSlot],
        cfg: &HarnessConfig,
    ) -> HarnessOutcome {
        let mut handles = Vec::with_capacity(cfg.workers);
        for worker in 0..cfg.workers {
            let allocator = self.allocator.clone();
            let screenings = screenings.to_vec();
            let cfg = cfg.clone();
            let seed = cfg.seed.wrapping_add(worker as u64);
            handles.push(tokio::spawn(async move {
                worker_loop(allocator, screenings, cfg, seed).await
            }));
        }

        let mut reports = Vec::with_capacity(cfg.workers);
        let mut held = Vec::new();
        for handle in handles {
            // A worker task only ends by returning its state.
            if let Ok((report, mut worker_held)) = handle.await {
                reports.push(report);
                held.append(&mut worker_held);
            }
        }

        info!(
            "Harness finished: {} workers, {} holds outstanding",
            reports.len(),
            held.len()
        );
        HarnessOutcome { reports, held }
    }

    /// Check the uniqueness and conservation invariants at a quiescent
    /// point, plus (for clean runs) the bookkeeping cross-check between
    /// worker tallies and store contents.
    pub async fn verify(
        &self,
        screenings: &[ScreeningSlot],
        outcome: &HarnessOutcome,
    ) -> Result<VerificationReport, AdmissionError> {
        let ledger = self.allocator.ledger();
        let mut violations = Vec::new();
        let mut seen_ids = HashSet::new();
        let mut active_total = 0;

        for slot in screenings {
            let records = ledger.occupied_records(slot.screening_id).await?;
            let mut seats = HashSet::new();
            for record in &records {
                if record.screening_id != slot.screening_id {
                    violations.push(format!(
                        "record {} leaked across screenings",
                        record.id
                    ));
                }
                if record.seat_number < 1 || record.seat_number > slot.capacity {
                    violations.push(format!(
                        "record {} holds out-of-range seat {}",
                        record.id, record.seat_number
                    ));
                }
                if !seats.insert(record.seat_number) {
                    violations.push(format!(
                        "seat {} of screening {} held by more than one reservation",
                        record.seat_number, slot.screening_id
                    ));
                }
                if !seen_ids.insert(record.id) {
                    violations.push(format!(
                        "reservation id {} appears under two seat keys",
                        record.id
                    ));
                }
            }

            let occupied = ledger.list_occupied(slot.screening_id).await?;
            let active = ledger.count_active(slot.screening_id).await?;
            if active != occupied.len() {
                violations.push(format!(
                    "screening {}: {} active reservations but {} occupied seats",
                    slot.screening_id,
                    active,
                    occupied.len()
                ));
            }
            active_total += active;
        }

        if outcome.clean() {
            // A move retires exactly the hold it replaces, so outstanding
            // holds are wins minus releases.
            let expected_active = outcome.total_claims_won() - outcome.total_releases();
            if expected_active != active_total {
                violations.push(format!(
                    "bookkeeping mismatch: workers expect {} active holds, store has {}",
                    expected_active, active_total
                ));
            }
            for record in &outcome.held {
                if !seen_ids.contains(&record.id) {
                    violations.push(format!(
                        "worker holds reservation {} that the store does not",
                        record.id
                    ));
                }
            }
            if outcome.held.len() != active_total {
                violations.push(format!(
                    "workers hold {} reservations, store has {} active",
                    outcome.held.len(),
                    active_total
                ));
            }
        }

        Ok(VerificationReport {
            violations,
            active_total,
        })
    }
}

async fn worker_loop(
    allocator: Arc<SeatAllocator>,
    screenings: Vec<ScreeningSlot>,
    cfg: HarnessConfig,
    seed: u64,
) -> (WorkerReport, Vec<Reservation>) {
    let holder_id = Uuid::new_v4();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut held: Vec<Reservation> = Vec::new();
    let mut report = WorkerReport {
        holder_id,
        ..Default::default()
    };

    for _ in 0..cfg.iterations_per_worker {
        let roll: f64 = rng.gen();

        if roll < cfg.move_ratio && !held.is_empty() {
            let idx = rng.gen_range(0..held.len());
            let capacity = screenings
                .iter()
                .find(|s| s.screening_id == held[idx].screening_id)
                .map(|s| s.capacity)
                .unwrap_or(1);
            let new_seat = rng.gen_range(1..=capacity);

            match allocator.move_to(held[idx].id, new_seat).await {
                Ok(MoveOutcome::Moved {
                    reservation,
                    compensation,
                }) => {
                    report.moves_won += 1;
                    if compensation != CompensationStatus::Released {
                        report.compensation_anomalies += 1;
                    }
                    held[idx] = reservation;
                }
                Ok(MoveOutcome::SeatTaken) => report.moves_lost += 1,
                Err(_) => report.store_errors += 1,
            }
        } else if roll < cfg.move_ratio + cfg.release_ratio && !held.is_empty() {
            let idx = rng.gen_range(0..held.len());
            let reservation = held.swap_remove(idx);
            match allocator.release(reservation.id).await {
                Ok(_) => report.releases += 1,
                Err(_) => report.store_errors += 1,
            }
        } else {
            let slot = screenings[rng.gen_range(0..screenings.len())];
            let seat = rng.gen_range(1..=slot.capacity);
            match allocator.claim(slot.screening_id, seat, holder_id).await {
                Ok(ClaimOutcome::Won(reservation)) => {
                    report.claims_won += 1;
                    held.push(reservation);
                }
                Ok(ClaimOutcome::SeatTaken) => report.claims_lost += 1,
                Err(_) => report.store_errors += 1,
            }
        }
    }

    (report, held)
}
