use prometheus::{IntCounter, Registry};

/// Counters for admission outcomes. Contention is counted rather than
/// logged as an error; the compensation counters are the anomaly signal for
/// a move whose old-seat release could not be confirmed.
pub struct AdmissionMetrics {
    pub claims_won: IntCounter,
    pub seat_conflicts: IntCounter,
    pub store_unavailable: IntCounter,
    pub compensation_superseded: IntCounter,
    pub compensation_retries: IntCounter,
    pub compensation_failed: IntCounter,
}

impl AdmissionMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        Ok(Self {
            claims_won: IntCounter::new(
                "usher_claims_won_total",
                "Claims that won seat ownership",
            )?,
            seat_conflicts: IntCounter::new(
                "usher_seat_conflicts_total",
                "Claims and moves that lost to an existing hold",
            )?,
            store_unavailable: IntCounter::new(
                "usher_store_unavailable_total",
                "Operations that hit an unavailable resource store",
            )?,
            compensation_superseded: IntCounter::new(
                "usher_compensation_superseded_total",
                "Move releases that found the old record superseded",
            )?,
            compensation_retries: IntCounter::new(
                "usher_compensation_retries_total",
                "Deferred release attempts for a move's old seat",
            )?,
            compensation_failed: IntCounter::new(
                "usher_compensation_failed_total",
                "Moves whose old seat could not be released within bounded retries",
            )?,
        })
    }

    pub fn register_on(&self, registry: &Registry) -> Result<(), prometheus::Error> {
        registry.register(Box::new(self.claims_won.clone()))?;
        registry.register(Box::new(self.seat_conflicts.clone()))?;
        registry.register(Box::new(self.store_unavailable.clone()))?;
        registry.register(Box::new(self.compensation_superseded.clone()))?;
        registry.register(Box::new(self.compensation_retries.clone()))?;
        registry.register(Box::new(self.compensation_failed.clone()))?;
        Ok(())
    }
}
