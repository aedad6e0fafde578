use std::sync::Arc;

use prometheus::Registry;
use tokio::sync::broadcast;

use usher_admission::{AdmissionMetrics, SeatAllocator};
use usher_core::catalog::Catalog;
use usher_core::events::SeatEvent;

#[derive(Clone)]
pub struct AppState {
    pub allocator: Arc<SeatAllocator>,
    pub catalog: Arc<dyn Catalog>,
    pub metrics: Arc<AdmissionMetrics>,
    pub registry: Arc<Registry>,
    pub seat_tx: broadcast::Sender<SeatEvent>,
}
