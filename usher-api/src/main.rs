use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use usher_admission::{AdmissionMetrics, SeatAllocator, SeatLedger};
use usher_api::{app, AppState};
use usher_core::catalog::Catalog;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "usher_api=debug,usher_admission=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = usher_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Usher API on port {}", config.server.port);

    let policy = config.admission.policy();

    // Resource store (Redis)
    let store = usher_store::RedisStore::new(&config.redis.url, policy.store_timeout)
        .expect("Failed to open Redis client");

    // Catalog (Postgres)
    let db = usher_store::DbClient::new(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");
    let catalog: Arc<dyn Catalog> = Arc::new(usher_store::PgCatalog::new(db.pool.clone()));

    // Metrics
    let registry = Arc::new(prometheus::Registry::new());
    let metrics = Arc::new(AdmissionMetrics::new().expect("Failed to build metrics"));
    metrics
        .register_on(&registry)
        .expect("Failed to register metrics");

    let ledger = SeatLedger::new(Arc::new(store));
    let allocator = Arc::new(SeatAllocator::new(
        ledger,
        catalog.clone(),
        policy,
        metrics.clone(),
    ));

    // Seat event broadcast for the SSE stream
    let (seat_tx, _) = tokio::sync::broadcast::channel(256);

    let app = app(AppState {
        allocator,
        catalog,
        metrics,
        registry,
        seat_tx,
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
