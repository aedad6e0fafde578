pub mod app_config;
pub mod catalog_repo;
pub mod database;
pub mod memory;
pub mod redis_repo;

pub use catalog_repo::{MemoryCatalog, PgCatalog};
pub use database::DbClient;
pub use memory::MemoryStore;
pub use redis_repo::RedisStore;
