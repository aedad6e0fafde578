use serde::Deserialize;
use std::env;
use std::time::Duration;
use usher_core::policy::AdmissionPolicy;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub admission: AdmissionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AdmissionConfig {
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
    #[serde(default = "default_retry_attempts")]
    pub release_retry_attempts: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub release_retry_backoff_ms: u64,
}

fn default_store_timeout_ms() -> u64 {
    2000
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    100
}

impl AdmissionConfig {
    pub fn policy(&self) -> AdmissionPolicy {
        AdmissionPolicy {
            store_timeout: Duration::from_millis(self.store_timeout_ms),
            release_retry_attempts: self.release_retry_attempts,
            release_retry_backoff: Duration::from_millis(self.release_retry_backoff_ms),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Add in the current environment file
            // Default to 'development' env
            // Note that this file is _optional_
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add in a local configuration file
            // This file shouldn't be checked in to git
            .add_source(config::File::with_name("config/local").required(false))
            // Add in settings from the environment (with a prefix of USHER)
            // Eg.. `USHER__SERVER__PORT=9000` would set the server port
            .add_source(config::Environment::with_prefix("USHER").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
