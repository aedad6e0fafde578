use std::time::Duration;

/// Timeout and retry policy shared by the store implementations and the
/// allocator's move compensation.
#[derive(Debug, Clone)]
pub struct AdmissionPolicy {
    /// Bound on every store round trip; expiry resolves to
    /// `StoreError::Unavailable` rather than hanging.
    pub store_timeout: Duration,
    /// Bounded attempts for releasing a move's old seat when the store is
    /// unavailable.
    pub release_retry_attempts: u32,
    /// Base delay between release retries, scaled by attempt number.
    pub release_retry_backoff: Duration,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(2),
            release_retry_attempts: 3,
            release_retry_backoff: Duration::from_millis(100),
        }
    }
}
