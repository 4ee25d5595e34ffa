use std::time::Duration;

/// TTL-capable key-value side store holding the authoritative revocation,
/// single-use and throttling state.
///
/// Every operation is atomic for the single key it touches. Nothing here is
/// atomic across keys; callers that touch several keys document the gap.
#[async_trait::async_trait]
pub trait RevocationStore: Send + Sync {
    async fn set_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Delete the key. Returns whether a value was actually removed, so two
    /// racing callers can tell which of them won.
    async fn atomic_delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Fetch and delete in one step. At most one caller observes the value.
    async fn take(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn add_to_set(&self, key: &str, member: &str) -> Result<(), StoreError>;

    async fn remove_from_set(&self, key: &str, member: &str) -> Result<(), StoreError>;

    async fn members_of(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Increment a counter, arming `ttl_secs` only on the 0 -> 1 transition so
    /// the window stays anchored to the first increment.
    async fn increment_with_ttl_on_first(&self, key: &str, ttl_secs: u64)
    -> Result<u64, StoreError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("unexpected value under {key}: {detail}")]
    Corrupt { key: String, detail: String },
}
