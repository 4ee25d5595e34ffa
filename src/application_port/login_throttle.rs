use crate::application_port::AuthError;

/// Failed password attempts per lower-cased identifier, in a window anchored
/// at the first failure.
#[async_trait::async_trait]
pub trait LoginThrottle: Send + Sync {
    async fn may_attempt(&self, identifier: &str) -> Result<bool, AuthError>;

    /// Returns the count after this failure.
    async fn record_failure(&self, identifier: &str) -> Result<u64, AuthError>;

    async fn clear(&self, identifier: &str) -> Result<(), AuthError>;
}
