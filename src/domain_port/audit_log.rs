use crate::application_port::*;
use crate::domain_model::*;
use chrono::{DateTime, Utc};

/// Durable forensic trail of refresh-token and magic-link lifecycles.
/// Write-only from this crate: nothing reads it back to decide access.
#[async_trait::async_trait]
pub trait AuditLog: Send + Sync {
    async fn record_refresh_issued(
        &self,
        token_id: &TokenId,
        user_id: UserId,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError>;

    async fn mark_refresh_revoked(&self, token_id: &TokenId) -> Result<(), AuthError>;

    async fn mark_all_refresh_revoked(&self, user_id: UserId) -> Result<(), AuthError>;

    async fn record_magic_link_issued(
        &self,
        link_id: &LinkId,
        user_id: UserId,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError>;

    async fn mark_magic_link_used(&self, link_id: &LinkId) -> Result<(), AuthError>;
}
