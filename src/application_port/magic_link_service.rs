use crate::application_port::AuthError;
use crate::domain_model::{Email, UserId};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct MagicLinkLogin {
    pub user_id: UserId,
    pub email: Email,
}

#[async_trait::async_trait]
pub trait MagicLinkService: Send + Sync {
    /// Provision the user on first touch, register a single-use link and mail
    /// it. A delivery failure is terminal for the attempt; the registered link
    /// simply expires.
    async fn send(&self, email: &str) -> Result<(), AuthError>;

    /// Redeem a link. Succeeds at most once per link, even under concurrent
    /// replays.
    async fn consume(&self, token: &str) -> Result<MagicLinkLogin, AuthError>;
}
