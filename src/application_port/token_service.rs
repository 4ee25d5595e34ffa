use crate::application_port::AuthError;
use crate::domain_model::{TokenClaims, UserId};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct AccessToken(pub String);

#[derive(Debug, Clone, Serialize)]
pub struct RefreshToken(pub String);

#[derive(Debug, Clone, Serialize)]
pub struct AuthTokens {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
}

/// Issues, verifies, rotates and revokes access/refresh token pairs.
///
/// Access tokens are stateless. Refresh tokens are only honoured while their
/// id is registered in the revocation store under the same owner.
#[async_trait::async_trait]
pub trait TokenService: Send + Sync {
    /// Pure signing, no I/O.
    fn issue_access_token(
        &self,
        user_id: UserId,
        email: &str,
    ) -> Result<(AccessToken, DateTime<Utc>), AuthError>;

    /// Signs first, then registers the id; the token is only returned once the
    /// registration succeeded.
    async fn issue_refresh_token(
        &self,
        user_id: UserId,
        email: &str,
    ) -> Result<(RefreshToken, DateTime<Utc>), AuthError>;

    async fn issue_token_pair(&self, user_id: UserId, email: &str)
    -> Result<AuthTokens, AuthError>;

    fn verify_access_token(&self, token: &str) -> Result<TokenClaims, AuthError>;

    /// Exchange a live refresh token for a new pair. The old id is deleted
    /// before the new pair is minted; of two concurrent calls with the same
    /// token exactly one succeeds.
    async fn rotate_refresh_token(&self, token: &str) -> Result<AuthTokens, AuthError>;

    async fn revoke_refresh_token(&self, token: &str) -> Result<(), AuthError>;

    /// Revoke every refresh token of the subject that existed when the call
    /// started. Best effort: a token issued while the family is being
    /// enumerated can survive.
    async fn revoke_all_for_subject(&self, user_id: UserId) -> Result<(), AuthError>;
}
