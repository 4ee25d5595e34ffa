use super::JwtCodec;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const REFRESH_TOKEN_PREFIX: &str = "refresh-token:";
const TOKEN_FAMILY_PREFIX: &str = "user-refresh-tokens:";

#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        TokenConfig {
            access_ttl: Duration::from_secs(15 * 60),
            refresh_ttl: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

pub struct RealTokenService {
    codec: JwtCodec,
    store: Arc<dyn RevocationStore>,
    audit_log: Arc<dyn AuditLog>,
    cfg: TokenConfig,
}

impl RealTokenService {
    pub fn new(
        codec: JwtCodec,
        store: Arc<dyn RevocationStore>,
        audit_log: Arc<dyn AuditLog>,
        cfg: TokenConfig,
    ) -> Self {
        Self {
            codec,
            store,
            audit_log,
            cfg,
        }
    }

    #[inline]
    fn refresh_key(token_id: &str) -> String {
        format!("{REFRESH_TOKEN_PREFIX}{token_id}")
    }

    #[inline]
    fn family_key(user_id: UserId) -> String {
        format!("{TOKEN_FAMILY_PREFIX}{user_id}")
    }

    fn sign(
        &self,
        user_id: UserId,
        email: &str,
        kind: TokenKind,
        jti: Option<TokenId>,
        ttl: Duration,
    ) -> Result<(String, DateTime<Utc>), CredentialError> {
        let iat_dt = Utc::now();
        let exp_dt = iat_dt + ttl;
        let claims = TokenClaims {
            sub: user_id,
            email: email.to_string(),
            kind,
            jti,
            iat: iat_dt.timestamp(),
            exp: exp_dt.timestamp(),
        };
        Ok((self.codec.sign(&claims)?, exp_dt))
    }

    /// Signature, kind, registration and ownership. Nothing is mutated.
    async fn check_refresh(&self, token: &str) -> Result<(TokenClaims, TokenId), CredentialError> {
        let claims: TokenClaims = self.codec.verify(token)?;
        if claims.kind != TokenKind::Refresh {
            return Err(CredentialError::WrongKind);
        }
        let token_id = claims.jti.clone().ok_or(CredentialError::Malformed)?;

        let key = Self::refresh_key(&token_id.0);
        let owner = self
            .store
            .get(&key)
            .await?
            .ok_or(CredentialError::NotFound)?;
        let owner = owner.parse::<UserId>().map_err(|e| StoreError::Corrupt {
            key,
            detail: e.to_string(),
        })?;
        if owner != claims.sub {
            return Err(CredentialError::OwnerMismatch);
        }
        Ok((claims, token_id))
    }

    /// Delete the registration. Only the caller whose delete actually removed
    /// the key wins; everyone else sees `NotFound`.
    async fn invalidate(&self, user_id: UserId, token_id: &TokenId) -> Result<(), CredentialError> {
        if !self
            .store
            .atomic_delete(&Self::refresh_key(&token_id.0))
            .await?
        {
            return Err(CredentialError::NotFound);
        }

        // The token is already dead; family membership is only bookkeeping.
        if let Err(e) = self
            .store
            .remove_from_set(&Self::family_key(user_id), &token_id.0)
            .await
        {
            warn!(error = %e, %token_id, "stale token id left in family set");
        }
        if let Err(e) = self.audit_log.mark_refresh_revoked(token_id).await {
            warn!(error = %e, %token_id, "audit: refresh revocation not recorded");
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl TokenService for RealTokenService {
    fn issue_access_token(
        &self,
        user_id: UserId,
        email: &str,
    ) -> Result<(AccessToken, DateTime<Utc>), AuthError> {
        let (token, exp_dt) =
            self.sign(user_id, email, TokenKind::Access, None, self.cfg.access_ttl)?;
        Ok((AccessToken(token), exp_dt))
    }

    async fn issue_refresh_token(
        &self,
        user_id: UserId,
        email: &str,
    ) -> Result<(RefreshToken, DateTime<Utc>), AuthError> {
        let token_id = TokenId::generate();
        let (token, exp_dt) = self.sign(
            user_id,
            email,
            TokenKind::Refresh,
            Some(token_id.clone()),
            self.cfg.refresh_ttl,
        )?;

        let key = Self::refresh_key(&token_id.0);
        let ttl_secs = self.cfg.refresh_ttl.as_secs().max(1);
        self.store
            .set_with_ttl(&key, &user_id.to_string(), ttl_secs)
            .await?;
        if let Err(e) = self
            .store
            .add_to_set(&Self::family_key(user_id), &token_id.0)
            .await
        {
            // A token outside its family would survive logout-all.
            if let Err(cleanup) = self.store.atomic_delete(&key).await {
                warn!(error = %cleanup, %token_id, "orphaned refresh registration");
            }
            return Err(e.into());
        }

        if let Err(e) = self
            .audit_log
            .record_refresh_issued(&token_id, user_id, exp_dt)
            .await
        {
            warn!(error = %e, %token_id, "audit: refresh issuance not recorded");
        }

        debug!(%user_id, %token_id, "refresh token issued");
        Ok((RefreshToken(token), exp_dt))
    }

    async fn issue_token_pair(
        &self,
        user_id: UserId,
        email: &str,
    ) -> Result<AuthTokens, AuthError> {
        let (access_token, access_exp) = self.issue_access_token(user_id, email)?;
        let (refresh_token, refresh_exp) = self.issue_refresh_token(user_id, email).await?;

        Ok(AuthTokens {
            access_token,
            refresh_token,
            access_token_expires_at: access_exp,
            refresh_token_expires_at: refresh_exp,
        })
    }

    fn verify_access_token(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let claims: TokenClaims = self.codec.verify(token)?;
        if claims.kind != TokenKind::Access {
            return Err(CredentialError::WrongKind.into());
        }
        Ok(claims)
    }

    async fn rotate_refresh_token(&self, token: &str) -> Result<AuthTokens, AuthError> {
        let (claims, token_id) = self.check_refresh(token).await?;
        self.invalidate(claims.sub, &token_id).await?;
        debug!(user_id = %claims.sub, %token_id, "refresh token rotated out");

        self.issue_token_pair(claims.sub, &claims.email).await
    }

    async fn revoke_refresh_token(&self, token: &str) -> Result<(), AuthError> {
        let (claims, token_id) = self.check_refresh(token).await?;
        self.invalidate(claims.sub, &token_id).await?;
        info!(user_id = %claims.sub, %token_id, "refresh token revoked");
        Ok(())
    }

    async fn revoke_all_for_subject(&self, user_id: UserId) -> Result<(), AuthError> {
        let family = Self::family_key(user_id);
        let members = self.store.members_of(&family).await?;

        let mut revoked = 0usize;
        for token_id in &members {
            if self.store.atomic_delete(&Self::refresh_key(token_id)).await? {
                revoked += 1;
            }
        }
        self.store.atomic_delete(&family).await?;

        if let Err(e) = self.audit_log.mark_all_refresh_revoked(user_id).await {
            warn!(error = %e, %user_id, "audit: family revocation not recorded");
        }

        info!(%user_id, revoked, "refresh token family revoked");
        Ok(())
    }
}
