use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

#[derive(Debug, Clone)]
pub struct AuditRow {
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
    /// `revoked` for refresh tokens, `used` for magic links.
    pub closed: bool,
}

#[derive(Default)]
pub struct MemoryAuditLog {
    refresh_tokens: DashMap<TokenId, AuditRow>,
    magic_links: DashMap<LinkId, AuditRow>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refresh_token(&self, token_id: &TokenId) -> Option<AuditRow> {
        self.refresh_tokens.get(token_id).map(|row| row.clone())
    }

    pub fn refresh_tokens_of(&self, user_id: UserId) -> Vec<(TokenId, AuditRow)> {
        self.refresh_tokens
            .iter()
            .filter(|row| row.user_id == user_id)
            .map(|row| (row.key().clone(), row.value().clone()))
            .collect()
    }

    pub fn magic_link(&self, link_id: &LinkId) -> Option<AuditRow> {
        self.magic_links.get(link_id).map(|row| row.clone())
    }
}

#[async_trait::async_trait]
impl AuditLog for MemoryAuditLog {
    async fn record_refresh_issued(
        &self,
        token_id: &TokenId,
        user_id: UserId,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        self.refresh_tokens.insert(
            token_id.clone(),
            AuditRow {
                user_id,
                expires_at,
                closed: false,
            },
        );
        Ok(())
    }

    async fn mark_refresh_revoked(&self, token_id: &TokenId) -> Result<(), AuthError> {
        if let Some(mut row) = self.refresh_tokens.get_mut(token_id) {
            row.closed = true;
        }
        Ok(())
    }

    async fn mark_all_refresh_revoked(&self, user_id: UserId) -> Result<(), AuthError> {
        self.refresh_tokens
            .iter_mut()
            .filter(|row| row.user_id == user_id)
            .for_each(|mut row| row.closed = true);
        Ok(())
    }

    async fn record_magic_link_issued(
        &self,
        link_id: &LinkId,
        user_id: UserId,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        self.magic_links.insert(
            link_id.clone(),
            AuditRow {
                user_id,
                expires_at,
                closed: false,
            },
        );
        Ok(())
    }

    async fn mark_magic_link_used(&self, link_id: &LinkId) -> Result<(), AuthError> {
        if let Some(mut row) = self.magic_links.get_mut(link_id) {
            row.closed = true;
        }
        Ok(())
    }
}
