use super::util::uid_as_bytes;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use sqlx::MySqlPool;

pub struct MySqlAuditLog {
    pool: MySqlPool,
}

impl MySqlAuditLog {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlAuditLog { pool }
    }
}

#[async_trait::async_trait]
impl AuditLog for MySqlAuditLog {
    async fn record_refresh_issued(
        &self,
        token_id: &TokenId,
        user_id: UserId,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        sqlx::query(
            r#"
INSERT INTO refresh_token_audit (token_id, user_id, expires_at, revoked)
VALUES (?, ?, ?, 0)
"#,
        )
        .bind(&token_id.0)
        .bind(uid_as_bytes(&user_id))
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::Store(e.to_string()))?;

        Ok(())
    }

    async fn mark_refresh_revoked(&self, token_id: &TokenId) -> Result<(), AuthError> {
        sqlx::query("UPDATE refresh_token_audit SET revoked = 1 WHERE token_id = ?")
            .bind(&token_id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;

        Ok(())
    }

    async fn mark_all_refresh_revoked(&self, user_id: UserId) -> Result<(), AuthError> {
        sqlx::query("UPDATE refresh_token_audit SET revoked = 1 WHERE user_id = ? AND revoked = 0")
            .bind(uid_as_bytes(&user_id))
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;

        Ok(())
    }

    async fn record_magic_link_issued(
        &self,
        link_id: &LinkId,
        user_id: UserId,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        sqlx::query(
            r#"
INSERT INTO magic_link_audit (link_id, user_id, expires_at, used)
VALUES (?, ?, ?, 0)
"#,
        )
        .bind(&link_id.0)
        .bind(uid_as_bytes(&user_id))
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::Store(e.to_string()))?;

        Ok(())
    }

    async fn mark_magic_link_used(&self, link_id: &LinkId) -> Result<(), AuthError> {
        sqlx::query("UPDATE magic_link_audit SET used = 1 WHERE link_id = ?")
            .bind(&link_id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;

        Ok(())
    }
}
