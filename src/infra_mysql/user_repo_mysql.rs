use super::util::{is_dup_key, uid_as_bytes, uid_from_bytes};
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

const SELECT_USER: &str = r#"
SELECT user_id, email, password_hash, name, avatar, provider, provider_id,
       email_verified, created_at
FROM user_account
"#;

pub struct MySqlUserRepo {
    pool: MySqlPool,
}

impl MySqlUserRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlUserRepo { pool }
    }

    fn row_to_record(row: MySqlRow) -> Result<UserRecord, AuthError> {
        let user_id_bytes: Vec<u8> = row
            .try_get("user_id")
            .map_err(|e| AuthError::Store(e.to_string()))?;
        let user_id = uid_from_bytes(&user_id_bytes)?;

        let email: String = row
            .try_get("email")
            .map_err(|e| AuthError::Store(e.to_string()))?;
        let email = Email::parse(&email)
            .map_err(|e| AuthError::Store(format!("stored email {email:?}: {e}")))?;

        let provider: String = row
            .try_get("provider")
            .map_err(|e| AuthError::Store(e.to_string()))?;
        let provider = provider.parse::<Provider>().map_err(AuthError::Store)?;

        let created_at: DateTime<Utc> = row
            .try_get("created_at")
            .map_err(|e| AuthError::Store(e.to_string()))?;

        Ok(UserRecord {
            user_id,
            email,
            password_hash: row
                .try_get("password_hash")
                .map_err(|e| AuthError::Store(e.to_string()))?,
            name: row
                .try_get("name")
                .map_err(|e| AuthError::Store(e.to_string()))?,
            avatar: row
                .try_get("avatar")
                .map_err(|e| AuthError::Store(e.to_string()))?,
            provider,
            provider_id: row
                .try_get("provider_id")
                .map_err(|e| AuthError::Store(e.to_string()))?,
            email_verified: row
                .try_get("email_verified")
                .map_err(|e| AuthError::Store(e.to_string()))?,
            created_at,
        })
    }

    async fn fetch_one_by_id(&self, user_id: UserId) -> Result<UserRecord, AuthError> {
        self.find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }
}

#[async_trait::async_trait]
impl UserRepo for MySqlUserRepo {
    async fn find_by_email(&self, email: &Email) -> Result<Option<UserRecord>, AuthError> {
        let row = sqlx::query(&format!("{SELECT_USER} WHERE email = ?"))
            .bind(email.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AuthError::Store(format!("query user by email: {e}")))?;

        row.map(Self::row_to_record).transpose()
    }

    async fn find_by_id(&self, user_id: UserId) -> Result<Option<UserRecord>, AuthError> {
        let row = sqlx::query(&format!("{SELECT_USER} WHERE user_id = ?"))
            .bind(uid_as_bytes(&user_id))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AuthError::Store(format!("query user by id: {e}")))?;

        row.map(Self::row_to_record).transpose()
    }

    async fn create(&self, user: NewUser) -> Result<UserRecord, AuthError> {
        let user_id = UserId::generate();

        sqlx::query(
            r#"
INSERT INTO user_account
    (user_id, email, password_hash, name, avatar, provider, provider_id, email_verified)
VALUES (?, ?, ?, ?, ?, ?, ?, ?)
"#,
        )
        .bind(uid_as_bytes(&user_id))
        .bind(user.email.as_str())
        .bind(user.password_hash.as_deref())
        .bind(user.name.as_deref())
        .bind(user.avatar.as_deref())
        .bind(user.provider.as_str())
        .bind(user.provider_id.as_deref())
        .bind(user.email_verified)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_dup_key(&e) {
                AuthError::UserExists
            } else {
                AuthError::Store(e.to_string())
            }
        })?;

        self.fetch_one_by_id(user_id).await
    }

    async fn update_email_verified(
        &self,
        user_id: UserId,
        verified: bool,
    ) -> Result<(), AuthError> {
        let result = sqlx::query("UPDATE user_account SET email_verified = ? WHERE user_id = ?")
            .bind(verified)
            .bind(uid_as_bytes(&user_id))
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;

        // MySQL reports changed rows, so an idempotent update can legitimately
        // touch zero of them.
        if result.rows_affected() == 0 && self.find_by_id(user_id).await?.is_none() {
            return Err(AuthError::UserNotFound);
        }
        Ok(())
    }

    async fn update_password_hash(
        &self,
        user_id: UserId,
        password_hash: &str,
    ) -> Result<(), AuthError> {
        let result = sqlx::query("UPDATE user_account SET password_hash = ? WHERE user_id = ?")
            .bind(password_hash)
            .bind(uid_as_bytes(&user_id))
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;

        if result.rows_affected() == 0 && self.find_by_id(user_id).await?.is_none() {
            return Err(AuthError::UserNotFound);
        }
        Ok(())
    }

    async fn update_profile(
        &self,
        user_id: UserId,
        update: &ProfileUpdate,
    ) -> Result<UserRecord, AuthError> {
        sqlx::query(
            "UPDATE user_account SET name = COALESCE(?, name), avatar = COALESCE(?, avatar) \
             WHERE user_id = ?",
        )
        .bind(update.name.as_deref())
        .bind(update.avatar.as_deref())
        .bind(uid_as_bytes(&user_id))
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::Store(e.to_string()))?;

        self.fetch_one_by_id(user_id).await
    }

    async fn link_provider(
        &self,
        user_id: UserId,
        provider: Provider,
        provider_id: &str,
        avatar: Option<&str>,
    ) -> Result<UserRecord, AuthError> {
        sqlx::query(
            r#"
UPDATE user_account
SET provider = ?, provider_id = ?, email_verified = 1, avatar = COALESCE(avatar, ?)
WHERE user_id = ?
"#,
        )
        .bind(provider.as_str())
        .bind(provider_id)
        .bind(avatar)
        .bind(uid_as_bytes(&user_id))
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::Store(e.to_string()))?;

        self.fetch_one_by_id(user_id).await
    }
}
