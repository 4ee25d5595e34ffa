use crate::application_port::*;
use crate::domain_model::*;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct UserRecord {
    pub user_id: UserId,
    pub email: Email,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub provider: Provider,
    pub provider_id: Option<String>,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: Email,
    pub password_hash: Option<String>,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub provider: Provider,
    pub provider_id: Option<String>,
    pub email_verified: bool,
}

impl NewUser {
    /// A bare account created on first touch, e.g. by a magic-link request.
    pub fn provisioned(email: Email, provider: Provider) -> Self {
        NewUser {
            email,
            password_hash: None,
            name: None,
            avatar: None,
            provider,
            provider_id: None,
            email_verified: false,
        }
    }
}

/// Self-service profile edit. `None` leaves the field as it is.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub avatar: Option<String>,
}

#[async_trait::async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_email(&self, email: &Email) -> Result<Option<UserRecord>, AuthError>;

    async fn find_by_id(&self, user_id: UserId) -> Result<Option<UserRecord>, AuthError>;

    /// Fails with `AuthError::UserExists` when the email is already taken.
    async fn create(&self, user: NewUser) -> Result<UserRecord, AuthError>;

    /// Idempotent.
    async fn update_email_verified(&self, user_id: UserId, verified: bool)
    -> Result<(), AuthError>;

    async fn update_password_hash(&self, user_id: UserId, password_hash: &str)
    -> Result<(), AuthError>;

    async fn update_profile(
        &self,
        user_id: UserId,
        update: &ProfileUpdate,
    ) -> Result<UserRecord, AuthError>;

    /// Switch the account to an external provider. Marks the email verified and
    /// keeps an existing avatar over the provider's one.
    async fn link_provider(
        &self,
        user_id: UserId,
        provider: Provider,
        provider_id: &str,
        avatar: Option<&str>,
    ) -> Result<UserRecord, AuthError>;
}
