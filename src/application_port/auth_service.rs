use crate::application_port::{AuthError, AuthTokens};
use crate::domain_model::UserId;
use crate::domain_port::{ProfileUpdate, UserRecord};
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

/// Identity asserted by Google after the authorization-code exchange, which
/// happens outside this crate.
#[derive(Debug, Clone)]
pub struct OAuthProfile {
    pub provider_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub avatar: Option<String>,
}

/// The closed set of ways a caller can prove who they are.
#[derive(Debug, Clone)]
pub enum CredentialFlow {
    Password { email: String, password: String },
    OAuth(OAuthProfile),
    MagicLink { token: String },
}

impl CredentialFlow {
    pub fn name(&self) -> &'static str {
        match self {
            CredentialFlow::Password { .. } => "password",
            CredentialFlow::OAuth(_) => "oauth",
            CredentialFlow::MagicLink { .. } => "magic_link",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResult {
    pub user: UserRecord,
    pub tokens: AuthTokens,
}

#[async_trait::async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError>;
    async fn verify_password(&self, password: &str, password_hash: &str)
    -> Result<bool, AuthError>;
}

#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    async fn register(&self, request: RegisterInput) -> Result<LoginResult, AuthError>;
    async fn authenticate(&self, flow: CredentialFlow) -> Result<LoginResult, AuthError>;
    async fn current_user(&self, access_token: &str) -> Result<UserRecord, AuthError>;
    async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, AuthError>;
    /// Revokes the refresh token if one is given; never fails on a bad token.
    async fn logout(&self, refresh_token: Option<&str>) -> Result<(), AuthError>;
    async fn logout_all(&self, user_id: UserId) -> Result<(), AuthError>;
    async fn change_password(
        &self,
        user_id: UserId,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError>;
    async fn update_profile(
        &self,
        user_id: UserId,
        update: ProfileUpdate,
    ) -> Result<UserRecord, AuthError>;
}
