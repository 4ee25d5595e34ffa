use super::error::*;
use crate::application_port::*;
use crate::domain_port::{ProfileUpdate, UserRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use warp::{self, reject};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(code: ApiErrorCode, message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError {
                code,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: UserRecord,
    pub tokens: AuthTokens,
}

impl From<LoginResult> for LoginResponse {
    fn from(result: LoginResult) -> Self {
        LoginResponse {
            user: result.user,
            tokens: result.tokens,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

fn rejection(error: AuthError) -> warp::Rejection {
    reject::custom(ApiErrorCode::from(error))
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

pub async fn register(
    body: RegisterRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let login_result = auth_service
        .register(RegisterInput {
            email: body.email,
            password: body.password,
            name: body.name,
        })
        .await
        .map_err(rejection)?;

    Ok(warp::reply::json(&ApiResponse::ok(LoginResponse::from(
        login_result,
    ))))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login(
    body: LoginRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let login_result = auth_service
        .authenticate(CredentialFlow::Password {
            email: body.email,
            password: body.password,
        })
        .await
        .map_err(rejection)?;

    Ok(warp::reply::json(&ApiResponse::ok(LoginResponse::from(
        login_result,
    ))))
}

/// Profile already fetched from the provider by the OAuth redirect handler.
#[derive(Debug, Deserialize)]
pub struct OAuthCallbackRequest {
    pub provider_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub avatar: Option<String>,
}

pub async fn oauth_callback(
    body: OAuthCallbackRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let login_result = auth_service
        .authenticate(CredentialFlow::OAuth(OAuthProfile {
            provider_id: body.provider_id,
            email: body.email,
            display_name: body.name,
            avatar: body.avatar,
        }))
        .await
        .map_err(rejection)?;

    Ok(warp::reply::json(&ApiResponse::ok(LoginResponse::from(
        login_result,
    ))))
}

#[derive(Debug, Deserialize)]
pub struct SendMagicLinkRequest {
    pub email: String,
}

pub async fn send_magic_link(
    body: SendMagicLinkRequest,
    magic_link_service: Arc<dyn MagicLinkService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    magic_link_service
        .send(&body.email)
        .await
        .map_err(rejection)?;

    Ok(warp::reply::json(&ApiResponse::ok(MessageResponse {
        message: "Magic link sent to your email",
    })))
}

#[derive(Debug, Deserialize)]
pub struct VerifyMagicLinkRequest {
    pub token: String,
}

pub async fn verify_magic_link(
    body: VerifyMagicLinkRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let login_result = auth_service
        .authenticate(CredentialFlow::MagicLink { token: body.token })
        .await
        .map_err(rejection)?;

    Ok(warp::reply::json(&ApiResponse::ok(LoginResponse::from(
        login_result,
    ))))
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh(
    body: RefreshRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let tokens = auth_service
        .refresh(&body.refresh_token)
        .await
        .map_err(rejection)?;

    Ok(warp::reply::json(&ApiResponse::ok(tokens)))
}

pub async fn me(user: UserRecord) -> Result<impl warp::Reply, warp::Rejection> {
    Ok(warp::reply::json(&ApiResponse::ok(user)))
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

pub async fn change_password(
    user: UserRecord,
    body: ChangePasswordRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    auth_service
        .change_password(user.user_id, &body.current_password, &body.new_password)
        .await
        .map_err(rejection)?;

    Ok(warp::reply::json(&ApiResponse::ok(MessageResponse {
        message: "Password changed, please log in again",
    })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub avatar: Option<String>,
}

pub async fn update_profile(
    user: UserRecord,
    body: UpdateProfileRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let user = auth_service
        .update_profile(
            user.user_id,
            ProfileUpdate {
                name: body.name,
                avatar: body.avatar,
            },
        )
        .await
        .map_err(rejection)?;

    Ok(warp::reply::json(&ApiResponse::ok(user)))
}

#[derive(Debug, Default, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

pub async fn logout(
    user: UserRecord,
    body: LogoutRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    debug!(user_id = %user.user_id, "logout");
    auth_service
        .logout(body.refresh_token.as_deref())
        .await
        .map_err(rejection)?;

    Ok(warp::reply::json(&ApiResponse::ok(MessageResponse {
        message: "Logged out",
    })))
}

pub async fn logout_all(
    user: UserRecord,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    auth_service
        .logout_all(user.user_id)
        .await
        .map_err(rejection)?;

    Ok(warp::reply::json(&ApiResponse::ok(MessageResponse {
        message: "Logged out from all devices",
    })))
}
