use crate::api::v1::handler::ApiResponse;
use crate::application_port::*;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use tracing::{debug, error, warn};
use warp::http::StatusCode;
use warp::{Rejection, reject};

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    let (code, message) = if let Some(code) = err.find::<ApiErrorCode>() {
        (code.clone(), code.to_string())
    } else if err.find::<reject::MissingHeader>().is_some() {
        (ApiErrorCode::InvalidToken, ApiErrorCode::InvalidToken.to_string())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (ApiErrorCode::BadRequest, e.to_string())
    } else if err.is_not_found() {
        return Ok(reply(
            ApiErrorCode::BadRequest,
            "no such route".to_string(),
            StatusCode::NOT_FOUND,
        ));
    } else if err.find::<reject::MethodNotAllowed>().is_some() {
        return Ok(reply(
            ApiErrorCode::BadRequest,
            "method not allowed".to_string(),
            StatusCode::METHOD_NOT_ALLOWED,
        ));
    } else {
        error!(?err, "unhandled rejection");
        (
            ApiErrorCode::InternalError,
            ApiErrorCode::InternalError.to_string(),
        )
    };

    let status = code.status();
    Ok(reply(code, message, status))
}

fn reply(
    code: ApiErrorCode,
    message: String,
    status: StatusCode,
) -> warp::reply::WithStatus<warp::reply::Json> {
    let json = warp::reply::json(&ApiResponse::<()>::err(code, message));
    warp::reply::with_status(json, status)
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
pub enum ApiErrorCode {
    #[error("Token is not valid")]
    InvalidToken,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Too many attempts, try again later")]
    TooManyAttempts,
    #[error("Email already registered")]
    EmailTaken,
    #[error("Email could not be delivered")]
    DeliveryFailed,
    #[error("Bad request")]
    BadRequest,
    #[error("Internal error")]
    InternalError,
}

impl ApiErrorCode {
    pub fn internal<E: std::fmt::Display>(error: E) -> ApiErrorCode {
        warn!("Internal error: {}", error);
        ApiErrorCode::InternalError
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiErrorCode::InvalidToken => StatusCode::UNAUTHORIZED,
            ApiErrorCode::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiErrorCode::TooManyAttempts => StatusCode::TOO_MANY_REQUESTS,
            ApiErrorCode::EmailTaken => StatusCode::CONFLICT,
            ApiErrorCode::DeliveryFailed => StatusCode::BAD_GATEWAY,
            ApiErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl reject::Reject for ApiErrorCode {}

impl From<AuthError> for ApiErrorCode {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::InvalidOrExpired | AuthError::UserNotFound => ApiErrorCode::InvalidToken,
            AuthError::InvalidCredentials => ApiErrorCode::InvalidCredentials,
            AuthError::TooManyAttempts => ApiErrorCode::TooManyAttempts,
            AuthError::UserExists => ApiErrorCode::EmailTaken,
            AuthError::DeliveryFailed(_) => ApiErrorCode::DeliveryFailed,
            AuthError::InvalidInput(e) => {
                debug!(reason = %e, "bad request");
                ApiErrorCode::BadRequest
            }
            AuthError::StoreUnavailable(e) | AuthError::Store(e) | AuthError::InternalError(e) => {
                ApiErrorCode::internal(e)
            }
        }
    }
}
