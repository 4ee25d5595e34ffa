use super::error::*;
use super::handler;
use crate::application_port::*;
use crate::domain_port::UserRecord;
use crate::server::*;
use std::convert::Infallible;
use std::sync::Arc;
use warp::{Filter, http, reject};

const MAX_BODY_BYTES: u64 = 16 * 1024;

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let register = warp::post()
        .and(warp::path("register"))
        .and(warp::path::end())
        .and(json_body())
        .and(with(server.auth_service.clone()))
        .and_then(handler::register);

    let login = warp::post()
        .and(warp::path("login"))
        .and(warp::path::end())
        .and(json_body())
        .and(with(server.auth_service.clone()))
        .and_then(handler::login);

    let oauth_callback = warp::post()
        .and(warp::path!("oauth" / "callback"))
        .and(json_body())
        .and(with(server.auth_service.clone()))
        .and_then(handler::oauth_callback);

    let send_magic_link = warp::post()
        .and(warp::path!("magic-link" / "send"))
        .and(json_body())
        .and(with(server.magic_link_service.clone()))
        .and_then(handler::send_magic_link);

    let verify_magic_link = warp::post()
        .and(warp::path!("magic-link" / "verify"))
        .and(json_body())
        .and(with(server.auth_service.clone()))
        .and_then(handler::verify_magic_link);

    let refresh = warp::post()
        .and(warp::path("refresh"))
        .and(warp::path::end())
        .and(json_body())
        .and(with(server.auth_service.clone()))
        .and_then(handler::refresh);

    let me = warp::get()
        .and(warp::path("me"))
        .and(warp::path::end())
        .and(with_verification(server.auth_service.clone()))
        .and_then(handler::me);

    let update_profile = warp::patch()
        .and(warp::path("me"))
        .and(warp::path::end())
        .and(with_verification(server.auth_service.clone()))
        .and(json_body())
        .and(with(server.auth_service.clone()))
        .and_then(handler::update_profile);

    let change_password = warp::post()
        .and(warp::path("change-password"))
        .and(warp::path::end())
        .and(with_verification(server.auth_service.clone()))
        .and(json_body())
        .and(with(server.auth_service.clone()))
        .and_then(handler::change_password);

    // The body is optional: a bare POST still ends the client-side session.
    let logout = warp::post()
        .and(warp::path("logout"))
        .and(warp::path::end())
        .and(with_verification(server.auth_service.clone()))
        .and(
            json_body::<handler::LogoutRequest>()
                .or(warp::any().map(handler::LogoutRequest::default))
                .unify(),
        )
        .and(with(server.auth_service.clone()))
        .and_then(handler::logout);

    let logout_all = warp::post()
        .and(warp::path("logout-all"))
        .and(warp::path::end())
        .and(with_verification(server.auth_service.clone()))
        .and(with(server.auth_service.clone()))
        .and_then(handler::logout_all);

    register
        .or(login)
        .or(oauth_callback)
        .or(send_magic_link)
        .or(verify_magic_link)
        .or(refresh)
        .or(me)
        .or(update_profile)
        .or(change_password)
        .or(logout)
        .or(logout_all)
}

fn json_body<T>() -> impl Filter<Extract = (T,), Error = warp::Rejection> + Clone
where
    T: serde::de::DeserializeOwned + Send,
{
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

/// `Authorization: Bearer <access token>`, resolved to the account it names.
fn with_bearer() -> impl Filter<Extract = (String,), Error = warp::Rejection> + Clone {
    warp::header::<String>(http::header::AUTHORIZATION.as_ref()).and_then(
        |header: String| async move {
            match header.strip_prefix("Bearer ") {
                Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
                _ => Err(reject::custom(ApiErrorCode::InvalidToken)),
            }
        },
    )
}

fn with_verification(
    auth_service: Arc<dyn AuthService>,
) -> impl Filter<Extract = (UserRecord,), Error = warp::Rejection> + Clone {
    with_bearer().and_then(move |token: String| {
        let auth_service = auth_service.clone();
        async move {
            let user = auth_service
                .current_user(&token)
                .await
                .map_err(ApiErrorCode::from)
                .map_err(reject::custom)?;
            Ok::<_, warp::Rejection>(user)
        }
    })
}
