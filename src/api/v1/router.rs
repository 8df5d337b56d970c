use super::error::*;
use super::handler;
use crate::application_port::*;
use crate::domain_model::*;
use crate::server::*;
use std::convert::Infallible;
use std::sync::Arc;
use warp::{Filter, http, reject};

const MAX_BODY_BYTES: u64 = 16 * 1024;

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let register = warp::path!("auth" / "register")
        .and(warp::post())
        .and(json_body())
        .and(with(server.auth_service.clone()))
        .and_then(handler::register);

    let login = warp::path!("auth" / "login")
        .and(warp::post())
        .and(json_body())
        .and(with(server.auth_service.clone()))
        .and_then(handler::login);

    let refresh = warp::path!("auth" / "refresh")
        .and(warp::post())
        .and(json_body())
        .and(with(server.auth_service.clone()))
        .and_then(handler::refresh);

    let logout = warp::path!("auth" / "logout")
        .and(warp::post())
        .and(with_bearer())
        .and(with(server.auth_service.clone()))
        .and_then(handler::logout);

    let me = warp::path!("users" / "me")
        .and(warp::get())
        .and(with_identity(server.auth_service.clone()))
        .and(with(server.user_service.clone()))
        .and_then(handler::get_me);

    let update_me = warp::path!("users" / "me")
        .and(warp::patch())
        .and(json_body())
        .and(with_identity(server.auth_service.clone()))
        .and(with(server.user_service.clone()))
        .and_then(handler::update_me);

    let list_users = warp::path!("users")
        .and(warp::get())
        .and(warp::query::<handler::ListUsersQuery>())
        .and(with_role(server.auth_service.clone(), Role::Admin))
        .and(with(server.user_service.clone()))
        .and_then(handler::list_users);

    let get_user = warp::path!("users" / i64)
        .and(warp::get())
        .and(with_role(server.auth_service.clone(), Role::Admin))
        .and(with(server.user_service.clone()))
        .and_then(handler::get_user);

    let update_user = warp::path!("users" / i64)
        .and(warp::patch())
        .and(json_body())
        .and(with_role(server.auth_service.clone(), Role::Admin))
        .and(with(server.user_service.clone()))
        .and_then(handler::admin_update_user);

    register
        .or(login)
        .or(refresh)
        .or(logout)
        .or(me)
        .or(update_me)
        .or(list_users)
        .or(get_user)
        .or(update_user)
}

/// `GET /ws?token=`. The token is checked after the upgrade so refusals can carry a close code.
pub fn realtime(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    warp::path!("ws")
        .and(warp::get())
        .and(warp::query::<handler::HandshakeQuery>())
        .and(warp::ws())
        .and(with(server.auth_service.clone()))
        .and(with(server.connection_manager.clone()))
        .map(
            |query: handler::HandshakeQuery,
             ws: warp::ws::Ws,
             auth_service: Arc<dyn AuthService>,
             connection_manager: Arc<ConnectionManager>| {
                ws.on_upgrade(move |socket| {
                    handler::join_notifications(socket, query.token, auth_service, connection_manager)
                })
            },
        )
}

pub(crate) fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

fn json_body<T>() -> impl Filter<Extract = (T,), Error = warp::Rejection> + Clone
where
    T: serde::de::DeserializeOwned + Send,
{
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

pub(crate) fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn with_bearer() -> impl Filter<Extract = (String,), Error = warp::Rejection> + Clone {
    warp::header::optional::<String>(http::header::AUTHORIZATION.as_str()).and_then(
        |header: Option<String>| async move {
            match header {
                None => Err(reject::custom(ApiErrorCode::MissingToken)),
                Some(header) => bearer_token(&header)
                    .map(str::to_owned)
                    .ok_or_else(|| reject::custom(ApiErrorCode::InvalidToken)),
            }
        },
    )
}

fn with_identity(
    auth_service: Arc<dyn AuthService>,
) -> impl Filter<Extract = (Identity,), Error = warp::Rejection> + Clone {
    with_bearer().and_then(move |token: String| {
        let auth_service = auth_service.clone();
        async move {
            let identity = auth_service
                .resolve(&token)
                .await
                .map_err(ApiErrorCode::from)
                .map_err(reject::custom)?;
            Ok::<_, warp::Rejection>(identity)
        }
    })
}

fn with_role(
    auth_service: Arc<dyn AuthService>,
    required: Role,
) -> impl Filter<Extract = (Identity,), Error = warp::Rejection> + Clone {
    with_identity(auth_service).and_then(move |identity: Identity| async move {
        require_role(&identity, required)
            .map_err(ApiErrorCode::from)
            .map_err(reject::custom)?;
        Ok::<_, warp::Rejection>(identity)
    })
}
