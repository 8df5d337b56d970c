use super::error::*;
use crate::application_port::*;
use crate::domain_model::*;
use crate::logger::*;
use crate::server::{ConnReceiver, ConnSender, ConnectionManager};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::http::StatusCode;
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

    pub fn err(code: ApiErrorCode, retry_after: Option<u64>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError {
                code,
                message: code.to_string(),
                retry_after,
            }),
        }
    }
}

// region auth

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub display_name: String,
}

pub async fn register(
    body: RegisterRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let input = RegisterInput {
        email: body.email,
        password: body.password,
        display_name: body.display_name,
    };
    let profile = auth_service
        .register(input)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::with_status(
        warp::reply::json(&ApiResponse::ok(profile)),
        StatusCode::CREATED,
    ))
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
    let input = LoginInput {
        email: body.email,
        password: body.password,
    };
    let tokens = auth_service
        .login(input)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(tokens)))
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
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(tokens)))
}

pub async fn logout(
    token: String,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    auth_service
        .logout(&token)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(StatusCode::NO_CONTENT)
}

// endregion

// region users

pub async fn get_me(
    identity: Identity,
    user_service: Arc<dyn UserService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let profile = user_service
        .get_user(identity.id)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(profile)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateMeRequest {
    pub display_name: Option<String>,
    pub email: Option<String>,
}

pub async fn update_me(
    body: UpdateMeRequest,
    identity: Identity,
    user_service: Arc<dyn UserService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let update = ProfileUpdate {
        display_name: body.display_name,
        email: body.email,
    };
    let profile = user_service
        .update_profile(identity.id, update)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(profile)))
}

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

pub async fn list_users(
    query: ListUsersQuery,
    _admin: Identity,
    user_service: Arc<dyn UserService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let page = user_service
        .list_users(query.cursor.as_deref(), query.limit)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(page)))
}

pub async fn get_user(
    user_id: i64,
    _admin: Identity,
    user_service: Arc<dyn UserService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let profile = user_service
        .get_user(UserId(user_id))
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(profile)))
}

#[derive(Debug, Deserialize)]
pub struct AdminUpdateRequest {
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub display_name: Option<String>,
}

pub async fn admin_update_user(
    user_id: i64,
    body: AdminUpdateRequest,
    admin: Identity,
    user_service: Arc<dyn UserService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let update = AdminUserUpdate {
        role: body.role,
        is_active: body.is_active,
        display_name: body.display_name,
    };
    let profile = user_service
        .admin_update(UserId(user_id), update)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    info!(admin = %admin.id, user_id, "user updated by admin");
    Ok(warp::reply::json(&ApiResponse::ok(profile)))
}

// endregion

// region realtime

#[derive(Debug, Deserialize)]
pub struct HandshakeQuery {
    pub token: Option<String>,
}

fn handshake_rejection(error: AuthError) -> HandshakeRejection {
    match error {
        AuthError::WrongTokenKind => HandshakeRejection::WrongTokenKind,
        AuthError::TokenRevoked => HandshakeRejection::TokenRevoked,
        AuthError::InvalidToken => HandshakeRejection::InvalidToken,
        other => {
            warn!("handshake verification failed: {}", other);
            HandshakeRejection::InvalidToken
        }
    }
}

pub async fn join_notifications(
    socket: warp::ws::WebSocket,
    token: Option<String>,
    auth_service: Arc<dyn AuthService>,
    connection_manager: Arc<ConnectionManager>,
) {
    let (s2c, c2s) = socket.split();
    admit(
        Box::new(s2c),
        Box::new(c2s),
        token,
        auth_service.as_ref(),
        &connection_manager,
    )
    .await
}

/// Registers the connection when the token passes `verify_access`,
/// otherwise closes it with the matching close code.
pub async fn admit(
    mut s2c: Box<dyn ConnSender>,
    c2s: Box<dyn ConnReceiver>,
    token: Option<String>,
    auth_service: &dyn AuthService,
    connection_manager: &ConnectionManager,
) {
    let verdict = match token.as_deref().filter(|token| !token.is_empty()) {
        None => Err(HandshakeRejection::MissingToken),
        Some(token) => auth_service
            .verify_access(token)
            .await
            .map_err(handshake_rejection),
    };

    match verdict {
        Ok(claims) => connection_manager.serve(claims.subject, s2c, c2s).await,
        Err(rejection) => {
            debug!(code = rejection.close_code(), "handshake refused");
            if let Err(e) = s2c.refuse(rejection).await {
                debug!("closing refused socket: {}", e);
            }
        }
    }
}

// endregion
