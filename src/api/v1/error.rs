use crate::api::v1::handler::ApiResponse;
use crate::application_port::*;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use tracing::{debug, warn};
use warp::http::{HeaderValue, StatusCode, header};
use warp::{Rejection, Reply, reject};

pub async fn recover_error(err: Rejection) -> Result<impl Reply, Infallible> {
    let (code, retry_after) = if let Some(limited) = err.find::<RateLimited>() {
        (ApiErrorCode::RateLimited, Some(limited.retry_after_secs))
    } else if let Some(code) = err.find::<ApiErrorCode>() {
        (*code, None)
    } else if err.find::<warp::filters::body::BodyDeserializeError>().is_some()
        || err.find::<reject::InvalidQuery>().is_some()
        || err.find::<reject::InvalidHeader>().is_some()
        || err.find::<reject::MissingHeader>().is_some()
        || err.find::<reject::UnsupportedMediaType>().is_some()
        || err.find::<reject::PayloadTooLarge>().is_some()
        || err.find::<reject::LengthRequired>().is_some()
    {
        (ApiErrorCode::BadRequest, None)
    } else if err.find::<reject::MethodNotAllowed>().is_some() {
        (ApiErrorCode::MethodNotAllowed, None)
    } else if err.is_not_found() {
        (ApiErrorCode::NotFound, None)
    } else {
        warn!("Unhandled rejection: {:?}", err);
        (ApiErrorCode::InternalError, None)
    };

    let body = ApiResponse::<()>::err(code, retry_after);
    let mut response =
        warp::reply::with_status(warp::reply::json(&body), code.status()).into_response();
    if let Some(secs) = retry_after {
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(secs));
    }
    Ok(response)
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
pub enum ApiErrorCode {
    #[error("Missing bearer token")]
    MissingToken,
    #[error("Token is not valid")]
    InvalidToken,
    #[error("Token has been revoked")]
    TokenRevoked,
    #[error("Unknown or inactive identity")]
    IdentityNotFound,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Account is disabled")]
    AccountDisabled,
    #[error("Insufficient permissions")]
    Forbidden,
    #[error("Email already registered")]
    EmailTaken,
    #[error("Validation failed")]
    ValidationFailed,
    #[error("Invalid cursor")]
    InvalidCursor,
    #[error("Malformed request")]
    BadRequest,
    #[error("Not found")]
    NotFound,
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Too many requests")]
    RateLimited,
    #[error("Internal error")]
    InternalError,
}

impl ApiErrorCode {
    pub fn internal<E: std::fmt::Display>(error: E) -> ApiErrorCode {
        warn!("Internal error: {}", error);
        ApiErrorCode::InternalError
    }

    pub fn status(self) -> StatusCode {
        match self {
            ApiErrorCode::MissingToken
            | ApiErrorCode::InvalidToken
            | ApiErrorCode::TokenRevoked
            | ApiErrorCode::IdentityNotFound
            | ApiErrorCode::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiErrorCode::AccountDisabled | ApiErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ApiErrorCode::EmailTaken => StatusCode::CONFLICT,
            ApiErrorCode::ValidationFailed => StatusCode::UNPROCESSABLE_ENTITY,
            ApiErrorCode::InvalidCursor | ApiErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiErrorCode::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl reject::Reject for ApiErrorCode {}

#[derive(Debug)]
pub struct RateLimited {
    pub retry_after_secs: u64,
}

impl reject::Reject for RateLimited {}

impl From<AuthError> for ApiErrorCode {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::InvalidToken | AuthError::WrongTokenKind => ApiErrorCode::InvalidToken,
            AuthError::TokenRevoked => ApiErrorCode::TokenRevoked,
            AuthError::IdentityNotFound => ApiErrorCode::IdentityNotFound,
            AuthError::InsufficientRole | AuthError::OwnershipDenied => ApiErrorCode::Forbidden,
            AuthError::InvalidCredentials => ApiErrorCode::InvalidCredentials,
            AuthError::AccountDisabled => ApiErrorCode::AccountDisabled,
            AuthError::EmailTaken => ApiErrorCode::EmailTaken,
            AuthError::ValidationFailed(reason) => {
                debug!("Validation failed: {}", reason);
                ApiErrorCode::ValidationFailed
            }
            AuthError::Store(e) => ApiErrorCode::internal(e),
            AuthError::InternalError(e) => ApiErrorCode::internal(e),
        }
    }
}

impl From<UserError> for ApiErrorCode {
    fn from(error: UserError) -> Self {
        match error {
            UserError::NotFound => ApiErrorCode::NotFound,
            UserError::InvalidCursor => ApiErrorCode::InvalidCursor,
            UserError::EmailTaken => ApiErrorCode::EmailTaken,
            UserError::ValidationFailed(reason) => {
                debug!("Validation failed: {}", reason);
                ApiErrorCode::ValidationFailed
            }
            UserError::Store(e) => ApiErrorCode::internal(e),
        }
    }
}
