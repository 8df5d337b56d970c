use super::error::RateLimited;
use super::router::{bearer_token, with};
use crate::application_port::AuthService;
use crate::server::{RateKey, RateLimiter, Server};
use std::net::SocketAddr;
use std::sync::Arc;
use warp::filters::path::FullPath;
use warp::{Filter, http, reject};

/// Admission gate in front of every route. Keys on the bearer subject when
/// the token verifies, otherwise on the peer address.
pub fn admission(
    server: Arc<Server>,
) -> impl Filter<Extract = (), Error = warp::Rejection> + Clone {
    warp::path::full()
        .and(warp::addr::remote())
        .and(warp::header::optional::<String>(
            http::header::AUTHORIZATION.as_str(),
        ))
        .and(with(server.auth_service.clone()))
        .and(with(server.rate_limiter.clone()))
        .and_then(
            |path: FullPath,
             remote: Option<SocketAddr>,
             authorization: Option<String>,
             auth_service: Arc<dyn AuthService>,
             rate_limiter: Arc<RateLimiter>| async move {
                if RateLimiter::is_exempt(path.as_str()) {
                    return Ok(());
                }

                let key = authorization
                    .as_deref()
                    .and_then(bearer_token)
                    .and_then(|token| auth_service.subject_hint(token))
                    .map(RateKey::User)
                    .unwrap_or(RateKey::Ip(remote.map(|addr| addr.ip())));

                rate_limiter.check(&key.to_string()).map_err(|exceeded| {
                    tracing::debug!(%key, retry_after = exceeded.retry_after_secs, "rate limited");
                    reject::custom(RateLimited {
                        retry_after_secs: exceeded.retry_after_secs,
                    })
                })
            },
        )
        .untuple_one()
}
