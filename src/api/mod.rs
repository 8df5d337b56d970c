pub mod v1;

use crate::server::Server;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use warp::Filter;

/// Full HTTP surface: health, realtime handshake and the v1 API, behind the rate limiter.
pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = Infallible> + Clone {
    let health = warp::path!("health")
        .and(warp::get())
        .map(|| warp::reply::json(&json!({ "status": "ok" })));

    let api_v1 = warp::path("api")
        .and(warp::path("v1"))
        .and(v1::routes(server.clone()));

    v1::admission(server.clone())
        .and(health.or(v1::realtime(server)).or(api_v1))
        .recover(v1::recover_error)
}
