#![allow(dead_code)]

use fasttrack::api;
use fasttrack::application_port::*;
use fasttrack::domain_model::*;
use fasttrack::server::Server;
use fasttrack::settings::parse_settings_str;
use serde_json::Value;
use std::sync::Arc;
use warp::http::{HeaderMap, StatusCode};

pub const PASSWORD: &str = "correct-horse";

pub fn settings_toml(capacity: usize) -> String {
    format!(
        r#"
[auth]
issuer = "fasttrack.test"
audience = "fasttrack-client"
signing_key = "integration-test-key"
hasher = "fake"

[http]
address = "127.0.0.1:0"

[log]
filter = "warn"

[rate_limit]
capacity = {capacity}
window_secs = 60

[realtime]
ping_interval_secs = 30

[revocation]
backend = "storage"
sweep_interval_secs = 3600

[storage]
backend = "memory"
"#
    )
}

pub async fn server_with_capacity(capacity: usize) -> Arc<Server> {
    let settings = parse_settings_str(&settings_toml(capacity)).unwrap();
    Arc::new(Server::try_new(&settings).await.unwrap())
}

pub async fn server() -> Arc<Server> {
    server_with_capacity(10_000).await
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub async fn call(
    server: &Arc<Server>,
    method: &str,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Reply {
    let mut request = warp::test::request().method(method).path(path);
    if let Some(token) = token {
        request = request.header("authorization", format!("Bearer {token}"));
    }
    if let Some(body) = body {
        request = request.json(&body);
    }

    let response = request.reply(&api::routes(server.clone())).await;
    let body = if response.body().is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(response.body()).unwrap()
    };
    Reply {
        status: response.status(),
        headers: response.headers().clone(),
        body,
    }
}

pub struct Session {
    pub user_id: UserId,
    pub access_token: String,
    pub refresh_token: String,
}

/// Registers and logs in through the service layer, leaving the HTTP rate budget untouched.
pub async fn session(server: &Arc<Server>, email: &str) -> Session {
    let profile = server
        .auth_service
        .register(RegisterInput {
            email: email.to_string(),
            password: PASSWORD.to_string(),
            display_name: email.to_string(),
        })
        .await
        .unwrap();
    let tokens = server
        .auth_service
        .login(LoginInput {
            email: email.to_string(),
            password: PASSWORD.to_string(),
        })
        .await
        .unwrap();
    Session {
        user_id: profile.id,
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
    }
}

pub async fn promote(server: &Arc<Server>, user_id: UserId) {
    server
        .user_service
        .admin_update(
            user_id,
            AdminUserUpdate {
                role: Some(Role::Admin),
                ..AdminUserUpdate::default()
            },
        )
        .await
        .unwrap();
}
