use crate::domain_model::{Role, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique token identifier; the unit of revocation.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Jti(pub String);

impl Jti {
    pub fn generate() -> Self {
        Jti(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Jti {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Verified content of a token. Only produced by a successful decode.
#[derive(Debug, Clone)]
pub struct Claims {
    pub subject: UserId,
    pub role: Option<Role>,
    pub kind: TokenKind,
    pub jti: Option<Jti>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub jti: Jti,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
}

impl AuthTokens {
    pub fn bearer(access: IssuedToken, refresh: IssuedToken) -> Self {
        AuthTokens {
            access_token: access.token,
            refresh_token: refresh.token,
            token_type: "bearer",
            access_token_expires_at: access.expires_at,
            refresh_token_expires_at: refresh.expires_at,
        }
    }
}
