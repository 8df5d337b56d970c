use crate::application_port::{AuthError, TokenCodec};
use crate::domain_model::*;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub signing_key: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireClaims {
    sub: String, // user id as string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<Role>, // access tokens only
    #[serde(rename = "type")]
    kind: TokenKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    jti: Option<String>,
    exp: i64,
    iat: i64,
    iss: String,
    aud: String,
}

pub struct JwtHs256Codec {
    cfg: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtHs256Codec {
    pub fn new(cfg: JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_audience(&[cfg.audience.clone()]);
        validation.set_issuer(&[cfg.issuer.clone()]);

        JwtHs256Codec {
            encoding_key: EncodingKey::from_secret(&cfg.signing_key),
            decoding_key: DecodingKey::from_secret(&cfg.signing_key),
            validation,
            cfg,
        }
    }

    fn issue(
        &self,
        subject: UserId,
        role: Option<Role>,
        kind: TokenKind,
        ttl: Duration,
    ) -> Result<IssuedToken, AuthError> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| AuthError::InternalError(e.to_string()))?;
        let iat_dt = Utc::now();
        let exp_dt = iat_dt + ttl;
        let jti = Jti::generate();
        let claims = WireClaims {
            sub: subject.to_string(),
            role,
            kind,
            jti: Some(jti.0.clone()),
            exp: exp_dt.timestamp(),
            iat: iat_dt.timestamp(),
            iss: self.cfg.issuer.clone(),
            aud: self.cfg.audience.clone(),
        };
        let token = self.sign(&claims)?;
        Ok(IssuedToken {
            token,
            jti,
            expires_at: exp_dt,
        })
    }

    fn sign(&self, claims: &WireClaims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AuthError::InternalError(e.to_string()))
    }
}

impl TokenCodec for JwtHs256Codec {
    fn issue_access(&self, subject: UserId, role: Role) -> Result<IssuedToken, AuthError> {
        self.issue(subject, Some(role), TokenKind::Access, self.cfg.access_ttl)
    }

    fn issue_refresh(&self, subject: UserId) -> Result<IssuedToken, AuthError> {
        self.issue(subject, None, TokenKind::Refresh, self.cfg.refresh_ttl)
    }

    fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        let data = decode::<WireClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|_| AuthError::InvalidToken)?;
        let claims = data.claims;

        let subject = claims
            .sub
            .parse::<UserId>()
            .map_err(|_| AuthError::InvalidToken)?;
        let expires_at =
            DateTime::<Utc>::from_timestamp(claims.exp, 0).ok_or(AuthError::InvalidToken)?;

        Ok(Claims {
            subject,
            role: claims.role,
            kind: claims.kind,
            jti: claims.jti.map(Jti),
            expires_at,
        })
    }
}
