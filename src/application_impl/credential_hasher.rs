use crate::application_port::{AuthError, CredentialHasher};
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

pub struct Argon2PasswordHasher;

#[async_trait::async_trait]
impl CredentialHasher for Argon2PasswordHasher {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            Argon2::default()
                .hash_password(password.as_bytes(), &salt)
                .map(|hash| hash.to_string())
                .map_err(|e| AuthError::InternalError(e.to_string()))
        })
        .await
        .map_err(|e| AuthError::InternalError(e.to_string()))?
    }

    async fn verify_password(
        &self,
        password: &str,
        password_hash: &str,
    ) -> Result<bool, AuthError> {
        let password = password.to_owned();
        let password_hash = password_hash.to_owned();
        tokio::task::spawn_blocking(move || {
            let parsed = PasswordHash::new(&password_hash)
                .map_err(|e| AuthError::InternalError(format!("invalid PHC hash: {e}")))?;

            match Argon2::default().verify_password(password.as_bytes(), &parsed) {
                Ok(_) => Ok(true),
                Err(argon2::password_hash::Error::Password) => Ok(false),
                Err(e) => Err(AuthError::InternalError(format!("verify error: {e}"))),
            }
        })
        .await
        .map_err(|e| AuthError::InternalError(e.to_string()))?
    }
}

/// Reversible stand-in for tests and local runs. Never select it in production settings.
#[derive(Debug, Default)]
pub struct FakeCredentialHasher;

const FAKE_PREFIX: &str = "fake$";

#[async_trait::async_trait]
impl CredentialHasher for FakeCredentialHasher {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        Ok(format!("{FAKE_PREFIX}{password}"))
    }

    async fn verify_password(
        &self,
        password: &str,
        password_hash: &str,
    ) -> Result<bool, AuthError> {
        match password_hash.strip_prefix(FAKE_PREFIX) {
            Some(stored) => Ok(stored == password),
            None => Err(AuthError::InternalError("not a fake hash".to_string())),
        }
    }
}
