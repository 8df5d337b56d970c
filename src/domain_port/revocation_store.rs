use crate::domain_model::Jti;
use crate::domain_port::StoreError;
use chrono::{DateTime, Utc};

#[async_trait::async_trait]
pub trait RevocationStore: Send + Sync {
    /// Record `jti` as revoked until `expires_at`.
    ///
    /// Idempotent: revoking an already revoked jti is not an error. Returns
    /// `true` only for the call that actually inserted the entry, which lets
    /// refresh rotation detect a concurrent exchange of the same token.
    async fn revoke(&self, jti: &Jti, expires_at: DateTime<Utc>) -> Result<bool, StoreError>;

    async fn is_revoked(&self, jti: &Jti) -> Result<bool, StoreError>;

    /// Delete entries whose expiry has passed and return how many went away.
    /// Entries removed concurrently by another sweep are not counted and not an error.
    async fn sweep(&self) -> Result<u64, StoreError>;
}
