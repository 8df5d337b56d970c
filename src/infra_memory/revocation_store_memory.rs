use crate::domain_model::Jti;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

#[derive(Debug, Clone)]
struct RevokedEntry {
    expires_at: DateTime<Utc>,
    revoked_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct MemoryRevocationStore {
    revoked: DashMap<Jti, RevokedEntry>,
}

impl MemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.revoked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revoked.is_empty()
    }

    pub fn revoked_at(&self, jti: &Jti) -> Option<DateTime<Utc>> {
        self.revoked.get(jti).map(|entry| entry.revoked_at)
    }
}

#[async_trait::async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn revoke(&self, jti: &Jti, expires_at: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut inserted = false;
        self.revoked.entry(jti.clone()).or_insert_with(|| {
            inserted = true;
            RevokedEntry {
                expires_at,
                revoked_at: Utc::now(),
            }
        });
        Ok(inserted)
    }

    async fn is_revoked(&self, jti: &Jti) -> Result<bool, StoreError> {
        Ok(self.revoked.contains_key(jti))
    }

    async fn sweep(&self) -> Result<u64, StoreError> {
        let now = Utc::now();
        let mut removed = 0u64;
        self.revoked.retain(|_, entry| {
            let keep = entry.expires_at >= now;
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }
}
