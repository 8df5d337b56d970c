use super::util::store_err;
use crate::domain_model::Jti;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use sqlx::MySqlPool;

/// Backed by `revoked_token (jti VARCHAR(64) PRIMARY KEY, expires_at DATETIME(6), revoked_at DATETIME(6))`.
pub struct MySqlRevocationStore {
    pool: MySqlPool,
}

impl MySqlRevocationStore {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlRevocationStore { pool }
    }
}

#[async_trait::async_trait]
impl RevocationStore for MySqlRevocationStore {
    async fn revoke(&self, jti: &Jti, expires_at: DateTime<Utc>) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
INSERT IGNORE INTO revoked_token (jti, expires_at, revoked_at)
VALUES (?, ?, ?)
"#,
        )
        .bind(jti.as_str())
        .bind(expires_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(result.rows_affected() == 1)
    }

    async fn is_revoked(&self, jti: &Jti) -> Result<bool, StoreError> {
        let count: i64 = sqlx::query_scalar(r#"SELECT COUNT(1) FROM revoked_token WHERE jti = ?"#)
            .bind(jti.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(store_err)?;

        Ok(count > 0)
    }

    async fn sweep(&self) -> Result<u64, StoreError> {
        let result = sqlx::query(r#"DELETE FROM revoked_token WHERE expires_at < ?"#)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(store_err)?;

        Ok(result.rows_affected())
    }
}
