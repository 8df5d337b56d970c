use super::util::store_err;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

const SELECT_COLUMNS: &str = r#"
SELECT user_id, email, password_hash, display_name, role, is_active, created_at, updated_at
FROM users
"#;

pub struct MySqlUserRepo {
    pool: MySqlPool,
}

impl MySqlUserRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlUserRepo { pool }
    }

    fn row_to_record(row: MySqlRow) -> Result<UserRecord, StoreError> {
        let backend = |e: sqlx::Error| StoreError::Backend(e.to_string());

        let role: String = row.try_get("role").map_err(backend)?;
        let role = role.parse::<Role>().map_err(StoreError::Backend)?;

        Ok(UserRecord {
            user_id: UserId(row.try_get::<i64, _>("user_id").map_err(backend)?),
            email: row.try_get("email").map_err(backend)?,
            password_hash: row.try_get("password_hash").map_err(backend)?,
            display_name: row.try_get("display_name").map_err(backend)?,
            role,
            is_active: row.try_get("is_active").map_err(backend)?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(backend)?,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at").map_err(backend)?,
        })
    }
}

#[async_trait::async_trait]
impl UserRepo for MySqlUserRepo {
    async fn create(&self, user: &NewUser) -> Result<UserRecord, StoreError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
INSERT INTO users (email, password_hash, display_name, role, is_active, created_at, updated_at)
VALUES (?, ?, ?, ?, ?, ?, ?)
"#,
        )
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.display_name)
        .bind(Role::User.as_str())
        .bind(true)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        let user_id = UserId(result.last_insert_id() as i64);
        self.get_by_id(user_id)
            .await?
            .ok_or_else(|| StoreError::Backend(format!("inserted user {user_id} vanished")))
    }

    async fn get_by_id(&self, user_id: UserId) -> Result<Option<UserRecord>, StoreError> {
        let sql = format!("{SELECT_COLUMNS} WHERE user_id = ?");
        let row_opt = sqlx::query(&sql)
            .bind(user_id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        row_opt.map(Self::row_to_record).transpose()
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let sql = format!("{SELECT_COLUMNS} WHERE email = ?");
        let row_opt = sqlx::query(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        row_opt.map(Self::row_to_record).transpose()
    }

    async fn list_after(
        &self,
        after: Option<UserId>,
        limit: u32,
    ) -> Result<Vec<UserRecord>, StoreError> {
        let sql = format!("{SELECT_COLUMNS} WHERE user_id > ? ORDER BY user_id ASC LIMIT ?");
        let rows = sqlx::query(&sql)
            .bind(after.map(|id| id.0).unwrap_or(0))
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;
        rows.into_iter().map(Self::row_to_record).collect()
    }

    async fn update(
        &self,
        user_id: UserId,
        changes: &UserChanges,
    ) -> Result<Option<UserRecord>, StoreError> {
        sqlx::query(
            r#"
UPDATE users
SET email = COALESCE(?, email),
    display_name = COALESCE(?, display_name),
    role = COALESCE(?, role),
    is_active = COALESCE(?, is_active),
    updated_at = ?
WHERE user_id = ?
"#,
        )
        .bind(changes.email.as_deref())
        .bind(changes.display_name.as_deref())
        .bind(changes.role.map(Role::as_str))
        .bind(changes.is_active)
        .bind(Utc::now())
        .bind(user_id.0)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        self.get_by_id(user_id).await
    }
}
