use crate::domain_model::*;
use crate::domain_port::StoreError;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub user_id: UserId,
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.user_id,
            role: self.role,
            is_active: self.is_active,
        }
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.user_id,
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            role: self.role,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

#[async_trait::async_trait]
pub trait UserRepo: Send + Sync {
    /// New users get role `user` and are active. Fails with `Duplicate` on a taken email.
    async fn create(&self, user: &NewUser) -> Result<UserRecord, StoreError>;

    async fn get_by_id(&self, user_id: UserId) -> Result<Option<UserRecord>, StoreError>;

    async fn get_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Up to `limit` records with id strictly greater than `after`, ascending by id.
    async fn list_after(
        &self,
        after: Option<UserId>,
        limit: u32,
    ) -> Result<Vec<UserRecord>, StoreError>;

    /// Returns `None` when the user does not exist.
    async fn update(
        &self,
        user_id: UserId,
        changes: &UserChanges,
    ) -> Result<Option<UserRecord>, StoreError>;
}
