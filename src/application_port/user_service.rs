use crate::domain_model::*;
use crate::domain_port::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("user not found")]
    NotFound,
    #[error("invalid cursor")]
    InvalidCursor,
    #[error("email already registered")]
    EmailTaken,
    #[error("validation failed: {0}")]
    ValidationFailed(String),
    #[error("store error: {0}")]
    Store(String),
}

impl From<StoreError> for UserError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Duplicate => UserError::EmailTaken,
            StoreError::Backend(e) => UserError::Store(e),
        }
    }
}

impl From<InvalidCursor> for UserError {
    fn from(_: InvalidCursor) -> Self {
        UserError::InvalidCursor
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AdminUserUpdate {
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub display_name: Option<String>,
}

#[async_trait::async_trait]
pub trait UserService: Send + Sync {
    async fn get_user(&self, user_id: UserId) -> Result<UserProfile, UserError>;
    async fn list_users(
        &self,
        cursor: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Page<UserProfile>, UserError>;
    async fn update_profile(
        &self,
        user_id: UserId,
        update: ProfileUpdate,
    ) -> Result<UserProfile, UserError>;
    async fn admin_update(
        &self,
        user_id: UserId,
        update: AdminUserUpdate,
    ) -> Result<UserProfile, UserError>;
}
