use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use std::sync::Arc;

pub struct RealUserService {
    user_repo: Arc<dyn UserRepo>,
}

impl RealUserService {
    pub fn new(user_repo: Arc<dyn UserRepo>) -> RealUserService {
        RealUserService { user_repo }
    }

    async fn apply(&self, user_id: UserId, changes: UserChanges) -> Result<UserProfile, UserError> {
        self.user_repo
            .update(user_id, &changes)
            .await?
            .map(|record| record.profile())
            .ok_or(UserError::NotFound)
    }
}

#[async_trait::async_trait]
impl UserService for RealUserService {
    async fn get_user(&self, user_id: UserId) -> Result<UserProfile, UserError> {
        self.user_repo
            .get_by_id(user_id)
            .await?
            .map(|record| record.profile())
            .ok_or(UserError::NotFound)
    }

    async fn list_users(
        &self,
        cursor: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Page<UserProfile>, UserError> {
        let after = cursor
            .map(|c| c.parse::<IdCursor>())
            .transpose()?
            .map(|c| i64::try_from(c.0).map(UserId))
            .transpose()
            .map_err(|_| UserError::InvalidCursor)?;
        let limit = page_limit(limit);

        let rows = self.user_repo.list_after(after, limit + 1).await?;
        let page = Page::from_rows(rows, limit, |record| record.user_id.0 as u64);
        Ok(page.map(|record| record.profile()))
    }

    async fn update_profile(
        &self,
        user_id: UserId,
        update: ProfileUpdate,
    ) -> Result<UserProfile, UserError> {
        if let Some(email) = &update.email {
            if !email.contains('@') {
                return Err(UserError::ValidationFailed("invalid email".to_string()));
            }
        }
        self.apply(
            user_id,
            UserChanges {
                email: update.email,
                display_name: update.display_name,
                ..UserChanges::default()
            },
        )
        .await
    }

    async fn admin_update(
        &self,
        user_id: UserId,
        update: AdminUserUpdate,
    ) -> Result<UserProfile, UserError> {
        self.apply(
            user_id,
            UserChanges {
                role: update.role,
                is_active: update.is_active,
                display_name: update.display_name,
                ..UserChanges::default()
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra_memory::MemoryUserRepo;

    async fn service_with_users(n: usize) -> RealUserService {
        let repo = Arc::new(MemoryUserRepo::new());
        for i in 0..n {
            repo.create(&NewUser {
                email: format!("user{i}@x.io"),
                password_hash: "h".to_string(),
                display_name: String::new(),
            })
            .await
            .unwrap();
        }
        RealUserService::new(repo)
    }

    #[tokio::test]
    async fn pagination_visits_every_user_once() {
        let service = service_with_users(7).await;
        let mut seen = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = service.list_users(cursor.as_deref(), Some(3)).await.unwrap();
            seen.extend(page.items.iter().map(|p| p.id));
            if !page.has_more {
                assert!(page.next_cursor.is_none());
                break;
            }
            cursor = page.next_cursor;
        }

        assert_eq!(seen, (1..=7).map(UserId).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn exact_multiple_of_limit_ends_without_cursor() {
        let service = service_with_users(4).await;
        let first = service.list_users(None, Some(2)).await.unwrap();
        assert!(first.has_more);
        let second = service
            .list_users(first.next_cursor.as_deref(), Some(2))
            .await
            .unwrap();
        assert_eq!(second.items.len(), 2);
        assert!(!second.has_more);
        assert!(second.next_cursor.is_none());
    }

    #[tokio::test]
    async fn tampered_cursor_is_rejected() {
        let service = service_with_users(1).await;
        assert!(matches!(
            service.list_users(Some("bogus"), None).await,
            Err(UserError::InvalidCursor)
        ));
        let too_big = IdCursor(u64::MAX).to_string();
        assert!(matches!(
            service.list_users(Some(&too_big), None).await,
            Err(UserError::InvalidCursor)
        ));
    }

    #[tokio::test]
    async fn updates_report_missing_users() {
        let service = service_with_users(1).await;
        let updated = service
            .admin_update(
                UserId(1),
                AdminUserUpdate {
                    role: Some(Role::Admin),
                    ..AdminUserUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.role, Role::Admin);

        assert!(matches!(
            service
                .update_profile(UserId(2), ProfileUpdate::default())
                .await,
            Err(UserError::NotFound)
        ));
    }
}
