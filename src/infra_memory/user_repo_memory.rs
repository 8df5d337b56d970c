use crate::domain_model::*;
use crate::domain_port::*;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Mutex;

#[derive(Default)]
struct UserTable {
    next_id: i64,
    rows: BTreeMap<UserId, UserRecord>,
}

/// Process-local user table, ordered by id like the SQL backend.
#[derive(Default)]
pub struct MemoryUserRepo {
    table: Mutex<UserTable>,
}

impl MemoryUserRepo {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_table<R>(&self, f: impl FnOnce(&mut UserTable) -> R) -> Result<R, StoreError> {
        let mut table = self
            .table
            .lock()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(f(&mut table))
    }
}

#[async_trait::async_trait]
impl UserRepo for MemoryUserRepo {
    async fn create(&self, user: &NewUser) -> Result<UserRecord, StoreError> {
        self.with_table(|table| {
            if table.rows.values().any(|r| r.email == user.email) {
                return Err(StoreError::Duplicate);
            }
            table.next_id += 1;
            let now = Utc::now();
            let record = UserRecord {
                user_id: UserId(table.next_id),
                email: user.email.clone(),
                password_hash: user.password_hash.clone(),
                display_name: user.display_name.clone(),
                role: Role::User,
                is_active: true,
                created_at: now,
                updated_at: now,
            };
            table.rows.insert(record.user_id, record.clone());
            Ok(record)
        })?
    }

    async fn get_by_id(&self, user_id: UserId) -> Result<Option<UserRecord>, StoreError> {
        self.with_table(|table| table.rows.get(&user_id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        self.with_table(|table| table.rows.values().find(|r| r.email == email).cloned())
    }

    async fn list_after(
        &self,
        after: Option<UserId>,
        limit: u32,
    ) -> Result<Vec<UserRecord>, StoreError> {
        self.with_table(|table| {
            let rows: Box<dyn Iterator<Item = &UserRecord>> = match after {
                Some(after) => Box::new(
                    table
                        .rows
                        .range((std::ops::Bound::Excluded(after), std::ops::Bound::Unbounded))
                        .map(|(_, r)| r),
                ),
                None => Box::new(table.rows.values()),
            };
            rows.take(limit as usize).cloned().collect()
        })
    }

    async fn update(
        &self,
        user_id: UserId,
        changes: &UserChanges,
    ) -> Result<Option<UserRecord>, StoreError> {
        self.with_table(|table| {
            if let Some(email) = &changes.email {
                if table
                    .rows
                    .values()
                    .any(|r| &r.email == email && r.user_id != user_id)
                {
                    return Err(StoreError::Duplicate);
                }
            }
            let Some(record) = table.rows.get_mut(&user_id) else {
                return Ok(None);
            };
            if let Some(email) = &changes.email {
                record.email = email.clone();
            }
            if let Some(display_name) = &changes.display_name {
                record.display_name = display_name.clone();
            }
            if let Some(role) = changes.role {
                record.role = role;
            }
            if let Some(is_active) = changes.is_active {
                record.is_active = is_active;
            }
            record.updated_at = Utc::now();
            Ok(Some(record.clone()))
        })?
    }
}
