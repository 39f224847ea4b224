//! In-memory user store, used by tests and local runs without Postgres.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::users::repo::{StoreError, UserStore};
use crate::users::repo_types::{User, UserDraft};

#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users.
    pub fn count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, User>> {
        // A poisoned map is still consistent: inserts are a single call.
        self.users.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn taken(users: &HashMap<Uuid, User>, draft: &UserDraft) -> Option<&'static str> {
    fn clash(ours: &Option<String>, theirs: &Option<String>) -> bool {
        matches!((ours, theirs), (Some(a), Some(b)) if a == b)
    }

    users.values().find_map(|u| {
        if clash(&draft.email, &u.email) {
            Some("email")
        } else if clash(&draft.phone_number, &u.phone_number) {
            Some("phone_number")
        } else if clash(&draft.google_id, &u.google_id) {
            Some("google_id")
        } else if clash(&draft.apple_id, &u.apple_id) {
            Some("apple_id")
        } else {
            None
        }
    })
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, draft: UserDraft) -> Result<User, StoreError> {
        if !draft.is_identifiable() {
            return Err(StoreError::Unidentifiable);
        }

        // Check and insert under one guard so concurrent duplicates cannot both land.
        let mut users = self.lock();
        if let Some(field) = taken(&users, &draft) {
            return Err(StoreError::Conflict(field));
        }
        let user = draft.into_user(Uuid::new_v4(), OffsetDateTime::now_utc());
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .lock()
            .values()
            .find(|u| u.email.as_deref() == Some(email))
            .cloned())
    }
}
