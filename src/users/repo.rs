use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::users::repo_types::{User, UserDraft};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("a user with this {0} already exists")]
    Conflict(&'static str),

    #[error("user record has no identifying field")]
    Unidentifiable,

    #[error("store operation timed out")]
    Timeout,

    #[error("database error: {0}")]
    Backend(#[from] sqlx::Error),
}

/// Durable user storage. Implementations enforce identity uniqueness at write time.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new user, assigning id and timestamps. Atomic.
    async fn create(&self, draft: UserDraft) -> Result<User, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
}

/// Postgres-backed store. Uniqueness relies on the `UNIQUE` constraints in `migrations/`.
#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, draft: UserDraft) -> Result<User, StoreError> {
        if !draft.is_identifiable() {
            return Err(StoreError::Unidentifiable);
        }

        let id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, phone_number, password_hash, google_id, apple_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING id, email, phone_number, password_hash, google_id, apple_id, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&draft.email)
        .bind(&draft.phone_number)
        .bind(&draft.password_hash)
        .bind(&draft.google_id)
        .bind(&draft.apple_id)
        .bind(now)
        .fetch_one(&self.db)
        .await
        .map_err(map_insert_error)?;

        debug!(user_id = %user.id, "user row inserted");
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, phone_number, password_hash, google_id, apple_id, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }
}

fn map_insert_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            if let Some(field) = conflict_field(db_err.constraint()) {
                return StoreError::Conflict(field);
            }
        }
        if db_err.is_check_violation() {
            return StoreError::Unidentifiable;
        }
    }
    StoreError::Backend(err)
}

/// Identity column guarded by one of the constraints in `migrations/`.
/// Any other unique violation (primary key included) is not an identity conflict.
fn conflict_field(constraint: Option<&str>) -> Option<&'static str> {
    match constraint? {
        "users_email_key" => Some("email"),
        "users_phone_number_key" => Some("phone_number"),
        "users_google_id_key" => Some("google_id"),
        "users_apple_id_key" => Some("apple_id"),
        _ => None,
    }
}
