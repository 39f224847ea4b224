use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record as stored. Deliberately not `Serialize`: only `PublicUser` leaves the service.
#[derive(Clone, FromRow)]
pub struct User {
    pub id: Uuid,                      // assigned by the store
    pub email: Option<String>,         // unique when present
    pub phone_number: Option<String>,  // reserved
    pub password_hash: Option<String>, // Argon2 PHC string, local accounts only
    pub google_id: Option<String>,     // reserved
    pub apple_id: Option<String>,      // reserved
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("phone_number", &self.phone_number)
            .field("password_hash", &redacted(&self.password_hash))
            .field("google_id", &self.google_id)
            .field("apple_id", &self.apple_id)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Caller-supplied fields for a new user. The store fills in id and timestamps.
#[derive(Clone, Default)]
pub struct UserDraft {
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
    pub apple_id: Option<String>,
}

impl UserDraft {
    /// Draft for an email + password account.
    pub fn local(email: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            password_hash: Some(password_hash.into()),
            ..Self::default()
        }
    }

    /// At least one of email, phone or a provider id must be present.
    pub fn is_identifiable(&self) -> bool {
        self.email.is_some()
            || self.phone_number.is_some()
            || self.google_id.is_some()
            || self.apple_id.is_some()
    }

    /// Stamp the draft into a full record.
    pub(crate) fn into_user(self, id: Uuid, now: OffsetDateTime) -> User {
        User {
            id,
            email: self.email,
            phone_number: self.phone_number,
            password_hash: self.password_hash,
            google_id: self.google_id,
            apple_id: self.apple_id,
            created_at: now,
            updated_at: now,
        }
    }
}

impl std::fmt::Debug for UserDraft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserDraft")
            .field("email", &self.email)
            .field("phone_number", &self.phone_number)
            .field("password_hash", &redacted(&self.password_hash))
            .field("google_id", &self.google_id)
            .field("apple_id", &self.apple_id)
            .finish()
    }
}

fn redacted(value: &Option<String>) -> Option<&'static str> {
    value.as_ref().map(|_| "<redacted>")
}
