use std::{sync::Arc, time::Duration};

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::{
    auth::{
        dto::{PublicUser, SignUpRequest},
        password::{CredentialHasher, HashingError},
    },
    error::{AuthError, ValidationErrors},
    users::{StoreError, UserDraft, UserStore},
};

pub const MIN_PASSWORD_CHARS: usize = 8;
const MAX_EMAIL_BYTES: usize = 254;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex =
            Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex compiles");
    }
    email.len() <= MAX_EMAIL_BYTES && EMAIL_RE.is_match(email)
}

/// Check the whole request and report every bad field at once.
pub fn validate_signup(req: &SignUpRequest) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();

    if req.email.is_empty() {
        errors.add("email", "is required");
    } else if !is_valid_email(&req.email) {
        errors.add("email", "must be a valid email address");
    }

    if req.password.is_empty() {
        errors.add("password", "is required");
    } else if req.password.chars().count() < MIN_PASSWORD_CHARS {
        errors.add(
            "password",
            format!("must be at least {MIN_PASSWORD_CHARS} characters"),
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Signup pipeline: validate, hash, persist, sanitize.
#[derive(Clone)]
pub struct RegistrationService {
    users: Arc<dyn UserStore>,
    hasher: Arc<dyn CredentialHasher>,
    store_timeout: Duration,
}

impl RegistrationService {
    pub fn new(
        users: Arc<dyn UserStore>,
        hasher: Arc<dyn CredentialHasher>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            users,
            hasher,
            store_timeout,
        }
    }

    pub async fn signup(&self, req: SignUpRequest) -> Result<PublicUser, AuthError> {
        if let Err(errors) = validate_signup(&req) {
            warn!(fields = %errors, "signup rejected");
            return Err(AuthError::Validation(errors));
        }
        let SignUpRequest { email, password } = req;

        // Argon2 is CPU bound; keep it off the async workers.
        let hasher = Arc::clone(&self.hasher);
        let password_hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| HashingError::new(e.to_string()))??;
        debug!("credential hashed");

        let draft = UserDraft::local(email, password_hash);
        let user = tokio::time::timeout(self.store_timeout, self.users.create(draft))
            .await
            .map_err(|_| StoreError::Timeout)??;

        info!(user_id = %user.id, "user registered");
        Ok(PublicUser::from(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::password::cheap_hasher, users::MemoryUserStore, users::User};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn req(email: &str, password: &str) -> SignUpRequest {
        SignUpRequest {
            email: email.into(),
            password: password.into(),
        }
    }

    fn service(store: Arc<MemoryUserStore>) -> RegistrationService {
        RegistrationService::new(store, Arc::new(cheap_hasher()), Duration::from_secs(5))
    }

    /// Hasher that counts calls and always fails.
    #[derive(Default)]
    struct FailingHasher {
        calls: AtomicUsize,
    }

    impl CredentialHasher for FailingHasher {
        fn hash(&self, _secret: &str) -> Result<String, HashingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(HashingError::new("primitive rejected input"))
        }
        fn verify(&self, _secret: &str, _hashed: &str) -> Result<bool, HashingError> {
            Ok(false)
        }
    }

    /// Store that never answers in time.
    struct SlowStore;

    #[async_trait]
    impl UserStore for SlowStore {
        async fn create(&self, draft: UserDraft) -> Result<User, StoreError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(draft.into_user(uuid::Uuid::new_v4(), time::OffsetDateTime::now_utc()))
        }
        async fn find_by_email(&self, _email: &str) -> Result<Option<User>, StoreError> {
            Ok(None)
        }
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("a@example.com"));
        assert!(is_valid_email("first.last+tag@sub.example.co"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email(" a@example.com"));
        assert!(!is_valid_email("a b@example.com"));
        let long = format!("{}@example.com", "a".repeat(250));
        assert!(!is_valid_email(&long));
    }

    #[test]
    fn validation_reports_every_bad_field() {
        let errors = validate_signup(&req("not-an-email", "short")).unwrap_err();
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["email", "password"]);

        let errors = validate_signup(&req("", "")).unwrap_err();
        assert_eq!(errors.to_string(), "email: is required; password: is required");
    }

    #[test]
    fn password_length_counts_characters() {
        assert!(validate_signup(&req("a@example.com", "hunter22")).is_ok());
        assert!(validate_signup(&req("a@example.com", "hunter2")).is_err());
        // 8 characters, more than 8 bytes
        assert!(validate_signup(&req("a@example.com", "ééééééé1")).is_ok());
        // 4 characters, 8 bytes
        assert!(validate_signup(&req("a@example.com", "éééé")).is_err());
    }

    #[tokio::test]
    async fn signup_returns_sanitized_user() {
        let store = Arc::new(MemoryUserStore::new());
        let user = service(Arc::clone(&store))
            .signup(req("a@example.com", "hunter22"))
            .await
            .unwrap();

        assert!(!user.id.is_nil());
        assert_eq!(user.email.as_deref(), Some("a@example.com"));
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("password"));
        assert!(!json.contains("hunter22"));
    }

    #[tokio::test]
    async fn stored_hash_verifies_against_submitted_password() {
        let store = Arc::new(MemoryUserStore::new());
        service(Arc::clone(&store))
            .signup(req("a@example.com", "hunter22"))
            .await
            .unwrap();

        let stored = store.find_by_email("a@example.com").await.unwrap().unwrap();
        let hash = stored.password_hash.expect("local account has a hash");
        assert_ne!(hash, "hunter22");
        assert!(cheap_hasher().verify("hunter22", &hash).unwrap());
        assert!(!cheap_hasher().verify("hunter23", &hash).unwrap());
    }

    #[tokio::test]
    async fn email_is_stored_exactly_as_submitted() {
        let store = Arc::new(MemoryUserStore::new());
        let user = service(Arc::clone(&store))
            .signup(req("Mixed.Case@Example.com", "hunter22"))
            .await
            .unwrap();
        assert_eq!(user.email.as_deref(), Some("Mixed.Case@Example.com"));
        assert!(store
            .find_by_email("Mixed.Case@Example.com")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn short_password_never_reaches_the_store() {
        let store = Arc::new(MemoryUserStore::new());
        let err = service(Arc::clone(&store))
            .signup(req("a@example.com", "short"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
        assert_eq!(store.count(), 0);
    }

    #[tokio::test]
    async fn malformed_email_is_rejected_before_hashing() {
        let hasher = Arc::new(FailingHasher::default());
        let svc = RegistrationService::new(
            Arc::new(MemoryUserStore::new()),
            Arc::clone(&hasher) as Arc<dyn CredentialHasher>,
            Duration::from_secs(5),
        );
        let err = svc.signup(req("not-an-email", "hunter22")).await.unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
        assert_eq!(hasher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn hashing_failure_is_reported_and_nothing_is_stored() {
        let store = Arc::new(MemoryUserStore::new());
        let svc = RegistrationService::new(
            Arc::clone(&store) as Arc<dyn UserStore>,
            Arc::new(FailingHasher::default()),
            Duration::from_secs(5),
        );
        let err = svc.signup(req("a@example.com", "hunter22")).await.unwrap_err();
        assert!(matches!(err, AuthError::Hashing(_)));
        assert_eq!(store.count(), 0);
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let svc = service(Arc::new(MemoryUserStore::new()));
        svc.signup(req("a@example.com", "hunter22")).await.unwrap();
        let err = svc.signup(req("a@example.com", "another-pass")).await.unwrap_err();
        assert!(matches!(err, AuthError::Conflict("email")));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_signups_with_same_email_yield_one_user() {
        let store = Arc::new(MemoryUserStore::new());
        let svc = service(Arc::clone(&store));
        let (a, b) = tokio::join!(
            svc.signup(req("race@example.com", "hunter22")),
            svc.signup(req("race@example.com", "hunter33")),
        );

        let results = [a, b];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(AuthError::Conflict("email")))));
        assert_eq!(store.count(), 1);
    }

    #[tokio::test]
    async fn slow_store_times_out_as_storage_error() {
        let svc = RegistrationService::new(
            Arc::new(SlowStore),
            Arc::new(cheap_hasher()),
            Duration::from_millis(50),
        );
        let err = svc.signup(req("a@example.com", "hunter22")).await.unwrap_err();
        assert!(matches!(err, AuthError::Storage(_)));
        assert!(err.to_string().contains("timed out"));
    }
}
