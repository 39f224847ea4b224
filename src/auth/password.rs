use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
#[error("credential hashing failed: {0}")]
pub struct HashingError(String);

impl HashingError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<password_hash::Error> for HashingError {
    fn from(e: password_hash::Error) -> Self {
        Self(e.to_string())
    }
}

/// One-way credential transform. The salt is generated per call and embedded in the output.
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, secret: &str) -> Result<String, HashingError>;

    /// `Ok(false)` on mismatch; errors only when `hashed` is not a usable hash string.
    fn verify(&self, secret: &str, hashed: &str) -> Result<bool, HashingError>;
}

/// Argon2id with PHC-formatted output.
#[derive(Clone, Default)]
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
}

impl Argon2Hasher {
    pub fn new(params: Params) -> Self {
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, secret: &str) -> Result<String, HashingError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                HashingError::from(e)
            })?
            .to_string();
        Ok(hash)
    }

    fn verify(&self, secret: &str, hashed: &str) -> Result<bool, HashingError> {
        let parsed = PasswordHash::new(hashed).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            HashingError::from(e)
        })?;
        // Cost parameters come from the stored hash, not from `self`.
        match self.argon2.verify_password(secret.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => {
                error!(error = %e, "argon2 verify_password error");
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
pub(crate) fn cheap_hasher() -> Argon2Hasher {
    Argon2Hasher::new(Params::new(1024, 1, 1, None).expect("valid argon2 params"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let hasher = Argon2Hasher::default();
        let password = "Secur3P@ssw0rd!";
        let hash = hasher.hash(password).expect("hashing should succeed");
        assert!(hasher.verify(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let hasher = cheap_hasher();
        let hash = hasher.hash("correct-horse-battery-staple").expect("hashing should succeed");
        assert!(!hasher.verify("wrong-password", &hash).expect("verify should not error"));
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = cheap_hasher().verify("anything", "not-a-valid-hash").unwrap_err();
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn output_is_salted_argon2id() {
        let hasher = cheap_hasher();
        let a = hasher.hash("hunter22").unwrap();
        let b = hasher.hash("hunter22").unwrap();
        assert!(a.starts_with("$argon2id$"));
        assert_ne!(a, b, "each call must use a fresh salt");
        assert!(!a.contains("hunter22"));
        assert!(hasher.verify("hunter22", &a).unwrap());
        assert!(hasher.verify("hunter22", &b).unwrap());
    }

    #[test]
    fn verify_uses_params_embedded_in_hash() {
        let hash = cheap_hasher().hash("hunter22").unwrap();
        assert!(Argon2Hasher::default().verify("hunter22", &hash).unwrap());
    }

    #[test]
    fn unicode_secrets_roundtrip() {
        let hasher = cheap_hasher();
        let hash = hasher.hash("pässwörd-密码").unwrap();
        assert!(hasher.verify("pässwörd-密码", &hash).unwrap());
        assert!(!hasher.verify("passwörd-密码", &hash).unwrap());
    }
}
