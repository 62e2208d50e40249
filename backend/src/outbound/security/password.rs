//! Argon2id password digests stored as PHC strings.
//!
//! A digest looks like `$argon2id$v=19$m=19456,t=2,p=1$<salt>$<hash>`. The
//! cost parameters travel with the digest, so raising them later leaves
//! existing credentials verifiable.

use argon2::password_hash::{
    self, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
};
use argon2::{ARGON2ID_IDENT, Algorithm, Argon2, Params, Version};
use rand::RngCore;

use crate::domain::ports::{PasswordHashError, PasswordHasher};

const SALT_LEN: usize = 16;

/// [`PasswordHasher`] producing Argon2id digests.
#[derive(Debug, Clone)]
pub struct Argon2PasswordHasher {
    params: Params,
}

impl Default for Argon2PasswordHasher {
    fn default() -> Self {
        Self {
            params: Params::DEFAULT,
        }
    }
}

impl Argon2PasswordHasher {
    /// Build a hasher with explicit memory (KiB), pass and lane costs.
    pub fn with_cost(
        memory_kib: u32,
        iterations: u32,
        lanes: u32,
    ) -> Result<Self, PasswordHashError> {
        let params = Params::new(memory_kib, iterations, lanes, None)
            .map_err(|error| PasswordHashError::hashing(error.to_string()))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

fn malformed(message: impl Into<String>) -> PasswordHashError {
    PasswordHashError::malformed_digest(message)
}

impl PasswordHasher for Argon2PasswordHasher {
    fn hash(&self, password: &str) -> Result<String, PasswordHashError> {
        let mut salt = [0_u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        let salt = SaltString::encode_b64(&salt)
            .map_err(|error| PasswordHashError::hashing(error.to_string()))?;
        self.argon2()
            .hash_password(password.as_bytes(), &salt)
            .map(|digest| digest.to_string())
            .map_err(|error| PasswordHashError::hashing(error.to_string()))
    }

    fn verify(&self, password: &str, digest: &str) -> Result<bool, PasswordHashError> {
        let parsed = PasswordHash::new(digest).map_err(|error| malformed(error.to_string()))?;
        if parsed.algorithm != ARGON2ID_IDENT {
            return Err(malformed(format!("unsupported algorithm {}", parsed.algorithm)));
        }
        match self.argon2().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(error) => Err(malformed(error.to_string())),
        }
    }
}
