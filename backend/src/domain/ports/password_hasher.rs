//! Port for password digest creation and verification.
//!
//! The scheme is an adapter concern; the identity service only stores and
//! compares opaque digests.

use super::define_port_error;

define_port_error! {
    /// Errors raised by password hashing adapters.
    pub enum PasswordHashError {
        /// The stored digest could not be parsed.
        MalformedDigest { message: String } => "stored password digest is malformed: {message}",
        /// A digest could not be derived.
        Hashing { message: String } => "password hashing failed: {message}",
    }
}

/// Derive and check password digests.
#[cfg_attr(test, mockall::automock)]
pub trait PasswordHasher: Send + Sync {
    /// Produce a self-describing digest for `password`.
    fn hash(&self, password: &str) -> Result<String, PasswordHashError>;

    /// Check `password` against a digest produced by [`PasswordHasher::hash`].
    fn verify(&self, password: &str, digest: &str) -> Result<bool, PasswordHashError>;
}
