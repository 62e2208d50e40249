//! Driving port for the identity store.

use async_trait::async_trait;

use crate::domain::{Error, LoginCredentials, ProfilePatch, Registration, User, UserId};

/// Register, authenticate and maintain user accounts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Create an account; fails with `conflict` when the email is taken.
    async fn register(&self, registration: Registration) -> Result<User, Error>;

    /// Resolve credentials to a user id, or fail with `unauthorized`.
    async fn authenticate(&self, credentials: &LoginCredentials) -> Result<UserId, Error>;

    /// Read the caller's profile.
    async fn profile(&self, user_id: &UserId) -> Result<User, Error>;

    /// Apply a validated patch to the caller's profile.
    async fn update_profile(&self, user_id: &UserId, patch: ProfilePatch) -> Result<User, Error>;
}
