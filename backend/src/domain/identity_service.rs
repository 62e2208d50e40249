//! Identity store service: registration, login and profile maintenance.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use tracing::{info, warn};

use crate::domain::ports::{IdentityService, PasswordHashError, PasswordHasher, UserRepository};
use crate::domain::service_support::map_user_error;
use crate::domain::{Error, LoginCredentials, ProfilePatch, Registration, User, UserId};

const BAD_CREDENTIALS: &str = "incorrect email or password";

fn map_hash_error(error: PasswordHashError) -> Error {
    warn!(%error, "password digest could not be derived");
    Error::internal("password could not be stored")
}

/// Identity service backed by a user repository and password hasher.
#[derive(Clone)]
pub struct IdentityStore<U, H> {
    users: Arc<U>,
    hasher: Arc<H>,
    clock: Arc<dyn Clock>,
}

impl<U, H> IdentityStore<U, H> {
    /// Create a new identity service.
    pub fn new(users: Arc<U>, hasher: Arc<H>, clock: Arc<dyn Clock>) -> Self {
        Self {
            users,
            hasher,
            clock,
        }
    }
}

#[async_trait]
impl<U, H> IdentityService for IdentityStore<U, H>
where
    U: UserRepository,
    H: PasswordHasher,
{
    async fn register(&self, registration: Registration) -> Result<User, Error> {
        let existing = self
            .users
            .find_by_email(registration.email())
            .await
            .map_err(map_user_error)?;
        if existing.is_some() {
            return Err(Error::conflict(format!(
                "email {} is already registered",
                registration.email()
            )));
        }

        let now = self.clock.utc();
        let user = User {
            id: UserId::random(),
            name: registration.name().clone(),
            email: registration.email().clone(),
            phone: registration.phone().map(str::to_owned),
            age: registration.age(),
            created_at: now,
            updated_at: now,
        };
        let digest = self
            .hasher
            .hash(registration.password())
            .map_err(map_hash_error)?;
        self.users
            .insert(&user, &digest)
            .await
            .map_err(map_user_error)?;
        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    async fn authenticate(&self, credentials: &LoginCredentials) -> Result<UserId, Error> {
        let Some(stored) = self
            .users
            .find_by_email(credentials.email())
            .await
            .map_err(map_user_error)?
        else {
            return Err(Error::unauthorized(BAD_CREDENTIALS));
        };

        match self
            .hasher
            .verify(credentials.password(), &stored.password_hash)
        {
            Ok(true) => Ok(stored.user.id),
            Ok(false) => Err(Error::unauthorized(BAD_CREDENTIALS)),
            Err(error) => {
                warn!(user_id = %stored.user.id, %error, "stored password digest rejected");
                Err(Error::unauthorized(BAD_CREDENTIALS))
            }
        }
    }

    async fn profile(&self, user_id: &UserId) -> Result<User, Error> {
        self.users
            .find_by_id(user_id)
            .await
            .map_err(map_user_error)?
            .ok_or_else(|| Error::not_found(format!("user {user_id} not found")))
    }

    async fn update_profile(&self, user_id: &UserId, patch: ProfilePatch) -> Result<User, Error> {
        let mut user = self.profile(user_id).await?;
        let ProfilePatch {
            name,
            email,
            phone,
            age,
            password,
        } = patch;
        if let Some(name) = name {
            user.name = name;
        }
        if let Some(email) = email.filter(|email| *email != user.email) {
            let taken = self
                .users
                .find_by_email(&email)
                .await
                .map_err(map_user_error)?;
            if taken.is_some() {
                return Err(Error::conflict(format!("email {email} is already registered")));
            }
            user.email = email;
        }
        if let Some(phone) = phone {
            user.phone = phone;
        }
        if age.is_some() {
            user.age = age;
        }
        user.updated_at = self.clock.utc();
        let digest = password
            .map(|password| self.hasher.hash(password.as_str()))
            .transpose()
            .map_err(map_hash_error)?;

        self.users
            .update(&user, digest)
            .await
            .map_err(map_user_error)?;
        Ok(user)
    }
}

#[cfg(test)]
#[path = "identity_service_tests.rs"]
mod tests;
