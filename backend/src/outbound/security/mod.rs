//! Credential and join-code adapters.

mod password;
mod pool_codes;

pub use password::Argon2PasswordHasher;
pub use pool_codes::RandomPoolCodeGenerator;
