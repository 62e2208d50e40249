//! Port for pool persistence.

use async_trait::async_trait;

use crate::domain::{Pool, PoolCode, PoolId, PoolMember, UserId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by pool repository adapters.
    pub enum PoolRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "pool repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "pool repository query failed: {message}",
        /// The join code collided with an existing pool at insert time.
        DuplicateCode { code: String } => "join code {code} is already taken",
    }
}

/// Port for creating, reading and updating pools.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PoolRepository: Send + Sync {
    /// Insert the pool and its creator's admin membership atomically.
    async fn create_with_admin(
        &self,
        pool: &Pool,
        admin: &PoolMember,
    ) -> Result<(), PoolRepositoryError>;

    /// Fetch a pool by identifier.
    async fn find_by_id(&self, id: &PoolId) -> Result<Option<Pool>, PoolRepositoryError>;

    /// Fetch a pool by its (upper-case) join code.
    async fn find_by_code(&self, code: &PoolCode) -> Result<Option<Pool>, PoolRepositoryError>;

    /// Whether any pool already uses `code`.
    async fn code_exists(&self, code: &PoolCode) -> Result<bool, PoolRepositoryError>;

    /// Pools the user is a member of, newest first.
    async fn list_for_member(&self, user_id: &UserId) -> Result<Vec<Pool>, PoolRepositoryError>;

    /// Persist editable settings (title, description, max members, status,
    /// `updated_at`). Never writes `current_amount`, which only moves through
    /// the ledger's atomic adjustments.
    async fn update_settings(&self, pool: &Pool) -> Result<(), PoolRepositoryError>;

    /// Pools that have no admin membership.
    async fn list_without_admin(&self) -> Result<Vec<PoolId>, PoolRepositoryError>;
}
