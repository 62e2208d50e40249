//! Driving port for pool creation and settings.

use async_trait::async_trait;

use crate::domain::{Error, Pool, PoolCode, PoolDraft, PoolId, PoolPatch, UserId};

/// Create pools and manage their settings.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PoolRegistry: Send + Sync {
    /// Create a pool with a fresh join code; the creator becomes its admin.
    async fn create_pool(&self, creator: &UserId, draft: PoolDraft) -> Result<Pool, Error>;

    /// Fetch a pool by id.
    async fn get_pool(&self, pool_id: &PoolId) -> Result<Pool, Error>;

    /// Fetch a pool by join code (case-insensitive).
    async fn get_pool_by_code(&self, code: &PoolCode) -> Result<Pool, Error>;

    /// Update pool settings; admins only.
    async fn update_pool(
        &self,
        user_id: &UserId,
        pool_id: &PoolId,
        patch: PoolPatch,
    ) -> Result<Pool, Error>;

    /// Pools the user belongs to, newest first.
    async fn list_my_pools(&self, user_id: &UserId) -> Result<Vec<Pool>, Error>;

    /// Pools left without any admin membership.
    async fn list_orphaned_pools(&self) -> Result<Vec<PoolId>, Error>;
}
