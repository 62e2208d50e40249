//! Pool registry service: creation with unique join codes and admin-gated
//! settings updates.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use tracing::{debug, info};

use crate::domain::ports::{
    MembershipRepository, PoolCodeGenerator, PoolRegistry, PoolRepository, PoolRepositoryError,
};
use crate::domain::service_support::{
    invalid_field, load_pool, map_membership_error, map_pool_error, require_admin,
};
use crate::domain::{
    Error, MemberRole, Pool, PoolCode, PoolDraft, PoolId, PoolMember, PoolPatch, UserId,
};

/// Upper bound on join-code draws before giving up.
pub const MAX_CODE_ATTEMPTS: usize = 16;

/// Pool registry backed by pool and membership repositories.
#[derive(Clone)]
pub struct PoolRegistryService<P, M> {
    pools: Arc<P>,
    members: Arc<M>,
    codes: Arc<dyn PoolCodeGenerator>,
    clock: Arc<dyn Clock>,
}

impl<P, M> PoolRegistryService<P, M> {
    /// Create a new registry service.
    pub fn new(
        pools: Arc<P>,
        members: Arc<M>,
        codes: Arc<dyn PoolCodeGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            pools,
            members,
            codes,
            clock,
        }
    }
}

#[async_trait]
impl<P, M> PoolRegistry for PoolRegistryService<P, M>
where
    P: PoolRepository,
    M: MembershipRepository,
{
    async fn create_pool(&self, creator: &UserId, draft: PoolDraft) -> Result<Pool, Error> {
        let now = self.clock.utc();
        let pool_id = PoolId::random();
        let admin = PoolMember {
            pool_id,
            user_id: creator.clone(),
            role: MemberRole::Admin,
            joined_at: now,
        };

        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let code = self.codes.generate();
            if self
                .pools
                .code_exists(&code)
                .await
                .map_err(map_pool_error)?
            {
                debug!(attempt, "join code already taken, drawing another");
                continue;
            }

            let pool = draft
                .clone()
                .into_pool(pool_id, code, creator.clone(), now);
            match self.pools.create_with_admin(&pool, &admin).await {
                Ok(()) => {
                    info!(pool_id = %pool.id, creator = %creator, "pool created");
                    return Ok(pool);
                }
                Err(PoolRepositoryError::DuplicateCode { code }) => {
                    debug!(attempt, %code, "join code collided on insert, drawing another");
                }
                Err(other) => return Err(map_pool_error(other)),
            }
        }

        Err(Error::conflict(
            "could not allocate a unique join code, try again",
        ))
    }

    async fn get_pool(&self, pool_id: &PoolId) -> Result<Pool, Error> {
        load_pool(self.pools.as_ref(), pool_id).await
    }

    async fn get_pool_by_code(&self, code: &PoolCode) -> Result<Pool, Error> {
        self.pools
            .find_by_code(code)
            .await
            .map_err(map_pool_error)?
            .ok_or_else(|| Error::not_found("no pool uses this join code"))
    }

    async fn update_pool(
        &self,
        user_id: &UserId,
        pool_id: &PoolId,
        patch: PoolPatch,
    ) -> Result<Pool, Error> {
        let mut pool = load_pool(self.pools.as_ref(), pool_id).await?;
        require_admin(self.members.as_ref(), pool_id, user_id).await?;

        if let Some(max_members) = patch.max_members {
            let current = self
                .members
                .count_members(pool_id)
                .await
                .map_err(map_membership_error)?;
            if max_members < current {
                return Err(invalid_field(
                    "maxMembers",
                    format!("max members cannot be below the current member count ({current})"),
                ));
            }
        }

        patch.apply(&mut pool, self.clock.utc());
        self.pools
            .update_settings(&pool)
            .await
            .map_err(map_pool_error)?;
        info!(pool_id = %pool.id, "pool settings updated");
        Ok(pool)
    }

    async fn list_my_pools(&self, user_id: &UserId) -> Result<Vec<Pool>, Error> {
        self.pools
            .list_for_member(user_id)
            .await
            .map_err(map_pool_error)
    }

    async fn list_orphaned_pools(&self) -> Result<Vec<PoolId>, Error> {
        self.pools
            .list_without_admin()
            .await
            .map_err(map_pool_error)
    }
}

#[cfg(test)]
#[path = "pool_registry_service_tests.rs"]
mod tests;
