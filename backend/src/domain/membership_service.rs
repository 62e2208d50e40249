//! Membership admission service: join requests, admin resolution and
//! membership reads.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use tracing::info;

use crate::domain::ports::{
    Admission, MembershipAdmission, MembershipRepository, PoolRepository, UserRepository,
};
use crate::domain::service_support::{
    invalid_field, load_pool, map_membership_error, map_pool_error, require_admin,
    summaries_by_id,
};
use crate::domain::{
    Error, JoinDecision, JoinRequest, JoinRequestId, JoinRequestStatus, JoinRequestView,
    MemberRole, MemberView, PoolCode, PoolId, PoolMember, PoolStatus, UserId,
};

/// Membership admission backed by pool, membership and user repositories.
#[derive(Clone)]
pub struct MembershipService<P, M, U> {
    pools: Arc<P>,
    members: Arc<M>,
    users: Arc<U>,
    clock: Arc<dyn Clock>,
}

impl<P, M, U> MembershipService<P, M, U> {
    /// Create a new admission service.
    pub fn new(pools: Arc<P>, members: Arc<M>, users: Arc<U>, clock: Arc<dyn Clock>) -> Self {
        Self {
            pools,
            members,
            users,
            clock,
        }
    }
}

#[async_trait]
impl<P, M, U> MembershipAdmission for MembershipService<P, M, U>
where
    P: PoolRepository,
    M: MembershipRepository,
    U: UserRepository,
{
    async fn request_to_join(
        &self,
        user_id: &UserId,
        code: &PoolCode,
    ) -> Result<JoinRequest, Error> {
        let pool = self
            .pools
            .find_by_code(code)
            .await
            .map_err(map_pool_error)?
            .ok_or_else(|| Error::not_found("no pool uses this join code"))?;

        let existing = self
            .members
            .find_member(&pool.id, user_id)
            .await
            .map_err(map_membership_error)?;
        if existing.is_some() {
            return Err(Error::conflict("you are already a member of this pool"));
        }
        let pending = self
            .members
            .find_pending_request(&pool.id, user_id)
            .await
            .map_err(map_membership_error)?;
        if pending.is_some() {
            return Err(Error::conflict(
                "you already have a pending request for this pool",
            ));
        }
        if pool.status == PoolStatus::Closed {
            return Err(Error::conflict("this pool is not accepting new members"));
        }
        let count = self
            .members
            .count_members(&pool.id)
            .await
            .map_err(map_membership_error)?;
        if count >= pool.max_members {
            return Err(Error::conflict(format!(
                "pool is full ({} members)",
                pool.max_members
            )));
        }

        let request = JoinRequest::pending(pool.id, user_id.clone(), self.clock.utc());
        self.members
            .insert_join_request(&request)
            .await
            .map_err(map_membership_error)?;
        info!(pool_id = %pool.id, user_id = %user_id, request_id = %request.id, "join requested");
        Ok(request)
    }

    async fn list_join_requests(
        &self,
        admin_id: &UserId,
        pool_id: &PoolId,
        status: Option<JoinRequestStatus>,
    ) -> Result<Vec<JoinRequestView>, Error> {
        load_pool(self.pools.as_ref(), pool_id).await?;
        require_admin(self.members.as_ref(), pool_id, admin_id).await?;

        let requests = self
            .members
            .list_join_requests(pool_id, status)
            .await
            .map_err(map_membership_error)?;
        let ids = requests.iter().map(|request| request.user_id.clone()).collect();
        let mut summaries = summaries_by_id(self.users.as_ref(), ids).await?;
        Ok(requests
            .into_iter()
            .map(|request| JoinRequestView {
                user: summaries.remove(&request.user_id),
                request,
            })
            .collect())
    }

    async fn resolve_join_request(
        &self,
        admin_id: &UserId,
        request_id: &JoinRequestId,
        target: JoinRequestStatus,
    ) -> Result<JoinRequest, Error> {
        let mut request = self
            .members
            .find_join_request(request_id)
            .await
            .map_err(map_membership_error)?
            .ok_or_else(|| Error::not_found(format!("join request {request_id} not found")))?;
        require_admin(self.members.as_ref(), &request.pool_id, admin_id).await?;

        let Some(decision) = JoinDecision::from_status(target) else {
            return Err(invalid_field(
                "status",
                "status must be APPROVED or REJECTED",
            ));
        };
        if request.status != JoinRequestStatus::Pending {
            return Err(Error::conflict(format!(
                "join request is already {}",
                request.status.as_str()
            )));
        }

        let now = self.clock.utc();
        request.status = decision.resulting_status();
        request.resolved_at = Some(now);
        request.resolved_by = Some(admin_id.clone());

        let admission = match decision {
            JoinDecision::Approve => {
                let pool = load_pool(self.pools.as_ref(), &request.pool_id).await?;
                Some(Admission {
                    member: PoolMember {
                        pool_id: request.pool_id,
                        user_id: request.user_id.clone(),
                        role: MemberRole::Member,
                        joined_at: now,
                    },
                    max_members: pool.max_members,
                })
            }
            JoinDecision::Reject => None,
        };

        self.members
            .resolve_join_request(&request, admission)
            .await
            .map_err(map_membership_error)?;
        info!(
            request_id = %request.id,
            pool_id = %request.pool_id,
            status = request.status.as_str(),
            "join request resolved"
        );
        Ok(request)
    }

    async fn get_members(&self, pool_id: &PoolId) -> Result<Vec<MemberView>, Error> {
        load_pool(self.pools.as_ref(), pool_id).await?;
        let members = self
            .members
            .list_members(pool_id)
            .await
            .map_err(map_membership_error)?;
        let ids = members.iter().map(|member| member.user_id.clone()).collect();
        let mut summaries = summaries_by_id(self.users.as_ref(), ids).await?;
        Ok(members
            .into_iter()
            .map(|member| MemberView {
                user: summaries.remove(&member.user_id),
                member,
            })
            .collect())
    }

    async fn get_membership(
        &self,
        pool_id: &PoolId,
        user_id: &UserId,
    ) -> Result<PoolMember, Error> {
        self.members
            .find_member(pool_id, user_id)
            .await
            .map_err(map_membership_error)?
            .ok_or_else(|| Error::not_found("you are not a member of this pool"))
    }
}

#[cfg(test)]
#[path = "membership_service_tests.rs"]
mod tests;
