//! Driving port for join requests and membership reads.

use async_trait::async_trait;

use crate::domain::{
    Error, JoinRequest, JoinRequestId, JoinRequestStatus, JoinRequestView, MemberView, PoolCode,
    PoolId, PoolMember, UserId,
};

/// Admit users into pools and read memberships.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MembershipAdmission: Send + Sync {
    /// File a pending join request using a pool's join code.
    async fn request_to_join(&self, user_id: &UserId, code: &PoolCode)
    -> Result<JoinRequest, Error>;

    /// List a pool's join requests; admins only.
    async fn list_join_requests(
        &self,
        admin_id: &UserId,
        pool_id: &PoolId,
        status: Option<JoinRequestStatus>,
    ) -> Result<Vec<JoinRequestView>, Error>;

    /// Approve or reject a pending request; admins only.
    ///
    /// `target` must be `APPROVED` or `REJECTED`.
    async fn resolve_join_request(
        &self,
        admin_id: &UserId,
        request_id: &JoinRequestId,
        target: JoinRequestStatus,
    ) -> Result<JoinRequest, Error>;

    /// Members of a pool with their public profiles.
    async fn get_members(&self, pool_id: &PoolId) -> Result<Vec<MemberView>, Error>;

    /// The caller's own membership of a pool.
    async fn get_membership(&self, pool_id: &PoolId, user_id: &UserId)
    -> Result<PoolMember, Error>;
}
