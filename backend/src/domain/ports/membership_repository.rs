//! Port for memberships and join requests.

use async_trait::async_trait;

use crate::domain::{JoinRequest, JoinRequestId, JoinRequestStatus, PoolId, PoolMember, UserId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by membership repository adapters.
    pub enum MembershipRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "membership repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "membership repository query failed: {message}",
        /// The request was no longer pending when the resolution was applied.
        AlreadyResolved => "join request has already been resolved",
        /// The user is already a member of the pool.
        AlreadyMember => "user is already a member of this pool",
        /// The pool reached its member limit.
        PoolFull { max_members: u32 } => "pool is full ({max_members} members)",
        /// The user already has a pending request for the pool.
        DuplicatePendingRequest => "a pending join request already exists",
    }
}

/// Membership to create when a join request is approved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub member: PoolMember,
    pub max_members: u32,
}

/// Port for reading memberships and driving join requests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MembershipRepository: Send + Sync {
    /// Fetch the membership of `user_id` in `pool_id`.
    async fn find_member(
        &self,
        pool_id: &PoolId,
        user_id: &UserId,
    ) -> Result<Option<PoolMember>, MembershipRepositoryError>;

    /// All memberships of a pool, oldest first.
    async fn list_members(
        &self,
        pool_id: &PoolId,
    ) -> Result<Vec<PoolMember>, MembershipRepositoryError>;

    /// Number of members in a pool.
    async fn count_members(&self, pool_id: &PoolId) -> Result<u32, MembershipRepositoryError>;

    /// Store a new pending request. Storage rejects a second pending request
    /// for the same (pool, user).
    async fn insert_join_request(
        &self,
        request: &JoinRequest,
    ) -> Result<(), MembershipRepositoryError>;

    /// Fetch a join request by id.
    async fn find_join_request(
        &self,
        id: &JoinRequestId,
    ) -> Result<Option<JoinRequest>, MembershipRepositoryError>;

    /// Fetch the pending request of `user_id` for `pool_id`, if any.
    async fn find_pending_request(
        &self,
        pool_id: &PoolId,
        user_id: &UserId,
    ) -> Result<Option<JoinRequest>, MembershipRepositoryError>;

    /// Requests for a pool, newest first, optionally filtered by status.
    async fn list_join_requests(
        &self,
        pool_id: &PoolId,
        status: Option<JoinRequestStatus>,
    ) -> Result<Vec<JoinRequest>, MembershipRepositoryError>;

    /// Apply a resolution in one atomic step.
    ///
    /// The status change is conditional on the stored request still being
    /// `PENDING`. When `admission` is present the membership is inserted in
    /// the same transaction, after checking the pool's capacity.
    async fn resolve_join_request(
        &self,
        resolved: &JoinRequest,
        admission: Option<Admission>,
    ) -> Result<(), MembershipRepositoryError>;
}
