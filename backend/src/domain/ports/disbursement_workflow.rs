//! Driving port for the disbursement voting workflow.

use async_trait::async_trait;

use crate::domain::{
    Disbursement, DisbursementDraft, DisbursementId, DisbursementStatus, Error, PoolId, UserId,
    VoteChoice,
};

/// A member's ballot on a disbursement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastVoteRequest {
    pub voter_id: UserId,
    pub disbursement_id: DisbursementId,
    pub choice: VoteChoice,
    /// Already validated comment (trimmed, at most 280 characters).
    pub comment: Option<String>,
}

/// Result reported by whoever executed the payout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayoutOutcome {
    Succeeded,
    Failed,
}

/// Propose, vote on and pay out disbursements.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DisbursementWorkflow: Send + Sync {
    /// Open a proposal for voting; requester and recipient must be members.
    async fn create_disbursement(
        &self,
        requester_id: &UserId,
        pool_id: &PoolId,
        draft: DisbursementDraft,
    ) -> Result<Disbursement, Error>;

    /// Cast a vote and resolve the proposal when a majority is reached.
    async fn vote(&self, request: CastVoteRequest) -> Result<Disbursement, Error>;

    /// Fetch one disbursement.
    async fn get_disbursement(&self, id: &DisbursementId) -> Result<Disbursement, Error>;

    /// A pool's disbursements, newest first.
    async fn list_disbursements(
        &self,
        pool_id: &PoolId,
        status: Option<DisbursementStatus>,
    ) -> Result<Vec<Disbursement>, Error>;

    /// Withdraw a proposal still open for voting; requester or admin only.
    async fn cancel_disbursement(
        &self,
        user_id: &UserId,
        id: &DisbursementId,
    ) -> Result<Disbursement, Error>;

    /// Move an approved proposal into payout; admins only.
    async fn start_payout(&self, admin_id: &UserId, id: &DisbursementId)
    -> Result<Disbursement, Error>;

    /// Record the payout result; admins only.
    async fn record_payout_outcome(
        &self,
        admin_id: &UserId,
        id: &DisbursementId,
        outcome: PayoutOutcome,
    ) -> Result<Disbursement, Error>;

    /// Reject every proposal whose voting deadline has passed. Returns how
    /// many were expired.
    async fn expire_overdue(&self) -> Result<usize, Error>;
}
