//! Disbursement workflow service.
//!
//! Votes are applied with optimistic concurrency: the aggregate is loaded,
//! mutated in memory and saved against the version it was loaded at. A
//! concurrent writer makes the save fail with a revision mismatch, in which
//! case the whole read-decide-write cycle is retried.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use tracing::{debug, info, warn};

use crate::domain::ports::{
    CastVoteRequest, DisbursementRepository, DisbursementRepositoryError, DisbursementWorkflow,
    MembershipRepository, PayoutOutcome, PoolBalanceEffect, PoolRepository,
};
use crate::domain::service_support::{
    invalid_field, load_pool, map_membership_error, require_admin, require_member,
};
use crate::domain::{
    Disbursement, DisbursementDraft, DisbursementId, DisbursementStatus,
    DisbursementTransitionError, Error, PoolId, UserId, Vote, VoteEffect,
};

/// Number of read-decide-write cycles a vote may take before giving up.
pub const MAX_VOTE_ATTEMPTS: usize = 3;

fn map_disbursement_error(error: DisbursementRepositoryError) -> Error {
    match error {
        DisbursementRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("disbursement repository unavailable: {message}"))
        }
        DisbursementRepositoryError::Query { message } => {
            Error::internal(format!("disbursement repository error: {message}"))
        }
        DisbursementRepositoryError::RevisionMismatch { .. } => Error::conflict(
            "disbursement was modified concurrently, try again",
        ),
        DisbursementRepositoryError::DuplicateVote => {
            Error::forbidden("you have already voted on this disbursement")
        }
        DisbursementRepositoryError::InsufficientFunds => {
            Error::conflict("pool balance is below the disbursement amount")
        }
    }
}

fn map_transition_error(error: DisbursementTransitionError) -> Error {
    match error {
        DisbursementTransitionError::AlreadyVoted => Error::forbidden(error.to_string()),
        DisbursementTransitionError::NotPendingVote { .. }
        | DisbursementTransitionError::DeadlinePassed
        | DisbursementTransitionError::InvalidTransition { .. }
        | DisbursementTransitionError::InsufficientFunds { .. } => Error::conflict(error.to_string()),
    }
}

/// Disbursement workflow backed by pool, membership and disbursement
/// repositories.
#[derive(Clone)]
pub struct DisbursementService<P, M, D> {
    pools: Arc<P>,
    members: Arc<M>,
    disbursements: Arc<D>,
    clock: Arc<dyn Clock>,
}

impl<P, M, D> DisbursementService<P, M, D> {
    /// Create a new workflow service.
    pub fn new(pools: Arc<P>, members: Arc<M>, disbursements: Arc<D>, clock: Arc<dyn Clock>) -> Self {
        Self {
            pools,
            members,
            disbursements,
            clock,
        }
    }
}

impl<P, M, D> DisbursementService<P, M, D>
where
    P: PoolRepository,
    M: MembershipRepository,
    D: DisbursementRepository,
{
    async fn load(&self, id: &DisbursementId) -> Result<Disbursement, Error> {
        self.disbursements
            .find_by_id(id)
            .await
            .map_err(map_disbursement_error)?
            .ok_or_else(|| Error::not_found(format!("disbursement {id} not found")))
    }

    /// Persist a state change made in memory, bumping the local version to
    /// match storage.
    async fn commit(
        &self,
        disbursement: &mut Disbursement,
        effect: PoolBalanceEffect,
    ) -> Result<(), DisbursementRepositoryError> {
        let expected = disbursement.version;
        self.disbursements
            .save(disbursement, expected, effect)
            .await?;
        disbursement.version = expected + 1;
        Ok(())
    }

    /// Reject `disbursement` if its deadline passed. A lost race is not an
    /// error: whoever won already persisted a resolution, so the stored row
    /// is reloaded.
    async fn expire_lazily(&self, mut disbursement: Disbursement) -> Result<Disbursement, Error> {
        if !disbursement.expire_if_due(self.clock.utc()) {
            return Ok(disbursement);
        }
        match self.commit(&mut disbursement, PoolBalanceEffect::None).await {
            Ok(()) => {
                info!(disbursement_id = %disbursement.id, "disbursement expired");
                Ok(disbursement)
            }
            Err(DisbursementRepositoryError::RevisionMismatch { .. }) => {
                self.load(&disbursement.id).await
            }
            Err(other) => Err(map_disbursement_error(other)),
        }
    }

    async fn try_vote(&self, request: &CastVoteRequest) -> Result<Disbursement, VoteAttempt> {
        let mut disbursement = self.load(&request.disbursement_id).await?;
        require_member(
            self.members.as_ref(),
            &disbursement.pool_id,
            &request.voter_id,
        )
        .await?;
        let pool = load_pool(self.pools.as_ref(), &disbursement.pool_id).await?;
        let member_count = self
            .members
            .count_members(&disbursement.pool_id)
            .await
            .map_err(map_membership_error)?;

        let vote = Vote {
            voter_id: request.voter_id.clone(),
            choice: request.choice,
            voted_at: self.clock.utc(),
            comment: request.comment.clone(),
        };
        match disbursement.cast_vote(vote, member_count, pool.approval_policy) {
            Ok(effect) => {
                self.commit(&mut disbursement, PoolBalanceEffect::None)
                    .await
                    .map_err(VoteAttempt::from_repository)?;
                match effect {
                    VoteEffect::Recorded => debug!(
                        disbursement_id = %disbursement.id,
                        votes_for = disbursement.votes_for,
                        votes_against = disbursement.votes_against,
                        "vote recorded"
                    ),
                    VoteEffect::Resolved(status) => info!(
                        disbursement_id = %disbursement.id,
                        status = status.as_str(),
                        votes_for = disbursement.votes_for,
                        votes_against = disbursement.votes_against,
                        member_count,
                        "disbursement resolved by vote"
                    ),
                }
                Ok(disbursement)
            }
            Err(DisbursementTransitionError::DeadlinePassed) => {
                match self.commit(&mut disbursement, PoolBalanceEffect::None).await {
                    Ok(()) => info!(disbursement_id = %disbursement.id, "disbursement expired"),
                    Err(DisbursementRepositoryError::RevisionMismatch { .. }) => {}
                    Err(other) => return Err(map_disbursement_error(other).into()),
                }
                Err(map_transition_error(DisbursementTransitionError::DeadlinePassed).into())
            }
            Err(other) => Err(map_transition_error(other).into()),
        }
    }
}

/// Outcome of one vote attempt that did not succeed.
enum VoteAttempt {
    /// Another writer saved first; the cycle may be retried.
    Stale,
    Failed(Error),
}

impl VoteAttempt {
    fn from_repository(error: DisbursementRepositoryError) -> Self {
        match error {
            DisbursementRepositoryError::RevisionMismatch { .. } => Self::Stale,
            other => Self::Failed(map_disbursement_error(other)),
        }
    }
}

impl From<Error> for VoteAttempt {
    fn from(error: Error) -> Self {
        Self::Failed(error)
    }
}

#[async_trait]
impl<P, M, D> DisbursementWorkflow for DisbursementService<P, M, D>
where
    P: PoolRepository,
    M: MembershipRepository,
    D: DisbursementRepository,
{
    async fn create_disbursement(
        &self,
        requester_id: &UserId,
        pool_id: &PoolId,
        draft: DisbursementDraft,
    ) -> Result<Disbursement, Error> {
        let pool = load_pool(self.pools.as_ref(), pool_id).await?;
        require_member(self.members.as_ref(), pool_id, requester_id).await?;
        let recipient = self
            .members
            .find_member(pool_id, &draft.recipient_user_id)
            .await
            .map_err(map_membership_error)?;
        if recipient.is_none() {
            return Err(invalid_field(
                "recipientUserId",
                "recipient must be a member of this pool",
            ));
        }

        let disbursement = Disbursement::propose(
            draft,
            *pool_id,
            requester_id.clone(),
            pool.voting_window,
            self.clock.utc(),
        );
        self.disbursements
            .insert(&disbursement)
            .await
            .map_err(map_disbursement_error)?;
        info!(
            disbursement_id = %disbursement.id,
            pool_id = %pool_id,
            amount = disbursement.amount,
            deadline = %disbursement.voting_deadline,
            "disbursement proposed"
        );
        Ok(disbursement)
    }

    async fn vote(&self, request: CastVoteRequest) -> Result<Disbursement, Error> {
        for attempt in 1..=MAX_VOTE_ATTEMPTS {
            match self.try_vote(&request).await {
                Ok(disbursement) => return Ok(disbursement),
                Err(VoteAttempt::Stale) => {
                    debug!(
                        attempt,
                        disbursement_id = %request.disbursement_id,
                        "concurrent update while voting, retrying"
                    );
                }
                Err(VoteAttempt::Failed(error)) => return Err(error),
            }
        }
        warn!(disbursement_id = %request.disbursement_id, "vote retries exhausted");
        Err(Error::conflict(
            "disbursement was modified concurrently, try again",
        ))
    }

    async fn get_disbursement(&self, id: &DisbursementId) -> Result<Disbursement, Error> {
        let disbursement = self.load(id).await?;
        self.expire_lazily(disbursement).await
    }

    async fn list_disbursements(
        &self,
        pool_id: &PoolId,
        status: Option<DisbursementStatus>,
    ) -> Result<Vec<Disbursement>, Error> {
        load_pool(self.pools.as_ref(), pool_id).await?;
        // Stored overdue proposals still read PENDING_VOTE until expired here.
        let stored_status = status.filter(|wanted| *wanted != DisbursementStatus::Rejected);
        let listed = self
            .disbursements
            .list_for_pool(pool_id, stored_status)
            .await
            .map_err(map_disbursement_error)?;
        let mut current = Vec::with_capacity(listed.len());
        for disbursement in listed {
            let disbursement = self.expire_lazily(disbursement).await?;
            if status.is_none_or(|wanted| wanted == disbursement.status) {
                current.push(disbursement);
            }
        }
        Ok(current)
    }

    async fn cancel_disbursement(
        &self,
        user_id: &UserId,
        id: &DisbursementId,
    ) -> Result<Disbursement, Error> {
        let disbursement = self.load(id).await?;
        if &disbursement.requested_by_user_id != user_id {
            require_admin(self.members.as_ref(), &disbursement.pool_id, user_id).await?;
        }
        let mut disbursement = self.expire_lazily(disbursement).await?;
        disbursement
            .cancel(self.clock.utc())
            .map_err(map_transition_error)?;
        self.commit(&mut disbursement, PoolBalanceEffect::None)
            .await
            .map_err(map_disbursement_error)?;
        info!(disbursement_id = %disbursement.id, cancelled_by = %user_id, "disbursement cancelled");
        Ok(disbursement)
    }

    async fn start_payout(
        &self,
        admin_id: &UserId,
        id: &DisbursementId,
    ) -> Result<Disbursement, Error> {
        let mut disbursement = self.load(id).await?;
        require_admin(self.members.as_ref(), &disbursement.pool_id, admin_id).await?;
        let pool = load_pool(self.pools.as_ref(), &disbursement.pool_id).await?;
        disbursement
            .begin_payout(pool.current_amount)
            .map_err(map_transition_error)?;
        self.commit(&mut disbursement, PoolBalanceEffect::None)
            .await
            .map_err(map_disbursement_error)?;
        info!(disbursement_id = %disbursement.id, amount = disbursement.amount, "payout started");
        Ok(disbursement)
    }

    async fn record_payout_outcome(
        &self,
        admin_id: &UserId,
        id: &DisbursementId,
        outcome: PayoutOutcome,
    ) -> Result<Disbursement, Error> {
        let mut disbursement = self.load(id).await?;
        require_admin(self.members.as_ref(), &disbursement.pool_id, admin_id).await?;
        let succeeded = outcome == PayoutOutcome::Succeeded;
        disbursement
            .complete_payout(succeeded)
            .map_err(map_transition_error)?;
        let effect = if succeeded {
            PoolBalanceEffect::Debit
        } else {
            PoolBalanceEffect::None
        };
        self.commit(&mut disbursement, effect)
            .await
            .map_err(map_disbursement_error)?;
        info!(
            disbursement_id = %disbursement.id,
            status = disbursement.status.as_str(),
            "payout recorded"
        );
        Ok(disbursement)
    }

    async fn expire_overdue(&self) -> Result<usize, Error> {
        let now = self.clock.utc();
        let overdue = self
            .disbursements
            .list_overdue(now)
            .await
            .map_err(map_disbursement_error)?;
        let mut expired = 0;
        for mut disbursement in overdue {
            if !disbursement.expire_if_due(now) {
                continue;
            }
            match self.commit(&mut disbursement, PoolBalanceEffect::None).await {
                Ok(()) => expired += 1,
                Err(DisbursementRepositoryError::RevisionMismatch { .. }) => {
                    debug!(disbursement_id = %disbursement.id, "resolved concurrently, skipping");
                }
                Err(other) => return Err(map_disbursement_error(other)),
            }
        }
        if expired > 0 {
            info!(expired, "overdue disbursements rejected");
        }
        Ok(expired)
    }
}

#[cfg(test)]
#[path = "disbursement_service_tests.rs"]
mod tests;
