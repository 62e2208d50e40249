//! In-memory repositories for local development and tests.
//!
//! A single [`InMemoryStore`] implements every driven repository port over
//! one lock, so operations that touch several records (crediting a pool on
//! settlement, admitting a member after a capacity check, debiting a pool on
//! payout) are atomic in the same way the Diesel adapters make them atomic
//! with a transaction. Nothing survives a restart.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::ports::{
    Admission, ContributionRepository, ContributionRepositoryError, DisbursementRepository,
    DisbursementRepositoryError, MembershipRepository, MembershipRepositoryError,
    PoolBalanceEffect, PoolRepository, PoolRepositoryError, StoredUser, UserRepository,
    UserRepositoryError,
};
use crate::domain::{
    Contribution, ContributionId, ContributionStatus, Disbursement, DisbursementId,
    DisbursementStatus, EmailAddress, JoinRequest, JoinRequestId, JoinRequestStatus, MemberRole,
    Pool, PoolCode, PoolId, PoolMember, User, UserId, UserSummary,
};

#[derive(Default)]
struct State {
    users: HashMap<UserId, StoredUser>,
    pools: HashMap<PoolId, Pool>,
    members: Vec<PoolMember>,
    join_requests: HashMap<JoinRequestId, JoinRequest>,
    contributions: HashMap<ContributionId, Contribution>,
    disbursements: HashMap<DisbursementId, Disbursement>,
}

impl State {
    fn is_member(&self, pool_id: &PoolId, user_id: &UserId) -> bool {
        self.members
            .iter()
            .any(|member| &member.pool_id == pool_id && &member.user_id == user_id)
    }

    fn member_count(&self, pool_id: &PoolId) -> usize {
        self.members
            .iter()
            .filter(|member| &member.pool_id == pool_id)
            .count()
    }
}

/// Process-local store implementing every repository port.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    /// Empty store; clones share the same state.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn insert(&self, user: &User, password_hash: &str) -> Result<(), UserRepositoryError> {
        let mut state = self.state.write().await;
        if state.users.values().any(|stored| stored.user.email == user.email) {
            return Err(UserRepositoryError::duplicate_email(user.email.as_ref()));
        }
        state.users.insert(
            user.id.clone(),
            StoredUser {
                user: user.clone(),
                password_hash: password_hash.to_owned(),
            },
        );
        Ok(())
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserRepositoryError> {
        let state = self.state.read().await;
        Ok(state.users.get(id).map(|stored| stored.user.clone()))
    }

    async fn find_by_email(
        &self,
        email: &EmailAddress,
    ) -> Result<Option<StoredUser>, UserRepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|stored| &stored.user.email == email)
            .cloned())
    }

    async fn update(
        &self,
        user: &User,
        password_hash: Option<String>,
    ) -> Result<(), UserRepositoryError> {
        let mut state = self.state.write().await;
        if state
            .users
            .values()
            .any(|stored| stored.user.id != user.id && stored.user.email == user.email)
        {
            return Err(UserRepositoryError::duplicate_email(user.email.as_ref()));
        }
        let stored = state
            .users
            .get_mut(&user.id)
            .ok_or_else(|| UserRepositoryError::query(format!("user {} not found", user.id)))?;
        stored.user = user.clone();
        if let Some(hash) = password_hash {
            stored.password_hash = hash;
        }
        Ok(())
    }

    async fn find_summaries(
        &self,
        ids: &[UserId],
    ) -> Result<Vec<UserSummary>, UserRepositoryError> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.users.get(id))
            .map(|stored| stored.user.summary())
            .collect())
    }
}

#[async_trait]
impl PoolRepository for InMemoryStore {
    async fn create_with_admin(
        &self,
        pool: &Pool,
        admin: &PoolMember,
    ) -> Result<(), PoolRepositoryError> {
        let mut state = self.state.write().await;
        if state
            .pools
            .values()
            .any(|existing| existing.pool_code == pool.pool_code)
        {
            return Err(PoolRepositoryError::duplicate_code(pool.pool_code.as_ref()));
        }
        state.pools.insert(pool.id, pool.clone());
        state.members.push(admin.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &PoolId) -> Result<Option<Pool>, PoolRepositoryError> {
        Ok(self.state.read().await.pools.get(id).cloned())
    }

    async fn find_by_code(&self, code: &PoolCode) -> Result<Option<Pool>, PoolRepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .pools
            .values()
            .find(|pool| &pool.pool_code == code)
            .cloned())
    }

    async fn code_exists(&self, code: &PoolCode) -> Result<bool, PoolRepositoryError> {
        let state = self.state.read().await;
        Ok(state.pools.values().any(|pool| &pool.pool_code == code))
    }

    async fn list_for_member(&self, user_id: &UserId) -> Result<Vec<Pool>, PoolRepositoryError> {
        let state = self.state.read().await;
        let mut pools: Vec<Pool> = state
            .pools
            .values()
            .filter(|pool| state.is_member(&pool.id, user_id))
            .cloned()
            .collect();
        pools.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(pools)
    }

    async fn update_settings(&self, pool: &Pool) -> Result<(), PoolRepositoryError> {
        let mut state = self.state.write().await;
        let stored = state
            .pools
            .get_mut(&pool.id)
            .ok_or_else(|| PoolRepositoryError::query(format!("pool {} not found", pool.id)))?;
        stored.title.clone_from(&pool.title);
        stored.description.clone_from(&pool.description);
        stored.max_members = pool.max_members;
        stored.status = pool.status;
        stored.updated_at = pool.updated_at;
        Ok(())
    }

    async fn list_without_admin(&self) -> Result<Vec<PoolId>, PoolRepositoryError> {
        let state = self.state.read().await;
        let mut orphaned: Vec<&Pool> = state
            .pools
            .values()
            .filter(|pool| {
                !state.members.iter().any(|member| {
                    member.pool_id == pool.id && member.role == MemberRole::Admin
                })
            })
            .collect();
        orphaned.sort_by_key(|pool| pool.created_at);
        Ok(orphaned.into_iter().map(|pool| pool.id).collect())
    }
}

#[async_trait]
impl MembershipRepository for InMemoryStore {
    async fn find_member(
        &self,
        pool_id: &PoolId,
        user_id: &UserId,
    ) -> Result<Option<PoolMember>, MembershipRepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .members
            .iter()
            .find(|member| &member.pool_id == pool_id && &member.user_id == user_id)
            .cloned())
    }

    async fn list_members(
        &self,
        pool_id: &PoolId,
    ) -> Result<Vec<PoolMember>, MembershipRepositoryError> {
        let state = self.state.read().await;
        let mut members: Vec<PoolMember> = state
            .members
            .iter()
            .filter(|member| &member.pool_id == pool_id)
            .cloned()
            .collect();
        members.sort_by_key(|member| member.joined_at);
        Ok(members)
    }

    async fn count_members(&self, pool_id: &PoolId) -> Result<u32, MembershipRepositoryError> {
        let count = self.state.read().await.member_count(pool_id);
        u32::try_from(count).map_err(|_| MembershipRepositoryError::query("member count overflow"))
    }

    async fn insert_join_request(
        &self,
        request: &JoinRequest,
    ) -> Result<(), MembershipRepositoryError> {
        let mut state = self.state.write().await;
        let duplicate = state.join_requests.values().any(|existing| {
            existing.pool_id == request.pool_id
                && existing.user_id == request.user_id
                && existing.status == JoinRequestStatus::Pending
        });
        if duplicate {
            return Err(MembershipRepositoryError::DuplicatePendingRequest);
        }
        state.join_requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn find_join_request(
        &self,
        id: &JoinRequestId,
    ) -> Result<Option<JoinRequest>, MembershipRepositoryError> {
        Ok(self.state.read().await.join_requests.get(id).cloned())
    }

    async fn find_pending_request(
        &self,
        pool_id: &PoolId,
        user_id: &UserId,
    ) -> Result<Option<JoinRequest>, MembershipRepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .join_requests
            .values()
            .find(|request| {
                &request.pool_id == pool_id
                    && &request.user_id == user_id
                    && request.status == JoinRequestStatus::Pending
            })
            .cloned())
    }

    async fn list_join_requests(
        &self,
        pool_id: &PoolId,
        status: Option<JoinRequestStatus>,
    ) -> Result<Vec<JoinRequest>, MembershipRepositoryError> {
        let state = self.state.read().await;
        let mut requests: Vec<JoinRequest> = state
            .join_requests
            .values()
            .filter(|request| &request.pool_id == pool_id)
            .filter(|request| status.is_none_or(|wanted| request.status == wanted))
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        Ok(requests)
    }

    async fn resolve_join_request(
        &self,
        resolved: &JoinRequest,
        admission: Option<Admission>,
    ) -> Result<(), MembershipRepositoryError> {
        let mut state = self.state.write().await;
        let still_pending = state
            .join_requests
            .get(&resolved.id)
            .is_some_and(|stored| stored.status == JoinRequestStatus::Pending);
        if !still_pending {
            return Err(MembershipRepositoryError::AlreadyResolved);
        }
        if let Some(Admission {
            member,
            max_members,
        }) = admission
        {
            if state.is_member(&member.pool_id, &member.user_id) {
                return Err(MembershipRepositoryError::AlreadyMember);
            }
            let at_capacity = u32::try_from(state.member_count(&member.pool_id))
                .map_or(true, |count| count >= max_members);
            if at_capacity {
                return Err(MembershipRepositoryError::pool_full(max_members));
            }
            state.members.push(member);
        }
        state.join_requests.insert(resolved.id, resolved.clone());
        Ok(())
    }
}

#[async_trait]
impl ContributionRepository for InMemoryStore {
    async fn insert(&self, contribution: &Contribution) -> Result<(), ContributionRepositoryError> {
        let mut state = self.state.write().await;
        state
            .contributions
            .insert(contribution.id, contribution.clone());
        Ok(())
    }

    async fn attach_reference(
        &self,
        id: &ContributionId,
        reference: &str,
    ) -> Result<(), ContributionRepositoryError> {
        let mut state = self.state.write().await;
        let stored = state
            .contributions
            .get_mut(id)
            .ok_or_else(|| ContributionRepositoryError::query(format!("contribution {id} not found")))?;
        stored.payment_reference = Some(reference.to_owned());
        Ok(())
    }

    async fn find_by_id(
        &self,
        id: &ContributionId,
    ) -> Result<Option<Contribution>, ContributionRepositoryError> {
        Ok(self.state.read().await.contributions.get(id).cloned())
    }

    async fn list_for_member(
        &self,
        pool_id: &PoolId,
        member_id: &UserId,
    ) -> Result<Vec<Contribution>, ContributionRepositoryError> {
        let state = self.state.read().await;
        let mut contributions: Vec<Contribution> = state
            .contributions
            .values()
            .filter(|c| &c.pool_id == pool_id && &c.member_id == member_id)
            .cloned()
            .collect();
        contributions.sort_by(|a, b| b.contributed_at.cmp(&a.contributed_at));
        Ok(contributions)
    }

    async fn settle(
        &self,
        id: &ContributionId,
        status: ContributionStatus,
        settled_at: DateTime<Utc>,
    ) -> Result<(Contribution, bool), ContributionRepositoryError> {
        let mut state = self.state.write().await;
        let stored = state
            .contributions
            .get(id)
            .ok_or_else(|| ContributionRepositoryError::query(format!("contribution {id} not found")))?;
        if stored.status != ContributionStatus::Pending {
            return Ok((stored.clone(), false));
        }
        let mut settled = stored.clone();
        settled.status = status;
        settled.settled_at = Some(settled_at);

        if status == ContributionStatus::Success {
            let pool = state.pools.get_mut(&settled.pool_id).ok_or_else(|| {
                ContributionRepositoryError::query(format!("pool {} not found", settled.pool_id))
            })?;
            pool.current_amount = pool
                .current_amount
                .checked_add(settled.amount)
                .ok_or_else(|| {
                    ContributionRepositoryError::query(format!(
                        "pool {} balance would overflow",
                        settled.pool_id
                    ))
                })?;
        }
        state.contributions.insert(settled.id, settled.clone());
        Ok((settled, true))
    }
}

#[async_trait]
impl DisbursementRepository for InMemoryStore {
    async fn insert(&self, disbursement: &Disbursement) -> Result<(), DisbursementRepositoryError> {
        let mut state = self.state.write().await;
        state
            .disbursements
            .insert(disbursement.id, disbursement.clone());
        Ok(())
    }

    async fn find_by_id(
        &self,
        id: &DisbursementId,
    ) -> Result<Option<Disbursement>, DisbursementRepositoryError> {
        Ok(self.state.read().await.disbursements.get(id).cloned())
    }

    async fn list_for_pool(
        &self,
        pool_id: &PoolId,
        status: Option<DisbursementStatus>,
    ) -> Result<Vec<Disbursement>, DisbursementRepositoryError> {
        let state = self.state.read().await;
        let mut disbursements: Vec<Disbursement> = state
            .disbursements
            .values()
            .filter(|d| &d.pool_id == pool_id)
            .filter(|d| status.is_none_or(|wanted| d.status == wanted))
            .cloned()
            .collect();
        disbursements.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        Ok(disbursements)
    }

    async fn save(
        &self,
        disbursement: &Disbursement,
        expected_version: i64,
        effect: PoolBalanceEffect,
    ) -> Result<(), DisbursementRepositoryError> {
        let mut state = self.state.write().await;
        let actual = state
            .disbursements
            .get(&disbursement.id)
            .map(|stored| stored.version)
            .ok_or_else(|| {
                DisbursementRepositoryError::query(format!(
                    "disbursement {} not found",
                    disbursement.id
                ))
            })?;
        if actual != expected_version {
            return Err(DisbursementRepositoryError::revision_mismatch(
                expected_version,
                actual,
            ));
        }
        let voters: HashSet<&UserId> = disbursement.votes.iter().map(|v| &v.voter_id).collect();
        if voters.len() != disbursement.votes.len() {
            return Err(DisbursementRepositoryError::DuplicateVote);
        }
        if effect == PoolBalanceEffect::Debit {
            let pool = state.pools.get_mut(&disbursement.pool_id).ok_or_else(|| {
                DisbursementRepositoryError::query(format!(
                    "pool {} not found",
                    disbursement.pool_id
                ))
            })?;
            if pool.current_amount < disbursement.amount {
                return Err(DisbursementRepositoryError::InsufficientFunds);
            }
            pool.current_amount -= disbursement.amount;
        }
        let mut stored = disbursement.clone();
        stored.version = expected_version + 1;
        state.disbursements.insert(stored.id, stored);
        Ok(())
    }

    async fn list_overdue(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Disbursement>, DisbursementRepositoryError> {
        let state = self.state.read().await;
        let mut overdue: Vec<Disbursement> = state
            .disbursements
            .values()
            .filter(|d| d.status == DisbursementStatus::PendingVote && d.voting_deadline <= now)
            .cloned()
            .collect();
        overdue.sort_by_key(|d| d.voting_deadline);
        Ok(overdue)
    }
}

#[cfg(test)]
mod tests;
