//! Port for the contribution ledger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{Contribution, ContributionId, ContributionStatus, PoolId, UserId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by contribution repository adapters.
    pub enum ContributionRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "contribution repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "contribution repository query failed: {message}",
    }
}

/// Port for recording contributions and their settlement.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContributionRepository: Send + Sync {
    /// Insert a new (pending) contribution.
    async fn insert(&self, contribution: &Contribution) -> Result<(), ContributionRepositoryError>;

    /// Record the payment gateway's reference for a contribution.
    async fn attach_reference(
        &self,
        id: &ContributionId,
        reference: &str,
    ) -> Result<(), ContributionRepositoryError>;

    /// Fetch a contribution by id.
    async fn find_by_id(
        &self,
        id: &ContributionId,
    ) -> Result<Option<Contribution>, ContributionRepositoryError>;

    /// Contributions of a member to a pool, newest first.
    async fn list_for_member(
        &self,
        pool_id: &PoolId,
        member_id: &UserId,
    ) -> Result<Vec<Contribution>, ContributionRepositoryError>;

    /// Move a contribution out of `PENDING`.
    ///
    /// The update only applies while the stored status is still `PENDING`;
    /// settling to `SUCCESS` credits the pool's `current_amount` in the same
    /// transaction. Returns the stored contribution afterwards together with
    /// whether this call performed the transition.
    async fn settle(
        &self,
        id: &ContributionId,
        status: ContributionStatus,
        settled_at: DateTime<Utc>,
    ) -> Result<(Contribution, bool), ContributionRepositoryError>;
}
