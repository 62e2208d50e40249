//! Port for disbursement persistence with optimistic concurrency.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{Disbursement, DisbursementId, DisbursementStatus, PoolId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by disbursement repository adapters.
    pub enum DisbursementRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "disbursement repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "disbursement repository query failed: {message}",
        /// Another writer saved the row first.
        RevisionMismatch { expected: i64, actual: i64 } =>
            "disbursement revision mismatch: expected {expected}, found {actual}",
        /// Storage already holds a vote from this member.
        DuplicateVote => "member has already voted on this disbursement",
        /// The pool balance cannot cover the payout.
        InsufficientFunds => "pool balance is below the disbursement amount",
    }
}

/// Side effect on the pool balance applied together with a save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolBalanceEffect {
    /// Leave the pool balance untouched.
    None,
    /// Subtract the disbursement amount; fails if the balance is too low.
    Debit,
}

/// Port for writing disbursements and reading them back.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DisbursementRepository: Send + Sync {
    /// Insert a new proposal.
    async fn insert(&self, disbursement: &Disbursement) -> Result<(), DisbursementRepositoryError>;

    /// Fetch a disbursement with its votes in cast order.
    async fn find_by_id(
        &self,
        id: &DisbursementId,
    ) -> Result<Option<Disbursement>, DisbursementRepositoryError>;

    /// Disbursements of a pool, newest first, optionally filtered by status.
    async fn list_for_pool(
        &self,
        pool_id: &PoolId,
        status: Option<DisbursementStatus>,
    ) -> Result<Vec<Disbursement>, DisbursementRepositoryError>;

    /// Persist state, tallies and any newly appended votes.
    ///
    /// Succeeds only when the stored `version` equals `expected_version`;
    /// the stored version is then incremented.
    async fn save(
        &self,
        disbursement: &Disbursement,
        expected_version: i64,
        effect: PoolBalanceEffect,
    ) -> Result<(), DisbursementRepositoryError>;

    /// Proposals still `PENDING_VOTE` whose deadline is at or before `now`.
    async fn list_overdue(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Disbursement>, DisbursementRepositoryError>;
}
