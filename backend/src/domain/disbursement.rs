//! Disbursement proposal and its voting state machine.
//!
//! ```text
//! PENDING_VOTE ──► APPROVED ──► PROCESSING_PAYOUT ──► DISBURSED
//!      │                                   └────────► FAILED_PAYOUT
//!      ├─────────► REJECTED   (majority against, or deadline passed)
//!      └─────────► CANCELLED
//! ```
//!
//! Transitions leave `version` untouched. Repositories compare it on save
//! and increment it, so only one of two racing writers succeeds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ids::{DisbursementId, PoolId};
use super::pool::{ApprovalPolicy, PolicyOutcome, VotingWindow};
use super::user::UserId;

/// Maximum purpose length.
pub const PURPOSE_MAX: usize = 500;
/// Maximum vote comment length.
pub const COMMENT_MAX: usize = 280;
/// Maximum proof URL length.
pub const PROOF_URL_MAX: usize = 2048;

/// Lifecycle state of a disbursement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisbursementStatus {
    PendingVote,
    Approved,
    Rejected,
    Cancelled,
    ProcessingPayout,
    Disbursed,
    FailedPayout,
}

impl DisbursementStatus {
    /// Stable storage label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PendingVote => "PENDING_VOTE",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Cancelled => "CANCELLED",
            Self::ProcessingPayout => "PROCESSING_PAYOUT",
            Self::Disbursed => "DISBURSED",
            Self::FailedPayout => "FAILED_PAYOUT",
        }
    }

    /// Parse a storage label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "PENDING_VOTE" => Some(Self::PendingVote),
            "APPROVED" => Some(Self::Approved),
            "REJECTED" => Some(Self::Rejected),
            "CANCELLED" => Some(Self::Cancelled),
            "PROCESSING_PAYOUT" => Some(Self::ProcessingPayout),
            "DISBURSED" => Some(Self::Disbursed),
            "FAILED_PAYOUT" => Some(Self::FailedPayout),
            _ => None,
        }
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Rejected | Self::Cancelled | Self::Disbursed | Self::FailedPayout
        )
    }
}

impl std::fmt::Display for DisbursementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A member's ballot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoteChoice {
    For,
    Against,
}

impl VoteChoice {
    /// Stable storage label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::For => "FOR",
            Self::Against => "AGAINST",
        }
    }

    /// Parse a storage label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "FOR" => Some(Self::For),
            "AGAINST" => Some(Self::Against),
            _ => None,
        }
    }
}

/// A recorded vote, in cast order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vote {
    pub voter_id: UserId,
    pub choice: VoteChoice,
    pub voted_at: DateTime<Utc>,
    pub comment: Option<String>,
}

/// Input validation failures for disbursement operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DisbursementValidationError {
    #[error("amount must be greater than zero")]
    NonPositiveAmount,
    #[error("purpose must not be empty")]
    EmptyPurpose,
    #[error("purpose must be at most {max} characters")]
    PurposeTooLong { max: usize },
    #[error("proof url must be an http(s) URL of at most {max} characters")]
    InvalidProofUrl { max: usize },
    #[error("comment must be at most {max} characters")]
    CommentTooLong { max: usize },
}

impl DisbursementValidationError {
    /// Name of the offending field for structured error details.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::NonPositiveAmount => "amount",
            Self::EmptyPurpose | Self::PurposeTooLong { .. } => "purpose",
            Self::InvalidProofUrl { .. } => "proofUrl",
            Self::CommentTooLong { .. } => "comment",
        }
    }
}

/// Transition failures raised by the state machine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DisbursementTransitionError {
    /// Voting is not open because the disbursement already left `PENDING_VOTE`.
    #[error("disbursement is {status}, voting is closed")]
    NotPendingVote { status: DisbursementStatus },
    /// The voting deadline passed; the disbursement has just been expired.
    #[error("voting deadline has passed")]
    DeadlinePassed,
    /// The voter already cast a ballot on this disbursement.
    #[error("member has already voted on this disbursement")]
    AlreadyVoted,
    /// The requested transition is not allowed from the current state.
    #[error("cannot move disbursement from {from} to {to}")]
    InvalidTransition {
        from: DisbursementStatus,
        to: DisbursementStatus,
    },
    /// The pool does not hold enough funds for the payout.
    #[error("pool balance {available} is below the requested amount {requested}")]
    InsufficientFunds { available: i64, requested: i64 },
}

/// Validated optional vote comment.
pub fn validate_comment(raw: Option<&str>) -> Result<Option<String>, DisbursementValidationError> {
    let Some(comment) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };
    if comment.chars().count() > COMMENT_MAX {
        return Err(DisbursementValidationError::CommentTooLong { max: COMMENT_MAX });
    }
    Ok(Some(comment.to_owned()))
}

/// Unvalidated disbursement proposal.
#[derive(Debug, Clone)]
pub struct DisbursementDraftInput {
    pub recipient_user_id: UserId,
    pub amount: i64,
    pub purpose: String,
    pub proof_url: Option<String>,
}

/// Validated disbursement proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisbursementDraft {
    pub recipient_user_id: UserId,
    pub amount: i64,
    pub purpose: String,
    pub proof_url: Option<String>,
}

impl DisbursementDraft {
    /// Validate proposal fields. Recipient membership is checked by the
    /// service because it needs storage.
    pub fn try_new(input: DisbursementDraftInput) -> Result<Self, DisbursementValidationError> {
        if input.amount <= 0 {
            return Err(DisbursementValidationError::NonPositiveAmount);
        }
        let purpose = input.purpose.trim();
        if purpose.is_empty() {
            return Err(DisbursementValidationError::EmptyPurpose);
        }
        if purpose.chars().count() > PURPOSE_MAX {
            return Err(DisbursementValidationError::PurposeTooLong { max: PURPOSE_MAX });
        }
        let proof_url = input
            .proof_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(|url| {
                let well_formed = (url.starts_with("https://") || url.starts_with("http://"))
                    && url.len() <= PROOF_URL_MAX
                    && !url.chars().any(char::is_whitespace);
                if well_formed {
                    Ok(url.to_owned())
                } else {
                    Err(DisbursementValidationError::InvalidProofUrl { max: PROOF_URL_MAX })
                }
            })
            .transpose()?;
        Ok(Self {
            recipient_user_id: input.recipient_user_id,
            amount: input.amount,
            purpose: purpose.to_owned(),
            proof_url,
        })
    }
}

/// Result of a successful vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteEffect {
    /// The vote was recorded and voting continues.
    Recorded,
    /// The vote pushed the tally over the threshold.
    Resolved(DisbursementStatus),
}

/// Proposal to pay pool funds to a member, decided by vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disbursement {
    pub id: DisbursementId,
    pub pool_id: PoolId,
    pub recipient_user_id: UserId,
    pub requested_by_user_id: UserId,
    pub amount: i64,
    pub purpose: String,
    pub proof_url: Option<String>,
    pub status: DisbursementStatus,
    pub requested_at: DateTime<Utc>,
    pub voting_deadline: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub votes_for: u32,
    pub votes_against: u32,
    pub votes: Vec<Vote>,
    /// Optimistic concurrency revision; starts at 1.
    pub version: i64,
}

impl Disbursement {
    /// Open a new proposal for voting.
    #[must_use]
    pub fn propose(
        draft: DisbursementDraft,
        pool_id: PoolId,
        requested_by: UserId,
        window: VotingWindow,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: DisbursementId::random(),
            pool_id,
            recipient_user_id: draft.recipient_user_id,
            requested_by_user_id: requested_by,
            amount: draft.amount,
            purpose: draft.purpose,
            proof_url: draft.proof_url,
            status: DisbursementStatus::PendingVote,
            requested_at: now,
            voting_deadline: now + window.duration(),
            resolved_at: None,
            votes_for: 0,
            votes_against: 0,
            votes: Vec::new(),
            version: 1,
        }
    }

    /// Whether `voter` already cast a ballot.
    #[must_use]
    pub fn has_voted(&self, voter: &UserId) -> bool {
        self.votes.iter().any(|vote| &vote.voter_id == voter)
    }

    /// Reject an overdue proposal. Returns `true` when the state changed.
    ///
    /// Voting is open strictly before the deadline.
    pub fn expire_if_due(&mut self, now: DateTime<Utc>) -> bool {
        if self.status == DisbursementStatus::PendingVote && now >= self.voting_deadline {
            self.status = DisbursementStatus::Rejected;
            self.resolved_at = Some(now);
            true
        } else {
            false
        }
    }

    /// Record a vote and resolve the proposal when the policy decides it.
    ///
    /// On [`DisbursementTransitionError::DeadlinePassed`] the aggregate has
    /// been moved to `REJECTED` and must still be persisted.
    pub fn cast_vote(
        &mut self,
        vote: Vote,
        member_count: u32,
        policy: ApprovalPolicy,
    ) -> Result<VoteEffect, DisbursementTransitionError> {
        if self.expire_if_due(vote.voted_at) {
            return Err(DisbursementTransitionError::DeadlinePassed);
        }
        if self.status != DisbursementStatus::PendingVote {
            return Err(DisbursementTransitionError::NotPendingVote {
                status: self.status,
            });
        }
        if self.has_voted(&vote.voter_id) {
            return Err(DisbursementTransitionError::AlreadyVoted);
        }

        let now = vote.voted_at;
        match vote.choice {
            VoteChoice::For => self.votes_for = self.votes_for.saturating_add(1),
            VoteChoice::Against => self.votes_against = self.votes_against.saturating_add(1),
        }
        self.votes.push(vote);

        let resolved = match policy.evaluate(self.votes_for, self.votes_against, member_count) {
            PolicyOutcome::Approved => DisbursementStatus::Approved,
            PolicyOutcome::Rejected => DisbursementStatus::Rejected,
            PolicyOutcome::Undecided => return Ok(VoteEffect::Recorded),
        };
        self.status = resolved;
        self.resolved_at = Some(now);
        Ok(VoteEffect::Resolved(resolved))
    }

    /// Withdraw a proposal that is still open for voting.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), DisbursementTransitionError> {
        self.transition(
            DisbursementStatus::PendingVote,
            DisbursementStatus::Cancelled,
        )?;
        self.resolved_at = Some(now);
        Ok(())
    }

    /// Start paying out an approved proposal from `available` pool funds.
    pub fn begin_payout(&mut self, available: i64) -> Result<(), DisbursementTransitionError> {
        if self.status == DisbursementStatus::Approved && available < self.amount {
            return Err(DisbursementTransitionError::InsufficientFunds {
                available,
                requested: self.amount,
            });
        }
        self.transition(
            DisbursementStatus::Approved,
            DisbursementStatus::ProcessingPayout,
        )
    }

    /// Record the payout result.
    pub fn complete_payout(&mut self, succeeded: bool) -> Result<(), DisbursementTransitionError> {
        let target = if succeeded {
            DisbursementStatus::Disbursed
        } else {
            DisbursementStatus::FailedPayout
        };
        self.transition(DisbursementStatus::ProcessingPayout, target)
    }

    fn transition(
        &mut self,
        from: DisbursementStatus,
        to: DisbursementStatus,
    ) -> Result<(), DisbursementTransitionError> {
        if self.status != from {
            return Err(DisbursementTransitionError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}

#[cfg(test)]
#[path = "disbursement_tests.rs"]
mod tests;
