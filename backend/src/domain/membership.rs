//! Pool membership and join-request records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ids::{JoinRequestId, PoolId};
use super::user::{UserId, UserSummary};

/// Role of a user within a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberRole {
    Admin,
    Member,
}

impl MemberRole {
    /// Stable storage label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Member => "MEMBER",
        }
    }

    /// Parse a storage label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "ADMIN" => Some(Self::Admin),
            "MEMBER" => Some(Self::Member),
            _ => None,
        }
    }
}

/// A user's membership of a pool. At most one exists per (pool, user).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolMember {
    pub pool_id: PoolId,
    pub user_id: UserId,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
}

impl PoolMember {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == MemberRole::Admin
    }
}

/// Membership joined with the member's public profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberView {
    pub member: PoolMember,
    pub user: Option<UserSummary>,
}

/// Lifecycle of a join request: `PENDING` resolves exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JoinRequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl JoinRequestStatus {
    /// Stable storage label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }

    /// Parse a storage label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "PENDING" => Some(Self::Pending),
            "APPROVED" => Some(Self::Approved),
            "REJECTED" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// Admin decision on a pending join request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinDecision {
    Approve,
    Reject,
}

impl JoinDecision {
    /// Map a requested target status onto a decision.
    ///
    /// Only the two terminal states are valid decisions; `PENDING` is not.
    #[must_use]
    pub const fn from_status(status: JoinRequestStatus) -> Option<Self> {
        match status {
            JoinRequestStatus::Approved => Some(Self::Approve),
            JoinRequestStatus::Rejected => Some(Self::Reject),
            JoinRequestStatus::Pending => None,
        }
    }

    /// Status a request ends in after this decision.
    #[must_use]
    pub const fn resulting_status(self) -> JoinRequestStatus {
        match self {
            Self::Approve => JoinRequestStatus::Approved,
            Self::Reject => JoinRequestStatus::Rejected,
        }
    }
}

/// A user's request to join a pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    pub id: JoinRequestId,
    pub pool_id: PoolId,
    pub user_id: UserId,
    pub status: JoinRequestStatus,
    pub requested_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<UserId>,
}

impl JoinRequest {
    /// Create a new pending request.
    #[must_use]
    pub fn pending(pool_id: PoolId, user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: JoinRequestId::random(),
            pool_id,
            user_id,
            status: JoinRequestStatus::Pending,
            requested_at: now,
            resolved_at: None,
            resolved_by: None,
        }
    }
}

/// Join request joined with the requester's public profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequestView {
    pub request: JoinRequest,
    pub user: Option<UserSummary>,
}
