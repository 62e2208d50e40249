//! Response payloads shared across handlers, plus OpenAPI-only schemas.
//!
//! Domain aggregates stay free of wire concerns; these DTOs fix the JSON
//! shape (camelCase keys, string identifiers) clients depend on.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{
    ApprovalPolicy, Contribution, ContributionPeriod, ContributionStatus, Disbursement,
    DisbursementStatus, JoinRequest, JoinRequestStatus, JoinRequestView, MemberRole, MemberView,
    Pool, PoolMember, PoolStatus, User, UserSummary, Vote, VoteChoice, VotingWindow,
};

/// Caller's own account.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    #[schema(example = "3fa85f64-5717-4562-b3fc-2c963f66afa6")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub age: Option<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(value: User) -> Self {
        Self {
            id: value.id.to_string(),
            name: value.name.as_ref().to_owned(),
            email: value.email.as_ref().to_owned(),
            phone: value.phone,
            age: value.age,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

/// Public snapshot of another user.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserSummaryResponse {
    pub id: String,
    pub name: String,
    pub email: String,
}

impl From<UserSummary> for UserSummaryResponse {
    fn from(value: UserSummary) -> Self {
        Self {
            id: value.id.to_string(),
            name: value.name,
            email: value.email,
        }
    }
}

/// Pool settings and balance.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PoolResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub community_type: String,
    pub max_members: u32,
    pub contribution_period: ContributionPeriod,
    pub contribution_amount_per_member: i64,
    pub benefit_coverage: Vec<String>,
    pub approval_policy: ApprovalPolicy,
    pub voting_window: VotingWindow,
    #[schema(example = "K7Q2M9XA")]
    pub pool_code: String,
    pub current_amount: i64,
    pub status: PoolStatus,
    pub creator_user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Pool> for PoolResponse {
    fn from(value: Pool) -> Self {
        Self {
            id: value.id.to_string(),
            title: value.title,
            description: value.description,
            community_type: value.community_type,
            max_members: value.max_members,
            contribution_period: value.contribution_period,
            contribution_amount_per_member: value.contribution_amount_per_member,
            benefit_coverage: value.benefit_coverage,
            approval_policy: value.approval_policy,
            voting_window: value.voting_window,
            pool_code: value.pool_code.to_string(),
            current_amount: value.current_amount,
            status: value.status,
            creator_user_id: value.creator_user_id.to_string(),
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

/// Membership of a user in a pool.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemberResponse {
    pub pool_id: String,
    pub user_id: String,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummaryResponse>,
}

impl From<PoolMember> for MemberResponse {
    fn from(value: PoolMember) -> Self {
        Self {
            pool_id: value.pool_id.to_string(),
            user_id: value.user_id.to_string(),
            role: value.role,
            joined_at: value.joined_at,
            user: None,
        }
    }
}

impl From<MemberView> for MemberResponse {
    fn from(value: MemberView) -> Self {
        Self {
            user: value.user.map(UserSummaryResponse::from),
            ..Self::from(value.member)
        }
    }
}

/// Join request, optionally with the requester's profile.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequestResponse {
    pub id: String,
    pub pool_id: String,
    pub user_id: String,
    pub status: JoinRequestStatus,
    pub requested_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummaryResponse>,
}

impl From<JoinRequest> for JoinRequestResponse {
    fn from(value: JoinRequest) -> Self {
        Self {
            id: value.id.to_string(),
            pool_id: value.pool_id.to_string(),
            user_id: value.user_id.to_string(),
            status: value.status,
            requested_at: value.requested_at,
            resolved_at: value.resolved_at,
            resolved_by: value.resolved_by.map(|id| id.to_string()),
            user: None,
        }
    }
}

impl From<JoinRequestView> for JoinRequestResponse {
    fn from(value: JoinRequestView) -> Self {
        Self {
            user: value.user.map(UserSummaryResponse::from),
            ..Self::from(value.request)
        }
    }
}

/// Contribution ledger entry.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContributionResponse {
    pub id: String,
    pub pool_id: String,
    pub member_id: String,
    pub amount: i64,
    pub status: ContributionStatus,
    pub payment_reference: Option<String>,
    pub contributed_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl From<Contribution> for ContributionResponse {
    fn from(value: Contribution) -> Self {
        Self {
            id: value.id.to_string(),
            pool_id: value.pool_id.to_string(),
            member_id: value.member_id.to_string(),
            amount: value.amount,
            status: value.status,
            payment_reference: value.payment_reference,
            contributed_at: value.contributed_at,
            settled_at: value.settled_at,
        }
    }
}

/// Ballot recorded on a disbursement.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VoteResponse {
    pub voter_id: String,
    pub choice: VoteChoice,
    pub voted_at: DateTime<Utc>,
    pub comment: Option<String>,
}

impl From<Vote> for VoteResponse {
    fn from(value: Vote) -> Self {
        Self {
            voter_id: value.voter_id.to_string(),
            choice: value.choice,
            voted_at: value.voted_at,
            comment: value.comment,
        }
    }
}

/// Disbursement proposal with its tallies and ballots.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DisbursementResponse {
    pub id: String,
    pub pool_id: String,
    pub recipient_user_id: String,
    pub requested_by_user_id: String,
    pub amount: i64,
    pub purpose: String,
    pub proof_url: Option<String>,
    pub status: DisbursementStatus,
    pub requested_at: DateTime<Utc>,
    pub voting_deadline: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub votes_for: u32,
    pub votes_against: u32,
    pub votes: Vec<VoteResponse>,
}

impl From<Disbursement> for DisbursementResponse {
    fn from(value: Disbursement) -> Self {
        Self {
            id: value.id.to_string(),
            pool_id: value.pool_id.to_string(),
            recipient_user_id: value.recipient_user_id.to_string(),
            requested_by_user_id: value.requested_by_user_id.to_string(),
            amount: value.amount,
            purpose: value.purpose,
            proof_url: value.proof_url,
            status: value.status,
            requested_at: value.requested_at,
            voting_deadline: value.voting_deadline,
            resolved_at: value.resolved_at,
            votes_for: value.votes_for,
            votes_against: value.votes_against,
            votes: value.votes.into_iter().map(VoteResponse::from).collect(),
        }
    }
}

/// OpenAPI schema for the failure envelope written by
/// [`crate::inbound::http::error`].
#[derive(ToSchema)]
#[expect(
    dead_code,
    reason = "Used only for OpenAPI schema generation via utoipa"
)]
pub struct ErrorEnvelopeSchema {
    /// Always `false`.
    success: bool,
    /// Same text as `error.message`.
    #[schema(example = "pool is full (10 members)")]
    message: String,
    /// Structured error payload.
    error: crate::domain::Error,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DisbursementId, PoolId, UserId};
    use crate::test_support::fixture_now;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    fn member_views_embed_the_profile() {
        let user_id = UserId::random();
        let view = MemberView {
            member: PoolMember {
                pool_id: PoolId::random(),
                user_id: user_id.clone(),
                role: MemberRole::Admin,
                joined_at: fixture_now(),
            },
            user: Some(UserSummary {
                id: user_id.clone(),
                name: "Siti Rahma".to_owned(),
                email: "siti@example.com".to_owned(),
            }),
        };

        let value = serde_json::to_value(MemberResponse::from(view)).expect("serialise");

        assert_eq!(value["role"], json!("ADMIN"));
        assert_eq!(value["user"]["name"], json!("Siti Rahma"));
        assert_eq!(value["userId"], json!(user_id.to_string()));
    }

    #[rstest]
    fn disbursements_use_camel_case_and_screaming_statuses() {
        let now = fixture_now();
        let disbursement = Disbursement {
            id: DisbursementId::random(),
            pool_id: PoolId::random(),
            recipient_user_id: UserId::random(),
            requested_by_user_id: UserId::random(),
            amount: 250_000,
            purpose: "clinic visit".to_owned(),
            proof_url: None,
            status: DisbursementStatus::PendingVote,
            requested_at: now,
            voting_deadline: now,
            resolved_at: None,
            votes_for: 0,
            votes_against: 0,
            votes: Vec::new(),
            version: 1,
        };

        let value = serde_json::to_value(DisbursementResponse::from(disbursement)).expect("json");

        assert_eq!(value["status"], json!("PENDING_VOTE"));
        assert_eq!(value["votesFor"], json!(0));
        assert!(value.get("version").is_none());
    }
}
