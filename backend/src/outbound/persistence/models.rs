//! Internal Diesel row structs for database operations.
//!
//! These types are implementation details of the persistence layer and must
//! never be exposed to the domain. Enum columns are stored as the domain's
//! stable labels and decoded with `from_label`; a label the domain does not
//! know is reported as a [`RowDecodeError`] rather than silently defaulted.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::{
    ApprovalPolicy, Contribution, ContributionId, ContributionPeriod, ContributionStatus,
    Disbursement, DisbursementId, DisbursementStatus, EmailAddress, JoinRequest, JoinRequestId,
    JoinRequestStatus, MemberRole, Pool, PoolCode, PoolId, PoolMember, PoolStatus, User, UserId,
    UserName, Vote, VoteChoice, VotingWindow,
};

use super::schema::{
    contributions, disbursement_votes, disbursements, join_requests, pool_members, pools, users,
};

/// A stored row that no longer satisfies domain validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("stored {table} row {id} is invalid: {reason}")]
pub(crate) struct RowDecodeError {
    table: &'static str,
    id: Uuid,
    reason: String,
}

impl RowDecodeError {
    fn new(table: &'static str, id: Uuid, reason: impl Into<String>) -> Self {
        Self {
            table,
            id,
            reason: reason.into(),
        }
    }
}

fn label<T>(
    table: &'static str,
    id: Uuid,
    column: &str,
    raw: &str,
    parse: impl FnOnce(&str) -> Option<T>,
) -> Result<T, RowDecodeError> {
    parse(raw).ok_or_else(|| RowDecodeError::new(table, id, format!("unknown {column} {raw:?}")))
}

fn count(table: &'static str, id: Uuid, column: &str, raw: i32) -> Result<u32, RowDecodeError> {
    u32::try_from(raw)
        .map_err(|_| RowDecodeError::new(table, id, format!("negative {column} {raw}")))
}

pub(crate) fn count_to_db(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub age: Option<i16>,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RowDecodeError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let invalid = |reason: String| RowDecodeError::new("users", row.id, reason);
        let name = UserName::new(&row.name).map_err(|err| invalid(err.to_string()))?;
        let email = EmailAddress::new(&row.email).map_err(|err| invalid(err.to_string()))?;
        let age = row
            .age
            .map(u8::try_from)
            .transpose()
            .map_err(|_| invalid(format!("age {:?} out of range", row.age)))?;
        Ok(Self {
            id: UserId::from_uuid(row.id),
            name,
            email,
            phone: row.phone,
            age,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub(crate) struct NewUserRow<'a> {
    pub id: Uuid,
    pub name: &'a str,
    pub email: &'a str,
    pub phone: Option<&'a str>,
    pub age: Option<i16>,
    pub password_hash: &'a str,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'a> NewUserRow<'a> {
    pub(crate) fn new(user: &'a User, password_hash: &'a str) -> Self {
        Self {
            id: *user.id.as_uuid(),
            name: user.name.as_ref(),
            email: user.email.as_ref(),
            phone: user.phone.as_deref(),
            age: user.age.map(i16::from),
            password_hash,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Profile changeset. `password_hash` is skipped when `None`.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = users)]
pub(crate) struct UserUpdate<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub phone: Option<Option<&'a str>>,
    pub age: Option<Option<i16>>,
    pub password_hash: Option<&'a str>,
    pub updated_at: DateTime<Utc>,
}

impl<'a> UserUpdate<'a> {
    pub(crate) fn new(user: &'a User, password_hash: Option<&'a str>) -> Self {
        Self {
            name: user.name.as_ref(),
            email: user.email.as_ref(),
            phone: Some(user.phone.as_deref()),
            age: Some(user.age.map(i16::from)),
            password_hash,
            updated_at: user.updated_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Pools
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = pools)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct PoolRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub community_type: String,
    pub max_members: i32,
    pub contribution_period: String,
    pub contribution_amount_per_member: i64,
    pub benefit_coverage: Vec<String>,
    pub approval_policy: String,
    pub voting_window: String,
    pub pool_code: String,
    pub current_amount: i64,
    pub status: String,
    pub creator_user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PoolRow> for Pool {
    type Error = RowDecodeError;

    fn try_from(row: PoolRow) -> Result<Self, Self::Error> {
        let id = row.id;
        Ok(Self {
            id: PoolId::from_uuid(id),
            max_members: count("pools", id, "max_members", row.max_members)?,
            contribution_period: label(
                "pools",
                id,
                "contribution_period",
                &row.contribution_period,
                ContributionPeriod::from_label,
            )?,
            approval_policy: label(
                "pools",
                id,
                "approval_policy",
                &row.approval_policy,
                ApprovalPolicy::from_label,
            )?,
            voting_window: label(
                "pools",
                id,
                "voting_window",
                &row.voting_window,
                VotingWindow::from_label,
            )?,
            pool_code: PoolCode::parse(&row.pool_code)
                .map_err(|err| RowDecodeError::new("pools", id, err.to_string()))?,
            status: label("pools", id, "status", &row.status, PoolStatus::from_label)?,
            title: row.title,
            description: row.description,
            community_type: row.community_type,
            contribution_amount_per_member: row.contribution_amount_per_member,
            benefit_coverage: row.benefit_coverage,
            current_amount: row.current_amount,
            creator_user_id: UserId::from_uuid(row.creator_user_id),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = pools)]
pub(crate) struct NewPoolRow<'a> {
    pub id: Uuid,
    pub title: &'a str,
    pub description: &'a str,
    pub community_type: &'a str,
    pub max_members: i32,
    pub contribution_period: &'static str,
    pub contribution_amount_per_member: i64,
    pub benefit_coverage: &'a [String],
    pub approval_policy: &'static str,
    pub voting_window: &'static str,
    pub pool_code: &'a str,
    pub current_amount: i64,
    pub status: &'static str,
    pub creator_user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'a> From<&'a Pool> for NewPoolRow<'a> {
    fn from(pool: &'a Pool) -> Self {
        Self {
            id: *pool.id.as_uuid(),
            title: &pool.title,
            description: &pool.description,
            community_type: &pool.community_type,
            max_members: count_to_db(pool.max_members),
            contribution_period: pool.contribution_period.as_str(),
            contribution_amount_per_member: pool.contribution_amount_per_member,
            benefit_coverage: &pool.benefit_coverage,
            approval_policy: pool.approval_policy.as_str(),
            voting_window: pool.voting_window.as_str(),
            pool_code: pool.pool_code.as_ref(),
            current_amount: pool.current_amount,
            status: pool.status.as_str(),
            creator_user_id: *pool.creator_user_id.as_uuid(),
            created_at: pool.created_at,
            updated_at: pool.updated_at,
        }
    }
}

/// Editable settings; `current_amount` is deliberately absent.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = pools)]
pub(crate) struct PoolSettingsUpdate<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub max_members: i32,
    pub status: &'static str,
    pub updated_at: DateTime<Utc>,
}

impl<'a> From<&'a Pool> for PoolSettingsUpdate<'a> {
    fn from(pool: &'a Pool) -> Self {
        Self {
            title: &pool.title,
            description: &pool.description,
            max_members: count_to_db(pool.max_members),
            status: pool.status.as_str(),
            updated_at: pool.updated_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Memberships and join requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = pool_members)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct PoolMemberRow {
    pub pool_id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub joined_at: DateTime<Utc>,
}

impl TryFrom<PoolMemberRow> for PoolMember {
    type Error = RowDecodeError;

    fn try_from(row: PoolMemberRow) -> Result<Self, Self::Error> {
        Ok(Self {
            role: label("pool_members", row.pool_id, "role", &row.role, MemberRole::from_label)?,
            pool_id: PoolId::from_uuid(row.pool_id),
            user_id: UserId::from_uuid(row.user_id),
            joined_at: row.joined_at,
        })
    }
}

impl From<&PoolMember> for PoolMemberRow {
    fn from(member: &PoolMember) -> Self {
        Self {
            pool_id: *member.pool_id.as_uuid(),
            user_id: *member.user_id.as_uuid(),
            role: member.role.as_str().to_owned(),
            joined_at: member.joined_at,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = join_requests)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct JoinRequestRow {
    pub id: Uuid,
    pub pool_id: Uuid,
    pub user_id: Uuid,
    pub status: String,
    pub requested_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<Uuid>,
}

impl TryFrom<JoinRequestRow> for JoinRequest {
    type Error = RowDecodeError;

    fn try_from(row: JoinRequestRow) -> Result<Self, Self::Error> {
        Ok(Self {
            status: label(
                "join_requests",
                row.id,
                "status",
                &row.status,
                JoinRequestStatus::from_label,
            )?,
            id: JoinRequestId::from_uuid(row.id),
            pool_id: PoolId::from_uuid(row.pool_id),
            user_id: UserId::from_uuid(row.user_id),
            requested_at: row.requested_at,
            resolved_at: row.resolved_at,
            resolved_by: row.resolved_by.map(UserId::from_uuid),
        })
    }
}

impl From<&JoinRequest> for JoinRequestRow {
    fn from(request: &JoinRequest) -> Self {
        Self {
            id: *request.id.as_uuid(),
            pool_id: *request.pool_id.as_uuid(),
            user_id: *request.user_id.as_uuid(),
            status: request.status.as_str().to_owned(),
            requested_at: request.requested_at,
            resolved_at: request.resolved_at,
            resolved_by: request.resolved_by.as_ref().map(|id| *id.as_uuid()),
        }
    }
}

// ---------------------------------------------------------------------------
// Contributions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = contributions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct ContributionRow {
    pub id: Uuid,
    pub pool_id: Uuid,
    pub member_id: Uuid,
    pub amount: i64,
    pub status: String,
    pub payment_reference: Option<String>,
    pub contributed_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl TryFrom<ContributionRow> for Contribution {
    type Error = RowDecodeError;

    fn try_from(row: ContributionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            status: label(
                "contributions",
                row.id,
                "status",
                &row.status,
                ContributionStatus::from_label,
            )?,
            id: ContributionId::from_uuid(row.id),
            pool_id: PoolId::from_uuid(row.pool_id),
            member_id: UserId::from_uuid(row.member_id),
            amount: row.amount,
            payment_reference: row.payment_reference,
            contributed_at: row.contributed_at,
            settled_at: row.settled_at,
        })
    }
}

impl From<&Contribution> for ContributionRow {
    fn from(contribution: &Contribution) -> Self {
        Self {
            id: *contribution.id.as_uuid(),
            pool_id: *contribution.pool_id.as_uuid(),
            member_id: *contribution.member_id.as_uuid(),
            amount: contribution.amount,
            status: contribution.status.as_str().to_owned(),
            payment_reference: contribution.payment_reference.clone(),
            contributed_at: contribution.contributed_at,
            settled_at: contribution.settled_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Disbursements and votes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = disbursements)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct DisbursementRow {
    pub id: Uuid,
    pub pool_id: Uuid,
    pub recipient_user_id: Uuid,
    pub requested_by_user_id: Uuid,
    pub amount: i64,
    pub purpose: String,
    pub proof_url: Option<String>,
    pub status: String,
    pub requested_at: DateTime<Utc>,
    pub voting_deadline: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub votes_for: i32,
    pub votes_against: i32,
    pub version: i64,
}

impl DisbursementRow {
    /// Rebuild the aggregate from its row and votes in cast order.
    pub(crate) fn into_domain(self, votes: Vec<VoteRow>) -> Result<Disbursement, RowDecodeError> {
        let id = self.id;
        let votes = votes
            .into_iter()
            .map(Vote::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Disbursement {
            id: DisbursementId::from_uuid(id),
            pool_id: PoolId::from_uuid(self.pool_id),
            recipient_user_id: UserId::from_uuid(self.recipient_user_id),
            requested_by_user_id: UserId::from_uuid(self.requested_by_user_id),
            amount: self.amount,
            purpose: self.purpose,
            proof_url: self.proof_url,
            status: label(
                "disbursements",
                id,
                "status",
                &self.status,
                DisbursementStatus::from_label,
            )?,
            requested_at: self.requested_at,
            voting_deadline: self.voting_deadline,
            resolved_at: self.resolved_at,
            votes_for: count("disbursements", id, "votes_for", self.votes_for)?,
            votes_against: count("disbursements", id, "votes_against", self.votes_against)?,
            votes,
            version: self.version,
        })
    }
}

impl From<&Disbursement> for DisbursementRow {
    fn from(disbursement: &Disbursement) -> Self {
        Self {
            id: *disbursement.id.as_uuid(),
            pool_id: *disbursement.pool_id.as_uuid(),
            recipient_user_id: *disbursement.recipient_user_id.as_uuid(),
            requested_by_user_id: *disbursement.requested_by_user_id.as_uuid(),
            amount: disbursement.amount,
            purpose: disbursement.purpose.clone(),
            proof_url: disbursement.proof_url.clone(),
            status: disbursement.status.as_str().to_owned(),
            requested_at: disbursement.requested_at,
            voting_deadline: disbursement.voting_deadline,
            resolved_at: disbursement.resolved_at,
            votes_for: count_to_db(disbursement.votes_for),
            votes_against: count_to_db(disbursement.votes_against),
            version: disbursement.version,
        }
    }
}

/// State written back by a versioned save.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = disbursements)]
#[diesel(treat_none_as_null = true)]
pub(crate) struct DisbursementStateUpdate<'a> {
    pub status: &'static str,
    pub resolved_at: Option<DateTime<Utc>>,
    pub votes_for: i32,
    pub votes_against: i32,
    pub proof_url: Option<&'a str>,
    pub version: i64,
}

impl<'a> DisbursementStateUpdate<'a> {
    pub(crate) fn new(disbursement: &'a Disbursement, version: i64) -> Self {
        Self {
            status: disbursement.status.as_str(),
            resolved_at: disbursement.resolved_at,
            votes_for: count_to_db(disbursement.votes_for),
            votes_against: count_to_db(disbursement.votes_against),
            proof_url: disbursement.proof_url.as_deref(),
            version,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = disbursement_votes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct VoteRow {
    pub disbursement_id: Uuid,
    pub voter_id: Uuid,
    pub choice: String,
    pub comment: Option<String>,
    pub voted_at: DateTime<Utc>,
}

impl TryFrom<VoteRow> for Vote {
    type Error = RowDecodeError;

    fn try_from(row: VoteRow) -> Result<Self, Self::Error> {
        Ok(Self {
            choice: label(
                "disbursement_votes",
                row.disbursement_id,
                "choice",
                &row.choice,
                VoteChoice::from_label,
            )?,
            voter_id: UserId::from_uuid(row.voter_id),
            voted_at: row.voted_at,
            comment: row.comment,
        })
    }
}

impl VoteRow {
    pub(crate) fn new(disbursement_id: &DisbursementId, vote: &Vote) -> Self {
        Self {
            disbursement_id: *disbursement_id.as_uuid(),
            voter_id: *vote.voter_id.as_uuid(),
            choice: vote.choice.as_str().to_owned(),
            comment: vote.comment.clone(),
            voted_at: vote.voted_at,
        }
    }
}
