//! Helpers shared by the pool domain services: repository error mapping,
//! authorisation guards and read-side joins.

use std::collections::HashMap;

use serde_json::json;

use crate::domain::ports::{
    MembershipRepository, MembershipRepositoryError, PoolRepository, PoolRepositoryError,
    UserRepository, UserRepositoryError,
};
use crate::domain::{Error, Pool, PoolId, PoolMember, UserId, UserSummary};

pub(crate) fn map_pool_error(error: PoolRepositoryError) -> Error {
    match error {
        PoolRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("pool repository unavailable: {message}"))
        }
        PoolRepositoryError::Query { message } => {
            Error::internal(format!("pool repository error: {message}"))
        }
        PoolRepositoryError::DuplicateCode { code } => {
            Error::conflict(format!("join code {code} is already taken"))
        }
    }
}

pub(crate) fn map_membership_error(error: MembershipRepositoryError) -> Error {
    match error {
        MembershipRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("membership repository unavailable: {message}"))
        }
        MembershipRepositoryError::Query { message } => {
            Error::internal(format!("membership repository error: {message}"))
        }
        other @ (MembershipRepositoryError::AlreadyResolved
        | MembershipRepositoryError::AlreadyMember
        | MembershipRepositoryError::PoolFull { .. }
        | MembershipRepositoryError::DuplicatePendingRequest) => Error::conflict(other.to_string()),
    }
}

pub(crate) fn map_user_error(error: UserRepositoryError) -> Error {
    match error {
        UserRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("user repository unavailable: {message}"))
        }
        UserRepositoryError::Query { message } => {
            Error::internal(format!("user repository error: {message}"))
        }
        UserRepositoryError::DuplicateEmail { email } => {
            Error::conflict(format!("email {email} is already registered"))
        }
    }
}

/// Build an `invalid_request` error carrying the offending field.
pub(crate) fn invalid_field(field: &str, message: impl Into<String>) -> Error {
    let message = message.into();
    Error::invalid_request(message.clone()).with_details(json!({
        "field": field,
        "message": message,
    }))
}

pub(crate) async fn load_pool<P>(pools: &P, pool_id: &PoolId) -> Result<Pool, Error>
where
    P: PoolRepository + ?Sized,
{
    pools
        .find_by_id(pool_id)
        .await
        .map_err(map_pool_error)?
        .ok_or_else(|| Error::not_found(format!("pool {pool_id} not found")))
}

/// Require that `user_id` belongs to `pool_id`.
pub(crate) async fn require_member<M>(
    members: &M,
    pool_id: &PoolId,
    user_id: &UserId,
) -> Result<PoolMember, Error>
where
    M: MembershipRepository + ?Sized,
{
    members
        .find_member(pool_id, user_id)
        .await
        .map_err(map_membership_error)?
        .ok_or_else(|| Error::forbidden("you are not a member of this pool"))
}

/// Require that `user_id` is an admin of `pool_id`.
pub(crate) async fn require_admin<M>(
    members: &M,
    pool_id: &PoolId,
    user_id: &UserId,
) -> Result<PoolMember, Error>
where
    M: MembershipRepository + ?Sized,
{
    let member = members
        .find_member(pool_id, user_id)
        .await
        .map_err(map_membership_error)?;
    match member {
        Some(member) if member.is_admin() => Ok(member),
        _ => Err(Error::forbidden("only pool admins may do this")),
    }
}

/// Load public snapshots for `ids`, keyed by user id.
pub(crate) async fn summaries_by_id<U>(
    users: &U,
    ids: Vec<UserId>,
) -> Result<HashMap<UserId, UserSummary>, Error>
where
    U: UserRepository + ?Sized,
{
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let summaries = users.find_summaries(&ids).await.map_err(map_user_error)?;
    Ok(summaries
        .into_iter()
        .map(|summary| (summary.id.clone(), summary))
        .collect())
}
