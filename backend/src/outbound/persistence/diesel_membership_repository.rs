//! PostgreSQL-backed `MembershipRepository`.
//!
//! Resolving a join request locks the pool row, flips the request out of
//! `PENDING` with a guarded update and, on approval, inserts the membership
//! after a capacity check, all in one transaction. Concurrent approvals for
//! the same pool therefore serialise on the pool row.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};

use crate::domain::ports::{Admission, MembershipRepository, MembershipRepositoryError};
use crate::domain::{JoinRequest, JoinRequestId, JoinRequestStatus, PoolId, PoolMember, UserId};

use super::error_mapping::{map_decode_error, map_diesel_error, map_pool_error, unique_violation};
use super::models::{JoinRequestRow, PoolMemberRow, RowDecodeError};
use super::pool::{DbPool, PoolError};
use super::schema::{join_requests, pool_members, pools};

/// Diesel implementation of [`MembershipRepository`].
#[derive(Clone)]
pub struct DieselMembershipRepository {
    pool: DbPool,
}

impl DieselMembershipRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Failure inside the resolution transaction.
#[derive(Debug)]
enum ResolveError {
    Diesel(diesel::result::Error),
    Rejected(MembershipRepositoryError),
}

impl From<diesel::result::Error> for ResolveError {
    fn from(error: diesel::result::Error) -> Self {
        Self::Diesel(error)
    }
}

fn pool_error(error: PoolError) -> MembershipRepositoryError {
    map_pool_error(error, MembershipRepositoryError::connection)
}

fn diesel_error(error: diesel::result::Error) -> MembershipRepositoryError {
    map_diesel_error(
        error,
        MembershipRepositoryError::query,
        MembershipRepositoryError::connection,
    )
}

fn decode_error(error: RowDecodeError) -> MembershipRepositoryError {
    map_decode_error(error, MembershipRepositoryError::query)
}

fn request_insert_error(error: diesel::result::Error) -> MembershipRepositoryError {
    if unique_violation(&error).is_some() {
        MembershipRepositoryError::DuplicatePendingRequest
    } else {
        diesel_error(error)
    }
}

fn member_insert_error(error: diesel::result::Error) -> MembershipRepositoryError {
    if unique_violation(&error).is_some() {
        MembershipRepositoryError::AlreadyMember
    } else {
        diesel_error(error)
    }
}

fn decode_requests(rows: Vec<JoinRequestRow>) -> Result<Vec<JoinRequest>, MembershipRepositoryError> {
    rows.into_iter()
        .map(JoinRequest::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(decode_error)
}

fn member_count(count: i64) -> Result<u32, MembershipRepositoryError> {
    u32::try_from(count).map_err(|_| MembershipRepositoryError::query("member count overflow"))
}

#[async_trait]
impl MembershipRepository for DieselMembershipRepository {
    async fn find_member(
        &self,
        pool_id: &PoolId,
        user_id: &UserId,
    ) -> Result<Option<PoolMember>, MembershipRepositoryError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        let row = pool_members::table
            .filter(pool_members::pool_id.eq(pool_id.as_uuid()))
            .filter(pool_members::user_id.eq(user_id.as_uuid()))
            .select(PoolMemberRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(diesel_error)?;
        row.map(PoolMember::try_from).transpose().map_err(decode_error)
    }

    async fn list_members(
        &self,
        pool_id: &PoolId,
    ) -> Result<Vec<PoolMember>, MembershipRepositoryError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        let rows: Vec<PoolMemberRow> = pool_members::table
            .filter(pool_members::pool_id.eq(pool_id.as_uuid()))
            .order(pool_members::joined_at.asc())
            .select(PoolMemberRow::as_select())
            .load(&mut conn)
            .await
            .map_err(diesel_error)?;
        rows.into_iter()
            .map(PoolMember::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map_err(decode_error)
    }

    async fn count_members(&self, pool_id: &PoolId) -> Result<u32, MembershipRepositoryError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        let count: i64 = pool_members::table
            .filter(pool_members::pool_id.eq(pool_id.as_uuid()))
            .count()
            .get_result(&mut conn)
            .await
            .map_err(diesel_error)?;
        member_count(count)
    }

    async fn insert_join_request(
        &self,
        request: &JoinRequest,
    ) -> Result<(), MembershipRepositoryError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        diesel::insert_into(join_requests::table)
            .values(JoinRequestRow::from(request))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(request_insert_error)
    }

    async fn find_join_request(
        &self,
        id: &JoinRequestId,
    ) -> Result<Option<JoinRequest>, MembershipRepositoryError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        let row = join_requests::table
            .filter(join_requests::id.eq(id.as_uuid()))
            .select(JoinRequestRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(diesel_error)?;
        row.map(JoinRequest::try_from).transpose().map_err(decode_error)
    }

    async fn find_pending_request(
        &self,
        pool_id: &PoolId,
        user_id: &UserId,
    ) -> Result<Option<JoinRequest>, MembershipRepositoryError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        let row = join_requests::table
            .filter(join_requests::pool_id.eq(pool_id.as_uuid()))
            .filter(join_requests::user_id.eq(user_id.as_uuid()))
            .filter(join_requests::status.eq(JoinRequestStatus::Pending.as_str()))
            .select(JoinRequestRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(diesel_error)?;
        row.map(JoinRequest::try_from).transpose().map_err(decode_error)
    }

    async fn list_join_requests(
        &self,
        pool_id: &PoolId,
        status: Option<JoinRequestStatus>,
    ) -> Result<Vec<JoinRequest>, MembershipRepositoryError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        let mut query = join_requests::table
            .filter(join_requests::pool_id.eq(pool_id.as_uuid()))
            .into_boxed();
        if let Some(status) = status {
            query = query.filter(join_requests::status.eq(status.as_str()));
        }
        let rows = query
            .order(join_requests::requested_at.desc())
            .select(JoinRequestRow::as_select())
            .load(&mut conn)
            .await
            .map_err(diesel_error)?;
        decode_requests(rows)
    }

    async fn resolve_join_request(
        &self,
        resolved: &JoinRequest,
        admission: Option<Admission>,
    ) -> Result<(), MembershipRepositoryError> {
        let request_id = *resolved.id.as_uuid();
        let pool_id = *resolved.pool_id.as_uuid();
        let status = resolved.status.as_str();
        let resolved_at = resolved.resolved_at;
        let resolved_by = resolved.resolved_by.as_ref().map(|id| *id.as_uuid());
        let mut conn = self.pool.get().await.map_err(pool_error)?;

        let outcome = conn
            .transaction(|conn| {
                async move {
                    pools::table
                        .filter(pools::id.eq(pool_id))
                        .select(pools::id)
                        .for_update()
                        .first::<uuid::Uuid>(conn)
                        .await?;

                    let flipped = diesel::update(
                        join_requests::table
                            .filter(join_requests::id.eq(request_id))
                            .filter(join_requests::status.eq(JoinRequestStatus::Pending.as_str())),
                    )
                    .set((
                        join_requests::status.eq(status),
                        join_requests::resolved_at.eq(resolved_at),
                        join_requests::resolved_by.eq(resolved_by),
                    ))
                    .execute(conn)
                    .await?;
                    if flipped == 0 {
                        return Err(ResolveError::Rejected(
                            MembershipRepositoryError::AlreadyResolved,
                        ));
                    }

                    let Some(Admission {
                        member,
                        max_members,
                    }) = admission
                    else {
                        return Ok(());
                    };
                    let current: i64 = pool_members::table
                        .filter(pool_members::pool_id.eq(pool_id))
                        .count()
                        .get_result(conn)
                        .await?;
                    if current >= i64::from(max_members) {
                        return Err(ResolveError::Rejected(MembershipRepositoryError::pool_full(
                            max_members,
                        )));
                    }
                    diesel::insert_into(pool_members::table)
                        .values(PoolMemberRow::from(&member))
                        .execute(conn)
                        .await
                        .map_err(|err| ResolveError::Rejected(member_insert_error(err)))?;
                    Ok(())
                }
                .scope_boxed()
            })
            .await;

        match outcome {
            Ok(()) => Ok(()),
            Err(ResolveError::Rejected(error)) => Err(error),
            Err(ResolveError::Diesel(error)) => Err(diesel_error(error)),
        }
    }
}
