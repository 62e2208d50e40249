//! PostgreSQL-backed `ContributionRepository`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use tracing::debug;

use crate::domain::ports::{ContributionRepository, ContributionRepositoryError};
use crate::domain::{Contribution, ContributionId, ContributionStatus, PoolId, UserId};

use super::error_mapping::{map_decode_error, map_diesel_error, map_pool_error};
use super::models::{ContributionRow, RowDecodeError};
use super::pool::{DbPool, PoolError};
use super::schema::{contributions, pools};

/// Diesel implementation of [`ContributionRepository`].
#[derive(Clone)]
pub struct DieselContributionRepository {
    pool: DbPool,
}

impl DieselContributionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn pool_error(error: PoolError) -> ContributionRepositoryError {
    map_pool_error(error, ContributionRepositoryError::connection)
}

fn diesel_error(error: diesel::result::Error) -> ContributionRepositoryError {
    map_diesel_error(
        error,
        ContributionRepositoryError::query,
        ContributionRepositoryError::connection,
    )
}

fn decode_error(error: RowDecodeError) -> ContributionRepositoryError {
    map_decode_error(error, ContributionRepositoryError::query)
}

#[async_trait]
impl ContributionRepository for DieselContributionRepository {
    async fn insert(&self, contribution: &Contribution) -> Result<(), ContributionRepositoryError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        diesel::insert_into(contributions::table)
            .values(ContributionRow::from(contribution))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(diesel_error)
    }

    async fn attach_reference(
        &self,
        id: &ContributionId,
        reference: &str,
    ) -> Result<(), ContributionRepositoryError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        let updated = diesel::update(contributions::table.filter(contributions::id.eq(id.as_uuid())))
            .set(contributions::payment_reference.eq(reference))
            .execute(&mut conn)
            .await
            .map_err(diesel_error)?;
        if updated == 0 {
            return Err(ContributionRepositoryError::query(format!(
                "contribution {id} not found"
            )));
        }
        Ok(())
    }

    async fn find_by_id(
        &self,
        id: &ContributionId,
    ) -> Result<Option<Contribution>, ContributionRepositoryError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        let row = contributions::table
            .filter(contributions::id.eq(id.as_uuid()))
            .select(ContributionRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(diesel_error)?;
        row.map(Contribution::try_from).transpose().map_err(decode_error)
    }

    async fn list_for_member(
        &self,
        pool_id: &PoolId,
        member_id: &UserId,
    ) -> Result<Vec<Contribution>, ContributionRepositoryError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        let rows: Vec<ContributionRow> = contributions::table
            .filter(contributions::pool_id.eq(pool_id.as_uuid()))
            .filter(contributions::member_id.eq(member_id.as_uuid()))
            .order(contributions::contributed_at.desc())
            .select(ContributionRow::as_select())
            .load(&mut conn)
            .await
            .map_err(diesel_error)?;
        rows.into_iter()
            .map(Contribution::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map_err(decode_error)
    }

    async fn settle(
        &self,
        id: &ContributionId,
        status: ContributionStatus,
        settled_at: DateTime<Utc>,
    ) -> Result<(Contribution, bool), ContributionRepositoryError> {
        let contribution_id = *id.as_uuid();
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        let (row, applied) = conn
            .transaction(|conn| {
                async move {
                    let settled = diesel::update(
                        contributions::table
                            .filter(contributions::id.eq(contribution_id))
                            .filter(
                                contributions::status.eq(ContributionStatus::Pending.as_str()),
                            ),
                    )
                    .set((
                        contributions::status.eq(status.as_str()),
                        contributions::settled_at.eq(Some(settled_at)),
                    ))
                    .returning(ContributionRow::as_returning())
                    .get_result(conn)
                    .await
                    .optional()?;

                    let Some(row) = settled else {
                        let current = contributions::table
                            .filter(contributions::id.eq(contribution_id))
                            .select(ContributionRow::as_select())
                            .first(conn)
                            .await?;
                        return Ok::<_, diesel::result::Error>((current, false));
                    };
                    if status == ContributionStatus::Success {
                        diesel::update(pools::table.filter(pools::id.eq(row.pool_id)))
                            .set(pools::current_amount.eq(pools::current_amount + row.amount))
                            .execute(conn)
                            .await?;
                    }
                    Ok((row, true))
                }
                .scope_boxed()
            })
            .await
            .map_err(diesel_error)?;
        debug!(%id, applied, "contribution settlement applied");
        let contribution = Contribution::try_from(row).map_err(decode_error)?;
        Ok((contribution, applied))
    }
}
