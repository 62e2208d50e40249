//! PostgreSQL-backed `PoolRepository`.
//!
//! Pool creation writes the pool row and the creator's admin membership in
//! one transaction; a collision on the `pool_code` unique index is reported
//! as [`PoolRepositoryError::DuplicateCode`] so the registry can retry with a
//! fresh code.

use async_trait::async_trait;
use diesel::dsl::{exists, not};
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use uuid::Uuid;

use crate::domain::ports::{PoolRepository, PoolRepositoryError};
use crate::domain::{MemberRole, Pool, PoolCode, PoolId, PoolMember, UserId};

use super::error_mapping::{map_decode_error, map_diesel_error, map_pool_error, unique_violation};
use super::models::{NewPoolRow, PoolMemberRow, PoolRow, PoolSettingsUpdate, RowDecodeError};
use super::pool::{DbPool, PoolError};
use super::schema::{pool_members, pools};

/// Diesel implementation of [`PoolRepository`].
#[derive(Clone)]
pub struct DieselPoolRepository {
    pool: DbPool,
}

impl DieselPoolRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn pool_error(error: PoolError) -> PoolRepositoryError {
    map_pool_error(error, PoolRepositoryError::connection)
}

fn diesel_error(error: diesel::result::Error) -> PoolRepositoryError {
    map_diesel_error(error, PoolRepositoryError::query, PoolRepositoryError::connection)
}

fn decode_error(error: RowDecodeError) -> PoolRepositoryError {
    map_decode_error(error, PoolRepositoryError::query)
}

fn insert_error(error: diesel::result::Error, code: &PoolCode) -> PoolRepositoryError {
    match unique_violation(&error) {
        Some(constraint) if constraint.is_empty() || constraint.contains("pool_code") => {
            PoolRepositoryError::duplicate_code(code.as_ref())
        }
        _ => diesel_error(error),
    }
}

fn decode_all(rows: Vec<PoolRow>) -> Result<Vec<Pool>, PoolRepositoryError> {
    rows.into_iter()
        .map(Pool::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(decode_error)
}

#[async_trait]
impl PoolRepository for DieselPoolRepository {
    async fn create_with_admin(
        &self,
        pool: &Pool,
        admin: &PoolMember,
    ) -> Result<(), PoolRepositoryError> {
        let new_pool = NewPoolRow::from(pool);
        let admin_row = PoolMemberRow::from(admin);
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        conn.transaction(|conn| {
            async move {
                diesel::insert_into(pools::table)
                    .values(&new_pool)
                    .execute(conn)
                    .await?;
                diesel::insert_into(pool_members::table)
                    .values(&admin_row)
                    .execute(conn)
                    .await?;
                Ok::<_, diesel::result::Error>(())
            }
            .scope_boxed()
        })
        .await
        .map_err(|err| insert_error(err, &pool.pool_code))
    }

    async fn find_by_id(&self, id: &PoolId) -> Result<Option<Pool>, PoolRepositoryError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        let row = pools::table
            .filter(pools::id.eq(id.as_uuid()))
            .select(PoolRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(diesel_error)?;
        row.map(Pool::try_from).transpose().map_err(decode_error)
    }

    async fn find_by_code(&self, code: &PoolCode) -> Result<Option<Pool>, PoolRepositoryError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        let row = pools::table
            .filter(pools::pool_code.eq(code.as_ref()))
            .select(PoolRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(diesel_error)?;
        row.map(Pool::try_from).transpose().map_err(decode_error)
    }

    async fn code_exists(&self, code: &PoolCode) -> Result<bool, PoolRepositoryError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        diesel::select(exists(pools::table.filter(pools::pool_code.eq(code.as_ref()))))
            .get_result(&mut conn)
            .await
            .map_err(diesel_error)
    }

    async fn list_for_member(&self, user_id: &UserId) -> Result<Vec<Pool>, PoolRepositoryError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        let rows = pools::table
            .inner_join(pool_members::table)
            .filter(pool_members::user_id.eq(user_id.as_uuid()))
            .order(pools::created_at.desc())
            .select(PoolRow::as_select())
            .load(&mut conn)
            .await
            .map_err(diesel_error)?;
        decode_all(rows)
    }

    async fn update_settings(&self, pool: &Pool) -> Result<(), PoolRepositoryError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        let updated = diesel::update(pools::table.filter(pools::id.eq(pool.id.as_uuid())))
            .set(PoolSettingsUpdate::from(pool))
            .execute(&mut conn)
            .await
            .map_err(diesel_error)?;
        if updated == 0 {
            return Err(PoolRepositoryError::query(format!("pool {} not found", pool.id)));
        }
        Ok(())
    }

    async fn list_without_admin(&self) -> Result<Vec<PoolId>, PoolRepositoryError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        let ids: Vec<Uuid> = pools::table
            .filter(not(exists(
                pool_members::table
                    .filter(pool_members::pool_id.eq(pools::id))
                    .filter(pool_members::role.eq(MemberRole::Admin.as_str())),
            )))
            .order(pools::created_at.asc())
            .select(pools::id)
            .load(&mut conn)
            .await
            .map_err(diesel_error)?;
        Ok(ids.into_iter().map(PoolId::from_uuid).collect())
    }
}
