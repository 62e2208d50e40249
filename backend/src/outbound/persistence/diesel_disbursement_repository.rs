//! PostgreSQL-backed `DisbursementRepository`.
//!
//! `save` is a check-and-set on the `version` column: the row is locked, its
//! version compared with the caller's expectation, newly cast votes appended
//! and any pool debit applied before the version is bumped. The composite
//! primary key on `disbursement_votes` backs the one-vote-per-member rule.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use crate::domain::ports::{DisbursementRepository, DisbursementRepositoryError, PoolBalanceEffect};
use crate::domain::{Disbursement, DisbursementId, DisbursementStatus, PoolId};

use super::error_mapping::{map_decode_error, map_diesel_error, map_pool_error, unique_violation};
use super::models::{DisbursementRow, DisbursementStateUpdate, RowDecodeError, VoteRow};
use super::pool::{DbPool, PoolError};
use super::schema::{disbursement_votes, disbursements, pools};

/// Diesel implementation of [`DisbursementRepository`].
#[derive(Clone)]
pub struct DieselDisbursementRepository {
    pool: DbPool,
}

impl DieselDisbursementRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Failure inside the save transaction.
#[derive(Debug)]
enum SaveError {
    Diesel(diesel::result::Error),
    Rejected(DisbursementRepositoryError),
}

impl From<diesel::result::Error> for SaveError {
    fn from(error: diesel::result::Error) -> Self {
        Self::Diesel(error)
    }
}

fn pool_error(error: PoolError) -> DisbursementRepositoryError {
    map_pool_error(error, DisbursementRepositoryError::connection)
}

fn diesel_error(error: diesel::result::Error) -> DisbursementRepositoryError {
    map_diesel_error(
        error,
        DisbursementRepositoryError::query,
        DisbursementRepositoryError::connection,
    )
}

fn decode_error(error: RowDecodeError) -> DisbursementRepositoryError {
    map_decode_error(error, DisbursementRepositoryError::query)
}

fn vote_insert_error(error: diesel::result::Error) -> SaveError {
    if unique_violation(&error).is_some() {
        SaveError::Rejected(DisbursementRepositoryError::DuplicateVote)
    } else {
        SaveError::Diesel(error)
    }
}

/// Attach votes (already in cast order) to their disbursement rows.
fn assemble(
    rows: Vec<DisbursementRow>,
    votes: Vec<VoteRow>,
) -> Result<Vec<Disbursement>, DisbursementRepositoryError> {
    let mut by_disbursement: HashMap<Uuid, Vec<VoteRow>> = HashMap::new();
    for vote in votes {
        by_disbursement
            .entry(vote.disbursement_id)
            .or_default()
            .push(vote);
    }
    rows.into_iter()
        .map(|row| {
            let votes = by_disbursement.remove(&row.id).unwrap_or_default();
            row.into_domain(votes)
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(decode_error)
}

async fn load_votes(
    conn: &mut AsyncPgConnection,
    ids: &[Uuid],
) -> Result<Vec<VoteRow>, diesel::result::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    disbursement_votes::table
        .filter(disbursement_votes::disbursement_id.eq_any(ids))
        .order((
            disbursement_votes::disbursement_id,
            disbursement_votes::voted_at.asc(),
        ))
        .select(VoteRow::as_select())
        .load(conn)
        .await
}

/// Votes present in `disbursement` that storage has not seen yet.
fn new_votes(disbursement: &Disbursement, stored_voters: &HashSet<Uuid>) -> Vec<VoteRow> {
    disbursement
        .votes
        .iter()
        .filter(|vote| !stored_voters.contains(vote.voter_id.as_uuid()))
        .map(|vote| VoteRow::new(&disbursement.id, vote))
        .collect()
}

impl DieselDisbursementRepository {
    async fn load_with_votes(
        &self,
        rows: Vec<DisbursementRow>,
        conn: &mut AsyncPgConnection,
    ) -> Result<Vec<Disbursement>, DisbursementRepositoryError> {
        let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
        let votes = load_votes(conn, &ids).await.map_err(diesel_error)?;
        assemble(rows, votes)
    }
}

#[async_trait]
impl DisbursementRepository for DieselDisbursementRepository {
    async fn insert(&self, disbursement: &Disbursement) -> Result<(), DisbursementRepositoryError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        diesel::insert_into(disbursements::table)
            .values(DisbursementRow::from(disbursement))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(diesel_error)
    }

    async fn find_by_id(
        &self,
        id: &DisbursementId,
    ) -> Result<Option<Disbursement>, DisbursementRepositoryError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        let row = disbursements::table
            .filter(disbursements::id.eq(id.as_uuid()))
            .select(DisbursementRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(diesel_error)?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut loaded = self.load_with_votes(vec![row], &mut conn).await?;
        Ok(loaded.pop())
    }

    async fn list_for_pool(
        &self,
        pool_id: &PoolId,
        status: Option<DisbursementStatus>,
    ) -> Result<Vec<Disbursement>, DisbursementRepositoryError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        let mut query = disbursements::table
            .filter(disbursements::pool_id.eq(pool_id.as_uuid()))
            .into_boxed();
        if let Some(status) = status {
            query = query.filter(disbursements::status.eq(status.as_str()));
        }
        let rows = query
            .order(disbursements::requested_at.desc())
            .select(DisbursementRow::as_select())
            .load(&mut conn)
            .await
            .map_err(diesel_error)?;
        self.load_with_votes(rows, &mut conn).await
    }

    async fn save(
        &self,
        disbursement: &Disbursement,
        expected_version: i64,
        effect: PoolBalanceEffect,
    ) -> Result<(), DisbursementRepositoryError> {
        let voters: HashSet<_> = disbursement.votes.iter().map(|v| &v.voter_id).collect();
        if voters.len() != disbursement.votes.len() {
            return Err(DisbursementRepositoryError::DuplicateVote);
        }
        let id = *disbursement.id.as_uuid();
        let pool_id = *disbursement.pool_id.as_uuid();
        let amount = disbursement.amount;
        let next_version = expected_version + 1;
        let changes = DisbursementStateUpdate::new(disbursement, next_version);
        let mut conn = self.pool.get().await.map_err(pool_error)?;

        let outcome = conn
            .transaction(|conn| {
                async move {
                    let actual: Option<i64> = disbursements::table
                        .filter(disbursements::id.eq(id))
                        .select(disbursements::version)
                        .for_update()
                        .first(conn)
                        .await
                        .optional()?;
                    let Some(actual) = actual else {
                        return Err(SaveError::Rejected(DisbursementRepositoryError::query(
                            format!("disbursement {id} not found"),
                        )));
                    };
                    if actual != expected_version {
                        return Err(SaveError::Rejected(
                            DisbursementRepositoryError::revision_mismatch(expected_version, actual),
                        ));
                    }

                    let stored_voters: HashSet<Uuid> = disbursement_votes::table
                        .filter(disbursement_votes::disbursement_id.eq(id))
                        .select(disbursement_votes::voter_id)
                        .load::<Uuid>(conn)
                        .await?
                        .into_iter()
                        .collect();
                    let appended = new_votes(disbursement, &stored_voters);
                    if !appended.is_empty() {
                        diesel::insert_into(disbursement_votes::table)
                            .values(&appended)
                            .execute(conn)
                            .await
                            .map_err(vote_insert_error)?;
                    }

                    if effect == PoolBalanceEffect::Debit {
                        let debited = diesel::update(
                            pools::table
                                .filter(pools::id.eq(pool_id))
                                .filter(pools::current_amount.ge(amount)),
                        )
                        .set(pools::current_amount.eq(pools::current_amount - amount))
                        .execute(conn)
                        .await?;
                        if debited == 0 {
                            return Err(SaveError::Rejected(
                                DisbursementRepositoryError::InsufficientFunds,
                            ));
                        }
                    }

                    diesel::update(
                        disbursements::table
                            .filter(disbursements::id.eq(id))
                            .filter(disbursements::version.eq(expected_version)),
                    )
                    .set(&changes)
                    .execute(conn)
                    .await?;
                    Ok(())
                }
                .scope_boxed()
            })
            .await;

        match outcome {
            Ok(()) => Ok(()),
            Err(SaveError::Rejected(error)) => Err(error),
            Err(SaveError::Diesel(error)) => Err(diesel_error(error)),
        }
    }

    async fn list_overdue(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Disbursement>, DisbursementRepositoryError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        let rows = disbursements::table
            .filter(disbursements::status.eq(DisbursementStatus::PendingVote.as_str()))
            .filter(disbursements::voting_deadline.le(now))
            .order(disbursements::voting_deadline.asc())
            .select(DisbursementRow::as_select())
            .load(&mut conn)
            .await
            .map_err(diesel_error)?;
        self.load_with_votes(rows, &mut conn).await
    }
}
