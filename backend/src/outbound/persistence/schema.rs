//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match `backend/migrations` exactly. When the
//! migrations change, regenerate them with `diesel print-schema`.

diesel::table! {
    /// Registered accounts. `email` carries a unique index.
    users (id) {
        id -> Uuid,
        name -> Varchar,
        email -> Varchar,
        phone -> Nullable<Varchar>,
        age -> Nullable<Int2>,
        password_hash -> Text,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Microfunding pools. `pool_code` carries a unique index.
    pools (id) {
        id -> Uuid,
        title -> Varchar,
        description -> Varchar,
        community_type -> Varchar,
        max_members -> Int4,
        contribution_period -> Varchar,
        contribution_amount_per_member -> Int8,
        benefit_coverage -> Array<Text>,
        approval_policy -> Varchar,
        voting_window -> Varchar,
        pool_code -> Varchar,
        current_amount -> Int8,
        status -> Varchar,
        creator_user_id -> Uuid,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// One row per (pool, user) membership.
    pool_members (pool_id, user_id) {
        pool_id -> Uuid,
        user_id -> Uuid,
        role -> Varchar,
        joined_at -> Timestamptz,
    }
}

diesel::table! {
    /// Join requests; a partial unique index allows one `PENDING` request
    /// per (pool, user).
    join_requests (id) {
        id -> Uuid,
        pool_id -> Uuid,
        user_id -> Uuid,
        status -> Varchar,
        requested_at -> Timestamptz,
        resolved_at -> Nullable<Timestamptz>,
        resolved_by -> Nullable<Uuid>,
    }
}

diesel::table! {
    /// Contribution ledger.
    contributions (id) {
        id -> Uuid,
        pool_id -> Uuid,
        member_id -> Uuid,
        amount -> Int8,
        status -> Varchar,
        payment_reference -> Nullable<Varchar>,
        contributed_at -> Timestamptz,
        settled_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    /// Disbursement proposals with denormalised tallies and a revision
    /// counter for optimistic concurrency.
    disbursements (id) {
        id -> Uuid,
        pool_id -> Uuid,
        recipient_user_id -> Uuid,
        requested_by_user_id -> Uuid,
        amount -> Int8,
        purpose -> Varchar,
        proof_url -> Nullable<Varchar>,
        status -> Varchar,
        requested_at -> Timestamptz,
        voting_deadline -> Timestamptz,
        resolved_at -> Nullable<Timestamptz>,
        votes_for -> Int4,
        votes_against -> Int4,
        version -> Int8,
    }
}

diesel::table! {
    /// Votes; the primary key forbids a second vote per member.
    disbursement_votes (disbursement_id, voter_id) {
        disbursement_id -> Uuid,
        voter_id -> Uuid,
        choice -> Varchar,
        comment -> Nullable<Varchar>,
        voted_at -> Timestamptz,
    }
}

diesel::joinable!(pool_members -> pools (pool_id));
diesel::joinable!(join_requests -> pools (pool_id));
diesel::joinable!(contributions -> pools (pool_id));
diesel::joinable!(disbursements -> pools (pool_id));
diesel::joinable!(disbursement_votes -> disbursements (disbursement_id));

diesel::allow_tables_to_appear_in_same_query!(
    users,
    pools,
    pool_members,
    join_requests,
    contributions,
    disbursements,
    disbursement_votes,
);
