//! Behavioural coverage for the in-memory repositories.

use rstest::{fixture, rstest};

use super::*;
use crate::domain::{
    DisbursementDraft, DisbursementDraftInput, UserName, VotingWindow,
};
use crate::test_support::{fixture_now, sample_pool};

#[fixture]
fn store() -> InMemoryStore {
    InMemoryStore::new()
}

fn user(email: &str) -> User {
    User {
        id: UserId::random(),
        name: UserName::new("Siti Rahma").expect("valid name"),
        email: EmailAddress::new(email).expect("valid email"),
        phone: None,
        age: Some(34),
        created_at: fixture_now(),
        updated_at: fixture_now(),
    }
}

fn admin_of(pool: &Pool) -> PoolMember {
    PoolMember {
        pool_id: pool.id,
        user_id: pool.creator_user_id.clone(),
        role: MemberRole::Admin,
        joined_at: pool.created_at,
    }
}

async fn seeded_pool(store: &InMemoryStore) -> Pool {
    let pool = sample_pool(&UserId::random());
    PoolRepository::create_with_admin(store, &pool, &admin_of(&pool))
        .await
        .expect("pool stored");
    pool
}

fn proposal(pool: &Pool, amount: i64) -> Disbursement {
    let draft = DisbursementDraft::try_new(DisbursementDraftInput {
        recipient_user_id: pool.creator_user_id.clone(),
        amount,
        purpose: "Hospital admission".to_owned(),
        proof_url: None,
    })
    .expect("valid draft");
    Disbursement::propose(
        draft,
        pool.id,
        pool.creator_user_id.clone(),
        VotingWindow::Hours24,
        fixture_now(),
    )
}

#[rstest]
#[tokio::test]
async fn duplicate_email_is_rejected(store: InMemoryStore) {
    UserRepository::insert(&store, &user("siti@example.com"), "digest")
        .await
        .expect("first insert");
    let err = UserRepository::insert(&store, &user("siti@example.com"), "digest")
        .await
        .expect_err("duplicate");
    assert!(matches!(err, UserRepositoryError::DuplicateEmail { .. }));
}

#[rstest]
#[tokio::test]
async fn duplicate_join_code_is_rejected(store: InMemoryStore) {
    let first = seeded_pool(&store).await;
    let second = sample_pool(&UserId::random());
    assert_eq!(first.pool_code, second.pool_code);

    let err = store
        .create_with_admin(&second, &admin_of(&second))
        .await
        .expect_err("code collision");
    assert!(matches!(err, PoolRepositoryError::DuplicateCode { .. }));
}

#[rstest]
#[tokio::test]
async fn settlement_credits_pool_once(store: InMemoryStore) {
    let pool = seeded_pool(&store).await;
    let contribution =
        Contribution::pending(pool.id, pool.creator_user_id.clone(), 50_000, fixture_now());
    ContributionRepository::insert(&store, &contribution)
        .await
        .expect("insert");

    let (first, applied) = store
        .settle(&contribution.id, ContributionStatus::Success, fixture_now())
        .await
        .expect("settle");
    assert!(applied);
    assert_eq!(first.status, ContributionStatus::Success);

    let (_, applied_again) = store
        .settle(&contribution.id, ContributionStatus::Failed, fixture_now())
        .await
        .expect("second settle");
    assert!(!applied_again);

    let stored = PoolRepository::find_by_id(&store, &pool.id)
        .await
        .expect("lookup")
        .expect("pool");
    assert_eq!(stored.current_amount, 50_000);
}

#[rstest]
#[tokio::test]
async fn overflowing_credit_leaves_contribution_pending(store: InMemoryStore) {
    let mut pool = sample_pool(&UserId::random());
    pool.current_amount = i64::MAX - 10;
    store
        .create_with_admin(&pool, &admin_of(&pool))
        .await
        .expect("pool stored");
    let contribution =
        Contribution::pending(pool.id, pool.creator_user_id.clone(), 50_000, fixture_now());
    ContributionRepository::insert(&store, &contribution)
        .await
        .expect("insert");

    store
        .settle(&contribution.id, ContributionStatus::Success, fixture_now())
        .await
        .expect_err("balance overflow");

    let stored = ContributionRepository::find_by_id(&store, &contribution.id)
        .await
        .expect("lookup")
        .expect("contribution");
    assert_eq!(stored.status, ContributionStatus::Pending);
    assert_eq!(stored.settled_at, None);
    let pool = PoolRepository::find_by_id(&store, &pool.id)
        .await
        .expect("lookup")
        .expect("pool");
    assert_eq!(pool.current_amount, i64::MAX - 10);
}

#[rstest]
#[tokio::test]
async fn credit_for_missing_pool_changes_nothing(store: InMemoryStore) {
    let contribution =
        Contribution::pending(PoolId::random(), UserId::random(), 50_000, fixture_now());
    ContributionRepository::insert(&store, &contribution)
        .await
        .expect("insert");

    store
        .settle(&contribution.id, ContributionStatus::Success, fixture_now())
        .await
        .expect_err("pool is missing");

    let stored = ContributionRepository::find_by_id(&store, &contribution.id)
        .await
        .expect("lookup")
        .expect("contribution");
    assert_eq!(stored.status, ContributionStatus::Pending);
}

#[rstest]
#[tokio::test]
async fn admission_respects_capacity(store: InMemoryStore) {
    let mut pool = sample_pool(&UserId::random());
    pool.max_members = 1;
    store
        .create_with_admin(&pool, &admin_of(&pool))
        .await
        .expect("pool stored");
    let applicant = UserId::random();
    let request = JoinRequest::pending(pool.id, applicant.clone(), fixture_now());
    store.insert_join_request(&request).await.expect("request");

    let approved = JoinRequest {
        status: JoinRequestStatus::Approved,
        resolved_at: Some(fixture_now()),
        resolved_by: Some(pool.creator_user_id.clone()),
        ..request
    };
    let admission = Admission {
        member: PoolMember {
            pool_id: pool.id,
            user_id: applicant,
            role: MemberRole::Member,
            joined_at: fixture_now(),
        },
        max_members: pool.max_members,
    };
    let err = store
        .resolve_join_request(&approved, Some(admission))
        .await
        .expect_err("pool is full");
    assert_eq!(err, MembershipRepositoryError::pool_full(1_u32));
    assert_eq!(store.count_members(&pool.id).await.expect("count"), 1);
}

#[rstest]
#[tokio::test]
async fn second_pending_request_is_rejected(store: InMemoryStore) {
    let pool = seeded_pool(&store).await;
    let applicant = UserId::random();
    store
        .insert_join_request(&JoinRequest::pending(pool.id, applicant.clone(), fixture_now()))
        .await
        .expect("first request");
    let err = store
        .insert_join_request(&JoinRequest::pending(pool.id, applicant, fixture_now()))
        .await
        .expect_err("duplicate");
    assert_eq!(err, MembershipRepositoryError::DuplicatePendingRequest);
}

#[rstest]
#[tokio::test]
async fn stale_version_is_rejected(store: InMemoryStore) {
    let pool = seeded_pool(&store).await;
    let disbursement = proposal(&pool, 10_000);
    DisbursementRepository::insert(&store, &disbursement)
        .await
        .expect("insert");

    store
        .save(&disbursement, 1, PoolBalanceEffect::None)
        .await
        .expect("first save");
    let err = store
        .save(&disbursement, 1, PoolBalanceEffect::None)
        .await
        .expect_err("stale");
    assert_eq!(err, DisbursementRepositoryError::revision_mismatch(1_i64, 2_i64));
}

#[rstest]
#[tokio::test]
async fn debit_requires_sufficient_balance(store: InMemoryStore) {
    let pool = seeded_pool(&store).await;
    let disbursement = proposal(&pool, 10_000);
    DisbursementRepository::insert(&store, &disbursement)
        .await
        .expect("insert");

    let err = store
        .save(&disbursement, 1, PoolBalanceEffect::Debit)
        .await
        .expect_err("empty pool");
    assert_eq!(err, DisbursementRepositoryError::InsufficientFunds);
    let stored = DisbursementRepository::find_by_id(&store, &disbursement.id)
        .await
        .expect("lookup")
        .expect("disbursement");
    assert_eq!(stored.version, 1);
}

#[rstest]
#[tokio::test]
async fn overdue_includes_deadline_instant(store: InMemoryStore) {
    let pool = seeded_pool(&store).await;
    let disbursement = proposal(&pool, 10_000);
    DisbursementRepository::insert(&store, &disbursement)
        .await
        .expect("insert");

    let before = store
        .list_overdue(disbursement.voting_deadline - chrono::Duration::seconds(1))
        .await
        .expect("list");
    assert!(before.is_empty());
    let at = store
        .list_overdue(disbursement.voting_deadline)
        .await
        .expect("list");
    assert_eq!(at.len(), 1);
}

#[rstest]
#[tokio::test]
async fn pools_without_admin_are_reported(store: InMemoryStore) {
    let healthy = seeded_pool(&store).await;
    let mut orphan = sample_pool(&UserId::random());
    orphan.pool_code = PoolCode::parse("ORPHAN01").expect("code");
    let member = PoolMember {
        role: MemberRole::Member,
        ..admin_of(&orphan)
    };
    store
        .create_with_admin(&orphan, &member)
        .await
        .expect("stored");

    let orphaned = store.list_without_admin().await.expect("list");
    assert_eq!(orphaned, vec![orphan.id]);
    assert!(!orphaned.contains(&healthy.id));
}
