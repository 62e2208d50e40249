//! Tests for the disbursement workflow service.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Duration;
use rstest::{fixture, rstest};

use super::*;
use crate::domain::ports::{
    MockDisbursementRepository, MockMembershipRepository, MockPoolRepository,
};
use crate::domain::{
    ApprovalPolicy, ContributionPeriod, DisbursementDraftInput, ErrorCode, MemberRole, Pool,
    PoolCode, PoolDraft, PoolDraftInput, PoolMember, VoteChoice, VotingWindow,
};
use crate::test_support::{MutableClock, fixture_now};

type Service =
    DisbursementService<MockPoolRepository, MockMembershipRepository, MockDisbursementRepository>;

#[fixture]
fn pool() -> Pool {
    let mut pool = PoolDraft::try_new(PoolDraftInput {
        title: "Harbour fund".into(),
        description: String::new(),
        community_type: "fishers".into(),
        max_members: 10,
        contribution_period: ContributionPeriod::Monthly,
        contribution_amount_per_member: 100_000,
        benefit_coverage: vec![],
        approval_policy: ApprovalPolicy::Voting50Percent,
        voting_window: VotingWindow::Hours24,
    })
    .expect("draft")
    .into_pool(
        PoolId::random(),
        PoolCode::parse("VOTE0001").expect("code"),
        UserId::random(),
        fixture_now(),
    );
    pool.current_amount = 1_000_000;
    pool
}

fn proposal(pool: &Pool, requester: &UserId, amount: i64) -> Disbursement {
    let draft = DisbursementDraft::try_new(DisbursementDraftInput {
        recipient_user_id: requester.clone(),
        amount,
        purpose: "Hospital stay".into(),
        proof_url: None,
    })
    .expect("draft");
    Disbursement::propose(
        draft,
        pool.id,
        requester.clone(),
        pool.voting_window,
        fixture_now(),
    )
}

fn pools_with(pool: Pool) -> MockPoolRepository {
    let mut pools = MockPoolRepository::new();
    pools
        .expect_find_by_id()
        .returning(move |_| Ok(Some(pool.clone())));
    pools
}

/// Membership repository where `admins` are admins, `members` plain members
/// and everybody else an outsider.
fn roster(admins: Vec<UserId>, members: Vec<UserId>, count: u32) -> MockMembershipRepository {
    let mut repo = MockMembershipRepository::new();
    repo.expect_find_member().returning(move |pool_id, user_id| {
        let role = if admins.contains(user_id) {
            Some(MemberRole::Admin)
        } else if members.contains(user_id) {
            Some(MemberRole::Member)
        } else {
            None
        };
        Ok(role.map(|role| PoolMember {
            pool_id: *pool_id,
            user_id: user_id.clone(),
            role,
            joined_at: fixture_now(),
        }))
    });
    repo.expect_count_members().returning(move |_| Ok(count));
    repo
}

fn stored(disbursement: Disbursement) -> MockDisbursementRepository {
    let mut repo = MockDisbursementRepository::new();
    repo.expect_find_by_id()
        .returning(move |_| Ok(Some(disbursement.clone())));
    repo
}

fn service(
    pools: MockPoolRepository,
    members: MockMembershipRepository,
    disbursements: MockDisbursementRepository,
    clock: Arc<MutableClock>,
) -> Service {
    DisbursementService::new(
        Arc::new(pools),
        Arc::new(members),
        Arc::new(disbursements),
        clock,
    )
}

fn clock() -> Arc<MutableClock> {
    Arc::new(MutableClock::new(fixture_now()))
}

fn ballot(voter: &UserId, id: DisbursementId, choice: VoteChoice) -> CastVoteRequest {
    CastVoteRequest {
        voter_id: voter.clone(),
        disbursement_id: id,
        choice,
        comment: None,
    }
}

fn prior_vote(voter: UserId, choice: VoteChoice) -> Vote {
    Vote {
        voter_id: voter,
        choice,
        voted_at: fixture_now(),
        comment: None,
    }
}

#[rstest]
#[tokio::test]
async fn create_requires_recipient_membership(pool: Pool) {
    let requester = UserId::random();
    let pool_id = pool.id;
    let mut disbursements = MockDisbursementRepository::new();
    disbursements.expect_insert().never();
    let draft = DisbursementDraft::try_new(DisbursementDraftInput {
        recipient_user_id: UserId::random(),
        amount: 10_000,
        purpose: "Medicine".into(),
        proof_url: None,
    })
    .expect("draft");

    let err = service(
        pools_with(pool),
        roster(vec![], vec![requester.clone()], 1),
        disbursements,
        clock(),
    )
    .create_disbursement(&requester, &pool_id, draft)
    .await
    .expect_err("recipient outsider");
    assert_eq!(err.code(), ErrorCode::InvalidRequest);
    assert_eq!(
        err.details().and_then(|details| details.get("field")),
        Some(&serde_json::json!("recipientUserId"))
    );
}

#[rstest]
#[tokio::test]
async fn create_opens_voting_window(pool: Pool) {
    let requester = UserId::random();
    let pool_id = pool.id;
    let mut disbursements = MockDisbursementRepository::new();
    disbursements.expect_insert().times(1).return_once(|_| Ok(()));
    let draft = DisbursementDraft::try_new(DisbursementDraftInput {
        recipient_user_id: requester.clone(),
        amount: 10_000,
        purpose: "Medicine".into(),
        proof_url: Some("https://example.com/receipt.pdf".into()),
    })
    .expect("draft");

    let created = service(
        pools_with(pool),
        roster(vec![], vec![requester.clone()], 1),
        disbursements,
        clock(),
    )
    .create_disbursement(&requester, &pool_id, draft)
    .await
    .expect("created");
    assert_eq!(created.status, DisbursementStatus::PendingVote);
    assert_eq!(created.voting_deadline, fixture_now() + Duration::hours(24));
    assert_eq!(created.version, 1);
}

#[rstest]
#[tokio::test]
async fn third_supporting_vote_of_five_approves(pool: Pool) {
    let voters: Vec<UserId> = (0..5).map(|_| UserId::random()).collect();
    let mut disbursement = proposal(&pool, &voters[0], 50_000);
    disbursement.votes_for = 2;
    disbursement.votes = vec![
        prior_vote(voters[0].clone(), VoteChoice::For),
        prior_vote(voters[1].clone(), VoteChoice::For),
    ];
    disbursement.version = 3;
    let id = disbursement.id;
    let mut disbursements = stored(disbursement);
    disbursements
        .expect_save()
        .withf(|saved, expected, effect| {
            *expected == 3
                && *effect == PoolBalanceEffect::None
                && saved.status == DisbursementStatus::Approved
                && saved.votes.len() == 3
        })
        .times(1)
        .return_once(|_, _, _| Ok(()));

    let voted = service(pools_with(pool), roster(vec![], voters.clone(), 5), disbursements, clock())
        .vote(ballot(&voters[2], id, VoteChoice::For))
        .await
        .expect("vote accepted");
    assert_eq!(voted.status, DisbursementStatus::Approved);
    assert_eq!(voted.votes_for, 3);
    assert_eq!(voted.resolved_at, Some(fixture_now()));
    assert_eq!(voted.version, 4);
}

#[rstest]
#[tokio::test]
async fn vote_retries_after_revision_mismatch(pool: Pool) {
    let voter = UserId::random();
    let disbursement = proposal(&pool, &voter, 50_000);
    let id = disbursement.id;
    let mut disbursements = stored(disbursement);
    let saves = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&saves);
    disbursements.expect_save().times(2).returning(move |_, _, _| {
        if seen.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(DisbursementRepositoryError::revision_mismatch(1_i64, 2_i64))
        } else {
            Ok(())
        }
    });

    let voted = service(pools_with(pool), roster(vec![], vec![voter.clone()], 4), disbursements, clock())
        .vote(ballot(&voter, id, VoteChoice::Against))
        .await
        .expect("second attempt succeeds");
    assert_eq!(voted.votes_against, 1);
    assert_eq!(saves.load(Ordering::SeqCst), 2);
}

#[rstest]
#[tokio::test]
async fn vote_gives_up_after_bounded_retries(pool: Pool) {
    let voter = UserId::random();
    let disbursement = proposal(&pool, &voter, 50_000);
    let id = disbursement.id;
    let mut disbursements = stored(disbursement);
    disbursements
        .expect_save()
        .times(MAX_VOTE_ATTEMPTS)
        .returning(|_, _, _| Err(DisbursementRepositoryError::revision_mismatch(1_i64, 2_i64)));

    let err = service(pools_with(pool), roster(vec![], vec![voter.clone()], 4), disbursements, clock())
        .vote(ballot(&voter, id, VoteChoice::For))
        .await
        .expect_err("contention");
    assert_eq!(err.code(), ErrorCode::Conflict);
}

#[rstest]
#[tokio::test]
async fn late_vote_expires_and_conflicts(pool: Pool) {
    let voter = UserId::random();
    let disbursement = proposal(&pool, &voter, 50_000);
    let id = disbursement.id;
    let mut disbursements = stored(disbursement);
    disbursements
        .expect_save()
        .withf(|saved, _, _| saved.status == DisbursementStatus::Rejected && saved.votes.is_empty())
        .times(1)
        .return_once(|_, _, _| Ok(()));
    let clock = clock();
    clock.advance(Duration::hours(24));

    let err = service(pools_with(pool), roster(vec![], vec![voter.clone()], 3), disbursements, clock)
        .vote(ballot(&voter, id, VoteChoice::For))
        .await
        .expect_err("deadline passed");
    assert_eq!(err.code(), ErrorCode::Conflict);
}

#[rstest]
#[tokio::test]
async fn second_vote_is_forbidden(pool: Pool) {
    let voter = UserId::random();
    let mut disbursement = proposal(&pool, &voter, 50_000);
    disbursement.votes_for = 1;
    disbursement.votes = vec![prior_vote(voter.clone(), VoteChoice::For)];
    let id = disbursement.id;
    let mut disbursements = stored(disbursement);
    disbursements.expect_save().never();

    let err = service(pools_with(pool), roster(vec![], vec![voter.clone()], 5), disbursements, clock())
        .vote(ballot(&voter, id, VoteChoice::Against))
        .await
        .expect_err("double vote");
    assert_eq!(err.code(), ErrorCode::Forbidden);
}

#[rstest]
#[tokio::test]
async fn outsiders_cannot_vote(pool: Pool) {
    let disbursement = proposal(&pool, &UserId::random(), 50_000);
    let id = disbursement.id;
    let mut disbursements = stored(disbursement);
    disbursements.expect_save().never();

    let err = service(pools_with(pool), roster(vec![], vec![], 3), disbursements, clock())
        .vote(ballot(&UserId::random(), id, VoteChoice::For))
        .await
        .expect_err("outsider");
    assert_eq!(err.code(), ErrorCode::Forbidden);
}

#[rstest]
#[tokio::test]
async fn reads_expire_overdue_proposals(pool: Pool) {
    let disbursement = proposal(&pool, &UserId::random(), 50_000);
    let id = disbursement.id;
    let mut disbursements = stored(disbursement);
    disbursements
        .expect_save()
        .withf(|saved, expected, _| saved.status == DisbursementStatus::Rejected && *expected == 1)
        .times(1)
        .return_once(|_, _, _| Ok(()));
    let clock = clock();
    clock.advance(Duration::hours(25));

    let read = service(pools_with(pool), roster(vec![], vec![], 1), disbursements, clock)
        .get_disbursement(&id)
        .await
        .expect("read");
    assert_eq!(read.status, DisbursementStatus::Rejected);
    assert_eq!(
        read.resolved_at,
        Some(fixture_now() + Duration::hours(25))
    );
}

#[derive(Debug, Clone, Copy)]
enum Canceller {
    Requester,
    Admin,
    Stranger,
}

#[rstest]
#[case(Canceller::Requester, None)]
#[case(Canceller::Admin, None)]
#[case(Canceller::Stranger, Some(ErrorCode::Forbidden))]
#[tokio::test]
async fn cancel_is_limited_to_requester_and_admins(
    pool: Pool,
    #[case] who: Canceller,
    #[case] expected_error: Option<ErrorCode>,
) {
    let requester = UserId::random();
    let admin = UserId::random();
    let stranger = UserId::random();
    let disbursement = proposal(&pool, &requester, 50_000);
    let id = disbursement.id;
    let mut disbursements = stored(disbursement);
    disbursements.expect_save().returning(|_, _, _| Ok(()));
    let caller = match who {
        Canceller::Requester => requester.clone(),
        Canceller::Admin => admin.clone(),
        Canceller::Stranger => stranger.clone(),
    };

    let result = service(
        pools_with(pool),
        roster(vec![admin], vec![requester, stranger], 3),
        disbursements,
        clock(),
    )
    .cancel_disbursement(&caller, &id)
    .await;
    match expected_error {
        None => assert_eq!(
            result.expect("cancelled").status,
            DisbursementStatus::Cancelled
        ),
        Some(code) => assert_eq!(result.expect_err("refused").code(), code),
    }
}

#[rstest]
#[tokio::test]
async fn cancelling_a_resolved_proposal_conflicts(pool: Pool) {
    let requester = UserId::random();
    let mut disbursement = proposal(&pool, &requester, 50_000);
    disbursement.status = DisbursementStatus::Approved;
    let id = disbursement.id;
    let mut disbursements = stored(disbursement);
    disbursements.expect_save().never();

    let err = service(pools_with(pool), roster(vec![], vec![requester.clone()], 1), disbursements, clock())
        .cancel_disbursement(&requester, &id)
        .await
        .expect_err("already approved");
    assert_eq!(err.code(), ErrorCode::Conflict);
}

#[rstest]
#[tokio::test]
async fn payout_needs_sufficient_funds(mut pool: Pool) {
    pool.current_amount = 10_000;
    let admin = UserId::random();
    let mut disbursement = proposal(&pool, &admin, 50_000);
    disbursement.status = DisbursementStatus::Approved;
    let id = disbursement.id;
    let mut disbursements = stored(disbursement);
    disbursements.expect_save().never();

    let err = service(pools_with(pool), roster(vec![admin.clone()], vec![], 1), disbursements, clock())
        .start_payout(&admin, &id)
        .await
        .expect_err("insufficient funds");
    assert_eq!(err.code(), ErrorCode::Conflict);
}

#[rstest]
#[tokio::test]
async fn payout_requires_admin(pool: Pool) {
    let member = UserId::random();
    let mut disbursement = proposal(&pool, &member, 50_000);
    disbursement.status = DisbursementStatus::Approved;
    let id = disbursement.id;

    let err = service(pools_with(pool), roster(vec![], vec![member.clone()], 1), stored(disbursement), clock())
        .start_payout(&member, &id)
        .await
        .expect_err("not admin");
    assert_eq!(err.code(), ErrorCode::Forbidden);
}

#[rstest]
#[case(PayoutOutcome::Succeeded, DisbursementStatus::Disbursed, PoolBalanceEffect::Debit)]
#[case(PayoutOutcome::Failed, DisbursementStatus::FailedPayout, PoolBalanceEffect::None)]
#[tokio::test]
async fn payout_outcome_settles_balance(
    pool: Pool,
    #[case] outcome: PayoutOutcome,
    #[case] status: DisbursementStatus,
    #[case] effect: PoolBalanceEffect,
) {
    let admin = UserId::random();
    let mut disbursement = proposal(&pool, &admin, 50_000);
    disbursement.status = DisbursementStatus::ProcessingPayout;
    let id = disbursement.id;
    let mut disbursements = stored(disbursement);
    disbursements
        .expect_save()
        .withf(move |saved, _, applied| saved.status == status && *applied == effect)
        .times(1)
        .return_once(|_, _, _| Ok(()));

    let recorded = service(pools_with(pool), roster(vec![admin.clone()], vec![], 1), disbursements, clock())
        .record_payout_outcome(&admin, &id, outcome)
        .await
        .expect("recorded");
    assert_eq!(recorded.status, status);
}

#[rstest]
#[tokio::test]
async fn debit_refused_by_storage_conflicts(pool: Pool) {
    let admin = UserId::random();
    let mut disbursement = proposal(&pool, &admin, 50_000);
    disbursement.status = DisbursementStatus::ProcessingPayout;
    let id = disbursement.id;
    let mut disbursements = stored(disbursement);
    disbursements
        .expect_save()
        .return_once(|_, _, _| Err(DisbursementRepositoryError::insufficient_funds()));

    let err = service(pools_with(pool), roster(vec![admin.clone()], vec![], 1), disbursements, clock())
        .record_payout_outcome(&admin, &id, PayoutOutcome::Succeeded)
        .await
        .expect_err("balance too low");
    assert_eq!(err.code(), ErrorCode::Conflict);
}

#[rstest]
#[tokio::test]
async fn sweep_counts_only_successful_expiries(pool: Pool) {
    let first = proposal(&pool, &UserId::random(), 10_000);
    let raced = proposal(&pool, &UserId::random(), 20_000);
    let raced_id = raced.id;
    let mut disbursements = MockDisbursementRepository::new();
    disbursements
        .expect_list_overdue()
        .return_once(move |_| Ok(vec![first, raced]));
    disbursements.expect_save().times(2).returning(move |saved, _, _| {
        if saved.id == raced_id {
            Err(DisbursementRepositoryError::revision_mismatch(1_i64, 2_i64))
        } else {
            Ok(())
        }
    });
    let clock = clock();
    clock.advance(Duration::days(2));

    let expired = service(MockPoolRepository::new(), MockMembershipRepository::new(), disbursements, clock)
        .expire_overdue()
        .await
        .expect("sweep");
    assert_eq!(expired, 1);
}
