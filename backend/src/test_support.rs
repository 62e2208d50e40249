//! Test utilities for the crate.
//!
//! Shared by unit tests (in `src/`) and integration tests (in `tests/`); only
//! compiled for tests or with the `test-support` feature.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use mockable::Clock;

use crate::domain::{
    ApprovalPolicy, ContributionId, ContributionPeriod, PayerDetails, PaymentNotification,
    PaymentSession, PaymentState, Pool, PoolCode, PoolDraft, PoolDraftInput, PoolId, UserId,
    VotingWindow,
};
use crate::domain::ports::{GatewayNotification, PaymentGateway, PaymentGatewayError};

/// Fixed instant used as "now" across fixtures.
#[must_use]
pub fn fixture_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 9, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// Open five-member monthly pool created by `creator` at [`fixture_now`].
///
/// # Panics
/// Never in practice; the fixture values are valid.
#[must_use]
pub fn sample_pool(creator: &UserId) -> Pool {
    let draft = PoolDraft::try_new(PoolDraftInput {
        title: "Kampung health fund".to_owned(),
        description: "Shared fund for clinic visits".to_owned(),
        community_type: "neighbourhood".to_owned(),
        max_members: 5,
        contribution_period: ContributionPeriod::Monthly,
        contribution_amount_per_member: 50_000,
        benefit_coverage: vec!["outpatient".to_owned(), "medicine".to_owned()],
        approval_policy: ApprovalPolicy::Voting50Percent,
        voting_window: VotingWindow::Hours24,
    })
    .expect("fixture draft is valid");
    let code = PoolCode::parse("KAMPUNG1").expect("fixture code is valid");
    draft.into_pool(PoolId::random(), code, creator.clone(), fixture_now())
}

/// Clock whose current time can be moved forward by tests.
pub struct MutableClock(Mutex<DateTime<Utc>>);

impl MutableClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    pub fn advance(&self, delta: Duration) {
        *self.lock_clock() += delta;
    }

    fn lock_clock(&self) -> MutexGuard<'_, DateTime<Utc>> {
        self.0
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.lock_clock()
    }
}

/// Scripted payment gateway for tests.
///
/// Sessions succeed unless `fail_sessions` is set; `fetch_state` reports the
/// configured state; notifications are accepted when their signature equals
/// `"valid"`.
#[derive(Default)]
pub struct StubPaymentGateway {
    state: Mutex<StubGatewayState>,
}

struct StubGatewayState {
    fail_sessions: bool,
    reported: PaymentState,
    sessions: Vec<ContributionId>,
}

impl Default for StubGatewayState {
    fn default() -> Self {
        Self {
            fail_sessions: false,
            reported: PaymentState::Pending,
            sessions: Vec::new(),
        }
    }
}

impl StubPaymentGateway {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make subsequent session requests fail with a transport error.
    pub fn fail_sessions(&self, fail: bool) {
        self.lock().fail_sessions = fail;
    }

    /// Set the state reported by `fetch_state`.
    pub fn report(&self, state: PaymentState) {
        self.lock().reported = state;
    }

    /// Orders for which a session was opened.
    pub fn sessions(&self) -> Vec<ContributionId> {
        self.lock().sessions.clone()
    }

    fn lock(&self) -> MutexGuard<'_, StubGatewayState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl PaymentGateway for StubPaymentGateway {
    async fn create_session(
        &self,
        order_id: &ContributionId,
        _amount: i64,
        _payer: &PayerDetails,
    ) -> Result<PaymentSession, PaymentGatewayError> {
        let mut state = self.lock();
        if state.fail_sessions {
            return Err(PaymentGatewayError::transport("connection refused"));
        }
        state.sessions.push(*order_id);
        Ok(PaymentSession {
            token: format!("token-{order_id}"),
            redirect_url: format!("https://pay.test/{order_id}"),
        })
    }

    async fn fetch_state(
        &self,
        _order_id: &ContributionId,
    ) -> Result<PaymentState, PaymentGatewayError> {
        Ok(self.lock().reported)
    }

    fn verify_notification(
        &self,
        notification: &GatewayNotification,
    ) -> Result<PaymentNotification, PaymentGatewayError> {
        if notification.signature_key != "valid" {
            return Err(PaymentGatewayError::InvalidSignature);
        }
        let contribution_id = ContributionId::parse(&notification.order_id)
            .map_err(|_| PaymentGatewayError::unknown_order(notification.order_id.clone()))?;
        let state = match notification.transaction_status.as_str() {
            "settlement" | "capture" => PaymentState::Settled,
            "pending" => PaymentState::Pending,
            _ => PaymentState::Failed,
        };
        Ok(PaymentNotification {
            contribution_id,
            state,
        })
    }
}
