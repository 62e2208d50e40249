//! Shared helpers for backend integration tests.
//!
//! Integration tests compile as separate crates under `backend/tests/`, so
//! the app wiring and request builders live here rather than being copied
//! into each file. HTTP suites run against the in-process store, the
//! scripted payment gateway and a movable clock; `embedded_postgres`
//! provisions real databases for the Diesel adapter suite.

#![allow(dead_code, reason = "each test crate uses a different subset")]

pub mod embedded_postgres;

use std::sync::Arc;

use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::cookie::{Cookie, Key};
use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, test, web};
use mockable::Clock;
use serde_json::{Value, json};

use healthfund::domain::ports::PaymentGateway;
use healthfund::inbound::http::contributions::{
    check_contribution_status, create_contribution, list_my_contributions, payment_notification,
};
use healthfund::inbound::http::disbursements::{
    cancel_disbursement, create_disbursement, get_disbursement, list_disbursements,
    record_payout_outcome, start_payout, vote,
};
use healthfund::inbound::http::join_requests::{
    list_join_requests, request_to_join, resolve_join_request,
};
use healthfund::inbound::http::pools::{
    create_pool, get_pool, get_pool_by_code, list_members, list_my_pools, my_membership,
    update_pool,
};
use healthfund::inbound::http::state::{Collaborators, HttpState, HttpStatePorts, Repositories};
use healthfund::inbound::http::users::{
    current_user, login, logout, register, update_current_user,
};
use healthfund::outbound::memory::InMemoryStore;
use healthfund::outbound::security::{Argon2PasswordHasher, RandomPoolCodeGenerator};
use healthfund::test_support::{MutableClock, StubPaymentGateway, fixture_now};

/// Password shared by every account created through [`sign_up!`].
pub const PASSWORD: &str = "correct horse battery";

/// Handles onto the collaborators behind a test app.
pub struct Harness {
    pub state: HttpState,
    pub gateway: Arc<StubPaymentGateway>,
    pub clock: Arc<MutableClock>,
}

/// Wire the real services over fresh in-process storage.
pub fn harness() -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let gateway = StubPaymentGateway::shared();
    let clock = Arc::new(MutableClock::new(fixture_now()));
    let gateway_port: Arc<dyn PaymentGateway> = gateway.clone();
    let clock_port: Arc<dyn Clock> = clock.clone();
    let ports = HttpStatePorts::from_repositories(
        Repositories {
            users: store.clone(),
            pools: store.clone(),
            members: store.clone(),
            contributions: store.clone(),
            disbursements: store,
        },
        Collaborators {
            hasher: Arc::new(Argon2PasswordHasher::with_cost(8, 1, 1).expect("cheap argon2 cost")),
            gateway: gateway_port,
            codes: Arc::new(RandomPoolCodeGenerator),
            clock: clock_port,
        },
    );
    Harness {
        state: HttpState::new(ports),
        gateway,
        clock,
    }
}

/// The `/api/v1` surface as the server mounts it.
pub fn api_app(
    state: HttpState,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let session = SessionMiddleware::builder(CookieSessionStore::default(), Key::generate())
        .cookie_name("session".to_owned())
        .cookie_secure(false)
        .build();
    App::new().app_data(web::Data::new(state)).service(
        web::scope("/api/v1")
            .wrap(session)
            .service(register)
            .service(login)
            .service(logout)
            .service(current_user)
            .service(update_current_user)
            .service(create_pool)
            .service(list_my_pools)
            .service(get_pool_by_code)
            .service(get_pool)
            .service(update_pool)
            .service(list_members)
            .service(my_membership)
            .service(request_to_join)
            .service(list_join_requests)
            .service(resolve_join_request)
            .service(create_contribution)
            .service(list_my_contributions)
            .service(check_contribution_status)
            .service(payment_notification)
            .service(create_disbursement)
            .service(list_disbursements)
            .service(get_disbursement)
            .service(vote)
            .service(cancel_disbursement)
            .service(start_payout)
            .service(record_payout_outcome),
    )
}

pub fn register_request(name: &str, email: &str) -> test::TestRequest {
    test::TestRequest::post().uri("/api/v1/users").set_json(json!({
        "name": name,
        "email": email,
        "password": PASSWORD,
    }))
}

pub fn login_request(email: &str) -> test::TestRequest {
    test::TestRequest::post()
        .uri("/api/v1/login")
        .set_json(json!({ "email": email, "password": PASSWORD }))
}

/// Body for a five-member pool that resolves votes by simple majority.
pub fn pool_body(title: &str) -> Value {
    json!({
        "title": title,
        "description": "Shared fund for clinic visits",
        "communityType": "neighbourhood",
        "maxMembers": 5,
        "contributionPeriod": "MONTHLY",
        "contributionAmountPerMember": 50_000,
        "benefitCoverage": ["outpatient", "medicine"],
        "approvalPolicy": "VOTING_50_PERCENT",
        "votingWindow": "24_HOURS",
    })
}

/// Settlement notification the stub gateway accepts.
pub fn settlement_notification(order_id: &str, amount: i64) -> Value {
    json!({
        "order_id": order_id,
        "status_code": "200",
        "gross_amount": format!("{amount}.00"),
        "signature_key": "valid",
        "transaction_status": "settlement",
    })
}

/// Extract the session cookie set by a response.
pub fn session_cookie<B>(res: &ServiceResponse<B>) -> Cookie<'static> {
    res.response()
        .cookies()
        .find(|cookie| cookie.name() == "session")
        .expect("session cookie set")
        .into_owned()
}

/// Send a request and decode the JSON body (`Null` when empty).
macro_rules! call {
    ($app:expr, $req:expr) => {{
        let res = actix_web::test::call_service($app, $req.to_request()).await;
        let status = res.status();
        let bytes = actix_web::test::read_body(res).await;
        let body: serde_json::Value = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, body)
    }};
}

/// Register an account, log in, and yield `(user_id, session_cookie)`.
macro_rules! sign_up {
    ($app:expr, $name:expr, $email:expr) => {{
        let (status, body) = call!($app, crate::support::register_request($name, $email));
        assert_eq!(status, actix_web::http::StatusCode::CREATED, "{body}");
        let user_id = body["data"]["id"].as_str().expect("user id").to_owned();
        let res = actix_web::test::call_service(
            $app,
            crate::support::login_request($email).to_request(),
        )
        .await;
        assert_eq!(res.status(), actix_web::http::StatusCode::OK);
        (user_id, crate::support::session_cookie(&res))
    }};
}

pub(crate) use {call, sign_up};
