//! Test helpers for inbound HTTP components.

use std::sync::Arc;

use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::cookie::{Cookie, Key};
use actix_web::dev::ServiceResponse;
use actix_web::{HttpResponse, test, web};

use crate::domain::ports::{
    MockContributionLedger, MockDisbursementWorkflow, MockIdentityService,
    MockMembershipAdmission, MockPoolRegistry,
};
use crate::domain::{Error, UserId};
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::{HttpState, HttpStatePorts};

/// Path of the test-only route that logs a user in without credentials.
pub const TEST_LOGIN_PATH: &str = "/test-login/{user_id}";

/// Build a session middleware configured for tests.
///
/// - Generates a fresh signing/encryption key per invocation.
/// - Sets the cookie name to `session` and disables the `Secure` flag for
///   local HTTP tests.
pub fn test_session_middleware() -> SessionMiddleware<CookieSessionStore> {
    SessionMiddleware::builder(CookieSessionStore::default(), Key::generate())
        .cookie_name("session".to_owned())
        .cookie_secure(false)
        .build()
}

/// Test-only handler persisting the user id from the path in the session.
pub async fn test_login(
    session: SessionContext,
    path: web::Path<String>,
) -> Result<HttpResponse, Error> {
    let user_id = UserId::new(path.into_inner())
        .map_err(|error| Error::invalid_request(error.to_string()))?;
    session.persist_user(&user_id)?;
    Ok(HttpResponse::NoContent().finish())
}

/// Request hitting [`test_login`] for `user_id`.
pub fn login_request(user_id: &UserId) -> test::TestRequest {
    test::TestRequest::get().uri(&format!("/test-login/{user_id}"))
}

/// Extract the session cookie set by a response.
pub fn session_cookie<B>(res: &ServiceResponse<B>) -> Cookie<'static> {
    res.response()
        .cookies()
        .find(|cookie| cookie.name() == "session")
        .expect("session cookie set")
        .into_owned()
}

/// Mock ports for handler tests; unset expectations panic when called.
#[derive(Default)]
pub struct MockPorts {
    pub identity: MockIdentityService,
    pub pools: MockPoolRegistry,
    pub membership: MockMembershipAdmission,
    pub contributions: MockContributionLedger,
    pub disbursements: MockDisbursementWorkflow,
}

impl MockPorts {
    /// Wrap the configured mocks into handler state.
    pub fn into_state(self) -> HttpState {
        HttpState::new(HttpStatePorts {
            identity: Arc::new(self.identity),
            pools: Arc::new(self.pools),
            membership: Arc::new(self.membership),
            contributions: Arc::new(self.contributions),
            disbursements: Arc::new(self.disbursements),
        })
    }
}
