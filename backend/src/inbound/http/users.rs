//! Account and session handlers.
//!
//! ```text
//! POST /api/v1/users {"name":"Siti Rahma","email":"siti@example.com","password":"..."}
//! POST /api/v1/login {"email":"siti@example.com","password":"..."}
//! POST /api/v1/logout
//! GET /api/v1/users/me
//! PATCH /api/v1/users/me {"phone":"+62 811 000"}
//! ```

use actix_web::{HttpResponse, get, patch, post, web};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::domain::{
    CredentialValidationError, Error, LoginCredentials, ProfilePatch, ProfilePatchInput,
    Registration, RegistrationInput,
};
use crate::inbound::http::ApiResult;
use crate::inbound::http::envelope::Envelope;
use crate::inbound::http::schemas::{ErrorEnvelopeSchema, UserResponse};
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::invalid_value_error;

/// Registration body for `POST /api/v1/users`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub age: Option<u8>,
}

/// Login body for `POST /api/v1/login`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Partial profile update for `PATCH /api/v1/users/me`.
///
/// An empty `phone` string clears the stored number.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub age: Option<u8>,
    pub password: Option<String>,
}

fn map_credential_error(err: CredentialValidationError) -> Error {
    invalid_value_error(err.field(), &err)
}

/// Create an account.
#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = Envelope<UserResponse>),
        (status = 400, description = "Invalid request", body = ErrorEnvelopeSchema),
        (status = 409, description = "Email already registered", body = ErrorEnvelopeSchema)
    ),
    tags = ["users"],
    operation_id = "registerUser",
    security([])
)]
#[post("/users")]
pub async fn register(
    state: web::Data<HttpState>,
    payload: web::Json<RegisterRequest>,
) -> ApiResult<HttpResponse> {
    let payload = payload.into_inner();
    let registration = Registration::try_new(RegistrationInput {
        name: &payload.name,
        email: &payload.email,
        password: &payload.password,
        phone: payload.phone.as_deref(),
        age: payload.age,
    })
    .map_err(map_credential_error)?;
    let user = state.identity.register(registration).await?;
    Ok(Envelope::new(UserResponse::from(user))
        .with_message("account created")
        .created())
}

/// Authenticate and establish a session.
#[utoipa::path(
    post,
    path = "/api/v1/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login success", body = Envelope<UserResponse>,
            headers(("Set-Cookie" = String, description = "Session cookie"))),
        (status = 400, description = "Invalid request", body = ErrorEnvelopeSchema),
        (status = 401, description = "Invalid credentials", body = ErrorEnvelopeSchema)
    ),
    tags = ["users"],
    operation_id = "login",
    security([])
)]
#[post("/login")]
pub async fn login(
    state: web::Data<HttpState>,
    session: SessionContext,
    payload: web::Json<LoginRequest>,
) -> ApiResult<HttpResponse> {
    let credentials = LoginCredentials::try_from_parts(&payload.email, &payload.password)
        .map_err(map_credential_error)?;
    let user_id = state.identity.authenticate(&credentials).await?;
    session.persist_user(&user_id)?;
    let user = state.identity.profile(&user_id).await?;
    info!(%user_id, "user logged in");
    Ok(Envelope::new(UserResponse::from(user))
        .with_message("logged in")
        .ok())
}

/// End the current session.
#[utoipa::path(
    post,
    path = "/api/v1/logout",
    responses(
        (status = 200, description = "Session cleared"),
        (status = 401, description = "Unauthorised", body = ErrorEnvelopeSchema)
    ),
    tags = ["users"],
    operation_id = "logout"
)]
#[post("/logout")]
pub async fn logout(session: SessionContext) -> ApiResult<HttpResponse> {
    session.require_user_id()?;
    session.forget();
    Ok(Envelope::new(()).with_message("logged out").ok())
}

/// Fetch the caller's profile.
#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    responses(
        (status = 200, description = "Profile", body = Envelope<UserResponse>),
        (status = 401, description = "Unauthorised", body = ErrorEnvelopeSchema),
        (status = 404, description = "Account no longer exists", body = ErrorEnvelopeSchema)
    ),
    tags = ["users"],
    operation_id = "getCurrentUser"
)]
#[get("/users/me")]
pub async fn current_user(
    state: web::Data<HttpState>,
    session: SessionContext,
) -> ApiResult<HttpResponse> {
    let user_id = session.require_user_id()?;
    let user = state.identity.profile(&user_id).await?;
    Ok(Envelope::new(UserResponse::from(user)).ok())
}

/// Update the caller's profile.
#[utoipa::path(
    patch,
    path = "/api/v1/users/me",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = Envelope<UserResponse>),
        (status = 400, description = "Invalid request", body = ErrorEnvelopeSchema),
        (status = 401, description = "Unauthorised", body = ErrorEnvelopeSchema),
        (status = 409, description = "Email already registered", body = ErrorEnvelopeSchema)
    ),
    tags = ["users"],
    operation_id = "updateCurrentUser"
)]
#[patch("/users/me")]
pub async fn update_current_user(
    state: web::Data<HttpState>,
    session: SessionContext,
    payload: web::Json<UpdateProfileRequest>,
) -> ApiResult<HttpResponse> {
    let user_id = session.require_user_id()?;
    let patch = ProfilePatch::try_new(ProfilePatchInput {
        name: payload.name.as_deref(),
        email: payload.email.as_deref(),
        phone: payload.phone.as_deref(),
        age: payload.age,
        password: payload.password.as_deref(),
    })
    .map_err(map_credential_error)?;
    let user = state.identity.update_profile(&user_id, patch).await?;
    Ok(Envelope::new(UserResponse::from(user))
        .with_message("profile updated")
        .ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EmailAddress, User, UserId, UserName};
    use crate::inbound::http::test_utils::{
        MockPorts, TEST_LOGIN_PATH, login_request, session_cookie, test_login,
        test_session_middleware,
    };
    use crate::test_support::fixture_now;
    use actix_web::http::StatusCode;
    use actix_web::{App, test};
    use rstest::rstest;
    use serde_json::{Value, json};

    fn user(id: &UserId) -> User {
        User {
            id: id.clone(),
            name: UserName::new("Siti Rahma").expect("name"),
            email: EmailAddress::new("siti@example.com").expect("email"),
            phone: None,
            age: Some(34),
            created_at: fixture_now(),
            updated_at: fixture_now(),
        }
    }

    fn test_app(
        ports: MockPorts,
    ) -> App<
        impl actix_web::dev::ServiceFactory<
            actix_web::dev::ServiceRequest,
            Config = (),
            Response = actix_web::dev::ServiceResponse,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        App::new()
            .wrap(test_session_middleware())
            .app_data(web::Data::new(ports.into_state()))
            .route(TEST_LOGIN_PATH, web::get().to(test_login))
            .service(
                web::scope("/api/v1")
                    .service(register)
                    .service(login)
                    .service(logout)
                    .service(current_user)
                    .service(update_current_user),
            )
    }

    #[actix_web::test]
    async fn register_returns_created_envelope() {
        let id = UserId::random();
        let mut ports = MockPorts::default();
        let created = user(&id);
        ports
            .identity
            .expect_register()
            .withf(|registration| registration.email().as_ref() == "siti@example.com")
            .times(1)
            .return_once(move |_| Ok(created));
        let app = test::init_service(test_app(ports)).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/users")
            .set_json(json!({
                "name": "Siti Rahma",
                "email": "Siti@Example.com",
                "password": "correct horse",
            }))
            .to_request();
        let res = test::call_service(&app, req).await;

        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["data"]["id"], json!(id.to_string()));
        assert_eq!(body["data"]["email"], json!("siti@example.com"));
    }

    #[rstest]
    #[case(json!({"name": "", "email": "a@b.c", "password": "long enough"}), "name")]
    #[case(json!({"name": "Ana", "email": "nope", "password": "long enough"}), "email")]
    #[case(json!({"name": "Ana", "email": "a@b.c", "password": "short"}), "password")]
    #[actix_web::test]
    async fn register_rejects_invalid_fields(#[case] payload: Value, #[case] field: &str) {
        let app = test::init_service(test_app(MockPorts::default())).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/users")
            .set_json(payload)
            .to_request();
        let res = test::call_service(&app, req).await;

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["error"]["details"]["field"], json!(field));
    }

    #[actix_web::test]
    async fn login_sets_session_cookie_usable_for_profile() {
        let id = UserId::random();
        let mut ports = MockPorts::default();
        let auth_id = id.clone();
        ports
            .identity
            .expect_authenticate()
            .times(1)
            .return_once(move |_| Ok(auth_id));
        let profile = user(&id);
        ports
            .identity
            .expect_profile()
            .times(2)
            .returning(move |_| Ok(profile.clone()));
        let app = test::init_service(test_app(ports)).await;

        let login_req = test::TestRequest::post()
            .uri("/api/v1/login")
            .set_json(json!({"email": "siti@example.com", "password": "correct horse"}))
            .to_request();
        let login_res = test::call_service(&app, login_req).await;
        assert_eq!(login_res.status(), StatusCode::OK);
        let cookie = session_cookie(&login_res);

        let me_req = test::TestRequest::get()
            .uri("/api/v1/users/me")
            .cookie(cookie)
            .to_request();
        let me_res = test::call_service(&app, me_req).await;
        assert_eq!(me_res.status(), StatusCode::OK);
        let body: Value = test::read_body_json(me_res).await;
        assert_eq!(body["data"]["name"], json!("Siti Rahma"));
    }

    #[actix_web::test]
    async fn login_failure_is_unauthorised() {
        let mut ports = MockPorts::default();
        ports
            .identity
            .expect_authenticate()
            .return_once(|_| Err(Error::unauthorized("invalid email or password")));
        let app = test::init_service(test_app(ports)).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/login")
            .set_json(json!({"email": "siti@example.com", "password": "wrong"}))
            .to_request();
        let res = test::call_service(&app, req).await;

        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert!(res.response().cookies().all(|c| c.name() != "session"));
    }

    #[actix_web::test]
    async fn profile_requires_session() {
        let app = test::init_service(test_app(MockPorts::default())).await;
        let res = test::call_service(
            &app,
            test::TestRequest::get().uri("/api/v1/users/me").to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn empty_profile_patch_is_rejected() {
        let id = UserId::random();
        let app = test::init_service(test_app(MockPorts::default())).await;
        let cookie = session_cookie(&test::call_service(&app, login_request(&id).to_request()).await);

        let req = test::TestRequest::patch()
            .uri("/api/v1/users/me")
            .cookie(cookie)
            .set_json(json!({}))
            .to_request();
        let res = test::call_service(&app, req).await;

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["error"]["details"]["field"], json!("body"));
    }

    #[actix_web::test]
    async fn profile_patch_clears_phone_with_empty_string() {
        let id = UserId::random();
        let mut ports = MockPorts::default();
        let updated = user(&id);
        ports
            .identity
            .expect_update_profile()
            .withf(|_, patch| patch.phone == Some(None) && patch.name.is_none())
            .times(1)
            .return_once(move |_, _| Ok(updated));
        let app = test::init_service(test_app(ports)).await;
        let cookie = session_cookie(&test::call_service(&app, login_request(&id).to_request()).await);

        let req = test::TestRequest::patch()
            .uri("/api/v1/users/me")
            .cookie(cookie)
            .set_json(json!({"phone": ""}))
            .to_request();
        let res = test::call_service(&app, req).await;

        assert_eq!(res.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn logout_clears_the_session() {
        let id = UserId::random();
        let app = test::init_service(test_app(MockPorts::default())).await;
        let cookie = session_cookie(&test::call_service(&app, login_request(&id).to_request()).await);

        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/v1/logout")
                .cookie(cookie)
                .to_request(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(session_cookie(&res).value(), "");
    }
}
