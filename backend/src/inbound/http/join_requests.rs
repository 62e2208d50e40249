//! Join request handlers.
//!
//! ```text
//! POST /api/v1/join-requests {"poolCode":"AB12CD34"}
//! GET /api/v1/pools/{poolId}/join-requests?status=PENDING
//! PATCH /api/v1/join-requests/{requestId} {"status":"APPROVED"}
//! ```

use actix_web::{HttpResponse, get, patch, post, web};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::{Error, JoinRequestId, JoinRequestStatus, PoolCode};
use crate::inbound::http::ApiResult;
use crate::inbound::http::envelope::Envelope;
use crate::inbound::http::pools::pool_id_from_path;
use crate::inbound::http::schemas::{ErrorEnvelopeSchema, JoinRequestResponse};
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{FieldName, invalid_value_error, parse_label, parse_path_id, require};

const STATUS_CHOICES: &str = "PENDING|APPROVED|REJECTED";
const DECISION_CHOICES: &str = "APPROVED|REJECTED";

/// Body for `POST /api/v1/join-requests`.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JoinPoolRequest {
    #[schema(example = "AB12CD34")]
    pub pool_code: Option<String>,
}

/// Body for `PATCH /api/v1/join-requests/{requestId}`.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolveJoinRequest {
    #[schema(example = "APPROVED")]
    pub status: Option<String>,
}

/// Optional status filter.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct JoinRequestQuery {
    pub status: Option<String>,
}

fn parse_status_filter(raw: Option<String>) -> Result<Option<JoinRequestStatus>, Error> {
    raw.map(|value| {
        parse_label(
            &value,
            FieldName::new("status"),
            STATUS_CHOICES,
            JoinRequestStatus::from_label,
        )
    })
    .transpose()
}

fn parse_decision(raw: Option<String>) -> Result<JoinRequestStatus, Error> {
    let raw = require(raw, FieldName::new("status"))?;
    parse_label(&raw, FieldName::new("status"), DECISION_CHOICES, |label| {
        JoinRequestStatus::from_label(label).filter(|status| *status != JoinRequestStatus::Pending)
    })
}

/// Ask to join a pool using its join code.
#[utoipa::path(
    post,
    path = "/api/v1/join-requests",
    request_body = JoinPoolRequest,
    responses(
        (status = 201, description = "Request filed", body = Envelope<JoinRequestResponse>),
        (status = 400, description = "Invalid request", body = ErrorEnvelopeSchema),
        (status = 401, description = "Unauthorised", body = ErrorEnvelopeSchema),
        (status = 404, description = "No pool uses this code", body = ErrorEnvelopeSchema),
        (status = 409, description = "Already a member, request pending or pool full", body = ErrorEnvelopeSchema)
    ),
    tags = ["membership"],
    operation_id = "requestToJoin"
)]
#[post("/join-requests")]
pub async fn request_to_join(
    state: web::Data<HttpState>,
    session: SessionContext,
    payload: web::Json<JoinPoolRequest>,
) -> ApiResult<HttpResponse> {
    let user_id = session.require_user_id()?;
    let raw = require(payload.into_inner().pool_code, FieldName::new("poolCode"))?;
    let code = PoolCode::parse(&raw).map_err(|err| invalid_value_error(err.field(), &err))?;
    let request = state.membership.request_to_join(&user_id, &code).await?;
    Ok(Envelope::new(JoinRequestResponse::from(request))
        .with_message("join request submitted")
        .created())
}

/// A pool's join requests; admins only.
#[utoipa::path(
    get,
    path = "/api/v1/pools/{poolId}/join-requests",
    params(("poolId" = String, Path, description = "Pool identifier"), JoinRequestQuery),
    responses(
        (status = 200, description = "Join requests", body = Envelope<Vec<JoinRequestResponse>>),
        (status = 401, description = "Unauthorised", body = ErrorEnvelopeSchema),
        (status = 403, description = "Caller is not an admin", body = ErrorEnvelopeSchema),
        (status = 404, description = "Pool not found", body = ErrorEnvelopeSchema)
    ),
    tags = ["membership"],
    operation_id = "listJoinRequests"
)]
#[get("/pools/{pool_id}/join-requests")]
pub async fn list_join_requests(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<String>,
    query: web::Query<JoinRequestQuery>,
) -> ApiResult<HttpResponse> {
    let admin_id = session.require_user_id()?;
    let pool_id = pool_id_from_path(&path)?;
    let status = parse_status_filter(query.into_inner().status)?;
    let requests = state
        .membership
        .list_join_requests(&admin_id, &pool_id, status)
        .await?;
    let data: Vec<JoinRequestResponse> =
        requests.into_iter().map(JoinRequestResponse::from).collect();
    Ok(Envelope::new(data).ok())
}

/// Approve or reject a pending join request; admins only.
#[utoipa::path(
    patch,
    path = "/api/v1/join-requests/{requestId}",
    params(("requestId" = String, Path, description = "Join request identifier")),
    request_body = ResolveJoinRequest,
    responses(
        (status = 200, description = "Resolved request", body = Envelope<JoinRequestResponse>),
        (status = 400, description = "Invalid decision", body = ErrorEnvelopeSchema),
        (status = 401, description = "Unauthorised", body = ErrorEnvelopeSchema),
        (status = 403, description = "Caller is not an admin", body = ErrorEnvelopeSchema),
        (status = 404, description = "Request not found", body = ErrorEnvelopeSchema),
        (status = 409, description = "Request already resolved or pool full", body = ErrorEnvelopeSchema)
    ),
    tags = ["membership"],
    operation_id = "resolveJoinRequest"
)]
#[patch("/join-requests/{request_id}")]
pub async fn resolve_join_request(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<String>,
    payload: web::Json<ResolveJoinRequest>,
) -> ApiResult<HttpResponse> {
    let admin_id = session.require_user_id()?;
    let request_id = parse_path_id(&path, "join request", JoinRequestId::parse)?;
    let target = parse_decision(payload.into_inner().status)?;
    let request = state
        .membership
        .resolve_join_request(&admin_id, &request_id, target)
        .await?;
    let message = match request.status {
        JoinRequestStatus::Approved => "join request approved",
        _ => "join request rejected",
    };
    Ok(Envelope::new(JoinRequestResponse::from(request))
        .with_message(message)
        .ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ErrorCode, JoinRequest, PoolId, UserId};
    use crate::inbound::http::test_utils::{
        MockPorts, TEST_LOGIN_PATH, login_request, session_cookie, test_login,
        test_session_middleware,
    };
    use crate::test_support::fixture_now;
    use actix_web::http::StatusCode;
    use actix_web::{App, test::{self}};
    use rstest::rstest;
    use serde_json::{Value, json};

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
                    .service(request_to_join)
                    .service(list_join_requests)
                    .service(resolve_join_request),
            )
    }

    #[rstest]
    #[case(Some("approved"), Ok(JoinRequestStatus::Approved))]
    #[case(Some("REJECTED"), Ok(JoinRequestStatus::Rejected))]
    #[case(Some("PENDING"), Err(()))]
    #[case(None, Err(()))]
    fn decisions_must_be_terminal(
        #[case] raw: Option<&str>,
        #[case] expected: Result<JoinRequestStatus, ()>,
    ) {
        let parsed = parse_decision(raw.map(str::to_owned)).map_err(|err| {
            assert_eq!(err.code(), ErrorCode::InvalidRequest);
        });
        assert_eq!(parsed, expected);
    }

    #[actix_web::test]
    async fn join_request_is_created() {
        let user = UserId::random();
        let pool_id = PoolId::random();
        let request = JoinRequest::pending(pool_id, user.clone(), fixture_now());
        let mut ports = MockPorts::default();
        ports
            .membership
            .expect_request_to_join()
            .withf(|_, code| code.as_ref() == "AB12CD34")
            .times(1)
            .return_once(move |_, _| Ok(request));
        let app = test::init_service(test_app(ports)).await;
        let cookie =
            session_cookie(&test::call_service(&app, login_request(&user).to_request()).await);

        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/v1/join-requests")
                .cookie(cookie)
                .set_json(json!({"poolCode": "ab12cd34"}))
                .to_request(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["data"]["status"], json!("PENDING"));
        assert_eq!(body["data"]["poolId"], json!(pool_id.to_string()));
    }

    #[actix_web::test]
    async fn malformed_code_is_rejected_before_lookup() {
        let user = UserId::random();
        let app = test::init_service(test_app(MockPorts::default())).await;
        let cookie =
            session_cookie(&test::call_service(&app, login_request(&user).to_request()).await);

        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/v1/join-requests")
                .cookie(cookie)
                .set_json(json!({"poolCode": "short"}))
                .to_request(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["error"]["details"]["field"], json!("poolCode"));
    }

    #[actix_web::test]
    async fn listing_passes_status_filter() {
        let admin = UserId::random();
        let pool_id = PoolId::random();
        let mut ports = MockPorts::default();
        ports
            .membership
            .expect_list_join_requests()
            .withf(move |_, pool, status| {
                pool == &pool_id && *status == Some(JoinRequestStatus::Pending)
            })
            .times(1)
            .return_once(|_, _, _| Ok(Vec::new()));
        let app = test::init_service(test_app(ports)).await;
        let cookie =
            session_cookie(&test::call_service(&app, login_request(&admin).to_request()).await);

        let res = test::call_service(
            &app,
            test::TestRequest::get()
                .uri(&format!("/api/v1/pools/{pool_id}/join-requests?status=pending"))
                .cookie(cookie)
                .to_request(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn resolving_twice_conflicts() {
        let admin = UserId::random();
        let request_id = JoinRequestId::random();
        let mut ports = MockPorts::default();
        ports
            .membership
            .expect_resolve_join_request()
            .return_once(|_, _, _| Err(Error::conflict("join request is already resolved")));
        let app = test::init_service(test_app(ports)).await;
        let cookie =
            session_cookie(&test::call_service(&app, login_request(&admin).to_request()).await);

        let res = test::call_service(
            &app,
            test::TestRequest::patch()
                .uri(&format!("/api/v1/join-requests/{request_id}"))
                .cookie(cookie)
                .set_json(json!({"status": "APPROVED"}))
                .to_request(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::CONFLICT);
    }
}
