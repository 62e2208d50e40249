//! Pool registry and membership read handlers.
//!
//! ```text
//! POST /api/v1/pools
//! GET /api/v1/pools/my-pools
//! GET /api/v1/pools/by-code/{code}
//! GET /api/v1/pools/{poolId}
//! PATCH /api/v1/pools/{poolId}
//! GET /api/v1/pools/{poolId}/members
//! GET /api/v1/pools/{poolId}/members/me
//! ```
//!
//! `my-pools` and `by-code` must be registered before `{poolId}` so the
//! literal segments win.

use actix_web::{HttpResponse, get, patch, post, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{
    ApprovalPolicy, ContributionPeriod, Error, PoolCode, PoolDraft, PoolDraftInput, PoolId,
    PoolPatch, PoolPatchInput, PoolStatus, PoolValidationError, VotingWindow,
};
use crate::inbound::http::ApiResult;
use crate::inbound::http::envelope::Envelope;
use crate::inbound::http::schemas::{ErrorEnvelopeSchema, MemberResponse, PoolResponse};
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{
    FieldName, invalid_value_error, parse_label, parse_path_id, require,
};

const PERIOD_CHOICES: &str = "WEEKLY|MONTHLY|ANNUALLY";
const POLICY_CHOICES: &str = "VOTING_50_PERCENT";
const WINDOW_CHOICES: &str = "24_HOURS|48_HOURS|72_HOURS|7_DAYS";
const STATUS_CHOICES: &str = "OPEN|CLOSED";

/// Creation body for `POST /api/v1/pools`.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePoolRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub community_type: Option<String>,
    pub max_members: Option<i64>,
    #[schema(example = "MONTHLY")]
    pub contribution_period: Option<String>,
    pub contribution_amount_per_member: Option<i64>,
    #[serde(default)]
    pub benefit_coverage: Vec<String>,
    /// Defaults to `VOTING_50_PERCENT`.
    pub approval_policy: Option<String>,
    /// Defaults to `24_HOURS`.
    pub voting_window: Option<String>,
}

/// Settings patch for `PATCH /api/v1/pools/{poolId}`.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePoolRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub max_members: Option<i64>,
    #[schema(example = "CLOSED")]
    pub status: Option<String>,
}

fn map_pool_validation(err: PoolValidationError) -> Error {
    invalid_value_error(err.field(), &err)
}

fn parse_create_request(payload: CreatePoolRequest) -> Result<PoolDraft, Error> {
    let period = require(
        payload.contribution_period,
        FieldName::new("contributionPeriod"),
    )?;
    let approval_policy = payload
        .approval_policy
        .map(|raw| {
            parse_label(
                &raw,
                FieldName::new("approvalPolicy"),
                POLICY_CHOICES,
                ApprovalPolicy::from_label,
            )
        })
        .transpose()?
        .unwrap_or_default();
    let voting_window = payload
        .voting_window
        .map(|raw| {
            parse_label(
                &raw,
                FieldName::new("votingWindow"),
                WINDOW_CHOICES,
                VotingWindow::from_label,
            )
        })
        .transpose()?
        .unwrap_or_default();

    PoolDraft::try_new(PoolDraftInput {
        title: require(payload.title, FieldName::new("title"))?,
        description: payload.description.unwrap_or_default(),
        community_type: require(payload.community_type, FieldName::new("communityType"))?,
        max_members: require(payload.max_members, FieldName::new("maxMembers"))?,
        contribution_period: parse_label(
            &period,
            FieldName::new("contributionPeriod"),
            PERIOD_CHOICES,
            ContributionPeriod::from_label,
        )?,
        contribution_amount_per_member: payload.contribution_amount_per_member.unwrap_or(0),
        benefit_coverage: payload.benefit_coverage,
        approval_policy,
        voting_window,
    })
    .map_err(map_pool_validation)
}

fn parse_update_request(payload: UpdatePoolRequest) -> Result<PoolPatch, Error> {
    let status = payload
        .status
        .map(|raw| {
            parse_label(
                &raw,
                FieldName::new("status"),
                STATUS_CHOICES,
                PoolStatus::from_label,
            )
        })
        .transpose()?;
    PoolPatch::try_new(PoolPatchInput {
        title: payload.title,
        description: payload.description,
        max_members: payload.max_members,
        status,
    })
    .map_err(map_pool_validation)
}

pub(crate) fn pool_id_from_path(raw: &str) -> Result<PoolId, Error> {
    parse_path_id(raw, "pool", PoolId::parse)
}

/// Create a pool; the caller becomes its admin.
#[utoipa::path(
    post,
    path = "/api/v1/pools",
    request_body = CreatePoolRequest,
    responses(
        (status = 201, description = "Pool created", body = Envelope<PoolResponse>),
        (status = 400, description = "Invalid request", body = ErrorEnvelopeSchema),
        (status = 401, description = "Unauthorised", body = ErrorEnvelopeSchema),
        (status = 409, description = "No free join code", body = ErrorEnvelopeSchema)
    ),
    tags = ["pools"],
    operation_id = "createPool"
)]
#[post("/pools")]
pub async fn create_pool(
    state: web::Data<HttpState>,
    session: SessionContext,
    payload: web::Json<CreatePoolRequest>,
) -> ApiResult<HttpResponse> {
    let user_id = session.require_user_id()?;
    let draft = parse_create_request(payload.into_inner())?;
    let pool = state.pools.create_pool(&user_id, draft).await?;
    Ok(Envelope::new(PoolResponse::from(pool))
        .with_message("pool created")
        .created())
}

/// Pools the caller belongs to, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/pools/my-pools",
    responses(
        (status = 200, description = "Pools", body = Envelope<Vec<PoolResponse>>),
        (status = 401, description = "Unauthorised", body = ErrorEnvelopeSchema)
    ),
    tags = ["pools"],
    operation_id = "listMyPools"
)]
#[get("/pools/my-pools")]
pub async fn list_my_pools(
    state: web::Data<HttpState>,
    session: SessionContext,
) -> ApiResult<HttpResponse> {
    let user_id = session.require_user_id()?;
    let pools = state.pools.list_my_pools(&user_id).await?;
    let data: Vec<PoolResponse> = pools.into_iter().map(PoolResponse::from).collect();
    Ok(Envelope::new(data).ok())
}

/// Look a pool up by its join code.
#[utoipa::path(
    get,
    path = "/api/v1/pools/by-code/{code}",
    params(("code" = String, Path, description = "Join code, case-insensitive")),
    responses(
        (status = 200, description = "Pool", body = Envelope<PoolResponse>),
        (status = 404, description = "No pool uses this code", body = ErrorEnvelopeSchema)
    ),
    tags = ["pools"],
    operation_id = "getPoolByCode",
    security([])
)]
#[get("/pools/by-code/{code}")]
pub async fn get_pool_by_code(
    state: web::Data<HttpState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let raw = path.into_inner();
    let code = parse_path_id(&raw, "pool with code", PoolCode::parse)?;
    let pool = state.pools.get_pool_by_code(&code).await?;
    Ok(Envelope::new(PoolResponse::from(pool)).ok())
}

/// Fetch a pool.
#[utoipa::path(
    get,
    path = "/api/v1/pools/{poolId}",
    params(("poolId" = String, Path, description = "Pool identifier")),
    responses(
        (status = 200, description = "Pool", body = Envelope<PoolResponse>),
        (status = 404, description = "Pool not found", body = ErrorEnvelopeSchema)
    ),
    tags = ["pools"],
    operation_id = "getPool",
    security([])
)]
#[get("/pools/{pool_id}")]
pub async fn get_pool(
    state: web::Data<HttpState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let pool_id = pool_id_from_path(&path)?;
    let pool = state.pools.get_pool(&pool_id).await?;
    Ok(Envelope::new(PoolResponse::from(pool)).ok())
}

/// Update pool settings; admins only.
#[utoipa::path(
    patch,
    path = "/api/v1/pools/{poolId}",
    params(("poolId" = String, Path, description = "Pool identifier")),
    request_body = UpdatePoolRequest,
    responses(
        (status = 200, description = "Updated pool", body = Envelope<PoolResponse>),
        (status = 400, description = "Invalid request", body = ErrorEnvelopeSchema),
        (status = 401, description = "Unauthorised", body = ErrorEnvelopeSchema),
        (status = 403, description = "Caller is not an admin", body = ErrorEnvelopeSchema),
        (status = 404, description = "Pool not found", body = ErrorEnvelopeSchema)
    ),
    tags = ["pools"],
    operation_id = "updatePool"
)]
#[patch("/pools/{pool_id}")]
pub async fn update_pool(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<String>,
    payload: web::Json<UpdatePoolRequest>,
) -> ApiResult<HttpResponse> {
    let user_id = session.require_user_id()?;
    let pool_id = pool_id_from_path(&path)?;
    let patch = parse_update_request(payload.into_inner())?;
    let pool = state.pools.update_pool(&user_id, &pool_id, patch).await?;
    Ok(Envelope::new(PoolResponse::from(pool))
        .with_message("pool updated")
        .ok())
}

/// Members of a pool with their public profiles.
#[utoipa::path(
    get,
    path = "/api/v1/pools/{poolId}/members",
    params(("poolId" = String, Path, description = "Pool identifier")),
    responses(
        (status = 200, description = "Members", body = Envelope<Vec<MemberResponse>>),
        (status = 401, description = "Unauthorised", body = ErrorEnvelopeSchema),
        (status = 404, description = "Pool not found", body = ErrorEnvelopeSchema)
    ),
    tags = ["pools"],
    operation_id = "listPoolMembers"
)]
#[get("/pools/{pool_id}/members")]
pub async fn list_members(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    session.require_user_id()?;
    let pool_id = pool_id_from_path(&path)?;
    let members = state.membership.get_members(&pool_id).await?;
    let data: Vec<MemberResponse> = members.into_iter().map(MemberResponse::from).collect();
    Ok(Envelope::new(data).ok())
}

/// The caller's own membership of a pool.
#[utoipa::path(
    get,
    path = "/api/v1/pools/{poolId}/members/me",
    params(("poolId" = String, Path, description = "Pool identifier")),
    responses(
        (status = 200, description = "Membership", body = Envelope<MemberResponse>),
        (status = 401, description = "Unauthorised", body = ErrorEnvelopeSchema),
        (status = 404, description = "Not a member", body = ErrorEnvelopeSchema)
    ),
    tags = ["pools"],
    operation_id = "getMyMembership"
)]
#[get("/pools/{pool_id}/members/me")]
pub async fn my_membership(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let user_id = session.require_user_id()?;
    let pool_id = pool_id_from_path(&path)?;
    let member = state.membership.get_membership(&pool_id, &user_id).await?;
    Ok(Envelope::new(MemberResponse::from(member)).ok())
}
