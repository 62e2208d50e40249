//! Disbursement proposal, voting and payout handlers.
//!
//! ```text
//! POST /api/v1/pools/{poolId}/disbursements
//! GET /api/v1/pools/{poolId}/disbursements?status=PENDING_VOTE
//! GET /api/v1/disbursements/{disbursementId}
//! POST /api/v1/disbursements/{disbursementId}/vote {"choice":"FOR"}
//! POST /api/v1/disbursements/{disbursementId}/cancel
//! POST /api/v1/disbursements/{disbursementId}/payout
//! POST /api/v1/disbursements/{disbursementId}/payout-outcome {"outcome":"SUCCEEDED"}
//! ```

use actix_web::{HttpResponse, get, post, web};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::ports::{CastVoteRequest, PayoutOutcome};
use crate::domain::{
    DisbursementDraft, DisbursementDraftInput, DisbursementId, DisbursementStatus,
    DisbursementValidationError, Error, VoteChoice, validate_comment,
};
use crate::inbound::http::ApiResult;
use crate::inbound::http::envelope::Envelope;
use crate::inbound::http::pools::pool_id_from_path;
use crate::inbound::http::schemas::{DisbursementResponse, ErrorEnvelopeSchema};
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{
    FieldName, invalid_value_error, parse_label, parse_path_id, parse_user_id, require,
};

const STATUS_CHOICES: &str =
    "PENDING_VOTE|APPROVED|REJECTED|CANCELLED|PROCESSING_PAYOUT|DISBURSED|FAILED_PAYOUT";
const CHOICE_CHOICES: &str = "FOR|AGAINST";
const OUTCOME_CHOICES: &str = "SUCCEEDED|FAILED";

/// Body for `POST /api/v1/pools/{poolId}/disbursements`.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateDisbursementRequest {
    pub recipient_user_id: Option<String>,
    #[schema(example = 250000)]
    pub amount: Option<i64>,
    pub purpose: Option<String>,
    pub proof_url: Option<String>,
}

/// Body for `POST /api/v1/disbursements/{disbursementId}/vote`.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    #[schema(example = "FOR")]
    pub choice: Option<String>,
    pub comment: Option<String>,
}

/// Body for `POST /api/v1/disbursements/{disbursementId}/payout-outcome`.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PayoutOutcomeRequest {
    #[schema(example = "SUCCEEDED")]
    pub outcome: Option<String>,
}

/// Optional status filter.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct DisbursementQuery {
    pub status: Option<String>,
}

fn map_disbursement_validation(err: DisbursementValidationError) -> Error {
    invalid_value_error(err.field(), &err)
}

fn parse_create_request(payload: CreateDisbursementRequest) -> Result<DisbursementDraft, Error> {
    let recipient = require(payload.recipient_user_id, FieldName::new("recipientUserId"))?;
    DisbursementDraft::try_new(DisbursementDraftInput {
        recipient_user_id: parse_user_id(&recipient, FieldName::new("recipientUserId"))?,
        amount: require(payload.amount, FieldName::new("amount"))?,
        purpose: require(payload.purpose, FieldName::new("purpose"))?,
        proof_url: payload.proof_url,
    })
    .map_err(map_disbursement_validation)
}

fn parse_outcome(label: &str) -> Option<PayoutOutcome> {
    match label {
        "SUCCEEDED" => Some(PayoutOutcome::Succeeded),
        "FAILED" => Some(PayoutOutcome::Failed),
        _ => None,
    }
}

fn disbursement_id_from_path(raw: &str) -> Result<DisbursementId, Error> {
    parse_path_id(raw, "disbursement", DisbursementId::parse)
}

/// Propose a disbursement and open voting.
#[utoipa::path(
    post,
    path = "/api/v1/pools/{poolId}/disbursements",
    params(("poolId" = String, Path, description = "Pool identifier")),
    request_body = CreateDisbursementRequest,
    responses(
        (status = 201, description = "Proposal opened", body = Envelope<DisbursementResponse>),
        (status = 400, description = "Invalid request", body = ErrorEnvelopeSchema),
        (status = 401, description = "Unauthorised", body = ErrorEnvelopeSchema),
        (status = 403, description = "Caller is not a member", body = ErrorEnvelopeSchema),
        (status = 404, description = "Pool not found", body = ErrorEnvelopeSchema)
    ),
    tags = ["disbursements"],
    operation_id = "createDisbursement"
)]
#[post("/pools/{pool_id}/disbursements")]
pub async fn create_disbursement(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<String>,
    payload: web::Json<CreateDisbursementRequest>,
) -> ApiResult<HttpResponse> {
    let user_id = session.require_user_id()?;
    let pool_id = pool_id_from_path(&path)?;
    let draft = parse_create_request(payload.into_inner())?;
    let disbursement = state
        .disbursements
        .create_disbursement(&user_id, &pool_id, draft)
        .await?;
    Ok(Envelope::new(DisbursementResponse::from(disbursement))
        .with_message("disbursement proposed")
        .created())
}

/// A pool's disbursements, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/pools/{poolId}/disbursements",
    params(("poolId" = String, Path, description = "Pool identifier"), DisbursementQuery),
    responses(
        (status = 200, description = "Disbursements", body = Envelope<Vec<DisbursementResponse>>),
        (status = 400, description = "Unknown status filter", body = ErrorEnvelopeSchema),
        (status = 404, description = "Pool not found", body = ErrorEnvelopeSchema)
    ),
    tags = ["disbursements"],
    operation_id = "listDisbursements",
    security([])
)]
#[get("/pools/{pool_id}/disbursements")]
pub async fn list_disbursements(
    state: web::Data<HttpState>,
    path: web::Path<String>,
    query: web::Query<DisbursementQuery>,
) -> ApiResult<HttpResponse> {
    let pool_id = pool_id_from_path(&path)?;
    let status = query
        .into_inner()
        .status
        .map(|raw| {
            parse_label(
                &raw,
                FieldName::new("status"),
                STATUS_CHOICES,
                DisbursementStatus::from_label,
            )
        })
        .transpose()?;
    let disbursements = state
        .disbursements
        .list_disbursements(&pool_id, status)
        .await?;
    let data: Vec<DisbursementResponse> = disbursements
        .into_iter()
        .map(DisbursementResponse::from)
        .collect();
    Ok(Envelope::new(data).ok())
}

/// Fetch a disbursement with its ballots.
#[utoipa::path(
    get,
    path = "/api/v1/disbursements/{disbursementId}",
    params(("disbursementId" = String, Path, description = "Disbursement identifier")),
    responses(
        (status = 200, description = "Disbursement", body = Envelope<DisbursementResponse>),
        (status = 404, description = "Disbursement not found", body = ErrorEnvelopeSchema)
    ),
    tags = ["disbursements"],
    operation_id = "getDisbursement",
    security([])
)]
#[get("/disbursements/{disbursement_id}")]
pub async fn get_disbursement(
    state: web::Data<HttpState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = disbursement_id_from_path(&path)?;
    let disbursement = state.disbursements.get_disbursement(&id).await?;
    Ok(Envelope::new(DisbursementResponse::from(disbursement)).ok())
}

/// Cast a ballot on a disbursement.
#[utoipa::path(
    post,
    path = "/api/v1/disbursements/{disbursementId}/vote",
    params(("disbursementId" = String, Path, description = "Disbursement identifier")),
    request_body = VoteRequest,
    responses(
        (status = 200, description = "Vote recorded", body = Envelope<DisbursementResponse>),
        (status = 400, description = "Invalid ballot", body = ErrorEnvelopeSchema),
        (status = 401, description = "Unauthorised", body = ErrorEnvelopeSchema),
        (status = 403, description = "Caller may not vote or already voted", body = ErrorEnvelopeSchema),
        (status = 404, description = "Disbursement not found", body = ErrorEnvelopeSchema),
        (status = 409, description = "Voting closed", body = ErrorEnvelopeSchema)
    ),
    tags = ["disbursements"],
    operation_id = "voteOnDisbursement"
)]
#[post("/disbursements/{disbursement_id}/vote")]
pub async fn vote(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<String>,
    payload: web::Json<VoteRequest>,
) -> ApiResult<HttpResponse> {
    let voter_id = session.require_user_id()?;
    let disbursement_id = disbursement_id_from_path(&path)?;
    let VoteRequest { choice, comment } = payload.into_inner();
    let choice = require(choice, FieldName::new("choice"))?;
    let choice = parse_label(
        &choice,
        FieldName::new("choice"),
        CHOICE_CHOICES,
        VoteChoice::from_label,
    )?;
    let comment = validate_comment(comment.as_deref()).map_err(map_disbursement_validation)?;
    let disbursement = state
        .disbursements
        .vote(CastVoteRequest {
            voter_id,
            disbursement_id,
            choice,
            comment,
        })
        .await?;
    Ok(Envelope::new(DisbursementResponse::from(disbursement))
        .with_message("vote recorded")
        .ok())
}

/// Withdraw a proposal that is still open for voting.
#[utoipa::path(
    post,
    path = "/api/v1/disbursements/{disbursementId}/cancel",
    params(("disbursementId" = String, Path, description = "Disbursement identifier")),
    responses(
        (status = 200, description = "Cancelled", body = Envelope<DisbursementResponse>),
        (status = 401, description = "Unauthorised", body = ErrorEnvelopeSchema),
        (status = 403, description = "Caller may not cancel", body = ErrorEnvelopeSchema),
        (status = 404, description = "Disbursement not found", body = ErrorEnvelopeSchema),
        (status = 409, description = "Voting already closed", body = ErrorEnvelopeSchema)
    ),
    tags = ["disbursements"],
    operation_id = "cancelDisbursement"
)]
#[post("/disbursements/{disbursement_id}/cancel")]
pub async fn cancel_disbursement(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let user_id = session.require_user_id()?;
    let id = disbursement_id_from_path(&path)?;
    let disbursement = state
        .disbursements
        .cancel_disbursement(&user_id, &id)
        .await?;
    Ok(Envelope::new(DisbursementResponse::from(disbursement))
        .with_message("disbursement cancelled")
        .ok())
}

/// Move an approved proposal into payout; admins only.
#[utoipa::path(
    post,
    path = "/api/v1/disbursements/{disbursementId}/payout",
    params(("disbursementId" = String, Path, description = "Disbursement identifier")),
    responses(
        (status = 200, description = "Payout started", body = Envelope<DisbursementResponse>),
        (status = 401, description = "Unauthorised", body = ErrorEnvelopeSchema),
        (status = 403, description = "Caller is not an admin", body = ErrorEnvelopeSchema),
        (status = 404, description = "Disbursement not found", body = ErrorEnvelopeSchema),
        (status = 409, description = "Not approved or insufficient funds", body = ErrorEnvelopeSchema)
    ),
    tags = ["disbursements"],
    operation_id = "startPayout"
)]
#[post("/disbursements/{disbursement_id}/payout")]
pub async fn start_payout(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let admin_id = session.require_user_id()?;
    let id = disbursement_id_from_path(&path)?;
    let disbursement = state.disbursements.start_payout(&admin_id, &id).await?;
    Ok(Envelope::new(DisbursementResponse::from(disbursement))
        .with_message("payout started")
        .ok())
}

/// Record the payout result; admins only.
#[utoipa::path(
    post,
    path = "/api/v1/disbursements/{disbursementId}/payout-outcome",
    params(("disbursementId" = String, Path, description = "Disbursement identifier")),
    request_body = PayoutOutcomeRequest,
    responses(
        (status = 200, description = "Outcome recorded", body = Envelope<DisbursementResponse>),
        (status = 400, description = "Unknown outcome", body = ErrorEnvelopeSchema),
        (status = 401, description = "Unauthorised", body = ErrorEnvelopeSchema),
        (status = 403, description = "Caller is not an admin", body = ErrorEnvelopeSchema),
        (status = 404, description = "Disbursement not found", body = ErrorEnvelopeSchema),
        (status = 409, description = "Not processing a payout", body = ErrorEnvelopeSchema)
    ),
    tags = ["disbursements"],
    operation_id = "recordPayoutOutcome"
)]
#[post("/disbursements/{disbursement_id}/payout-outcome")]
pub async fn record_payout_outcome(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<String>,
    payload: web::Json<PayoutOutcomeRequest>,
) -> ApiResult<HttpResponse> {
    let admin_id = session.require_user_id()?;
    let id = disbursement_id_from_path(&path)?;
    let outcome = require(payload.into_inner().outcome, FieldName::new("outcome"))?;
    let outcome = parse_label(
        &outcome,
        FieldName::new("outcome"),
        OUTCOME_CHOICES,
        parse_outcome,
    )?;
    let disbursement = state
        .disbursements
        .record_payout_outcome(&admin_id, &id, outcome)
        .await?;
    Ok(Envelope::new(DisbursementResponse::from(disbursement))
        .with_message("payout outcome recorded")
        .ok())
}
