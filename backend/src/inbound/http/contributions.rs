//! Contribution and payment notification handlers.
//!
//! ```text
//! POST /api/v1/pools/{poolId}/contributions {"amount":50000}
//! GET /api/v1/pools/{poolId}/contributions/me
//! GET /api/v1/contributions/{contributionId}/check-status
//! POST /api/v1/payments/notifications
//! ```
//!
//! The notification endpoint is called by the payment gateway, not by a
//! browser, so it carries no session; the gateway signature authenticates it.

use actix_web::{HttpResponse, get, post, web};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::domain::ContributionId;
use crate::domain::ports::{ContributionCheckout, GatewayNotification};
use crate::inbound::http::ApiResult;
use crate::inbound::http::envelope::Envelope;
use crate::inbound::http::pools::pool_id_from_path;
use crate::inbound::http::schemas::{ContributionResponse, ErrorEnvelopeSchema};
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{FieldName, parse_path_id, require};

/// Body for `POST /api/v1/pools/{poolId}/contributions`.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateContributionRequest {
    /// Whole currency units.
    #[schema(example = 50000)]
    pub amount: Option<i64>,
}

/// Hosted checkout handed back after opening a contribution.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub contribution_id: String,
    pub payment_token: String,
    pub redirect_url: String,
}

impl From<ContributionCheckout> for CheckoutResponse {
    fn from(value: ContributionCheckout) -> Self {
        Self {
            contribution_id: value.contribution_id.to_string(),
            payment_token: value.payment_token,
            redirect_url: value.redirect_url,
        }
    }
}

/// Settlement notification as posted by the gateway.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct PaymentNotificationRequest {
    pub order_id: String,
    pub status_code: String,
    pub gross_amount: String,
    pub signature_key: String,
    pub transaction_status: String,
    #[serde(default)]
    pub fraud_status: Option<String>,
}

impl From<PaymentNotificationRequest> for GatewayNotification {
    fn from(value: PaymentNotificationRequest) -> Self {
        Self {
            order_id: value.order_id,
            status_code: value.status_code,
            gross_amount: value.gross_amount,
            signature_key: value.signature_key,
            transaction_status: value.transaction_status,
            fraud_status: value.fraud_status,
        }
    }
}

/// Record a pending contribution and open a checkout session.
#[utoipa::path(
    post,
    path = "/api/v1/pools/{poolId}/contributions",
    params(("poolId" = String, Path, description = "Pool identifier")),
    request_body = CreateContributionRequest,
    responses(
        (status = 201, description = "Checkout opened", body = Envelope<CheckoutResponse>),
        (status = 400, description = "Invalid amount", body = ErrorEnvelopeSchema),
        (status = 401, description = "Unauthorised", body = ErrorEnvelopeSchema),
        (status = 403, description = "Caller is not a member", body = ErrorEnvelopeSchema),
        (status = 404, description = "Pool not found", body = ErrorEnvelopeSchema),
        (status = 502, description = "Payment gateway failure", body = ErrorEnvelopeSchema)
    ),
    tags = ["contributions"],
    operation_id = "createContribution"
)]
#[post("/pools/{pool_id}/contributions")]
pub async fn create_contribution(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<String>,
    payload: web::Json<CreateContributionRequest>,
) -> ApiResult<HttpResponse> {
    let user_id = session.require_user_id()?;
    let pool_id = pool_id_from_path(&path)?;
    let amount = require(payload.into_inner().amount, FieldName::new("amount"))?;
    let checkout = state
        .contributions
        .create_contribution(&user_id, &pool_id, amount)
        .await?;
    Ok(Envelope::new(CheckoutResponse::from(checkout))
        .with_message("contribution created")
        .created())
}

/// The caller's contributions to a pool.
#[utoipa::path(
    get,
    path = "/api/v1/pools/{poolId}/contributions/me",
    params(("poolId" = String, Path, description = "Pool identifier")),
    responses(
        (status = 200, description = "Contributions", body = Envelope<Vec<ContributionResponse>>),
        (status = 401, description = "Unauthorised", body = ErrorEnvelopeSchema),
        (status = 404, description = "Pool not found", body = ErrorEnvelopeSchema)
    ),
    tags = ["contributions"],
    operation_id = "listMyContributions"
)]
#[get("/pools/{pool_id}/contributions/me")]
pub async fn list_my_contributions(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let user_id = session.require_user_id()?;
    let pool_id = pool_id_from_path(&path)?;
    let contributions = state
        .contributions
        .list_my_contributions(&user_id, &pool_id)
        .await?;
    let data: Vec<ContributionResponse> = contributions
        .into_iter()
        .map(ContributionResponse::from)
        .collect();
    Ok(Envelope::new(data).ok())
}

/// Ask the gateway for the settlement state of a contribution.
#[utoipa::path(
    get,
    path = "/api/v1/contributions/{contributionId}/check-status",
    params(("contributionId" = String, Path, description = "Contribution identifier")),
    responses(
        (status = 200, description = "Contribution", body = Envelope<ContributionResponse>),
        (status = 401, description = "Unauthorised", body = ErrorEnvelopeSchema),
        (status = 403, description = "Not the caller's contribution", body = ErrorEnvelopeSchema),
        (status = 404, description = "Contribution not found", body = ErrorEnvelopeSchema),
        (status = 502, description = "Payment gateway failure", body = ErrorEnvelopeSchema)
    ),
    tags = ["contributions"],
    operation_id = "checkContributionStatus"
)]
#[get("/contributions/{contribution_id}/check-status")]
pub async fn check_contribution_status(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let user_id = session.require_user_id()?;
    let contribution_id = parse_path_id(&path, "contribution", ContributionId::parse)?;
    let contribution = state
        .contributions
        .check_contribution_status(&user_id, &contribution_id)
        .await?;
    Ok(Envelope::new(ContributionResponse::from(contribution)).ok())
}

/// Gateway settlement callback.
#[utoipa::path(
    post,
    path = "/api/v1/payments/notifications",
    request_body = PaymentNotificationRequest,
    responses(
        (status = 200, description = "Notification applied", body = Envelope<ContributionResponse>),
        (status = 403, description = "Signature rejected", body = ErrorEnvelopeSchema),
        (status = 404, description = "Unknown order", body = ErrorEnvelopeSchema)
    ),
    tags = ["contributions"],
    operation_id = "applyPaymentNotification",
    security([])
)]
#[post("/payments/notifications")]
pub async fn payment_notification(
    state: web::Data<HttpState>,
    payload: web::Json<PaymentNotificationRequest>,
) -> ApiResult<HttpResponse> {
    let notification = GatewayNotification::from(payload.into_inner());
    info!(
        order_id = %notification.order_id,
        transaction_status = %notification.transaction_status,
        "payment notification received"
    );
    let contribution = state
        .contributions
        .apply_payment_notification(&notification)
        .await?;
    Ok(Envelope::new(ContributionResponse::from(contribution)).ok())
}
