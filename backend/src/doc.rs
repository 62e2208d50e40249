//! OpenAPI documentation configuration.
//!
//! [`ApiDoc`] registers every HTTP endpoint from the inbound layer, the
//! request and response schemas, and the session cookie security scheme. The
//! document is served by Swagger UI in debug builds and exported with
//! `cargo run --bin openapi-dump`.

use crate::inbound::http::contributions::{
    CheckoutResponse, CreateContributionRequest, PaymentNotificationRequest,
};
use crate::inbound::http::disbursements::{
    CreateDisbursementRequest, PayoutOutcomeRequest, VoteRequest,
};
use crate::inbound::http::join_requests::{JoinPoolRequest, ResolveJoinRequest};
use crate::inbound::http::pools::{CreatePoolRequest, UpdatePoolRequest};
use crate::inbound::http::schemas::{
    ContributionResponse, DisbursementResponse, ErrorEnvelopeSchema, JoinRequestResponse,
    MemberResponse, PoolResponse, UserResponse, UserSummaryResponse, VoteResponse,
};
use crate::inbound::http::users::{LoginRequest, RegisterRequest, UpdateProfileRequest};
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// Enrich the generated document with the session cookie security scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "SessionCookie",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                "session",
                "Session cookie issued by POST /api/v1/login.",
            ))),
        );
    }
}

/// OpenAPI document for the REST API.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Health fund backend API",
        description = "Community microfunding pools: membership, contributions and \
                       member-voted disbursements."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    security(("SessionCookie" = [])),
    paths(
        crate::inbound::http::users::register,
        crate::inbound::http::users::login,
        crate::inbound::http::users::logout,
        crate::inbound::http::users::current_user,
        crate::inbound::http::users::update_current_user,
        crate::inbound::http::pools::create_pool,
        crate::inbound::http::pools::list_my_pools,
        crate::inbound::http::pools::get_pool_by_code,
        crate::inbound::http::pools::get_pool,
        crate::inbound::http::pools::update_pool,
        crate::inbound::http::pools::list_members,
        crate::inbound::http::pools::my_membership,
        crate::inbound::http::join_requests::request_to_join,
        crate::inbound::http::join_requests::list_join_requests,
        crate::inbound::http::join_requests::resolve_join_request,
        crate::inbound::http::contributions::create_contribution,
        crate::inbound::http::contributions::list_my_contributions,
        crate::inbound::http::contributions::check_contribution_status,
        crate::inbound::http::contributions::payment_notification,
        crate::inbound::http::disbursements::create_disbursement,
        crate::inbound::http::disbursements::list_disbursements,
        crate::inbound::http::disbursements::get_disbursement,
        crate::inbound::http::disbursements::vote,
        crate::inbound::http::disbursements::cancel_disbursement,
        crate::inbound::http::disbursements::start_payout,
        crate::inbound::http::disbursements::record_payout_outcome,
        crate::inbound::http::health::ready,
        crate::inbound::http::health::live,
    ),
    components(schemas(
        RegisterRequest,
        LoginRequest,
        UpdateProfileRequest,
        CreatePoolRequest,
        UpdatePoolRequest,
        JoinPoolRequest,
        ResolveJoinRequest,
        CreateContributionRequest,
        CheckoutResponse,
        PaymentNotificationRequest,
        CreateDisbursementRequest,
        VoteRequest,
        PayoutOutcomeRequest,
        UserResponse,
        UserSummaryResponse,
        PoolResponse,
        MemberResponse,
        JoinRequestResponse,
        ContributionResponse,
        VoteResponse,
        DisbursementResponse,
        ErrorEnvelopeSchema,
    )),
    tags(
        (name = "users", description = "Registration, login and profiles"),
        (name = "pools", description = "Pool registry and membership"),
        (name = "join-requests", description = "Membership admission"),
        (name = "contributions", description = "Contribution ledger and payments"),
        (name = "disbursements", description = "Member-voted disbursements"),
        (name = "health", description = "Endpoints for health checks")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    //! Tests verifying the generated document.

    use super::*;
    use rstest::rstest;
    use utoipa::openapi::RefOr;
    use utoipa::openapi::schema::Schema;

    fn schema_fields(name: &str) -> Vec<String> {
        let doc = ApiDoc::openapi();
        let schemas = &doc.components.as_ref().expect("components").schemas;
        match schemas.get(name).unwrap_or_else(|| panic!("{name} schema")) {
            RefOr::T(Schema::Object(obj)) => obj.properties.keys().cloned().collect(),
            _ => panic!("expected {name} to be an object schema"),
        }
    }

    #[rstest]
    #[case("/api/v1/pools/by-code/{code}")]
    #[case("/api/v1/pools/{poolId}/join-requests")]
    #[case("/api/v1/payments/notifications")]
    #[case("/api/v1/disbursements/{disbursementId}/vote")]
    #[case("/health/ready")]
    fn registers_paths(#[case] path: &str) {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key(path), "missing {path}");
    }

    #[rstest]
    fn pool_schema_exposes_the_join_code() {
        let fields = schema_fields("PoolResponse");
        assert!(fields.iter().any(|field| field == "poolCode"));
        assert!(fields.iter().any(|field| field == "currentAmount"));
    }

    #[rstest]
    fn session_cookie_scheme_is_registered() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("SessionCookie"));
    }
}
