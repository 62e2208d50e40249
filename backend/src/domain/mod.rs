//! Domain primitives, aggregates and services.
//!
//! Purpose: Define strongly typed entities for users, pools, memberships,
//! contributions and disbursements, plus the services implementing the
//! driving ports in [`ports`]. Nothing here depends on Actix or Diesel;
//! adapters reach the domain only through the port traits.
//!
//! Public surface:
//! - Error / ErrorCode: API error payload and stable identifiers.
//! - Pool, PoolMember, JoinRequest, Contribution, Disbursement: aggregates.
//! - IdentityStore, PoolRegistryService, MembershipService,
//!   ContributionService, DisbursementService: port implementations.

pub mod auth;
pub mod contribution;
mod contribution_service;
pub mod disbursement;
mod disbursement_service;
pub mod error;
mod identity_service;
pub mod ids;
pub mod membership;
mod membership_service;
pub mod pool;
mod pool_registry_service;
pub mod ports;
mod service_support;
pub mod trace_id;
pub mod user;

pub use self::auth::{
    CredentialValidationError, LoginCredentials, PASSWORD_MIN, ProfilePatch, ProfilePatchInput,
    Registration, RegistrationInput,
};
pub use self::contribution::{
    Contribution, ContributionStatus, PayerDetails, PaymentNotification, PaymentSession,
    PaymentState,
};
pub use self::contribution_service::ContributionService;
pub use self::disbursement::{
    COMMENT_MAX, Disbursement, DisbursementDraft, DisbursementDraftInput, DisbursementStatus,
    DisbursementTransitionError, DisbursementValidationError, PURPOSE_MAX, Vote, VoteChoice,
    VoteEffect, validate_comment,
};
pub use self::disbursement_service::{DisbursementService, MAX_VOTE_ATTEMPTS};
pub use self::error::{Error, ErrorCode};
pub use self::identity_service::IdentityStore;
pub use self::ids::{ContributionId, DisbursementId, InvalidIdError, JoinRequestId, PoolId};
pub use self::membership::{
    JoinDecision, JoinRequest, JoinRequestStatus, JoinRequestView, MemberRole, MemberView,
    PoolMember,
};
pub use self::membership_service::MembershipService;
pub use self::pool::{
    ApprovalPolicy, ContributionPeriod, POOL_CODE_ALPHABET, POOL_CODE_LEN, PolicyOutcome, Pool,
    PoolCode, PoolDraft, PoolDraftInput, PoolPatch, PoolPatchInput, PoolStatus,
    PoolValidationError, VotingWindow,
};
pub use self::pool_registry_service::{MAX_CODE_ATTEMPTS, PoolRegistryService};
pub use self::trace_id::{TRACE_ID_HEADER, TraceId};
pub use self::user::{
    EmailAddress, User, UserId, UserName, UserSummary, UserValidationError, normalise_phone,
    validate_age,
};

/// Convenient API result alias.
///
/// # Examples
/// ```
/// use actix_web::HttpResponse;
/// use healthfund::domain::{ApiResult, Error};
///
/// fn handler() -> ApiResult<HttpResponse> {
///     Err(Error::forbidden("nope"))
/// }
/// ```
pub type ApiResult<T> = Result<T, Error>;
