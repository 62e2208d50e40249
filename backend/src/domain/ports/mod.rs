//! Domain ports and supporting types for the hexagonal boundary.
//!
//! Driven ports (repositories, payment gateway, hashing, code generation) are
//! implemented by outbound adapters. Driving ports are the use cases inbound
//! adapters call; domain services implement them.

mod macros;
pub(crate) use macros::define_port_error;

mod contribution_ledger;
mod contribution_repository;
mod disbursement_repository;
mod disbursement_workflow;
mod identity;
mod membership_admission;
mod membership_repository;
mod password_hasher;
mod payment_gateway;
mod pool_code_generator;
mod pool_registry;
mod pool_repository;
mod user_repository;

#[cfg(test)]
pub use contribution_ledger::MockContributionLedger;
pub use contribution_ledger::{ContributionCheckout, ContributionLedger};
#[cfg(test)]
pub use contribution_repository::MockContributionRepository;
pub use contribution_repository::{ContributionRepository, ContributionRepositoryError};
#[cfg(test)]
pub use disbursement_repository::MockDisbursementRepository;
pub use disbursement_repository::{
    DisbursementRepository, DisbursementRepositoryError, PoolBalanceEffect,
};
#[cfg(test)]
pub use disbursement_workflow::MockDisbursementWorkflow;
pub use disbursement_workflow::{CastVoteRequest, DisbursementWorkflow, PayoutOutcome};
pub use identity::IdentityService;
#[cfg(test)]
pub use identity::MockIdentityService;
#[cfg(test)]
pub use membership_admission::MockMembershipAdmission;
pub use membership_admission::MembershipAdmission;
#[cfg(test)]
pub use membership_repository::MockMembershipRepository;
pub use membership_repository::{Admission, MembershipRepository, MembershipRepositoryError};
#[cfg(test)]
pub use password_hasher::MockPasswordHasher;
pub use password_hasher::{PasswordHashError, PasswordHasher};
#[cfg(test)]
pub use payment_gateway::MockPaymentGateway;
pub use payment_gateway::{GatewayNotification, PaymentGateway, PaymentGatewayError};
#[cfg(test)]
pub use pool_code_generator::MockPoolCodeGenerator;
pub use pool_code_generator::PoolCodeGenerator;
#[cfg(test)]
pub use pool_registry::MockPoolRegistry;
pub use pool_registry::PoolRegistry;
#[cfg(test)]
pub use pool_repository::MockPoolRepository;
pub use pool_repository::{PoolRepository, PoolRepositoryError};
#[cfg(test)]
pub use user_repository::MockUserRepository;
pub use user_repository::{StoredUser, UserRepository, UserRepositoryError};
