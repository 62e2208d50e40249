//! Shared HTTP adapter state.
//!
//! HTTP handlers accept this state via `actix_web::web::Data` so they only
//! depend on driving ports (use cases) and remain testable without I/O.

use std::sync::Arc;

use mockable::Clock;

use crate::domain::ports::{
    ContributionLedger, ContributionRepository, DisbursementRepository, DisbursementWorkflow,
    IdentityService, MembershipAdmission, MembershipRepository, PasswordHasher, PaymentGateway,
    PoolCodeGenerator, PoolRegistry, PoolRepository, UserRepository,
};
use crate::domain::{
    ContributionService, DisbursementService, IdentityStore, MembershipService,
    PoolRegistryService,
};

/// Parameter object bundling the port implementations for HTTP handlers.
#[derive(Clone)]
pub struct HttpStatePorts {
    pub identity: Arc<dyn IdentityService>,
    pub pools: Arc<dyn PoolRegistry>,
    pub membership: Arc<dyn MembershipAdmission>,
    pub contributions: Arc<dyn ContributionLedger>,
    pub disbursements: Arc<dyn DisbursementWorkflow>,
}

/// Driven repositories backing the services.
pub struct Repositories<U, P, M, C, D> {
    pub users: Arc<U>,
    pub pools: Arc<P>,
    pub members: Arc<M>,
    pub contributions: Arc<C>,
    pub disbursements: Arc<D>,
}

/// Non-storage collaborators, constructed once at startup.
pub struct Collaborators<H> {
    pub hasher: Arc<H>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub codes: Arc<dyn PoolCodeGenerator>,
    pub clock: Arc<dyn Clock>,
}

impl HttpStatePorts {
    /// Wire the domain services over a set of repositories.
    pub fn from_repositories<U, P, M, C, D, H>(
        repos: Repositories<U, P, M, C, D>,
        collaborators: Collaborators<H>,
    ) -> Self
    where
        U: UserRepository + 'static,
        P: PoolRepository + 'static,
        M: MembershipRepository + 'static,
        C: ContributionRepository + 'static,
        D: DisbursementRepository + 'static,
        H: PasswordHasher + 'static,
    {
        let Repositories {
            users,
            pools,
            members,
            contributions,
            disbursements,
        } = repos;
        let Collaborators {
            hasher,
            gateway,
            codes,
            clock,
        } = collaborators;
        Self {
            identity: Arc::new(IdentityStore::new(users.clone(), hasher, clock.clone())),
            pools: Arc::new(PoolRegistryService::new(
                pools.clone(),
                members.clone(),
                codes,
                clock.clone(),
            )),
            membership: Arc::new(MembershipService::new(
                pools.clone(),
                members.clone(),
                users.clone(),
                clock.clone(),
            )),
            contributions: Arc::new(ContributionService::new(
                pools.clone(),
                members.clone(),
                contributions,
                users,
                gateway,
                clock.clone(),
            )),
            disbursements: Arc::new(DisbursementService::new(
                pools,
                members,
                disbursements,
                clock,
            )),
        }
    }
}

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub identity: Arc<dyn IdentityService>,
    pub pools: Arc<dyn PoolRegistry>,
    pub membership: Arc<dyn MembershipAdmission>,
    pub contributions: Arc<dyn ContributionLedger>,
    pub disbursements: Arc<dyn DisbursementWorkflow>,
}

impl From<HttpStatePorts> for HttpState {
    fn from(ports: HttpStatePorts) -> Self {
        Self::new(ports)
    }
}

impl HttpState {
    /// Construct state from a ports bundle.
    pub fn new(ports: HttpStatePorts) -> Self {
        let HttpStatePorts {
            identity,
            pools,
            membership,
            contributions,
            disbursements,
        } = ports;
        Self {
            identity,
            pools,
            membership,
            contributions,
            disbursements,
        }
    }
}
