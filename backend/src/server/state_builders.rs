//! Builders wiring repositories and collaborators into [`HttpState`].

use std::io;
use std::sync::Arc;

use mockable::{Clock, DefaultClock};
use tracing::{info, warn};

use healthfund::domain::ports::PaymentGateway;
use healthfund::inbound::http::state::{
    Collaborators, HttpState, HttpStatePorts, Repositories,
};
use healthfund::outbound::memory::InMemoryStore;
use healthfund::outbound::payment::{DisabledPaymentGateway, SnapPaymentGateway};
use healthfund::outbound::persistence::{
    DbPool, DieselContributionRepository, DieselDisbursementRepository,
    DieselMembershipRepository, DieselPoolRepository, DieselUserRepository,
};
use healthfund::outbound::security::{Argon2PasswordHasher, RandomPoolCodeGenerator};
use healthfund::settings::AppSettings;

fn collaborators(gateway: Arc<dyn PaymentGateway>) -> Collaborators<Argon2PasswordHasher> {
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    Collaborators {
        hasher: Arc::new(Argon2PasswordHasher::default()),
        gateway,
        codes: Arc::new(RandomPoolCodeGenerator),
        clock,
    }
}

/// Build the payment gateway, falling back to the disabled adapter.
///
/// # Errors
/// Returns an error when gateway settings are present but invalid.
pub(crate) fn build_gateway(settings: &AppSettings) -> io::Result<Arc<dyn PaymentGateway>> {
    let config = settings
        .gateway_config()
        .map_err(|err| io::Error::other(err.to_string()))?;
    match config {
        Some(config) => {
            let gateway = SnapPaymentGateway::new(config)
                .map_err(|err| io::Error::other(format!("payment gateway setup failed: {err}")))?;
            info!("payment gateway configured");
            Ok(Arc::new(gateway))
        }
        None => {
            warn!("HEALTHFUND_PAYMENT_SERVER_KEY not set; contributions cannot be paid");
            Ok(Arc::new(DisabledPaymentGateway))
        }
    }
}

/// Build HTTP state on PostgreSQL when configured, otherwise on the
/// in-process store.
///
/// # Errors
/// Returns an error when settings are invalid or the database pool cannot
/// be built.
pub(crate) async fn build_http_state(settings: &AppSettings) -> io::Result<HttpState> {
    let gateway = build_gateway(settings)?;
    let pool_config = settings
        .pool_config()
        .map_err(|err| io::Error::other(err.to_string()))?;

    let ports = match pool_config {
        Some(config) => {
            let pool = DbPool::new(config)
                .await
                .map_err(|err| io::Error::other(format!("create database pool: {err}")))?;
            info!("using PostgreSQL storage");
            diesel_ports(&pool, gateway)
        }
        None => {
            warn!("HEALTHFUND_DATABASE_URL not set; using in-process storage (development only)");
            in_memory_ports(Arc::new(InMemoryStore::new()), gateway)
        }
    };
    Ok(HttpState::new(ports))
}

fn diesel_ports(pool: &DbPool, gateway: Arc<dyn PaymentGateway>) -> HttpStatePorts {
    HttpStatePorts::from_repositories(
        Repositories {
            users: Arc::new(DieselUserRepository::new(pool.clone())),
            pools: Arc::new(DieselPoolRepository::new(pool.clone())),
            members: Arc::new(DieselMembershipRepository::new(pool.clone())),
            contributions: Arc::new(DieselContributionRepository::new(pool.clone())),
            disbursements: Arc::new(DieselDisbursementRepository::new(pool.clone())),
        },
        collaborators(gateway),
    )
}

fn in_memory_ports(store: Arc<InMemoryStore>, gateway: Arc<dyn PaymentGateway>) -> HttpStatePorts {
    HttpStatePorts::from_repositories(
        Repositories {
            users: store.clone(),
            pools: store.clone(),
            members: store.clone(),
            contributions: store.clone(),
            disbursements: store,
        },
        collaborators(gateway),
    )
}
