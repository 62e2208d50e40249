//! Backend entry-point: loads settings, wires adapters and serves the REST API.

mod server;

use actix_web::web;
use mockable::DefaultEnv;
use ortho_config::OrthoConfig;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use healthfund::inbound::http::health::HealthState;
use healthfund::inbound::http::session_config::{
    BuildMode, fingerprint::key_fingerprint, session_settings_from_env,
};
use healthfund::settings::AppSettings;
use server::{ServerConfig, SessionCookieConfig, build_http_state, create_server};

/// Application bootstrap.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = AppSettings::load()
        .map_err(|e| std::io::Error::other(format!("failed to load settings: {e}")))?;
    info!(?settings, "settings loaded");

    let env = DefaultEnv::new();
    let session = session_settings_from_env(&env, BuildMode::from_debug_assertions())
        .map_err(std::io::Error::other)?;
    info!(
        fingerprint = %key_fingerprint(&session.key),
        "session signing key loaded"
    );

    let health_state = web::Data::new(HealthState::new());
    let http_state = match build_http_state(&settings).await {
        Ok(state) => state,
        Err(e) => {
            health_state.mark_unhealthy();
            return Err(e);
        }
    };

    let config = ServerConfig::new(
        SessionCookieConfig::new(
            session.key,
            session.cookie_secure,
            session.same_site,
            session.ttl,
        ),
        settings.bind_address(),
    );
    #[cfg(feature = "metrics")]
    let config = config.with_metrics(server::build_prometheus());

    let server = create_server(health_state.clone(), http_state, config)?;
    health_state.mark_ready();
    info!("server ready");
    server.await
}
