//! Server construction and middleware wiring.

mod config;
#[cfg(feature = "metrics")]
mod metrics;
mod state_builders;

pub use config::{ServerConfig, SessionCookieConfig};
#[cfg(feature = "metrics")]
pub(crate) use metrics::build_prometheus;
pub(crate) use state_builders::build_http_state;

#[cfg(feature = "metrics")]
use metrics::MetricsLayer;

use actix_session::{
    SessionMiddleware,
    config::{CookieContentSecurity, PersistentSession},
    storage::CookieSessionStore,
};
use actix_web::dev::{Server, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, HttpServer, web};

use healthfund::Trace;
#[cfg(debug_assertions)]
use healthfund::doc::ApiDoc;
use healthfund::inbound::http::contributions::{
    check_contribution_status, create_contribution, list_my_contributions, payment_notification,
};
use healthfund::inbound::http::disbursements::{
    cancel_disbursement, create_disbursement, get_disbursement, list_disbursements,
    record_payout_outcome, start_payout, vote,
};
use healthfund::inbound::http::error::{json_error_handler, path_error_handler, query_error_handler};
use healthfund::inbound::http::health::{HealthState, live, ready};
use healthfund::inbound::http::join_requests::{
    list_join_requests, request_to_join, resolve_join_request,
};
use healthfund::inbound::http::pools::{
    create_pool, get_pool, get_pool_by_code, list_members, list_my_pools, my_membership,
    update_pool,
};
use healthfund::inbound::http::state::HttpState;
use healthfund::inbound::http::users::{
    current_user, login, logout, register, update_current_user,
};
#[cfg(debug_assertions)]
use utoipa::OpenApi;
#[cfg(debug_assertions)]
use utoipa_swagger_ui::SwaggerUi;

#[derive(Clone)]
struct AppDependencies {
    health_state: web::Data<HealthState>,
    http_state: web::Data<HttpState>,
    session: SessionCookieConfig,
}

fn build_app(
    deps: AppDependencies,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let AppDependencies {
        health_state,
        http_state,
        session,
    } = deps;

    let session = SessionMiddleware::builder(CookieSessionStore::default(), session.key)
        .cookie_name("session".into())
        .cookie_path("/".into())
        .cookie_secure(session.secure)
        .cookie_http_only(true)
        .cookie_content_security(CookieContentSecurity::Private)
        .cookie_same_site(session.same_site)
        .session_lifecycle(PersistentSession::default().session_ttl(session.ttl))
        .build();

    // Literal segments (`my-pools`, `by-code`) must precede `{pool_id}`.
    let api = web::scope("/api/v1")
        .wrap(session)
        .service(register)
        .service(login)
        .service(logout)
        .service(current_user)
        .service(update_current_user)
        .service(create_pool)
        .service(list_my_pools)
        .service(get_pool_by_code)
        .service(get_pool)
        .service(update_pool)
        .service(list_members)
        .service(my_membership)
        .service(request_to_join)
        .service(list_join_requests)
        .service(resolve_join_request)
        .service(create_contribution)
        .service(list_my_contributions)
        .service(check_contribution_status)
        .service(payment_notification)
        .service(create_disbursement)
        .service(list_disbursements)
        .service(get_disbursement)
        .service(vote)
        .service(cancel_disbursement)
        .service(start_payout)
        .service(record_payout_outcome);

    let app = App::new()
        .app_data(health_state)
        .app_data(http_state)
        .app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .app_data(web::QueryConfig::default().error_handler(query_error_handler))
        .app_data(web::PathConfig::default().error_handler(path_error_handler))
        .wrap(Trace)
        .service(api)
        .service(ready)
        .service(live);

    #[cfg(debug_assertions)]
    let app = app.service(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()));

    app
}

/// Construct the HTTP server over pre-wired state.
///
/// Readiness is flipped by the caller once the listener is bound.
///
/// # Errors
/// Propagates [`std::io::Error`] when binding the socket fails.
pub fn create_server(
    health_state: web::Data<HealthState>,
    http_state: HttpState,
    config: ServerConfig,
) -> std::io::Result<Server> {
    let http_state = web::Data::new(http_state);
    let ServerConfig {
        session,
        bind_addr,
        #[cfg(feature = "metrics")]
        prometheus,
    } = config;

    #[cfg(feature = "metrics")]
    let metrics_layer = MetricsLayer::from_option(prometheus);

    let server = HttpServer::new(move || {
        let app = build_app(AppDependencies {
            health_state: health_state.clone(),
            http_state: http_state.clone(),
            session: session.clone(),
        });

        #[cfg(feature = "metrics")]
        let app = app.wrap(metrics_layer.clone());

        app
    })
    .bind(bind_addr)?
    .run();

    Ok(server)
}
