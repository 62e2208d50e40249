//! HTTP server configuration object.

use actix_web::cookie::{Key, SameSite, time::Duration};

#[cfg(feature = "metrics")]
use actix_web_prom::PrometheusMetrics;

/// Session cookie settings shared by every worker.
#[derive(Clone)]
pub struct SessionCookieConfig {
    pub(crate) key: Key,
    pub(crate) secure: bool,
    pub(crate) same_site: SameSite,
    pub(crate) ttl: Duration,
}

impl SessionCookieConfig {
    #[must_use]
    pub fn new(key: Key, secure: bool, same_site: SameSite, ttl: Duration) -> Self {
        Self {
            key,
            secure,
            same_site,
            ttl,
        }
    }
}

/// Everything `create_server` needs besides the wired ports.
pub struct ServerConfig {
    pub(crate) session: SessionCookieConfig,
    pub(crate) bind_addr: (String, u16),
    #[cfg(feature = "metrics")]
    pub(crate) prometheus: Option<PrometheusMetrics>,
}

impl ServerConfig {
    #[must_use]
    pub fn new(session: SessionCookieConfig, bind_addr: (String, u16)) -> Self {
        Self {
            session,
            bind_addr,
            #[cfg(feature = "metrics")]
            prometheus: None,
        }
    }

    #[cfg(feature = "metrics")]
    /// Attach Prometheus middleware to the configuration.
    #[must_use]
    pub fn with_metrics(mut self, prometheus: Option<PrometheusMetrics>) -> Self {
        self.prometheus = prometheus;
        self
    }
}
