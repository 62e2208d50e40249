//! Application settings loaded via OrthoConfig.
//!
//! Values come from `HEALTHFUND_*` environment variables, an optional
//! configuration file and command-line flags, in OrthoConfig's usual order
//! of precedence. Session cookie settings are read separately; see
//! [`crate::inbound::http::session_config`].

use std::time::Duration;

use ortho_config::OrthoConfig;
use reqwest::Url;
use serde::Deserialize;
use zeroize::Zeroizing;

use crate::outbound::payment::SnapGatewayConfig;
use crate::outbound::persistence::PoolConfig;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DB_POOL_SIZE: u32 = 10;
const DEFAULT_SNAP_BASE_URL: &str = "https://app.sandbox.midtrans.com/";
const DEFAULT_API_BASE_URL: &str = "https://api.sandbox.midtrans.com/";
const DEFAULT_PAYMENT_TIMEOUT_SECS: u64 = 10;

/// Errors raised while interpreting loaded settings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("invalid URL for {name}: {message}")]
    InvalidUrl { name: &'static str, message: String },
    #[error("{name} must be greater than zero")]
    Zero { name: &'static str },
}

/// Server, storage and payment gateway settings.
#[derive(Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "HEALTHFUND")]
pub struct AppSettings {
    /// Interface to bind the HTTP listener to.
    pub host: Option<String>,
    /// TCP port for the HTTP listener.
    pub port: Option<u16>,
    /// PostgreSQL URL. Without it the server runs on the in-process store.
    pub database_url: Option<String>,
    /// Maximum number of pooled database connections.
    pub db_pool_size: Option<u32>,
    /// Payment gateway server key. Without it payments are disabled.
    pub payment_server_key: Option<String>,
    /// Base URL of the hosted checkout API.
    pub payment_snap_base_url: Option<String>,
    /// Base URL of the gateway status API.
    pub payment_api_base_url: Option<String>,
    /// Gateway request timeout in seconds.
    pub payment_timeout_secs: Option<u64>,
}

impl std::fmt::Debug for AppSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_url", &self.database_url.as_ref().map(|_| "<set>"))
            .field("db_pool_size", &self.db_pool_size)
            .field(
                "payment_server_key",
                &self.payment_server_key.as_ref().map(|_| "<redacted>"),
            )
            .field("payment_snap_base_url", &self.payment_snap_base_url)
            .field("payment_api_base_url", &self.payment_api_base_url)
            .field("payment_timeout_secs", &self.payment_timeout_secs)
            .finish()
    }
}

fn parse_url(name: &'static str, raw: &str) -> Result<Url, SettingsError> {
    let mut url = Url::parse(raw.trim()).map_err(|err| SettingsError::InvalidUrl {
        name,
        message: err.to_string(),
    })?;
    // `Url::join` replaces the last segment unless the path ends in a slash.
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

impl AppSettings {
    /// Host and port for `HttpServer::bind`.
    pub fn bind_address(&self) -> (String, u16) {
        (
            self.host
                .clone()
                .unwrap_or_else(|| DEFAULT_HOST.to_owned()),
            self.port.unwrap_or(DEFAULT_PORT),
        )
    }

    /// Database pool settings, when a database URL is configured.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Zero`] for a zero pool size.
    pub fn pool_config(&self) -> Result<Option<PoolConfig>, SettingsError> {
        let Some(url) = self.database_url.as_deref().filter(|url| !url.trim().is_empty()) else {
            return Ok(None);
        };
        let size = self.db_pool_size.unwrap_or(DEFAULT_DB_POOL_SIZE);
        if size == 0 {
            return Err(SettingsError::Zero {
                name: "HEALTHFUND_DB_POOL_SIZE",
            });
        }
        Ok(Some(PoolConfig::new(url.trim()).with_max_size(size)))
    }

    /// Payment gateway settings, when a server key is configured.
    ///
    /// # Errors
    ///
    /// Returns an error when a base URL does not parse or the timeout is
    /// zero.
    pub fn gateway_config(&self) -> Result<Option<SnapGatewayConfig>, SettingsError> {
        let Some(key) = self
            .payment_server_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
        else {
            return Ok(None);
        };
        let timeout_secs = self
            .payment_timeout_secs
            .unwrap_or(DEFAULT_PAYMENT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(SettingsError::Zero {
                name: "HEALTHFUND_PAYMENT_TIMEOUT_SECS",
            });
        }
        Ok(Some(SnapGatewayConfig {
            server_key: Zeroizing::new(key.to_owned()),
            snap_base_url: parse_url(
                "HEALTHFUND_PAYMENT_SNAP_BASE_URL",
                self.payment_snap_base_url
                    .as_deref()
                    .unwrap_or(DEFAULT_SNAP_BASE_URL),
            )?,
            api_base_url: parse_url(
                "HEALTHFUND_PAYMENT_API_BASE_URL",
                self.payment_api_base_url
                    .as_deref()
                    .unwrap_or(DEFAULT_API_BASE_URL),
            )?,
            timeout: Duration::from_secs(timeout_secs),
        }))
    }
}
