//! Reqwest-backed Snap checkout adapter.
//!
//! Owns transport details only: request serialisation, basic auth with the
//! server key, HTTP error mapping and notification signature checks.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;
use tracing::debug;
use zeroize::Zeroizing;

use super::dto::{
    CustomerDetailsDto, SnapSessionDto, SnapTransactionDto, TransactionDetailsDto,
    TransactionStatusDto, payment_state,
};
use crate::domain::ports::{GatewayNotification, PaymentGateway, PaymentGatewayError};
use crate::domain::{
    ContributionId, PayerDetails, PaymentNotification, PaymentSession, PaymentState,
};

const BODY_PREVIEW_CHARS: usize = 160;

/// Connection settings for [`SnapPaymentGateway`].
#[derive(Clone)]
pub struct SnapGatewayConfig {
    /// Secret server key; used for basic auth and notification signatures.
    pub server_key: Zeroizing<String>,
    /// Base of the checkout API, e.g. `https://app.sandbox.midtrans.com`.
    pub snap_base_url: Url,
    /// Base of the core API used for status lookups.
    pub api_base_url: Url,
    pub timeout: Duration,
}

/// Payment gateway adapter speaking the Snap REST API.
pub struct SnapPaymentGateway {
    client: Client,
    server_key: Zeroizing<String>,
    transactions_endpoint: Url,
    api_base_url: Url,
}

impl SnapPaymentGateway {
    /// Build the adapter with a reqwest client honouring the configured
    /// timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the client cannot be constructed or the base
    /// URL cannot be extended with the transactions path.
    pub fn new(config: SnapGatewayConfig) -> Result<Self, PaymentGatewayError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|error| PaymentGatewayError::transport(error.to_string()))?;
        let transactions_endpoint = config
            .snap_base_url
            .join("snap/v1/transactions")
            .map_err(|error| PaymentGatewayError::transport(error.to_string()))?;
        Ok(Self {
            client,
            server_key: config.server_key,
            transactions_endpoint,
            api_base_url: config.api_base_url,
        })
    }

    fn status_endpoint(&self, order_id: &ContributionId) -> Result<Url, PaymentGatewayError> {
        self.api_base_url
            .join(&format!("v2/{order_id}/status"))
            .map_err(|error| PaymentGatewayError::transport(error.to_string()))
    }

    fn signature_for(&self, notification: &GatewayNotification) -> String {
        notification_signature(
            &notification.order_id,
            &notification.status_code,
            &notification.gross_amount,
            self.server_key.as_str(),
        )
    }
}

/// Hex SHA-512 of `order_id + status_code + gross_amount + server_key`.
pub(super) fn notification_signature(
    order_id: &str,
    status_code: &str,
    gross_amount: &str,
    server_key: &str,
) -> String {
    let mut hasher = Sha512::new();
    hasher.update(order_id.as_bytes());
    hasher.update(status_code.as_bytes());
    hasher.update(gross_amount.as_bytes());
    hasher.update(server_key.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl PaymentGateway for SnapPaymentGateway {
    async fn create_session(
        &self,
        order_id: &ContributionId,
        amount: i64,
        payer: &PayerDetails,
    ) -> Result<PaymentSession, PaymentGatewayError> {
        let order = order_id.to_string();
        let body = SnapTransactionDto {
            transaction_details: TransactionDetailsDto {
                order_id: &order,
                gross_amount: amount,
            },
            customer_details: CustomerDetailsDto {
                first_name: &payer.first_name,
                email: &payer.email,
                phone: payer.phone.as_deref(),
            },
        };
        let response = self
            .client
            .post(self.transactions_endpoint.clone())
            .basic_auth(self.server_key.as_str(), Some(""))
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, bytes.as_ref()));
        }
        let session: SnapSessionDto = serde_json::from_slice(&bytes).map_err(|error| {
            PaymentGatewayError::decode(format!("invalid checkout response: {error}"))
        })?;
        debug!(%order_id, "payment session opened");
        Ok(PaymentSession {
            token: session.token,
            redirect_url: session.redirect_url,
        })
    }

    async fn fetch_state(
        &self,
        order_id: &ContributionId,
    ) -> Result<PaymentState, PaymentGatewayError> {
        let response = self
            .client
            .get(self.status_endpoint(order_id)?)
            .basic_auth(self.server_key.as_str(), Some(""))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(map_transport_error)?;
        if status == StatusCode::NOT_FOUND {
            return Ok(PaymentState::Pending);
        }
        if !status.is_success() {
            return Err(map_status_error(status, bytes.as_ref()));
        }
        let dto: TransactionStatusDto = serde_json::from_slice(&bytes).map_err(|error| {
            PaymentGatewayError::decode(format!("invalid status response: {error}"))
        })?;
        Ok(dto.into_state())
    }

    fn verify_notification(
        &self,
        notification: &GatewayNotification,
    ) -> Result<PaymentNotification, PaymentGatewayError> {
        let expected = self.signature_for(notification);
        let provided = notification.signature_key.trim().to_ascii_lowercase();
        if !bool::from(expected.as_bytes().ct_eq(provided.as_bytes())) {
            return Err(PaymentGatewayError::InvalidSignature);
        }
        let contribution_id = ContributionId::parse(&notification.order_id)
            .map_err(|_| PaymentGatewayError::unknown_order(notification.order_id.as_str()))?;
        Ok(PaymentNotification {
            contribution_id,
            state: payment_state(
                &notification.transaction_status,
                notification.fraud_status.as_deref(),
            ),
        })
    }
}

fn map_transport_error(error: reqwest::Error) -> PaymentGatewayError {
    PaymentGatewayError::transport(error.to_string())
}

fn map_status_error(status: StatusCode, body: &[u8]) -> PaymentGatewayError {
    PaymentGatewayError::rejected(status.as_u16(), body_preview(body))
}

fn body_preview(body: &[u8]) -> String {
    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(BODY_PREVIEW_CHARS).collect::<String>();
    if compact.chars().count() > BODY_PREVIEW_CHARS {
        format!("{preview}...")
    } else {
        preview
    }
}
