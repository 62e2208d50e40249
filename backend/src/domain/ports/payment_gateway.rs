//! Port for the external payment gateway.
//!
//! Contributions are identified at the gateway by their [`ContributionId`]
//! (the gateway's "order id").

use async_trait::async_trait;

use crate::domain::{ContributionId, PayerDetails, PaymentNotification, PaymentSession, PaymentState};

use super::define_port_error;

define_port_error! {
    /// Errors raised by payment gateway adapters.
    pub enum PaymentGatewayError {
        /// No credentials are configured for the gateway.
        NotConfigured => "payment gateway is not configured",
        /// The request did not reach the gateway or timed out.
        Transport { message: String } => "payment gateway request failed: {message}",
        /// The gateway answered with an unexpected status.
        Rejected { status: u16, message: String } =>
            "payment gateway rejected the request with status {status}: {message}",
        /// The gateway response could not be decoded.
        Decode { message: String } => "payment gateway response could not be decoded: {message}",
        /// A settlement notification failed signature verification.
        InvalidSignature => "payment notification signature is invalid",
        /// A settlement notification referenced an unknown order.
        UnknownOrder { order_id: String } => "payment notification references unknown order {order_id}",
    }
}

/// Raw settlement notification as posted by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayNotification {
    pub order_id: String,
    pub status_code: String,
    pub gross_amount: String,
    pub signature_key: String,
    pub transaction_status: String,
    pub fraud_status: Option<String>,
}

/// Port for creating payment sessions and reading settlement state.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a hosted checkout session for a contribution.
    async fn create_session(
        &self,
        order_id: &ContributionId,
        amount: i64,
        payer: &PayerDetails,
    ) -> Result<PaymentSession, PaymentGatewayError>;

    /// Query the gateway for the current settlement state of an order.
    async fn fetch_state(&self, order_id: &ContributionId)
    -> Result<PaymentState, PaymentGatewayError>;

    /// Authenticate a pushed notification and translate it.
    fn verify_notification(
        &self,
        notification: &GatewayNotification,
    ) -> Result<PaymentNotification, PaymentGatewayError>;
}
