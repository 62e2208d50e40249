//! Gateway used when payments are not configured.

use async_trait::async_trait;

use crate::domain::ports::{GatewayNotification, PaymentGateway, PaymentGatewayError};
use crate::domain::{ContributionId, PayerDetails, PaymentNotification, PaymentSession, PaymentState};

/// Rejects every call with [`PaymentGatewayError::NotConfigured`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledPaymentGateway;

#[async_trait]
impl PaymentGateway for DisabledPaymentGateway {
    async fn create_session(
        &self,
        _order_id: &ContributionId,
        _amount: i64,
        _payer: &PayerDetails,
    ) -> Result<PaymentSession, PaymentGatewayError> {
        Err(PaymentGatewayError::NotConfigured)
    }

    async fn fetch_state(
        &self,
        _order_id: &ContributionId,
    ) -> Result<PaymentState, PaymentGatewayError> {
        Err(PaymentGatewayError::NotConfigured)
    }

    fn verify_notification(
        &self,
        _notification: &GatewayNotification,
    ) -> Result<PaymentNotification, PaymentGatewayError> {
        Err(PaymentGatewayError::NotConfigured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_call_reports_not_configured() {
        let gateway = DisabledPaymentGateway;
        let payer = PayerDetails {
            first_name: "Siti".to_owned(),
            email: "siti@example.com".to_owned(),
            phone: None,
        };
        let order = ContributionId::random();

        assert_eq!(
            gateway.create_session(&order, 10_000, &payer).await,
            Err(PaymentGatewayError::NotConfigured)
        );
        assert_eq!(
            gateway.fetch_state(&order).await,
            Err(PaymentGatewayError::NotConfigured)
        );
        let notification = GatewayNotification {
            order_id: order.to_string(),
            status_code: "200".to_owned(),
            gross_amount: "10000.00".to_owned(),
            signature_key: String::new(),
            transaction_status: "settlement".to_owned(),
            fraud_status: None,
        };
        assert_eq!(
            gateway.verify_notification(&notification),
            Err(PaymentGatewayError::NotConfigured)
        );
    }
}
