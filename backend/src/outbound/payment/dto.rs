//! Wire shapes for the Snap checkout and status APIs.

use serde::{Deserialize, Serialize};

use crate::domain::PaymentState;

#[derive(Debug, Serialize)]
pub(super) struct SnapTransactionDto<'a> {
    pub(super) transaction_details: TransactionDetailsDto<'a>,
    pub(super) customer_details: CustomerDetailsDto<'a>,
}

#[derive(Debug, Serialize)]
pub(super) struct TransactionDetailsDto<'a> {
    pub(super) order_id: &'a str,
    pub(super) gross_amount: i64,
}

#[derive(Debug, Serialize)]
pub(super) struct CustomerDetailsDto<'a> {
    pub(super) first_name: &'a str,
    pub(super) email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) phone: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub(super) struct SnapSessionDto {
    pub(super) token: String,
    pub(super) redirect_url: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct TransactionStatusDto {
    #[serde(default)]
    pub(super) status_code: Option<String>,
    #[serde(default)]
    pub(super) transaction_status: Option<String>,
    #[serde(default)]
    pub(super) fraud_status: Option<String>,
}

impl TransactionStatusDto {
    pub(super) fn into_state(self) -> PaymentState {
        // The status API answers 200 with an embedded 404 for orders the
        // payer never opened; those are still awaiting payment.
        if self.status_code.as_deref() == Some("404") {
            return PaymentState::Pending;
        }
        match self.transaction_status.as_deref() {
            Some(status) => payment_state(status, self.fraud_status.as_deref()),
            None => PaymentState::Pending,
        }
    }
}

/// Map a gateway transaction status onto a settlement state.
///
/// `capture` flagged `challenge` by fraud screening is not settled until an
/// operator accepts it.
pub(super) fn payment_state(transaction_status: &str, fraud_status: Option<&str>) -> PaymentState {
    match transaction_status {
        "capture" if fraud_status == Some("challenge") => PaymentState::Pending,
        "settlement" | "capture" => PaymentState::Settled,
        "pending" => PaymentState::Pending,
        _ => PaymentState::Failed,
    }
}
