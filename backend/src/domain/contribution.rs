//! Contribution ledger records and payment settlement values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ids::{ContributionId, PoolId};
use super::user::UserId;

/// Settlement state of a contribution. `PENDING` leaves exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContributionStatus {
    Pending,
    Success,
    Failed,
}

impl ContributionStatus {
    /// Stable storage label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }

    /// Parse a storage label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "PENDING" => Some(Self::Pending),
            "SUCCESS" => Some(Self::Success),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A member's payment towards a pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contribution {
    pub id: ContributionId,
    pub pool_id: PoolId,
    pub member_id: UserId,
    pub amount: i64,
    pub status: ContributionStatus,
    pub payment_reference: Option<String>,
    pub contributed_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl Contribution {
    /// Create a pending contribution awaiting a payment session.
    #[must_use]
    pub fn pending(pool_id: PoolId, member_id: UserId, amount: i64, now: DateTime<Utc>) -> Self {
        Self {
            id: ContributionId::random(),
            pool_id,
            member_id,
            amount,
            status: ContributionStatus::Pending,
            payment_reference: None,
            contributed_at: now,
            settled_at: None,
        }
    }
}

/// Payer details forwarded to the payment gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayerDetails {
    pub first_name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// Hosted checkout session returned by the payment gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentSession {
    pub token: String,
    pub redirect_url: String,
}

/// Settlement state reported by the payment gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentState {
    /// The payer has not completed the payment yet.
    Pending,
    /// Funds were captured.
    Settled,
    /// The payment was denied, cancelled or expired.
    Failed,
}

impl PaymentState {
    /// Contribution status this gateway state settles into, if any.
    #[must_use]
    pub const fn settles_to(self) -> Option<ContributionStatus> {
        match self {
            Self::Pending => None,
            Self::Settled => Some(ContributionStatus::Success),
            Self::Failed => Some(ContributionStatus::Failed),
        }
    }
}

/// Verified settlement notification pushed by the payment gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentNotification {
    pub contribution_id: ContributionId,
    pub state: PaymentState,
}
