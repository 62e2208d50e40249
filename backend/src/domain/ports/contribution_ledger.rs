//! Driving port for contributions.

use async_trait::async_trait;

use crate::domain::{Contribution, ContributionId, Error, PoolId, UserId};

use super::GatewayNotification;

/// Checkout details handed back to the contributing member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContributionCheckout {
    pub contribution_id: ContributionId,
    pub payment_token: String,
    pub redirect_url: String,
}

/// Record contributions and reflect their settlement.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContributionLedger: Send + Sync {
    /// Record a pending contribution and open a payment session for it.
    async fn create_contribution(
        &self,
        user_id: &UserId,
        pool_id: &PoolId,
        amount: i64,
    ) -> Result<ContributionCheckout, Error>;

    /// The caller's contributions to a pool, newest first.
    async fn list_my_contributions(
        &self,
        user_id: &UserId,
        pool_id: &PoolId,
    ) -> Result<Vec<Contribution>, Error>;

    /// Ask the gateway for the settlement state and reflect it.
    async fn check_contribution_status(
        &self,
        user_id: &UserId,
        contribution_id: &ContributionId,
    ) -> Result<Contribution, Error>;

    /// Apply a settlement notification pushed by the gateway.
    async fn apply_payment_notification(
        &self,
        notification: &GatewayNotification,
    ) -> Result<Contribution, Error>;
}
