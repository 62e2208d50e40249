//! Contribution ledger service.
//!
//! A contribution is recorded as `PENDING` before the payment session is
//! opened, so a gateway failure never leaves money unaccounted for. Settlement
//! arrives either through a pushed notification or an explicit status check;
//! both funnel into the repository's conditional `settle`, which credits the
//! pool exactly once.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use tracing::{info, warn};

use crate::domain::ports::{
    ContributionCheckout, ContributionLedger, ContributionRepository, ContributionRepositoryError,
    GatewayNotification, MembershipRepository, PaymentGateway, PaymentGatewayError,
    PoolRepository, UserRepository,
};
use crate::domain::service_support::{
    invalid_field, load_pool, map_user_error, require_member,
};
use crate::domain::{
    Contribution, ContributionId, ContributionStatus, Error, PayerDetails, PaymentState, PoolId,
    UserId,
};

fn map_contribution_error(error: ContributionRepositoryError) -> Error {
    match error {
        ContributionRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("contribution repository unavailable: {message}"))
        }
        ContributionRepositoryError::Query { message } => {
            Error::internal(format!("contribution repository error: {message}"))
        }
    }
}

fn map_gateway_error(error: PaymentGatewayError) -> Error {
    match error {
        PaymentGatewayError::NotConfigured => {
            Error::upstream_failure("payments are not configured")
        }
        PaymentGatewayError::InvalidSignature => {
            Error::forbidden("payment notification signature is invalid")
        }
        PaymentGatewayError::UnknownOrder { order_id } => {
            Error::not_found(format!("no contribution matches order {order_id}"))
        }
        other @ (PaymentGatewayError::Transport { .. }
        | PaymentGatewayError::Rejected { .. }
        | PaymentGatewayError::Decode { .. }) => Error::upstream_failure(other.to_string()),
    }
}

/// Contribution ledger backed by repositories and a payment gateway.
#[derive(Clone)]
pub struct ContributionService<P, M, C, U> {
    pools: Arc<P>,
    members: Arc<M>,
    contributions: Arc<C>,
    users: Arc<U>,
    gateway: Arc<dyn PaymentGateway>,
    clock: Arc<dyn Clock>,
}

impl<P, M, C, U> ContributionService<P, M, C, U> {
    /// Create a new ledger service.
    pub fn new(
        pools: Arc<P>,
        members: Arc<M>,
        contributions: Arc<C>,
        users: Arc<U>,
        gateway: Arc<dyn PaymentGateway>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            pools,
            members,
            contributions,
            users,
            gateway,
            clock,
        }
    }
}

impl<P, M, C, U> ContributionService<P, M, C, U>
where
    C: ContributionRepository,
    U: UserRepository,
{
    async fn payer_details(&self, user_id: &UserId) -> Result<PayerDetails, Error> {
        let user = self
            .users
            .find_by_id(user_id)
            .await
            .map_err(map_user_error)?
            .ok_or_else(|| Error::not_found(format!("user {user_id} not found")))?;
        let first_name = user
            .name
            .as_ref()
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_owned();
        Ok(PayerDetails {
            first_name,
            email: user.email.as_ref().to_owned(),
            phone: user.phone,
        })
    }

    async fn settle(
        &self,
        contribution: Contribution,
        state: PaymentState,
    ) -> Result<Contribution, Error> {
        let Some(target) = state.settles_to() else {
            return Ok(contribution);
        };
        if contribution.status != ContributionStatus::Pending {
            return Ok(contribution);
        }
        let (settled, applied) = self
            .contributions
            .settle(&contribution.id, target, self.clock.utc())
            .await
            .map_err(map_contribution_error)?;
        if applied {
            info!(
                contribution_id = %settled.id,
                pool_id = %settled.pool_id,
                status = settled.status.as_str(),
                amount = settled.amount,
                "contribution settled"
            );
        }
        Ok(settled)
    }

    async fn load(&self, id: &ContributionId) -> Result<Contribution, Error> {
        self.contributions
            .find_by_id(id)
            .await
            .map_err(map_contribution_error)?
            .ok_or_else(|| Error::not_found(format!("contribution {id} not found")))
    }
}

#[async_trait]
impl<P, M, C, U> ContributionLedger for ContributionService<P, M, C, U>
where
    P: PoolRepository,
    M: MembershipRepository,
    C: ContributionRepository,
    U: UserRepository,
{
    async fn create_contribution(
        &self,
        user_id: &UserId,
        pool_id: &PoolId,
        amount: i64,
    ) -> Result<ContributionCheckout, Error> {
        if amount <= 0 {
            return Err(invalid_field("amount", "amount must be greater than zero"));
        }
        load_pool(self.pools.as_ref(), pool_id).await?;
        require_member(self.members.as_ref(), pool_id, user_id).await?;

        let contribution = Contribution::pending(*pool_id, user_id.clone(), amount, self.clock.utc());
        self.contributions
            .insert(&contribution)
            .await
            .map_err(map_contribution_error)?;

        let payer = self.payer_details(user_id).await?;
        let session = self
            .gateway
            .create_session(&contribution.id, amount, &payer)
            .await
            .map_err(|error| {
                warn!(contribution_id = %contribution.id, %error, "payment session failed");
                map_gateway_error(error)
            })?;
        self.contributions
            .attach_reference(&contribution.id, &session.token)
            .await
            .map_err(map_contribution_error)?;
        info!(contribution_id = %contribution.id, pool_id = %pool_id, amount, "contribution opened");

        Ok(ContributionCheckout {
            contribution_id: contribution.id,
            payment_token: session.token,
            redirect_url: session.redirect_url,
        })
    }

    async fn list_my_contributions(
        &self,
        user_id: &UserId,
        pool_id: &PoolId,
    ) -> Result<Vec<Contribution>, Error> {
        load_pool(self.pools.as_ref(), pool_id).await?;
        self.contributions
            .list_for_member(pool_id, user_id)
            .await
            .map_err(map_contribution_error)
    }

    async fn check_contribution_status(
        &self,
        user_id: &UserId,
        contribution_id: &ContributionId,
    ) -> Result<Contribution, Error> {
        let contribution = self.load(contribution_id).await?;
        if &contribution.member_id != user_id {
            return Err(Error::forbidden(
                "you can only check your own contributions",
            ));
        }
        if contribution.status != ContributionStatus::Pending {
            return Ok(contribution);
        }
        let state = self
            .gateway
            .fetch_state(contribution_id)
            .await
            .map_err(|error| {
                warn!(%contribution_id, %error, "payment status check failed");
                map_gateway_error(error)
            })?;
        self.settle(contribution, state).await
    }

    async fn apply_payment_notification(
        &self,
        notification: &GatewayNotification,
    ) -> Result<Contribution, Error> {
        let verified = self
            .gateway
            .verify_notification(notification)
            .map_err(|error| {
                warn!(order_id = %notification.order_id, %error, "payment notification rejected");
                map_gateway_error(error)
            })?;
        let contribution = self
            .contributions
            .find_by_id(&verified.contribution_id)
            .await
            .map_err(map_contribution_error)?
            .ok_or_else(|| {
                Error::not_found(format!(
                    "no contribution matches order {}",
                    verified.contribution_id
                ))
            })?;
        self.settle(contribution, verified.state).await
    }
}

#[cfg(test)]
#[path = "contribution_service_tests.rs"]
mod tests;
