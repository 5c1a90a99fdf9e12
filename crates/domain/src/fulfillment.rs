//! Seam for post-payment side effects.

use async_trait::async_trait;

use crate::order::Order;
use crate::user::User;

/// Error raised by a fulfillment handler.
pub type FulfillmentFailure = Box<dyn std::error::Error + Send + Sync>;

/// Runs the side effects tied to an order's products.
///
/// Called by the order service after the payment-state change has been
/// committed, so a failure here never affects the payment state.
#[async_trait]
pub trait FulfillmentHandler: Send + Sync {
    /// Runs creation actions (tickets, bundles, badges) for a paid order.
    async fn execute_creation_actions(
        &self,
        order: &Order,
        initiator: &User,
    ) -> Result<(), FulfillmentFailure>;

    /// Revokes what creation produced for an order canceled after payment.
    async fn execute_revocation_actions(
        &self,
        order: &Order,
        initiator: &User,
    ) -> Result<(), FulfillmentFailure>;
}

/// Handler for shops without fulfillment actions.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFulfillment;

#[async_trait]
impl FulfillmentHandler for NoFulfillment {
    async fn execute_creation_actions(
        &self,
        _order: &Order,
        _initiator: &User,
    ) -> Result<(), FulfillmentFailure> {
        Ok(())
    }

    async fn execute_revocation_actions(
        &self,
        _order: &Order,
        _initiator: &User,
    ) -> Result<(), FulfillmentFailure> {
        Ok(())
    }
}
