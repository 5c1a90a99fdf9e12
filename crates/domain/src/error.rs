//! Domain error types.

use common::{OrderId, OrderNumber, OrderNumberSequenceId, ProductId, ShopId, StorefrontId, UserId};
use order_store::StoreError;
use thiserror::Error;

use crate::cart::CartError;
use crate::fulfillment::FulfillmentFailure;
use crate::order::OrderError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the order store.
    #[error("Order store error: {0}")]
    Store(#[from] StoreError),

    /// An order transition was rejected.
    #[error("Order error: {0}")]
    Order(OrderError),

    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Placement could not be committed; nothing was persisted.
    #[error("Order placement failed: {0}")]
    OrderFailed(#[source] StoreError),

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("Storefront not found: {0}")]
    StorefrontNotFound(StorefrontId),

    #[error("Shop not found: {0}")]
    ShopNotFound(ShopId),

    #[error("User not found: {0}")]
    UserNotFound(UserId),

    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("Order number sequence not found: {0}")]
    OrderNumberSequenceNotFound(OrderNumberSequenceId),

    /// Fulfillment failed after the payment state was committed.
    ///
    /// The order keeps its new payment state; fulfillment must be completed
    /// manually.
    #[error("Fulfillment failed for order {order_number}: {source}")]
    Fulfillment {
        order_number: OrderNumber,
        #[source]
        source: FulfillmentFailure,
    },
}

impl From<OrderError> for DomainError {
    fn from(e: OrderError) -> Self {
        DomainError::Order(e)
    }
}
