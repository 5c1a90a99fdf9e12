//! Fulfillment error types.

use common::{BadgeId, LineItemId, ProductId, TicketBundleId, TicketCategoryId, TicketId};
use order_store::StoreError;
use thiserror::Error;

/// Errors that can occur while running fulfillment actions.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// No set of unused ticket codes could be generated.
    #[error("Could not create {quantity} ticket(s) in category {category_id} after {attempts} attempts")]
    TicketCreationFailed {
        category_id: TicketCategoryId,
        quantity: u32,
        attempts: u32,
    },

    /// A ticket product lacks a type parameter it needs.
    #[error("Product {product_id} is missing type parameter '{parameter}'")]
    MissingTypeParameter {
        product_id: ProductId,
        parameter: &'static str,
    },

    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("Ticket not found: {0}")]
    TicketNotFound(TicketId),

    #[error("Ticket bundle not found: {0}")]
    TicketBundleNotFound(TicketBundleId),

    #[error("Badge not found: {0}")]
    BadgeNotFound(BadgeId),

    /// A line item's processing result could not be read.
    #[error("Invalid processing result for line item {line_item_id}: {reason}")]
    InvalidProcessingResult {
        line_item_id: LineItemId,
        reason: String,
    },

    #[error("Order store error: {0}")]
    Store(#[from] StoreError),
}

/// Convenience type alias for fulfillment results.
pub type Result<T> = std::result::Result<T, FulfillmentError>;
