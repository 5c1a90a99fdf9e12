use thiserror::Error;

use common::{LineItemId, OrderId, OrderNumber, OrderNumberSequenceId, ProductId};

/// Errors that can occur when interacting with the order store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The order's payment state changed since it was loaded.
    #[error(
        "Concurrency conflict for order {order_id}: expected payment state {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        order_id: OrderId,
        expected: String,
        actual: String,
    },

    /// An order with this number already exists.
    #[error("Duplicate order number: {0}")]
    DuplicateOrderNumber(OrderNumber),

    /// An order with this ID already exists.
    #[error("Duplicate order ID: {0}")]
    DuplicateOrderId(OrderId),

    /// Not enough stock left to fulfill a decrement.
    #[error(
        "Insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: i32,
        available: i32,
    },

    /// The order was not found in the store.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The line item was not found in the store.
    #[error("Line item not found: {0}")]
    LineItemNotFound(LineItemId),

    /// The order number sequence was not found in the store.
    #[error("Order number sequence not found: {0}")]
    SequenceNotFound(OrderNumberSequenceId),

    /// The records handed to the store are inconsistent.
    #[error("Invalid records: {0}")]
    InvalidRecords(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for order store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
