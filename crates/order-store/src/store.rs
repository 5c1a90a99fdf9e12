use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use common::{LineItemId, OrderId, OrderNumber, OrderNumberSequenceId, ProductId, ShopId, UserId};

use crate::{
    LogEntryRecord, LogQuery, NewOrder, OrderFlag, OrderNumberSequenceRecord, OrderUpdate,
    PaymentRecord, Result, StoreError, StoredOrder,
};

/// Core trait for order store implementations.
///
/// Multi-row writes (`insert_order`, `update_order`, `set_order_flag`,
/// `delete_order`) are atomic: either every row changes or none do. All implementations must be
/// thread-safe (Send + Sync).
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Registers a new order number sequence.
    async fn create_order_number_sequence(&self, sequence: OrderNumberSequenceRecord)
    -> Result<()>;

    async fn find_order_number_sequence(
        &self,
        sequence_id: OrderNumberSequenceId,
    ) -> Result<Option<OrderNumberSequenceRecord>>;

    /// Atomically increments the sequence and returns it with the new value.
    ///
    /// Concurrent callers never observe the same value.
    async fn increment_order_number_sequence(
        &self,
        sequence_id: OrderNumberSequenceId,
    ) -> Result<OrderNumberSequenceRecord>;

    /// Sets the available quantity of a product.
    async fn set_stock(&self, product_id: ProductId, quantity: i32) -> Result<()>;

    /// Returns the available quantity of a product, if stock is tracked.
    async fn get_stock(&self, product_id: ProductId) -> Result<Option<i32>>;

    /// Persists a placed order.
    ///
    /// Fails with `DuplicateOrderNumber` if the number is taken and with
    /// `InsufficientStock` if any decrement would take stock below zero.
    async fn insert_order(&self, new_order: NewOrder) -> Result<()>;

    /// Writes an order's payment columns, appends log entries, records an
    /// optional payment and restores stock.
    ///
    /// Other columns keep their stored values. Fails with
    /// `ConcurrencyConflict` if the stored payment state differs from
    /// `update.expected_payment_state`.
    async fn update_order(&self, update: OrderUpdate) -> Result<()>;

    /// Sets or clears a single flag column and appends its log entry.
    ///
    /// Other columns keep their stored values, so flag changes built from the
    /// same snapshot do not overwrite each other.
    async fn set_order_flag(
        &self,
        order_id: OrderId,
        flag: OrderFlag,
        value: Option<DateTime<Utc>>,
        log_entry: LogEntryRecord,
    ) -> Result<()>;

    async fn find_order(&self, order_id: OrderId) -> Result<Option<StoredOrder>>;

    async fn find_order_by_number(&self, order_number: &OrderNumber)
    -> Result<Option<StoredOrder>>;

    /// Returns the shop's orders, newest first.
    async fn get_orders_for_shop(&self, shop_id: &ShopId) -> Result<Vec<StoredOrder>>;

    /// Returns the orders a user placed, newest first.
    async fn get_orders_placed_by_user(&self, user_id: UserId) -> Result<Vec<StoredOrder>>;

    /// Counts the shop's orders grouped by stored payment state.
    async fn count_orders_per_payment_state(&self, shop_id: &ShopId)
    -> Result<HashMap<String, i64>>;

    /// Stores a line item's processing result and stamps its processed-at.
    async fn update_line_item_processing_result(
        &self,
        line_item_id: LineItemId,
        processing_result: serde_json::Value,
        processed_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Appends entries to the order log.
    async fn append_log_entries(&self, entries: Vec<LogEntryRecord>) -> Result<()>;

    /// Retrieves log entries matching a query, oldest first.
    async fn get_log_entries(&self, query: LogQuery) -> Result<Vec<LogEntryRecord>>;

    /// Returns the payments recorded against an order, oldest first.
    async fn get_payments_for_order(&self, order_id: OrderId) -> Result<Vec<PaymentRecord>>;

    /// Purges the order with its payments, log entries and line items.
    async fn delete_order(&self, order_id: OrderId) -> Result<()>;
}

/// Extension trait providing convenience methods for order stores.
#[async_trait]
pub trait OrderStoreExt: OrderStore {
    /// Appends a single entry to the order log.
    async fn append_log_entry(&self, entry: LogEntryRecord) -> Result<()> {
        self.append_log_entries(vec![entry]).await
    }

    /// Returns an order's full log, oldest first.
    async fn get_log_entries_for_order(&self, order_id: OrderId) -> Result<Vec<LogEntryRecord>> {
        self.get_log_entries(LogQuery::for_order(order_id)).await
    }

    /// Checks if an order exists.
    async fn order_exists(&self, order_id: OrderId) -> Result<bool> {
        Ok(self.find_order(order_id).await?.is_some())
    }

    /// Loads an order, failing with `OrderNotFound` if it is unknown.
    async fn get_order(&self, order_id: OrderId) -> Result<StoredOrder> {
        self.find_order(order_id)
            .await?
            .ok_or(StoreError::OrderNotFound(order_id))
    }
}

// Blanket implementation for all OrderStore implementations
impl<T: OrderStore + ?Sized> OrderStoreExt for T {}

/// Error returned when a new order's records do not belong together.
#[derive(Debug, Clone)]
pub struct OrderValidationError {
    pub message: String,
}

impl std::fmt::Display for OrderValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Order validation error: {}", self.message)
    }
}

impl std::error::Error for OrderValidationError {}

impl From<OrderValidationError> for StoreError {
    fn from(err: OrderValidationError) -> Self {
        StoreError::InvalidRecords(err.message)
    }
}

/// Validates a new order before inserting it.
pub fn validate_new_order(new_order: &NewOrder) -> std::result::Result<(), OrderValidationError> {
    let order = &new_order.order;

    if new_order.line_items.is_empty() {
        return Err(OrderValidationError {
            message: "Cannot insert an order without line items".to_string(),
        });
    }

    for item in &new_order.line_items {
        if item.order_id != order.id || item.order_number != order.order_number {
            return Err(OrderValidationError {
                message: format!("Line item {} does not belong to order {}", item.id, order.id),
            });
        }
        if item.quantity <= 0 {
            return Err(OrderValidationError {
                message: format!("Line item {} has non-positive quantity", item.id),
            });
        }
    }

    let line_total: i64 = new_order
        .line_items
        .iter()
        .map(|item| item.line_amount_cents)
        .sum();
    if line_total != order.total_amount_cents {
        return Err(OrderValidationError {
            message: format!(
                "Order total {} does not match line item total {}",
                order.total_amount_cents, line_total
            ),
        });
    }

    if new_order.log_entry.order_id != order.id {
        return Err(OrderValidationError {
            message: "Log entry must reference the new order".to_string(),
        });
    }

    if new_order.stock_decrements.iter().any(|c| c.quantity < 0) {
        return Err(OrderValidationError {
            message: "Stock decrements must not be negative".to_string(),
        });
    }

    Ok(())
}
