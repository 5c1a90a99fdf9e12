use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use common::{LineItemId, OrderId, OrderNumber, OrderNumberSequenceId, ProductId, ShopId, UserId};

use crate::{
    LineItemRecord, LogEntryRecord, LogQuery, NewOrder, OrderFlag, OrderNumberSequenceRecord,
    OrderRecord, OrderUpdate, PaymentRecord, Result, StoreError, StoredOrder,
    store::{OrderStore, validate_new_order},
};

#[derive(Default)]
struct State {
    sequences: HashMap<OrderNumberSequenceId, OrderNumberSequenceRecord>,
    stock: HashMap<ProductId, i32>,
    orders: HashMap<OrderId, OrderRecord>,
    line_items: Vec<LineItemRecord>,
    log_entries: Vec<LogEntryRecord>,
    payments: Vec<PaymentRecord>,
}

impl State {
    fn stored_order(&self, order: &OrderRecord) -> StoredOrder {
        StoredOrder {
            order: order.clone(),
            line_items: self
                .line_items
                .iter()
                .filter(|item| item.order_id == order.id)
                .cloned()
                .collect(),
        }
    }

    fn stored_orders_newest_first<'a>(
        &self,
        orders: impl Iterator<Item = &'a OrderRecord>,
    ) -> Vec<StoredOrder> {
        let mut orders: Vec<_> = orders.collect();
        orders.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.order_number.cmp(&a.order_number))
        });
        orders.into_iter().map(|o| self.stored_order(o)).collect()
    }
}

/// In-memory order store implementation for testing.
///
/// A single write lock guards all tables, which makes every multi-row write
/// atomic and gives the same guarantees as the PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryOrderStore {
    /// Creates a new empty in-memory order store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Returns the total number of log entries stored.
    pub async fn log_entry_count(&self) -> usize {
        self.state.read().await.log_entries.len()
    }

    /// Clears all tables.
    pub async fn clear(&self) {
        *self.state.write().await = State::default();
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create_order_number_sequence(
        &self,
        sequence: OrderNumberSequenceRecord,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        state.sequences.insert(sequence.id, sequence);
        Ok(())
    }

    async fn find_order_number_sequence(
        &self,
        sequence_id: OrderNumberSequenceId,
    ) -> Result<Option<OrderNumberSequenceRecord>> {
        let state = self.state.read().await;
        Ok(state.sequences.get(&sequence_id).cloned())
    }

    async fn increment_order_number_sequence(
        &self,
        sequence_id: OrderNumberSequenceId,
    ) -> Result<OrderNumberSequenceRecord> {
        let mut state = self.state.write().await;
        let sequence = state
            .sequences
            .get_mut(&sequence_id)
            .ok_or(StoreError::SequenceNotFound(sequence_id))?;
        sequence.value += 1;
        Ok(sequence.clone())
    }

    async fn set_stock(&self, product_id: ProductId, quantity: i32) -> Result<()> {
        let mut state = self.state.write().await;
        state.stock.insert(product_id, quantity);
        Ok(())
    }

    async fn get_stock(&self, product_id: ProductId) -> Result<Option<i32>> {
        let state = self.state.read().await;
        Ok(state.stock.get(&product_id).copied())
    }

    async fn insert_order(&self, new_order: NewOrder) -> Result<()> {
        validate_new_order(&new_order)?;

        let mut state = self.state.write().await;

        // Unique constraint simulation
        if state.orders.contains_key(&new_order.order.id) {
            return Err(StoreError::DuplicateOrderId(new_order.order.id));
        }
        if state
            .orders
            .values()
            .any(|o| o.order_number == new_order.order.order_number)
        {
            return Err(StoreError::DuplicateOrderNumber(
                new_order.order.order_number.clone(),
            ));
        }

        // Check every decrement before touching anything
        let mut requested: HashMap<ProductId, i32> = HashMap::new();
        for change in &new_order.stock_decrements {
            *requested.entry(change.product_id).or_default() += change.quantity;
        }
        for (product_id, quantity) in &requested {
            let available = state.stock.get(product_id).copied().unwrap_or(0);
            if available < *quantity {
                return Err(StoreError::InsufficientStock {
                    product_id: *product_id,
                    requested: *quantity,
                    available,
                });
            }
        }

        for (product_id, quantity) in requested {
            if let Some(available) = state.stock.get_mut(&product_id) {
                *available -= quantity;
            }
        }
        state
            .orders
            .insert(new_order.order.id, new_order.order.clone());
        state.line_items.extend(new_order.line_items);
        state.log_entries.push(new_order.log_entry);

        Ok(())
    }

    async fn update_order(&self, update: OrderUpdate) -> Result<()> {
        let mut state = self.state.write().await;

        let order_id = update.order.id;
        let current = state
            .orders
            .get_mut(&order_id)
            .ok_or(StoreError::OrderNotFound(order_id))?;
        if current.payment_state != update.expected_payment_state {
            return Err(StoreError::ConcurrencyConflict {
                order_id,
                expected: update.expected_payment_state,
                actual: current.payment_state.clone(),
            });
        }

        let order = update.order;
        current.payment_method = order.payment_method;
        current.payment_state = order.payment_state;
        current.payment_state_updated_at = order.payment_state_updated_at;
        current.payment_state_updated_by_id = order.payment_state_updated_by_id;
        current.cancellation_reason = order.cancellation_reason;

        state.log_entries.extend(update.log_entries);
        if let Some(payment) = update.payment {
            state.payments.push(payment);
        }
        for change in update.stock_increments {
            *state.stock.entry(change.product_id).or_default() += change.quantity;
        }

        Ok(())
    }

    async fn set_order_flag(
        &self,
        order_id: OrderId,
        flag: OrderFlag,
        value: Option<DateTime<Utc>>,
        log_entry: LogEntryRecord,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(&order_id)
            .ok_or(StoreError::OrderNotFound(order_id))?;
        match flag {
            OrderFlag::Invoiced => order.invoice_created_at = value,
            OrderFlag::Shipped => order.processed_at = value,
        }
        state.log_entries.push(log_entry);
        Ok(())
    }

    async fn find_order(&self, order_id: OrderId) -> Result<Option<StoredOrder>> {
        let state = self.state.read().await;
        Ok(state.orders.get(&order_id).map(|o| state.stored_order(o)))
    }

    async fn find_order_by_number(
        &self,
        order_number: &OrderNumber,
    ) -> Result<Option<StoredOrder>> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .values()
            .find(|o| &o.order_number == order_number)
            .map(|o| state.stored_order(o)))
    }

    async fn get_orders_for_shop(&self, shop_id: &ShopId) -> Result<Vec<StoredOrder>> {
        let state = self.state.read().await;
        Ok(state.stored_orders_newest_first(
            state.orders.values().filter(|o| &o.shop_id == shop_id),
        ))
    }

    async fn get_orders_placed_by_user(&self, user_id: UserId) -> Result<Vec<StoredOrder>> {
        let state = self.state.read().await;
        Ok(state.stored_orders_newest_first(
            state.orders.values().filter(|o| o.placed_by_id == user_id),
        ))
    }

    async fn count_orders_per_payment_state(
        &self,
        shop_id: &ShopId,
    ) -> Result<HashMap<String, i64>> {
        let state = self.state.read().await;
        let mut counts = HashMap::new();
        for order in state.orders.values().filter(|o| &o.shop_id == shop_id) {
            *counts.entry(order.payment_state.clone()).or_default() += 1;
        }
        Ok(counts)
    }

    async fn update_line_item_processing_result(
        &self,
        line_item_id: LineItemId,
        processing_result: serde_json::Value,
        processed_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let item = state
            .line_items
            .iter_mut()
            .find(|item| item.id == line_item_id)
            .ok_or(StoreError::LineItemNotFound(line_item_id))?;
        item.processing_result = processing_result;
        item.processed_at = Some(processed_at);
        Ok(())
    }

    async fn append_log_entries(&self, entries: Vec<LogEntryRecord>) -> Result<()> {
        let mut state = self.state.write().await;
        for entry in &entries {
            if !state.orders.contains_key(&entry.order_id) {
                return Err(StoreError::OrderNotFound(entry.order_id));
            }
        }
        state.log_entries.extend(entries);
        Ok(())
    }

    async fn get_log_entries(&self, query: LogQuery) -> Result<Vec<LogEntryRecord>> {
        let state = self.state.read().await;
        let mut entries: Vec<_> = state
            .log_entries
            .iter()
            .filter(|e| query.matches(e.order_id, &e.event_type, e.occurred_at))
            .cloned()
            .collect();

        // Stable sort keeps insertion order for equal timestamps
        entries.sort_by_key(|e| e.occurred_at);

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(entries.into_iter().skip(offset).take(limit).collect())
    }

    async fn get_payments_for_order(&self, order_id: OrderId) -> Result<Vec<PaymentRecord>> {
        let state = self.state.read().await;
        let mut payments: Vec<_> = state
            .payments
            .iter()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect();
        payments.sort_by_key(|p| p.created_at);
        Ok(payments)
    }

    async fn delete_order(&self, order_id: OrderId) -> Result<()> {
        let mut state = self.state.write().await;
        if state.orders.remove(&order_id).is_none() {
            return Err(StoreError::OrderNotFound(order_id));
        }
        state.payments.retain(|p| p.order_id != order_id);
        state.log_entries.retain(|e| e.order_id != order_id);
        state.line_items.retain(|item| item.order_id != order_id);
        Ok(())
    }
}
