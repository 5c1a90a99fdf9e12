//! Plain persistence records.
//!
//! These mirror the table rows one to one. The domain crate maps them to and
//! from its aggregate; nothing here knows about payment-state rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use common::{
    LineItemId, LogEntryId, OrderId, OrderNumber, OrderNumberSequenceId, PaymentId, ProductId,
    ProductNumber, ShopId, StorefrontId, UserId,
};

/// A per-shop counter used to allocate order numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderNumberSequenceRecord {
    pub id: OrderNumberSequenceId,
    pub shop_id: ShopId,
    pub prefix: String,
    pub value: i32,
}

/// A row of `shop_orders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: OrderId,
    pub created_at: DateTime<Utc>,
    pub shop_id: ShopId,
    pub storefront_id: StorefrontId,
    pub order_number: OrderNumber,
    pub placed_by_id: UserId,
    pub company: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub country: String,
    pub zip_code: String,
    pub city: String,
    pub street: String,
    pub currency: String,
    pub total_amount_cents: i64,
    pub payment_method: Option<String>,
    pub payment_state: String,
    pub payment_state_updated_at: Option<DateTime<Utc>>,
    pub payment_state_updated_by_id: Option<UserId>,
    pub cancellation_reason: Option<String>,
    pub invoice_created_at: Option<DateTime<Utc>>,
    pub processing_required: bool,
    pub processed_at: Option<DateTime<Utc>>,
}

/// A row of `shop_order_line_items`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItemRecord {
    pub id: LineItemId,
    pub order_id: OrderId,
    pub order_number: OrderNumber,
    pub product_id: ProductId,
    pub product_number: ProductNumber,
    pub product_type: String,
    pub name: String,
    pub unit_price_cents: i64,
    pub tax_rate_basis_points: i32,
    pub quantity: i32,
    pub line_amount_cents: i64,
    pub processing_required: bool,
    pub processing_result: serde_json::Value,
    pub processed_at: Option<DateTime<Utc>>,
}

/// A row of `shop_order_log_entries`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntryRecord {
    pub id: LogEntryId,
    pub occurred_at: DateTime<Utc>,
    pub event_type: String,
    pub order_id: OrderId,
    pub data: serde_json::Value,
}

/// A row of `shop_order_payments`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub created_at: DateTime<Utc>,
    pub method: String,
    pub amount_cents: i64,
    pub currency: String,
    pub additional_data: serde_json::Value,
}

/// A stock adjustment for a single product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockChange {
    pub product_id: ProductId,
    pub quantity: i32,
}

impl StockChange {
    pub fn new(product_id: ProductId, quantity: i32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// A timestamp column of `shop_orders` that is toggled on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderFlag {
    /// `invoice_created_at`
    Invoiced,
    /// `processed_at`
    Shipped,
}

impl OrderFlag {
    /// Returns the column holding this flag's timestamp.
    pub fn column(&self) -> &'static str {
        match self {
            OrderFlag::Invoiced => "invoice_created_at",
            OrderFlag::Shipped => "processed_at",
        }
    }
}

/// An order together with its line items, as loaded from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredOrder {
    pub order: OrderRecord,
    pub line_items: Vec<LineItemRecord>,
}

/// Everything written when an order is placed.
///
/// Applied atomically: either the order, its line items, the log entry and
/// all stock decrements persist, or none of them do.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order: OrderRecord,
    pub line_items: Vec<LineItemRecord>,
    pub log_entry: LogEntryRecord,
    pub stock_decrements: Vec<StockChange>,
}

/// A guarded payment-state transition of an order row.
///
/// Only the payment columns of `order` are written (method, state, its
/// updated-at and updated-by, cancellation reason). The update only applies
/// if the stored payment state still equals `expected_payment_state`.
#[derive(Debug, Clone)]
pub struct OrderUpdate {
    pub order: OrderRecord,
    pub expected_payment_state: String,
    pub log_entries: Vec<LogEntryRecord>,
    pub payment: Option<PaymentRecord>,
    pub stock_increments: Vec<StockChange>,
}

impl OrderUpdate {
    /// Creates an update expecting the payment state the record currently has.
    pub fn new(order: OrderRecord) -> Self {
        let expected_payment_state = order.payment_state.clone();
        Self {
            order,
            expected_payment_state,
            log_entries: Vec::new(),
            payment: None,
            stock_increments: Vec::new(),
        }
    }

    pub fn expect_payment_state(mut self, state: impl Into<String>) -> Self {
        self.expected_payment_state = state.into();
        self
    }

    pub fn with_log_entry(mut self, entry: LogEntryRecord) -> Self {
        self.log_entries.push(entry);
        self
    }

    pub fn with_payment(mut self, payment: PaymentRecord) -> Self {
        self.payment = Some(payment);
        self
    }

    pub fn with_stock_increments(mut self, increments: Vec<StockChange>) -> Self {
        self.stock_increments = increments;
        self
    }
}
