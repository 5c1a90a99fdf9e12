//! Order commands.

use chrono::{DateTime, Utc};
use common::{OrderId, StorefrontId, UserId};
use serde_json::{Map, Value};

use crate::cart::Cart;

use super::Orderer;

/// Command to place an order from a cart.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub storefront_id: StorefrontId,
    pub orderer: Orderer,
    pub cart: Cart,

    /// Placement time; defaults to now.
    pub created_at: Option<DateTime<Utc>>,
}

impl PlaceOrder {
    pub fn new(storefront_id: impl Into<StorefrontId>, orderer: Orderer, cart: Cart) -> Self {
        Self {
            storefront_id: storefront_id.into(),
            orderer,
            cart,
            created_at: None,
        }
    }

    /// Backdates the order, e.g. when importing historical orders.
    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }
}

/// Command to mark an order as paid.
#[derive(Debug, Clone)]
pub struct MarkOrderAsPaid {
    pub order_id: OrderId,
    pub payment_method: String,
    pub initiator_id: UserId,

    /// Extra data from a payment gateway, stored with the payment and the
    /// `order-paid` log entry.
    pub additional_payment_data: Map<String, Value>,
}

impl MarkOrderAsPaid {
    pub fn new(order_id: OrderId, payment_method: impl Into<String>, initiator_id: UserId) -> Self {
        Self {
            order_id,
            payment_method: payment_method.into(),
            initiator_id,
            additional_payment_data: Map::new(),
        }
    }

    pub fn with_additional_payment_data(mut self, data: Map<String, Value>) -> Self {
        self.additional_payment_data = data;
        self
    }
}

/// Command to cancel an order.
#[derive(Debug, Clone)]
pub struct CancelOrder {
    pub order_id: OrderId,
    pub initiator_id: UserId,
    pub reason: String,
}

impl CancelOrder {
    pub fn new(order_id: OrderId, initiator_id: UserId, reason: impl Into<String>) -> Self {
        Self {
            order_id,
            initiator_id,
            reason: reason.into(),
        }
    }
}

/// Command to attach a note to an order's log.
#[derive(Debug, Clone)]
pub struct AddNote {
    pub order_id: OrderId,
    pub author_id: UserId,
    pub text: String,
}

impl AddNote {
    pub fn new(order_id: OrderId, author_id: UserId, text: impl Into<String>) -> Self {
        Self {
            order_id,
            author_id,
            text: text.into(),
        }
    }
}
