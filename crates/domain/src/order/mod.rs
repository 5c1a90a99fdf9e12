//! Order aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod line_item;
mod log;
mod payment;
mod service;
mod state;
mod value_objects;

pub use aggregate::Order;
pub use commands::{AddNote, CancelOrder, MarkOrderAsPaid, PlaceOrder};
pub use events::{EventUser, ShopOrderCanceled, ShopOrderEvent, ShopOrderPaid, ShopOrderPlaced};
pub use line_item::LineItem;
pub use log::{OrderLogEntry, OrderLogEventType};
pub use payment::Payment;
pub use service::OrderService;
pub use state::{LineItemProcessingState, OrderState, PaymentState};
pub use value_objects::{Address, Orderer};

use common::{CurrencyMismatch, LineItemId, OrderNumber};
use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Order was already marked as paid.
    #[error("Order {0} is already marked as paid")]
    AlreadyMarkedAsPaid(OrderNumber),

    /// Order was already canceled.
    #[error("Order {0} is already canceled")]
    AlreadyCanceled(OrderNumber),

    /// Cannot place an order without items.
    #[error("Cart is empty")]
    EmptyCart,

    /// Shipping flags only apply to orders that require processing.
    #[error("Order {0} does not require processing")]
    ProcessingNotRequired(OrderNumber),

    /// Cart currency differs from the shop's currency.
    #[error("Currency mismatch: {0}")]
    CurrencyMismatch(#[from] CurrencyMismatch),

    /// A line item quantity does not fit the stored quantity range.
    #[error("Line item {line_item_id} quantity {quantity} is out of range")]
    QuantityOutOfRange {
        line_item_id: LineItemId,
        quantity: u32,
    },

    /// A stored record could not be mapped to the aggregate.
    #[error("Invalid order record: {0}")]
    InvalidRecord(String),
}
