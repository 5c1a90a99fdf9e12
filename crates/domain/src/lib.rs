//! Domain layer for the shop order lifecycle.
//!
//! This crate provides:
//! - Cart and catalog types used to place orders
//! - Order number sequences
//! - The order aggregate with its payment state machine and audit log
//! - `OrderService`, the single entry point for lifecycle transitions
//! - The `FulfillmentHandler` seam invoked after payment and cancellation

pub mod cart;
pub mod catalog;
pub mod config;
pub mod error;
pub mod fulfillment;
pub mod order;
pub mod sequence;
pub mod user;

pub use cart::{Cart, CartError, CartItem, MAX_QUANTITY};
pub use catalog::{
    InMemoryShopCatalog, Product, ProductType, ProductTypeParams, Shop, ShopCatalog, Storefront,
};
pub use config::ShopConfig;
pub use error::DomainError;
pub use fulfillment::{FulfillmentFailure, FulfillmentHandler, NoFulfillment};
pub use order::{
    AddNote, Address, CancelOrder, EventUser, LineItem, LineItemProcessingState, MarkOrderAsPaid,
    Order, OrderError, OrderLogEntry, OrderLogEventType, OrderService, OrderState, Orderer,
    Payment, PaymentState, PlaceOrder, ShopOrderCanceled, ShopOrderEvent, ShopOrderPaid,
    ShopOrderPlaced,
};
pub use sequence::{OrderNumberSequence, OrderNumberSequenceService, format_order_number};
pub use user::{InMemoryUserDirectory, User, UserDirectory};
