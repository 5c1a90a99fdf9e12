//! Fulfillment actions for shop orders.
//!
//! When an order is marked as paid, the executor runs the actions tied to
//! each line item's product:
//! 1. Type-based actions (`ticket`, `ticket_bundle` products)
//! 2. Actions registered for the product in the `ActionRegistry`
//!
//! When a paid order is canceled, tickets and bundles recorded in the line
//! items' processing results are revoked. Badge awardings are kept.

pub mod action;
pub mod config;
pub mod error;
pub mod executor;
pub mod registry;
pub mod services;

pub use action::{ActionId, FulfillmentAction, RegisteredAction};
pub use config::TicketCodeConfig;
pub use error::FulfillmentError;
pub use executor::FulfillmentExecutor;
pub use registry::ActionRegistry;
pub use services::{
    Badge, BadgeAwarding, BadgeService, CodeGenerator, InMemoryBadgeService,
    InMemoryTicketService, Ticket, TicketBundle, TicketService,
};
