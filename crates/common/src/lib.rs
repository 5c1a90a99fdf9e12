//! Shared types for the shop order system.

pub mod money;
pub mod types;

pub use money::{Currency, CurrencyMismatch, Money, ParseCurrencyError, TaxRate};
pub use types::{
    BadgeAwardingId, BadgeId, LineItemId, LogEntryId, OrderId, OrderNumber,
    OrderNumberSequenceId, PaymentId, ProductId, ProductNumber, ShopId, StorefrontId,
    TicketBundleId, TicketCategoryId, TicketId, UserId,
};
