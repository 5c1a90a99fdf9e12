//! Collaborator services used by fulfillment actions, with in-memory
//! implementations.

pub mod badge;
pub mod ticketing;

pub use badge::{Badge, BadgeAwarding, BadgeService, InMemoryBadgeService};
pub use ticketing::{
    CodeGenerator, InMemoryTicketService, TICKET_CODE_ALPHABET, TICKET_CODE_LENGTH, Ticket,
    TicketBundle, TicketService, random_ticket_code,
};
