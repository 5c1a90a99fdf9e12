//! Ticket service trait and in-memory implementation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderNumber, TicketBundleId, TicketCategoryId, TicketId, UserId};
use parking_lot::RwLock;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::TicketCodeConfig;
use crate::error::{FulfillmentError, Result};

/// Characters used in ticket codes. `I` and `O` are left out to avoid
/// confusion with `1` and `0`.
pub const TICKET_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";

pub const TICKET_CODE_LENGTH: usize = 5;

/// Produces candidate ticket codes.
pub type CodeGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// Generates a random code from [`TICKET_CODE_ALPHABET`].
pub fn random_ticket_code() -> String {
    let mut rng = rand::thread_rng();
    (0..TICKET_CODE_LENGTH)
        .map(|_| TICKET_CODE_ALPHABET[rng.gen_range(0..TICKET_CODE_ALPHABET.len())] as char)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub created_at: DateTime<Utc>,
    pub code: String,
    pub category_id: TicketCategoryId,
    pub owned_by_id: UserId,
    pub used_by_id: Option<UserId>,
    pub bundle_id: Option<TicketBundleId>,
    pub order_number: Option<OrderNumber>,
    pub revoked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketBundle {
    pub id: TicketBundleId,
    pub created_at: DateTime<Utc>,
    pub category_id: TicketCategoryId,
    pub ticket_quantity: u32,
    pub owned_by_id: UserId,
    pub ticket_ids: Vec<TicketId>,
    pub revoked: bool,
}

/// Trait for ticket issuing operations.
#[async_trait]
pub trait TicketService: Send + Sync {
    /// Creates `quantity` tickets owned and used by `owner_id`.
    async fn create_tickets(
        &self,
        category_id: TicketCategoryId,
        owner_id: UserId,
        quantity: u32,
        order_number: &OrderNumber,
    ) -> Result<Vec<Ticket>>;

    /// Creates a bundle of `ticket_quantity` tickets owned by `owner_id`.
    async fn create_ticket_bundle(
        &self,
        category_id: TicketCategoryId,
        ticket_quantity: u32,
        owner_id: UserId,
        order_number: &OrderNumber,
    ) -> Result<TicketBundle>;

    async fn revoke_ticket(&self, ticket_id: TicketId, initiator_id: UserId) -> Result<Ticket>;

    /// Revokes a bundle together with its tickets.
    async fn revoke_ticket_bundle(
        &self,
        bundle_id: TicketBundleId,
        initiator_id: UserId,
    ) -> Result<TicketBundle>;
}

#[derive(Debug, Default)]
struct TicketingState {
    tickets: HashMap<TicketId, Ticket>,
    bundles: HashMap<TicketBundleId, TicketBundle>,
    codes: HashSet<String>,
}

/// In-memory ticket service.
///
/// Codes are unique across all tickets it has issued.
#[derive(Clone)]
pub struct InMemoryTicketService {
    state: Arc<RwLock<TicketingState>>,
    config: TicketCodeConfig,
    generate_code: CodeGenerator,
}

impl Default for InMemoryTicketService {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTicketService {
    pub fn new() -> Self {
        Self::with_config(TicketCodeConfig::default())
    }

    pub fn with_config(config: TicketCodeConfig) -> Self {
        Self::with_code_generator(config, Arc::new(random_ticket_code))
    }

    /// Uses a custom code source, e.g. a scripted one in tests.
    pub fn with_code_generator(config: TicketCodeConfig, generate_code: CodeGenerator) -> Self {
        Self {
            state: Arc::default(),
            config,
            generate_code,
        }
    }

    pub fn ticket_count(&self) -> usize {
        self.state.read().tickets.len()
    }

    /// Returns the number of tickets that have not been revoked.
    pub fn active_ticket_count(&self) -> usize {
        self.state
            .read()
            .tickets
            .values()
            .filter(|t| !t.revoked)
            .count()
    }

    pub fn find_ticket(&self, ticket_id: TicketId) -> Option<Ticket> {
        self.state.read().tickets.get(&ticket_id).cloned()
    }

    pub fn find_bundle(&self, bundle_id: TicketBundleId) -> Option<TicketBundle> {
        self.state.read().bundles.get(&bundle_id).cloned()
    }

    pub fn tickets_owned_by(&self, user_id: UserId) -> Vec<Ticket> {
        self.state
            .read()
            .tickets
            .values()
            .filter(|t| t.owned_by_id == user_id)
            .cloned()
            .collect()
    }

    /// Allocates `quantity` codes not yet in use.
    ///
    /// Each code is drawn up to `max_code_attempts` times until it differs
    /// from the rest of the batch; a batch that collides with issued codes is
    /// discarded and redrawn up to `max_batch_attempts` times.
    fn allocate_codes(
        &self,
        issued: &HashSet<String>,
        category_id: TicketCategoryId,
        quantity: u32,
    ) -> Result<Vec<String>> {
        for attempt in 1..=self.config.max_batch_attempts {
            match self.generate_batch(quantity) {
                Some(codes) if codes.iter().all(|code| !issued.contains(code)) => {
                    return Ok(codes);
                }
                _ => tracing::debug!(attempt, quantity, "Ticket code batch rejected"),
            }
        }

        tracing::warn!(%category_id, quantity, "Ticket code generation exhausted");
        Err(FulfillmentError::TicketCreationFailed {
            category_id,
            quantity,
            attempts: self.config.max_batch_attempts,
        })
    }

    fn generate_batch(&self, quantity: u32) -> Option<Vec<String>> {
        let mut codes: Vec<String> = Vec::with_capacity(quantity as usize);
        for _ in 0..quantity {
            let code = (0..self.config.max_code_attempts)
                .map(|_| (self.generate_code)())
                .find(|code| !codes.contains(code))?;
            codes.push(code);
        }
        Some(codes)
    }

    fn issue(
        state: &mut TicketingState,
        codes: Vec<String>,
        category_id: TicketCategoryId,
        owner_id: UserId,
        bundle_id: Option<TicketBundleId>,
        order_number: &OrderNumber,
    ) -> Vec<Ticket> {
        let now = Utc::now();
        codes
            .into_iter()
            .map(|code| {
                let ticket = Ticket {
                    id: TicketId::new(),
                    created_at: now,
                    code: code.clone(),
                    category_id,
                    owned_by_id: owner_id,
                    used_by_id: Some(owner_id),
                    bundle_id,
                    order_number: Some(order_number.clone()),
                    revoked: false,
                };
                state.codes.insert(code);
                state.tickets.insert(ticket.id, ticket.clone());
                ticket
            })
            .collect()
    }
}

#[async_trait]
impl TicketService for InMemoryTicketService {
    async fn create_tickets(
        &self,
        category_id: TicketCategoryId,
        owner_id: UserId,
        quantity: u32,
        order_number: &OrderNumber,
    ) -> Result<Vec<Ticket>> {
        let mut state = self.state.write();
        let codes = self.allocate_codes(&state.codes, category_id, quantity)?;
        Ok(Self::issue(
            &mut state,
            codes,
            category_id,
            owner_id,
            None,
            order_number,
        ))
    }

    async fn create_ticket_bundle(
        &self,
        category_id: TicketCategoryId,
        ticket_quantity: u32,
        owner_id: UserId,
        order_number: &OrderNumber,
    ) -> Result<TicketBundle> {
        let mut state = self.state.write();
        let codes = self.allocate_codes(&state.codes, category_id, ticket_quantity)?;

        let bundle_id = TicketBundleId::new();
        let tickets = Self::issue(
            &mut state,
            codes,
            category_id,
            owner_id,
            Some(bundle_id),
            order_number,
        );
        let bundle = TicketBundle {
            id: bundle_id,
            created_at: Utc::now(),
            category_id,
            ticket_quantity,
            owned_by_id: owner_id,
            ticket_ids: tickets.iter().map(|t| t.id).collect(),
            revoked: false,
        };
        state.bundles.insert(bundle_id, bundle.clone());
        Ok(bundle)
    }

    async fn revoke_ticket(&self, ticket_id: TicketId, initiator_id: UserId) -> Result<Ticket> {
        let mut state = self.state.write();
        let ticket = state
            .tickets
            .get_mut(&ticket_id)
            .ok_or(FulfillmentError::TicketNotFound(ticket_id))?;
        ticket.revoked = true;
        tracing::debug!(%ticket_id, %initiator_id, "Ticket revoked");
        Ok(ticket.clone())
    }

    async fn revoke_ticket_bundle(
        &self,
        bundle_id: TicketBundleId,
        initiator_id: UserId,
    ) -> Result<TicketBundle> {
        let mut state = self.state.write();
        let bundle = state
            .bundles
            .get_mut(&bundle_id)
            .ok_or(FulfillmentError::TicketBundleNotFound(bundle_id))?;
        bundle.revoked = true;
        let bundle = bundle.clone();

        for ticket_id in &bundle.ticket_ids {
            if let Some(ticket) = state.tickets.get_mut(ticket_id) {
                ticket.revoked = true;
            }
        }
        tracing::debug!(%bundle_id, %initiator_id, "Ticket bundle revoked");
        Ok(bundle)
    }
}
