//! Runs fulfillment actions for paid orders and revokes them on cancellation.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::Utc;
use common::{BadgeId, TicketBundleId, TicketCategoryId, TicketId};
use domain::{
    FulfillmentFailure, FulfillmentHandler, LineItem, Order, OrderLogEntry, ProductType,
    ShopCatalog, User,
};
use order_store::{OrderStore, OrderStoreExt};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

use crate::action::FulfillmentAction;
use crate::error::{FulfillmentError, Result};
use crate::registry::ActionRegistry;
use crate::services::{BadgeService, TicketService};

const TICKET_IDS_KEY: &str = "ticket_ids";
const TICKET_BUNDLE_IDS_KEY: &str = "ticket_bundle_ids";

/// Executes the actions tied to an order's products.
///
/// For every line item, the action implied by the product type runs first,
/// followed by the actions registered for the product. Tickets and bundles
/// are owned by the orderer; their ids are recorded in the line item's
/// processing result so they can be revoked later.
pub struct FulfillmentExecutor<S, C, T, B>
where
    S: OrderStore,
    C: ShopCatalog,
    T: TicketService,
    B: BadgeService,
{
    store: S,
    catalog: C,
    tickets: T,
    badges: B,
    registry: ActionRegistry,
}

impl<S, C, T, B> FulfillmentExecutor<S, C, T, B>
where
    S: OrderStore,
    C: ShopCatalog,
    T: TicketService,
    B: BadgeService,
{
    pub fn new(store: S, catalog: C, tickets: T, badges: B, registry: ActionRegistry) -> Self {
        Self {
            store,
            catalog,
            tickets,
            badges,
            registry,
        }
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Runs creation actions for every line item of a paid order.
    #[tracing::instrument(
        skip(self, order, initiator),
        fields(order_number = %order.order_number(), initiator_id = %initiator.id)
    )]
    pub async fn create(&self, order: &Order, initiator: &User) -> Result<()> {
        for line_item in order.line_items() {
            let mut result = ProcessingResult::read(line_item)?;

            let type_action = self.type_based_action(line_item).await?;
            let registered = self
                .registry
                .actions_for_product(line_item.product_id())
                .into_iter()
                .map(|registered| registered.action);

            for action in type_action.into_iter().chain(registered) {
                tracing::debug!(
                    line_item_id = %line_item.id(),
                    %action,
                    "Running fulfillment action"
                );
                match action {
                    FulfillmentAction::CreateTickets { ticket_category_id } => {
                        self.create_tickets(order, line_item, ticket_category_id, &mut result)
                            .await?;
                    }
                    FulfillmentAction::CreateTicketBundles {
                        ticket_category_id,
                        ticket_quantity,
                    } => {
                        self.create_ticket_bundles(
                            order,
                            line_item,
                            ticket_category_id,
                            ticket_quantity,
                            &mut result,
                        )
                        .await?;
                    }
                    FulfillmentAction::AwardBadge { badge_id } => {
                        self.award_badge(order, badge_id).await?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Revokes the tickets and bundles recorded for each line item.
    ///
    /// Badge awardings are not revoked.
    #[tracing::instrument(
        skip(self, order, initiator),
        fields(order_number = %order.order_number(), initiator_id = %initiator.id)
    )]
    pub async fn revoke(&self, order: &Order, initiator: &User) -> Result<()> {
        for line_item in order.line_items() {
            let recorded = ProcessingResult::read(line_item)?;

            for ticket_id in &recorded.ticket_ids {
                let ticket = self.tickets.revoke_ticket(*ticket_id, initiator.id).await?;
                self.store
                    .append_log_entry(
                        OrderLogEntry::ticket_revoked(
                            order.id(),
                            ticket.id,
                            &ticket.code,
                            initiator.id,
                            Utc::now(),
                        )
                        .to_record(),
                    )
                    .await?;
                metrics::counter!("shop_tickets_revoked_total").increment(1);
            }

            for bundle_id in &recorded.ticket_bundle_ids {
                let bundle = self
                    .tickets
                    .revoke_ticket_bundle(*bundle_id, initiator.id)
                    .await?;
                self.store
                    .append_log_entry(
                        OrderLogEntry::ticket_bundle_revoked(
                            order.id(),
                            bundle.id,
                            initiator.id,
                            Utc::now(),
                        )
                        .to_record(),
                    )
                    .await?;
                metrics::counter!("shop_tickets_revoked_total")
                    .increment(u64::from(bundle.ticket_quantity));
            }
        }
        Ok(())
    }

    /// Maps ticket and bundle products to the action their type implies.
    async fn type_based_action(&self, line_item: &LineItem) -> Result<Option<FulfillmentAction>> {
        let product_type = line_item.product_type();
        if !matches!(product_type, ProductType::Ticket | ProductType::TicketBundle) {
            return Ok(None);
        }

        let product_id = line_item.product_id();
        let product = self
            .catalog
            .find_product(product_id)
            .await
            .ok_or(FulfillmentError::ProductNotFound(product_id))?;
        let ticket_category_id =
            product
                .type_params
                .ticket_category_id
                .ok_or(FulfillmentError::MissingTypeParameter {
                    product_id,
                    parameter: "ticket_category_id",
                })?;

        let action = match product_type {
            ProductType::TicketBundle => {
                let ticket_quantity = product.type_params.ticket_quantity.ok_or(
                    FulfillmentError::MissingTypeParameter {
                        product_id,
                        parameter: "ticket_quantity",
                    },
                )?;
                FulfillmentAction::CreateTicketBundles {
                    ticket_category_id,
                    ticket_quantity,
                }
            }
            _ => FulfillmentAction::CreateTickets { ticket_category_id },
        };
        Ok(Some(action))
    }

    async fn create_tickets(
        &self,
        order: &Order,
        line_item: &LineItem,
        category_id: TicketCategoryId,
        result: &mut ProcessingResult,
    ) -> Result<()> {
        let tickets = self
            .tickets
            .create_tickets(
                category_id,
                order.placed_by_id(),
                line_item.quantity(),
                order.order_number(),
            )
            .await?;

        let now = Utc::now();
        let entries = tickets
            .iter()
            .map(|ticket| {
                OrderLogEntry::ticket_created(
                    order.id(),
                    ticket.id,
                    &ticket.code,
                    ticket.category_id,
                    ticket.owned_by_id,
                    now,
                )
                .to_record()
            })
            .collect();
        self.store.append_log_entries(entries).await?;

        result.ticket_ids.extend(tickets.iter().map(|t| t.id));
        self.store
            .update_line_item_processing_result(line_item.id(), result.to_value(), now)
            .await?;

        metrics::counter!("shop_tickets_created_total").increment(tickets.len() as u64);
        tracing::info!(
            count = tickets.len(),
            %category_id,
            "Tickets created"
        );
        Ok(())
    }

    async fn create_ticket_bundles(
        &self,
        order: &Order,
        line_item: &LineItem,
        category_id: TicketCategoryId,
        ticket_quantity: u32,
        result: &mut ProcessingResult,
    ) -> Result<()> {
        let owner_id = order.placed_by_id();

        for _ in 0..line_item.quantity() {
            let bundle = self
                .tickets
                .create_ticket_bundle(category_id, ticket_quantity, owner_id, order.order_number())
                .await?;

            let now = Utc::now();
            self.store
                .append_log_entry(
                    OrderLogEntry::ticket_bundle_created(
                        order.id(),
                        bundle.id,
                        bundle.category_id,
                        bundle.ticket_quantity,
                        bundle.owned_by_id,
                        now,
                    )
                    .to_record(),
                )
                .await?;

            result.ticket_bundle_ids.insert(bundle.id);
            self.store
                .update_line_item_processing_result(line_item.id(), result.to_value(), now)
                .await?;
            metrics::counter!("shop_tickets_created_total").increment(u64::from(ticket_quantity));
        }

        tracing::info!(
            count = line_item.quantity(),
            ticket_quantity,
            %category_id,
            "Ticket bundles created"
        );
        Ok(())
    }

    async fn award_badge(&self, order: &Order, badge_id: BadgeId) -> Result<()> {
        let awarding = self
            .badges
            .award_badge(badge_id, order.placed_by_id())
            .await?;
        self.store
            .append_log_entry(
                OrderLogEntry::badge_awarded(
                    order.id(),
                    awarding.id,
                    awarding.badge_id,
                    awarding.awardee_id,
                    awarding.awarded_at,
                )
                .to_record(),
            )
            .await?;

        metrics::counter!("shop_badges_awarded_total").increment(1);
        tracing::info!(%badge_id, awardee_id = %awarding.awardee_id, "Badge awarded");
        Ok(())
    }
}

#[async_trait]
impl<S, C, T, B> FulfillmentHandler for FulfillmentExecutor<S, C, T, B>
where
    S: OrderStore,
    C: ShopCatalog,
    T: TicketService,
    B: BadgeService,
{
    async fn execute_creation_actions(
        &self,
        order: &Order,
        initiator: &User,
    ) -> std::result::Result<(), FulfillmentFailure> {
        Ok(self.create(order, initiator).await?)
    }

    async fn execute_revocation_actions(
        &self,
        order: &Order,
        initiator: &User,
    ) -> std::result::Result<(), FulfillmentFailure> {
        Ok(self.revoke(order, initiator).await?)
    }
}

/// A line item's processing result with the ids fulfillment recorded in it.
///
/// Other keys are carried through untouched.
#[derive(Debug, Default)]
struct ProcessingResult {
    data: Map<String, Value>,
    ticket_ids: BTreeSet<TicketId>,
    ticket_bundle_ids: BTreeSet<TicketBundleId>,
}

impl ProcessingResult {
    fn read(line_item: &LineItem) -> Result<Self> {
        let invalid = |reason: String| FulfillmentError::InvalidProcessingResult {
            line_item_id: line_item.id(),
            reason,
        };

        let data = match line_item.processing_result() {
            Value::Null => Map::new(),
            Value::Object(map) => map.clone(),
            other => return Err(invalid(format!("expected an object, got {other}"))),
        };
        let ticket_ids = read_ids(&data, TICKET_IDS_KEY).map_err(|e| invalid(e.to_string()))?;
        let ticket_bundle_ids =
            read_ids(&data, TICKET_BUNDLE_IDS_KEY).map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            data,
            ticket_ids,
            ticket_bundle_ids,
        })
    }

    fn to_value(&self) -> Value {
        let mut data = self.data.clone();
        if !self.ticket_ids.is_empty() {
            data.insert(TICKET_IDS_KEY.to_string(), json!(self.ticket_ids));
        }
        if !self.ticket_bundle_ids.is_empty() {
            data.insert(
                TICKET_BUNDLE_IDS_KEY.to_string(),
                json!(self.ticket_bundle_ids),
            );
        }
        Value::Object(data)
    }
}

fn read_ids<T: DeserializeOwned + Ord>(
    data: &Map<String, Value>,
    key: &str,
) -> serde_json::Result<BTreeSet<T>> {
    match data.get(key) {
        Some(ids) => serde_json::from_value(ids.clone()),
        None => Ok(BTreeSet::new()),
    }
}
