//! Order lifecycle service: the sole entry point for creating and
//! transitioning orders.

use std::collections::HashMap;
use std::time::Instant;

use chrono::Utc;
use common::{LineItemId, OrderId, OrderNumber, ProductId, ShopId, StorefrontId, UserId};
use order_store::{
    LogQuery, NewOrder, OrderFlag, OrderStore, OrderStoreExt, OrderUpdate, StockChange,
    StoreError, StoredOrder,
};

use crate::cart::Cart;
use crate::catalog::ShopCatalog;
use crate::config::ShopConfig;
use crate::error::DomainError;
use crate::fulfillment::FulfillmentHandler;
use crate::sequence::OrderNumberSequenceService;
use crate::user::{User, UserDirectory};

use super::{
    AddNote, CancelOrder, EventUser, MarkOrderAsPaid, Order, OrderError, OrderLogEntry,
    OrderLogEventType, Payment, PaymentState, PlaceOrder, ShopOrderCanceled, ShopOrderPaid,
    ShopOrderPlaced,
};

/// Service for managing the order lifecycle.
///
/// Generic over its collaborators so it can run against the in-memory or
/// PostgreSQL store and any catalog, user directory or fulfillment handler.
pub struct OrderService<S, C, U, F>
where
    S: OrderStore,
    C: ShopCatalog,
    U: UserDirectory,
    F: FulfillmentHandler,
{
    store: S,
    sequences: OrderNumberSequenceService<S>,
    catalog: C,
    users: U,
    fulfillment: F,
    config: ShopConfig,
}

impl<S, C, U, F> OrderService<S, C, U, F>
where
    S: OrderStore + Clone,
    C: ShopCatalog,
    U: UserDirectory,
    F: FulfillmentHandler,
{
    pub fn new(store: S, catalog: C, users: U, fulfillment: F) -> Self {
        Self {
            sequences: OrderNumberSequenceService::new(store.clone()),
            store,
            catalog,
            users,
            fulfillment,
            config: ShopConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ShopConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn sequences(&self) -> &OrderNumberSequenceService<S> {
        &self.sequences
    }

    pub fn config(&self) -> &ShopConfig {
        &self.config
    }

    /// Builds a cart for a storefront from current catalog prices.
    #[tracing::instrument(skip(self))]
    pub async fn create_cart(
        &self,
        storefront_id: &StorefrontId,
        items: &[(ProductId, u32)],
    ) -> Result<Cart, DomainError> {
        let storefront = self
            .catalog
            .find_storefront(storefront_id)
            .await
            .ok_or_else(|| DomainError::StorefrontNotFound(storefront_id.clone()))?;
        let shop = self
            .catalog
            .find_shop(&storefront.shop_id)
            .await
            .ok_or_else(|| DomainError::ShopNotFound(storefront.shop_id.clone()))?;

        let mut cart = Cart::new(shop.currency);
        for (product_id, quantity) in items {
            let product = self
                .catalog
                .find_product(*product_id)
                .await
                .ok_or(DomainError::ProductNotFound(*product_id))?;
            cart.add_item(product, *quantity)?;
        }
        Ok(cart)
    }

    /// Places an order.
    ///
    /// The order, its line items, the `order-placed` log entry and all stock
    /// decrements are persisted in one atomic store call.
    #[tracing::instrument(
        skip(self, cmd),
        fields(storefront_id = %cmd.storefront_id, orderer_id = %cmd.orderer.user.id)
    )]
    pub async fn place_order(
        &self,
        cmd: PlaceOrder,
    ) -> Result<(Order, ShopOrderPlaced), DomainError> {
        let start = Instant::now();
        let PlaceOrder {
            storefront_id,
            orderer,
            cart,
            created_at,
        } = cmd;

        if cart.is_empty() {
            tracing::warn!("Rejected order placement with empty cart");
            return Err(OrderError::EmptyCart.into());
        }

        let storefront = self
            .catalog
            .find_storefront(&storefront_id)
            .await
            .ok_or_else(|| DomainError::StorefrontNotFound(storefront_id.clone()))?;
        let shop = self
            .catalog
            .find_shop(&storefront.shop_id)
            .await
            .ok_or_else(|| DomainError::ShopNotFound(storefront.shop_id.clone()))?;
        if cart.currency() != shop.currency {
            return Err(OrderError::CurrencyMismatch(common::CurrencyMismatch {
                left: shop.currency,
                right: cart.currency(),
            })
            .into());
        }

        let order_number = self
            .sequences
            .generate_order_number(storefront.order_number_sequence_id)
            .await
            .map_err(|e| match e {
                DomainError::Store(source) => DomainError::OrderFailed(source),
                other => other,
            })?;

        let created_at = created_at.unwrap_or_else(Utc::now);
        let order = Order::place(
            OrderId::new(),
            created_at,
            &storefront,
            order_number,
            &orderer,
            &cart,
        )?;

        let new_order = NewOrder {
            order: order.to_record(),
            line_items: order.line_item_records()?,
            log_entry: OrderLogEntry::placed(order.id(), orderer.user.id, created_at).to_record(),
            stock_decrements: stock_changes(&order)?,
        };

        if let Err(e) = self.store.insert_order(new_order).await {
            metrics::counter!("shop_orders_failed_total").increment(1);
            tracing::error!(
                order_number = %order.order_number(),
                error = %e,
                "Order placement failed"
            );
            return Err(DomainError::OrderFailed(e));
        }

        metrics::counter!("shop_orders_placed_total").increment(1);
        metrics::histogram!("shop_order_placement_duration_seconds")
            .record(start.elapsed().as_secs_f64());
        tracing::info!(
            order_id = %order.id(),
            order_number = %order.order_number(),
            total = %order.total_amount(),
            "Order placed"
        );

        let orderer_event = EventUser::from(&orderer.user);
        let event = ShopOrderPlaced {
            occurred_at: created_at,
            initiator: orderer_event.clone(),
            order_id: order.id(),
            order_number: order.order_number().clone(),
            orderer: orderer_event,
        };
        Ok((order, event))
    }

    /// Marks an open order as paid, then runs creation fulfillment actions.
    ///
    /// The payment state is committed before fulfillment runs. If fulfillment
    /// fails the order stays paid and [`DomainError::Fulfillment`] is returned.
    #[tracing::instrument(
        skip(self, cmd),
        fields(order_id = %cmd.order_id, payment_method = %cmd.payment_method)
    )]
    pub async fn mark_order_as_paid(
        &self,
        cmd: MarkOrderAsPaid,
    ) -> Result<(Order, ShopOrderPaid), DomainError> {
        let mut order = self.get_order(cmd.order_id).await?;
        let initiator = self.get_user(cmd.initiator_id).await?;
        let orderer = self.get_user(order.placed_by_id()).await?;

        let now = Utc::now();
        let former = order
            .mark_as_paid(&cmd.payment_method, initiator.id, now)
            .inspect_err(|e| tracing::warn!(error = %e, "Rejected payment"))?;

        let payment = Payment::new(
            order.id(),
            now,
            &cmd.payment_method,
            order.total_amount(),
            cmd.additional_payment_data.clone(),
        );
        let update = OrderUpdate::new(order.to_record())
            .expect_payment_state(former.as_str())
            .with_log_entry(
                OrderLogEntry::payment_created(order.id(), payment.id, initiator.id, now)
                    .to_record(),
            )
            .with_log_entry(
                OrderLogEntry::paid(
                    order.id(),
                    former,
                    &cmd.payment_method,
                    initiator.id,
                    cmd.additional_payment_data,
                    now,
                )
                .to_record(),
            )
            .with_payment(payment.to_record());
        self.store.update_order(update).await?;

        metrics::counter!("shop_orders_paid_total").increment(1);
        tracing::info!(order_number = %order.order_number(), "Order marked as paid");

        self.run_fulfillment(&order, &initiator, FulfillmentStep::Creation)
            .await?;
        let order = self.get_order(order.id()).await?;

        let event = ShopOrderPaid {
            occurred_at: now,
            initiator: EventUser::from(&initiator),
            order_id: order.id(),
            order_number: order.order_number().clone(),
            orderer: EventUser::from(&orderer),
            payment_method: cmd.payment_method,
        };
        Ok((order, event))
    }

    /// Cancels an order, restores stock and, for paid orders, revokes
    /// fulfillment.
    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id))]
    pub async fn cancel_order(
        &self,
        cmd: CancelOrder,
    ) -> Result<(Order, ShopOrderCanceled), DomainError> {
        let mut order = self.get_order(cmd.order_id).await?;
        let initiator = self.get_user(cmd.initiator_id).await?;
        let orderer = self.get_user(order.placed_by_id()).await?;

        let now = Utc::now();
        let former = order
            .cancel(&cmd.reason, initiator.id, now)
            .inspect_err(|e| tracing::warn!(error = %e, "Rejected cancellation"))?;

        let update = OrderUpdate::new(order.to_record())
            .expect_payment_state(former.as_str())
            .with_log_entry(
                OrderLogEntry::canceled(order.id(), former, &cmd.reason, initiator.id, now)
                    .to_record(),
            )
            .with_stock_increments(stock_changes(&order)?);
        self.store.update_order(update).await?;

        metrics::counter!("shop_orders_canceled_total").increment(1);
        tracing::info!(
            order_number = %order.order_number(),
            payment_state = %order.payment_state(),
            "Order canceled"
        );

        if former == PaymentState::Paid {
            self.run_fulfillment(&order, &initiator, FulfillmentStep::Revocation)
                .await?;
        }
        let order = self.get_order(order.id()).await?;

        let event = ShopOrderCanceled {
            occurred_at: now,
            initiator: EventUser::from(&initiator),
            order_id: order.id(),
            order_number: order.order_number().clone(),
            orderer: EventUser::from(&orderer),
        };
        Ok((order, event))
    }

    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id))]
    pub async fn add_note(&self, cmd: AddNote) -> Result<OrderLogEntry, DomainError> {
        let order = self.get_order(cmd.order_id).await?;
        let entry = OrderLogEntry::note_added(order.id(), cmd.author_id, &cmd.text, Utc::now());
        self.store.append_log_entry(entry.to_record()).await?;
        Ok(entry)
    }

    #[tracing::instrument(skip(self))]
    pub async fn set_invoiced_flag(
        &self,
        order_id: OrderId,
        initiator_id: UserId,
    ) -> Result<Order, DomainError> {
        let mut order = self.get_order(order_id).await?;
        let now = Utc::now();
        order.set_invoiced(now);
        self.save_flag_change(order, OrderFlag::Invoiced, initiator_id, now)
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn unset_invoiced_flag(
        &self,
        order_id: OrderId,
        initiator_id: UserId,
    ) -> Result<Order, DomainError> {
        let mut order = self.get_order(order_id).await?;
        order.unset_invoiced();
        self.save_flag_change(order, OrderFlag::Invoiced, initiator_id, Utc::now())
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn set_shipped_flag(
        &self,
        order_id: OrderId,
        initiator_id: UserId,
    ) -> Result<Order, DomainError> {
        let mut order = self.get_order(order_id).await?;
        let now = Utc::now();
        order.set_shipped(now)?;
        self.save_flag_change(order, OrderFlag::Shipped, initiator_id, now)
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn unset_shipped_flag(
        &self,
        order_id: OrderId,
        initiator_id: UserId,
    ) -> Result<Order, DomainError> {
        let mut order = self.get_order(order_id).await?;
        order.unset_shipped()?;
        self.save_flag_change(order, OrderFlag::Shipped, initiator_id, Utc::now())
            .await
    }

    /// Stores fulfillment output on a line item and marks it processed.
    #[tracing::instrument(skip(self, processing_result))]
    pub async fn update_line_item_processing_result(
        &self,
        line_item_id: LineItemId,
        processing_result: serde_json::Value,
    ) -> Result<(), DomainError> {
        self.store
            .update_line_item_processing_result(line_item_id, processing_result, Utc::now())
            .await?;
        Ok(())
    }

    /// Deletes an order with its payments, log entries and line items.
    #[tracing::instrument(skip(self))]
    pub async fn delete_order(&self, order_id: OrderId) -> Result<(), DomainError> {
        self.store.delete_order(order_id).await.map_err(|e| match e {
            StoreError::OrderNotFound(id) => DomainError::OrderNotFound(id),
            other => DomainError::Store(other),
        })?;
        tracing::info!(%order_id, "Order deleted");
        Ok(())
    }

    // Queries

    pub async fn find_order(&self, order_id: OrderId) -> Result<Option<Order>, DomainError> {
        self.store
            .find_order(order_id)
            .await?
            .map(to_order)
            .transpose()
    }

    pub async fn get_order(&self, order_id: OrderId) -> Result<Order, DomainError> {
        self.find_order(order_id)
            .await?
            .ok_or(DomainError::OrderNotFound(order_id))
    }

    pub async fn find_order_by_number(
        &self,
        order_number: &OrderNumber,
    ) -> Result<Option<Order>, DomainError> {
        self.store
            .find_order_by_number(order_number)
            .await?
            .map(to_order)
            .transpose()
    }

    /// Returns the shop's orders, newest first.
    pub async fn get_orders_for_shop(&self, shop_id: &ShopId) -> Result<Vec<Order>, DomainError> {
        self.store
            .get_orders_for_shop(shop_id)
            .await?
            .into_iter()
            .map(to_order)
            .collect()
    }

    /// Returns the orders a user placed, newest first.
    pub async fn get_orders_placed_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Order>, DomainError> {
        self.store
            .get_orders_placed_by_user(user_id)
            .await?
            .into_iter()
            .map(to_order)
            .collect()
    }

    pub async fn count_open_orders(&self, shop_id: &ShopId) -> Result<i64, DomainError> {
        let counts = self.count_orders_per_payment_state(shop_id).await?;
        Ok(counts.get(&PaymentState::Open).copied().unwrap_or(0))
    }

    /// Counts the shop's orders per payment state; every state is present.
    pub async fn count_orders_per_payment_state(
        &self,
        shop_id: &ShopId,
    ) -> Result<HashMap<PaymentState, i64>, DomainError> {
        let mut counts: HashMap<PaymentState, i64> = [
            PaymentState::Open,
            PaymentState::Paid,
            PaymentState::CanceledBeforePaid,
            PaymentState::CanceledAfterPaid,
        ]
        .into_iter()
        .map(|state| (state, 0))
        .collect();

        for (state, count) in self.store.count_orders_per_payment_state(shop_id).await? {
            let state: PaymentState = state.parse().map_err(OrderError::InvalidRecord)?;
            counts.insert(state, count);
        }
        Ok(counts)
    }

    /// Returns an order's log, oldest first.
    pub async fn get_log_entries(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<OrderLogEntry>, DomainError> {
        self.query_log(LogQuery::for_order(order_id)).await
    }

    pub async fn query_log(&self, query: LogQuery) -> Result<Vec<OrderLogEntry>, DomainError> {
        self.store
            .get_log_entries(query)
            .await?
            .into_iter()
            .map(|record| OrderLogEntry::from_record(record).map_err(DomainError::from))
            .collect()
    }

    pub async fn get_payments_for_order(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<Payment>, DomainError> {
        self.store
            .get_payments_for_order(order_id)
            .await?
            .into_iter()
            .map(|record| Payment::from_record(record).map_err(DomainError::from))
            .collect()
    }

    /// Open and older than the configured threshold.
    pub fn is_overdue(&self, order: &Order) -> bool {
        order.is_overdue(Utc::now(), self.config.overdue_threshold)
    }

    async fn get_user(&self, user_id: UserId) -> Result<User, DomainError> {
        self.users
            .find_user(user_id)
            .await
            .ok_or(DomainError::UserNotFound(user_id))
    }

    /// Persists one flag of an already updated order.
    ///
    /// Only the flag's column is written, so concurrent changes to other
    /// columns survive.
    async fn save_flag_change(
        &self,
        order: Order,
        flag: OrderFlag,
        initiator_id: UserId,
        now: chrono::DateTime<Utc>,
    ) -> Result<Order, DomainError> {
        let (value, event_type) = match flag {
            OrderFlag::Invoiced => (
                order.invoice_created_at(),
                if order.is_invoiced() {
                    OrderLogEventType::OrderInvoiced
                } else {
                    OrderLogEventType::OrderInvoicedWithdrawn
                },
            ),
            OrderFlag::Shipped => (
                order.processed_at(),
                if order.is_processed() {
                    OrderLogEventType::OrderShipped
                } else {
                    OrderLogEventType::OrderShippedWithdrawn
                },
            ),
        };
        let entry = OrderLogEntry::flag_changed(event_type, order.id(), initiator_id, now);
        self.store
            .set_order_flag(order.id(), flag, value, entry.to_record())
            .await?;
        tracing::info!(order_number = %order.order_number(), %event_type, "Order flag changed");
        Ok(order)
    }

    async fn run_fulfillment(
        &self,
        order: &Order,
        initiator: &User,
        step: FulfillmentStep,
    ) -> Result<(), DomainError> {
        let result = match step {
            FulfillmentStep::Creation => {
                self.fulfillment
                    .execute_creation_actions(order, initiator)
                    .await
            }
            FulfillmentStep::Revocation => {
                self.fulfillment
                    .execute_revocation_actions(order, initiator)
                    .await
            }
        };

        result.map_err(|source| {
            metrics::counter!("shop_fulfillment_failures_total").increment(1);
            tracing::error!(
                order_number = %order.order_number(),
                payment_state = %order.payment_state(),
                error = %source,
                "Fulfillment failed after payment state change; manual follow-up required"
            );
            DomainError::Fulfillment {
                order_number: order.order_number().clone(),
                source,
            }
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum FulfillmentStep {
    Creation,
    Revocation,
}

fn to_order(stored: StoredOrder) -> Result<Order, DomainError> {
    Ok(Order::from_records(stored)?)
}

fn stock_changes(order: &Order) -> Result<Vec<StockChange>, OrderError> {
    order
        .line_items()
        .iter()
        .map(|item| {
            let quantity =
                i32::try_from(item.quantity()).map_err(|_| OrderError::QuantityOutOfRange {
                    line_item_id: item.id(),
                    quantity: item.quantity(),
                })?;
            Ok(StockChange::new(item.product_id(), quantity))
        })
        .collect()
}
