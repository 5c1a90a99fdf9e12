//! Order aggregate implementation.

use chrono::{DateTime, Duration, Utc};
use common::{Currency, Money, OrderId, OrderNumber, ShopId, StorefrontId, UserId};
use order_store::{LineItemRecord, OrderRecord, StoredOrder};

use crate::cart::Cart;
use crate::catalog::Storefront;

use super::{Address, LineItem, OrderError, OrderState, Orderer, PaymentState};

/// Order aggregate root.
///
/// Built from persistence records through [`Order::from_records`] and turned
/// back with [`Order::to_record`]. Payment-state flags (`is_paid`,
/// `is_overdue`, ...) are always derived, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    id: OrderId,
    created_at: DateTime<Utc>,
    shop_id: ShopId,
    storefront_id: StorefrontId,
    order_number: OrderNumber,
    placed_by_id: UserId,
    company: Option<String>,
    first_name: String,
    last_name: String,
    address: Address,
    currency: Currency,
    total_amount: Money,
    line_items: Vec<LineItem>,
    payment_method: Option<String>,
    payment_state: PaymentState,
    payment_state_updated_at: Option<DateTime<Utc>>,
    payment_state_updated_by_id: Option<UserId>,
    cancellation_reason: Option<String>,
    invoice_created_at: Option<DateTime<Utc>>,
    processing_required: bool,
    processed_at: Option<DateTime<Utc>>,
}

// Construction and mapping
impl Order {
    /// Builds a new open order from a cart.
    pub(crate) fn place(
        order_id: OrderId,
        created_at: DateTime<Utc>,
        storefront: &Storefront,
        order_number: OrderNumber,
        orderer: &Orderer,
        cart: &Cart,
    ) -> Result<Self, OrderError> {
        if cart.is_empty() {
            return Err(OrderError::EmptyCart);
        }

        let line_items: Vec<LineItem> = cart
            .items()
            .iter()
            .map(|item| LineItem::from_cart_item(order_id, &order_number, item))
            .collect();
        let processing_required = line_items.iter().any(LineItem::processing_required);

        Ok(Self {
            id: order_id,
            created_at,
            shop_id: storefront.shop_id.clone(),
            storefront_id: storefront.id.clone(),
            order_number,
            placed_by_id: orderer.user.id,
            company: orderer.company.clone(),
            first_name: orderer.first_name.clone(),
            last_name: orderer.last_name.clone(),
            address: orderer.address.clone(),
            currency: cart.currency(),
            total_amount: cart.calculate_total_amount(),
            line_items,
            payment_method: None,
            payment_state: PaymentState::Open,
            payment_state_updated_at: None,
            payment_state_updated_by_id: None,
            cancellation_reason: None,
            invoice_created_at: None,
            processing_required,
            processed_at: None,
        })
    }

    /// Builds the aggregate from its persistence records.
    pub fn from_records(stored: StoredOrder) -> Result<Self, OrderError> {
        let StoredOrder { order, line_items } = stored;

        let currency = Currency::parse(&order.currency)
            .map_err(|e| OrderError::InvalidRecord(e.to_string()))?;
        let payment_state = order
            .payment_state
            .parse()
            .map_err(OrderError::InvalidRecord)?;
        let line_items = line_items
            .into_iter()
            .map(|record| LineItem::from_record(record, currency))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            id: order.id,
            created_at: order.created_at,
            shop_id: order.shop_id,
            storefront_id: order.storefront_id,
            order_number: order.order_number,
            placed_by_id: order.placed_by_id,
            company: order.company,
            first_name: order.first_name,
            last_name: order.last_name,
            address: Address {
                country: order.country,
                zip_code: order.zip_code,
                city: order.city,
                street: order.street,
            },
            currency,
            total_amount: Money::from_cents(order.total_amount_cents, currency),
            line_items,
            payment_method: order.payment_method,
            payment_state,
            payment_state_updated_at: order.payment_state_updated_at,
            payment_state_updated_by_id: order.payment_state_updated_by_id,
            cancellation_reason: order.cancellation_reason,
            invoice_created_at: order.invoice_created_at,
            processing_required: order.processing_required,
            processed_at: order.processed_at,
        })
    }

    pub fn to_record(&self) -> OrderRecord {
        OrderRecord {
            id: self.id,
            created_at: self.created_at,
            shop_id: self.shop_id.clone(),
            storefront_id: self.storefront_id.clone(),
            order_number: self.order_number.clone(),
            placed_by_id: self.placed_by_id,
            company: self.company.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            country: self.address.country.clone(),
            zip_code: self.address.zip_code.clone(),
            city: self.address.city.clone(),
            street: self.address.street.clone(),
            currency: self.currency.code().to_string(),
            total_amount_cents: self.total_amount.cents(),
            payment_method: self.payment_method.clone(),
            payment_state: self.payment_state.as_str().to_string(),
            payment_state_updated_at: self.payment_state_updated_at,
            payment_state_updated_by_id: self.payment_state_updated_by_id,
            cancellation_reason: self.cancellation_reason.clone(),
            invoice_created_at: self.invoice_created_at,
            processing_required: self.processing_required,
            processed_at: self.processed_at,
        }
    }

    pub fn line_item_records(&self) -> Result<Vec<LineItemRecord>, OrderError> {
        self.line_items.iter().map(LineItem::to_record).collect()
    }
}

// Transitions
impl Order {
    /// Moves an open order to `Paid`, returning the former state.
    pub(crate) fn mark_as_paid(
        &mut self,
        payment_method: &str,
        initiator_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<PaymentState, OrderError> {
        if !self.payment_state.can_mark_as_paid() {
            let order_number = self.order_number.clone();
            return Err(if self.payment_state.is_canceled() {
                OrderError::AlreadyCanceled(order_number)
            } else {
                OrderError::AlreadyMarkedAsPaid(order_number)
            });
        }

        let former = self.payment_state;
        self.payment_state = PaymentState::Paid;
        self.payment_method = Some(payment_method.to_string());
        self.payment_state_updated_at = Some(now);
        self.payment_state_updated_by_id = Some(initiator_id);
        Ok(former)
    }

    /// Cancels the order, returning the former state.
    pub(crate) fn cancel(
        &mut self,
        reason: &str,
        initiator_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<PaymentState, OrderError> {
        if !self.payment_state.can_cancel() {
            return Err(OrderError::AlreadyCanceled(self.order_number.clone()));
        }

        let former = self.payment_state;
        self.payment_state = former.canceled_state();
        self.cancellation_reason = Some(reason.to_string());
        self.payment_state_updated_at = Some(now);
        self.payment_state_updated_by_id = Some(initiator_id);
        Ok(former)
    }

    pub(crate) fn set_invoiced(&mut self, now: DateTime<Utc>) {
        self.invoice_created_at = Some(now);
    }

    pub(crate) fn unset_invoiced(&mut self) {
        self.invoice_created_at = None;
    }

    pub(crate) fn set_shipped(&mut self, now: DateTime<Utc>) -> Result<(), OrderError> {
        self.ensure_processing_required()?;
        self.processed_at = Some(now);
        Ok(())
    }

    pub(crate) fn unset_shipped(&mut self) -> Result<(), OrderError> {
        self.ensure_processing_required()?;
        self.processed_at = None;
        Ok(())
    }

    fn ensure_processing_required(&self) -> Result<(), OrderError> {
        if !self.processing_required {
            return Err(OrderError::ProcessingNotRequired(self.order_number.clone()));
        }
        Ok(())
    }
}

// Query methods
impl Order {
    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn shop_id(&self) -> &ShopId {
        &self.shop_id
    }

    pub fn storefront_id(&self) -> &StorefrontId {
        &self.storefront_id
    }

    pub fn order_number(&self) -> &OrderNumber {
        &self.order_number
    }

    pub fn placed_by_id(&self) -> UserId {
        self.placed_by_id
    }

    pub fn company(&self) -> Option<&str> {
        self.company.as_deref()
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn line_items(&self) -> &[LineItem] {
        &self.line_items
    }

    pub fn payment_method(&self) -> Option<&str> {
        self.payment_method.as_deref()
    }

    pub fn payment_state(&self) -> PaymentState {
        self.payment_state
    }

    pub fn payment_state_updated_at(&self) -> Option<DateTime<Utc>> {
        self.payment_state_updated_at
    }

    pub fn payment_state_updated_by_id(&self) -> Option<UserId> {
        self.payment_state_updated_by_id
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
    }

    pub fn invoice_created_at(&self) -> Option<DateTime<Utc>> {
        self.invoice_created_at
    }

    pub fn processed_at(&self) -> Option<DateTime<Utc>> {
        self.processed_at
    }

    pub fn is_open(&self) -> bool {
        self.payment_state == PaymentState::Open
    }

    pub fn is_paid(&self) -> bool {
        self.payment_state == PaymentState::Paid
    }

    pub fn is_canceled(&self) -> bool {
        self.payment_state.is_canceled()
    }

    pub fn is_invoiced(&self) -> bool {
        self.invoice_created_at.is_some()
    }

    pub fn is_processing_required(&self) -> bool {
        self.processing_required
    }

    pub fn is_processed(&self) -> bool {
        self.processed_at.is_some()
    }

    /// Open and older than the threshold.
    pub fn is_overdue(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.is_open() && now - self.created_at > threshold
    }

    pub fn state(&self) -> OrderState {
        if self.is_canceled() {
            OrderState::Canceled
        } else if self.is_paid() && (!self.processing_required || self.is_processed()) {
            OrderState::Complete
        } else {
            OrderState::Open
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Product, ProductType, ProductTypeParams};
    use crate::user::User;
    use crate::order::LineItemProcessingState;
    use common::{OrderNumberSequenceId, ProductId, ProductNumber, TaxRate};

    fn product(product_type: ProductType, processing_required: bool) -> Product {
        Product {
            id: ProductId::new(),
            shop_id: ShopId::new("shop"),
            item_number: ProductNumber::new("P-001"),
            product_type,
            type_params: ProductTypeParams::default(),
            name: "Item".to_string(),
            price: Money::from_cents(1500, Currency::EUR),
            tax_rate: TaxRate::from_percent(19),
            processing_required,
        }
    }

    fn orderer() -> Orderer {
        Orderer {
            user: User::new(UserId::new(), "orderer"),
            company: None,
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            address: Address {
                country: "Germany".to_string(),
                zip_code: "31337".to_string(),
                city: "Example City".to_string(),
                street: "Example Street 1".to_string(),
            },
        }
    }

    fn storefront() -> Storefront {
        Storefront {
            id: StorefrontId::new("storefront"),
            shop_id: ShopId::new("shop"),
            order_number_sequence_id: OrderNumberSequenceId::new(),
        }
    }

    fn place(cart: &Cart) -> Result<Order, OrderError> {
        Order::place(
            OrderId::new(),
            Utc::now(),
            &storefront(),
            OrderNumber::new("ORDER-00001"),
            &orderer(),
            cart,
        )
    }

    fn placed_order(processing_required: bool) -> Order {
        let mut cart = Cart::new(Currency::EUR);
        cart.add_item(product(ProductType::Physical, processing_required), 2)
            .unwrap();
        place(&cart).unwrap()
    }

    #[test]
    fn test_place_order_snapshots_cart() {
        let order = placed_order(true);

        assert!(order.is_open());
        assert_eq!(order.state(), OrderState::Open);
        assert_eq!(order.total_amount().cents(), 3000);
        assert_eq!(order.line_items().len(), 1);
        assert_eq!(order.line_items()[0].quantity(), 2);
        assert!(order.is_processing_required());
        assert_eq!(order.first_name(), "Ada");
    }

    #[test]
    fn test_place_empty_cart_fails() {
        let result = place(&Cart::new(Currency::EUR));
        assert!(matches!(result, Err(OrderError::EmptyCart)));
    }

    #[test]
    fn test_mark_as_paid() {
        let mut order = placed_order(false);
        let initiator = UserId::new();

        let former = order.mark_as_paid("bank_transfer", initiator, Utc::now()).unwrap();

        assert_eq!(former, PaymentState::Open);
        assert!(order.is_paid());
        assert_eq!(order.payment_method(), Some("bank_transfer"));
        assert_eq!(order.payment_state_updated_by_id(), Some(initiator));
        assert_eq!(order.state(), OrderState::Complete);
    }

    #[test]
    fn test_mark_as_paid_twice_is_rejected_without_changes() {
        let mut order = placed_order(false);
        order.mark_as_paid("bank_transfer", UserId::new(), Utc::now()).unwrap();
        let snapshot = order.clone();

        let result = order.mark_as_paid("cash", UserId::new(), Utc::now());

        assert!(matches!(result, Err(OrderError::AlreadyMarkedAsPaid(_))));
        assert_eq!(order, snapshot);
    }

    #[test]
    fn test_mark_canceled_as_paid_is_rejected() {
        let mut order = placed_order(false);
        order.cancel("duplicate", UserId::new(), Utc::now()).unwrap();

        let result = order.mark_as_paid("cash", UserId::new(), Utc::now());
        assert!(matches!(result, Err(OrderError::AlreadyCanceled(_))));
        assert_eq!(order.payment_state(), PaymentState::CanceledBeforePaid);

        let mut refunded = placed_order(false);
        refunded.mark_as_paid("cash", UserId::new(), Utc::now()).unwrap();
        refunded.cancel("refund", UserId::new(), Utc::now()).unwrap();
        assert!(!refunded.payment_state().can_mark_as_paid());

        let result = refunded.mark_as_paid("cash", UserId::new(), Utc::now());
        assert!(matches!(result, Err(OrderError::AlreadyCanceled(_))));
        assert_eq!(refunded.payment_state(), PaymentState::CanceledAfterPaid);
    }

    #[test]
    fn test_cancel_before_and_after_paid() {
        let mut unpaid = placed_order(false);
        unpaid.cancel("duplicate", UserId::new(), Utc::now()).unwrap();
        assert_eq!(unpaid.payment_state(), PaymentState::CanceledBeforePaid);
        assert_eq!(unpaid.cancellation_reason(), Some("duplicate"));
        assert_eq!(unpaid.state(), OrderState::Canceled);

        let mut paid = placed_order(false);
        paid.mark_as_paid("cash", UserId::new(), Utc::now()).unwrap();
        let former = paid.cancel("refund", UserId::new(), Utc::now()).unwrap();
        assert_eq!(former, PaymentState::Paid);
        assert_eq!(paid.payment_state(), PaymentState::CanceledAfterPaid);
    }

    #[test]
    fn test_cancel_twice_is_rejected() {
        let mut order = placed_order(false);
        order.cancel("duplicate", UserId::new(), Utc::now()).unwrap();

        let result = order.cancel("again", UserId::new(), Utc::now());
        assert!(matches!(result, Err(OrderError::AlreadyCanceled(_))));
        assert_eq!(order.cancellation_reason(), Some("duplicate"));
    }

    #[test]
    fn test_paid_with_pending_processing_is_open() {
        let mut order = placed_order(true);
        order.mark_as_paid("cash", UserId::new(), Utc::now()).unwrap();
        assert_eq!(order.state(), OrderState::Open);
        assert_eq!(
            order.line_items()[0].processing_state(order.is_canceled()),
            LineItemProcessingState::Pending
        );

        order.set_shipped(Utc::now()).unwrap();
        assert_eq!(order.state(), OrderState::Complete);

        order.unset_shipped().unwrap();
        assert!(!order.is_processed());
    }

    #[test]
    fn test_shipped_flag_requires_processing() {
        let mut order = placed_order(false);
        assert!(matches!(
            order.set_shipped(Utc::now()),
            Err(OrderError::ProcessingNotRequired(_))
        ));
        assert!(matches!(
            order.unset_shipped(),
            Err(OrderError::ProcessingNotRequired(_))
        ));
    }

    #[test]
    fn test_invoiced_flag() {
        let mut order = placed_order(false);
        order.set_invoiced(Utc::now());
        assert!(order.is_invoiced());
        order.unset_invoiced();
        assert!(!order.is_invoiced());
    }

    #[test]
    fn test_overdue_only_when_open_and_old() {
        let mut order = placed_order(false);
        let threshold = Duration::days(14);
        let now = order.created_at();

        assert!(!order.is_overdue(now + Duration::days(14), threshold));
        assert!(order.is_overdue(now + Duration::days(15), threshold));

        order.mark_as_paid("cash", UserId::new(), now).unwrap();
        assert!(!order.is_overdue(now + Duration::days(15), threshold));
    }

    #[test]
    fn test_record_round_trip() {
        let mut order = placed_order(true);
        order.mark_as_paid("cash", UserId::new(), Utc::now()).unwrap();

        let stored = StoredOrder {
            order: order.to_record(),
            line_items: order.line_item_records().unwrap(),
        };
        assert_eq!(stored.order.payment_state, "paid");
        assert_eq!(stored.line_items[0].product_type, "physical");

        let restored = Order::from_records(stored).unwrap();
        assert_eq!(restored, order);
    }

    #[test]
    fn test_from_records_rejects_unknown_payment_state() {
        let order = placed_order(false);
        let mut record = order.to_record();
        record.payment_state = "refunded".to_string();

        let result = Order::from_records(StoredOrder {
            order: record,
            line_items: order.line_item_records().unwrap(),
        });
        assert!(matches!(result, Err(OrderError::InvalidRecord(_))));
    }
}
