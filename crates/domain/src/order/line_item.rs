//! Order line items.

use chrono::{DateTime, Utc};
use common::{
    Currency, LineItemId, Money, OrderId, OrderNumber, ProductId, ProductNumber, TaxRate,
};
use order_store::LineItemRecord;
use serde_json::Value;

use crate::cart::CartItem;
use crate::catalog::ProductType;

use super::{LineItemProcessingState, OrderError};

/// A product snapshot within a placed order.
///
/// Everything except the processing result and processed-at is fixed at
/// placement.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItem {
    id: LineItemId,
    order_id: OrderId,
    order_number: OrderNumber,
    product_id: ProductId,
    product_number: ProductNumber,
    product_type: ProductType,
    name: String,
    unit_price: Money,
    tax_rate: TaxRate,
    quantity: u32,
    line_amount: Money,
    processing_required: bool,
    processing_result: Value,
    processed_at: Option<DateTime<Utc>>,
}

impl LineItem {
    pub(crate) fn from_cart_item(
        order_id: OrderId,
        order_number: &OrderNumber,
        item: &CartItem,
    ) -> Self {
        Self {
            id: LineItemId::new(),
            order_id,
            order_number: order_number.clone(),
            product_id: item.product.id,
            product_number: item.product.item_number.clone(),
            product_type: item.product.product_type,
            name: item.product.name.clone(),
            unit_price: item.product.price,
            tax_rate: item.product.tax_rate,
            quantity: item.quantity,
            line_amount: item.line_amount,
            processing_required: item.product.processing_required,
            processing_result: Value::Object(Default::default()),
            processed_at: None,
        }
    }

    /// Builds a line item from its persistence record.
    pub fn from_record(record: LineItemRecord, currency: Currency) -> Result<Self, OrderError> {
        let product_type = record
            .product_type
            .parse()
            .map_err(OrderError::InvalidRecord)?;
        let quantity = u32::try_from(record.quantity).map_err(|_| {
            OrderError::InvalidRecord(format!(
                "Line item {} has negative quantity {}",
                record.id, record.quantity
            ))
        })?;
        let tax_rate = u32::try_from(record.tax_rate_basis_points)
            .map(TaxRate::from_basis_points)
            .map_err(|_| {
                OrderError::InvalidRecord(format!(
                    "Line item {} has a negative tax rate",
                    record.id
                ))
            })?;

        Ok(Self {
            id: record.id,
            order_id: record.order_id,
            order_number: record.order_number,
            product_id: record.product_id,
            product_number: record.product_number,
            product_type,
            name: record.name,
            unit_price: Money::from_cents(record.unit_price_cents, currency),
            tax_rate,
            quantity,
            line_amount: Money::from_cents(record.line_amount_cents, currency),
            processing_required: record.processing_required,
            processing_result: record.processing_result,
            processed_at: record.processed_at,
        })
    }

    /// Maps the line item to its persistence record.
    ///
    /// Fails if the quantity or tax rate exceeds the stored integer range.
    pub fn to_record(&self) -> Result<LineItemRecord, OrderError> {
        let quantity =
            i32::try_from(self.quantity).map_err(|_| OrderError::QuantityOutOfRange {
                line_item_id: self.id,
                quantity: self.quantity,
            })?;
        let tax_rate_basis_points = i32::try_from(self.tax_rate.basis_points()).map_err(|_| {
            OrderError::InvalidRecord(format!("Line item {} has an oversized tax rate", self.id))
        })?;

        Ok(LineItemRecord {
            id: self.id,
            order_id: self.order_id,
            order_number: self.order_number.clone(),
            product_id: self.product_id,
            product_number: self.product_number.clone(),
            product_type: self.product_type.as_str().to_string(),
            name: self.name.clone(),
            unit_price_cents: self.unit_price.cents(),
            tax_rate_basis_points,
            quantity,
            line_amount_cents: self.line_amount.cents(),
            processing_required: self.processing_required,
            processing_result: self.processing_result.clone(),
            processed_at: self.processed_at,
        })
    }

    /// Derives the processing state; `order_canceled` reflects the owning
    /// order's payment state.
    pub fn processing_state(&self, order_canceled: bool) -> LineItemProcessingState {
        if !self.processing_required {
            LineItemProcessingState::NotApplicable
        } else if order_canceled {
            LineItemProcessingState::Canceled
        } else if self.processed_at.is_some() {
            LineItemProcessingState::Complete
        } else {
            LineItemProcessingState::Pending
        }
    }

    pub fn id(&self) -> LineItemId {
        self.id
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn order_number(&self) -> &OrderNumber {
        &self.order_number
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn product_number(&self) -> &ProductNumber {
        &self.product_number
    }

    pub fn product_type(&self) -> ProductType {
        self.product_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    pub fn tax_rate(&self) -> TaxRate {
        self.tax_rate
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn line_amount(&self) -> Money {
        self.line_amount
    }

    pub fn processing_required(&self) -> bool {
        self.processing_required
    }

    /// Free-form data written back by fulfillment (e.g. created ticket IDs).
    pub fn processing_result(&self) -> &Value {
        &self.processing_result
    }

    pub fn processed_at(&self) -> Option<DateTime<Utc>> {
        self.processed_at
    }
}
