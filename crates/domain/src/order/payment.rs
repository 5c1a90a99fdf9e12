use chrono::{DateTime, Utc};
use common::{Currency, Money, OrderId, PaymentId};
use order_store::PaymentRecord;
use serde_json::{Map, Value};

use super::OrderError;

/// A payment recorded when an order is marked as paid.
#[derive(Debug, Clone, PartialEq)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub created_at: DateTime<Utc>,
    pub method: String,
    pub amount: Money,
    pub additional_data: Map<String, Value>,
}

impl Payment {
    pub(crate) fn new(
        order_id: OrderId,
        created_at: DateTime<Utc>,
        method: &str,
        amount: Money,
        additional_data: Map<String, Value>,
    ) -> Self {
        Self {
            id: PaymentId::new(),
            order_id,
            created_at,
            method: method.to_string(),
            amount,
            additional_data,
        }
    }

    pub fn from_record(record: PaymentRecord) -> Result<Self, OrderError> {
        let currency = Currency::parse(&record.currency)
            .map_err(|e| OrderError::InvalidRecord(e.to_string()))?;
        let additional_data = match record.additional_data {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(OrderError::InvalidRecord(format!(
                    "Payment {} has non-object data: {other}",
                    record.id
                )));
            }
        };

        Ok(Self {
            id: record.id,
            order_id: record.order_id,
            created_at: record.created_at,
            method: record.method,
            amount: Money::from_cents(record.amount_cents, currency),
            additional_data,
        })
    }

    pub fn to_record(&self) -> PaymentRecord {
        PaymentRecord {
            id: self.id,
            order_id: self.order_id,
            created_at: self.created_at,
            method: self.method.clone(),
            amount_cents: self.amount.cents(),
            currency: self.amount.currency().code().to_string(),
            additional_data: Value::Object(self.additional_data.clone()),
        }
    }
}
