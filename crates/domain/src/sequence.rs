//! Order number sequences.

use common::{OrderNumber, OrderNumberSequenceId, ShopId};
use order_store::{OrderNumberSequenceRecord, OrderStore, StoreError};

use crate::error::DomainError;

/// A per-shop counter with the prefix used for its order numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderNumberSequence {
    pub id: OrderNumberSequenceId,
    pub shop_id: ShopId,
    pub prefix: String,
    pub value: i32,
}

impl From<OrderNumberSequenceRecord> for OrderNumberSequence {
    fn from(record: OrderNumberSequenceRecord) -> Self {
        Self {
            id: record.id,
            shop_id: record.shop_id,
            prefix: record.prefix,
            value: record.value,
        }
    }
}

/// Formats an order number as prefix plus zero-padded counter value.
pub fn format_order_number(prefix: &str, value: i32) -> OrderNumber {
    OrderNumber::new(format!("{prefix}{value:05}"))
}

/// Allocates order numbers.
///
/// Uniqueness comes from the store's atomic increment, not from locking here.
#[derive(Clone)]
pub struct OrderNumberSequenceService<S: OrderStore> {
    store: S,
}

impl<S: OrderStore> OrderNumberSequenceService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Registers a sequence starting at zero.
    #[tracing::instrument(skip(self))]
    pub async fn create_sequence(
        &self,
        shop_id: ShopId,
        prefix: &str,
    ) -> Result<OrderNumberSequence, DomainError> {
        let record = OrderNumberSequenceRecord {
            id: OrderNumberSequenceId::new(),
            shop_id,
            prefix: prefix.to_string(),
            value: 0,
        };
        self.store.create_order_number_sequence(record.clone()).await?;
        Ok(record.into())
    }

    pub async fn find_sequence(
        &self,
        sequence_id: OrderNumberSequenceId,
    ) -> Result<Option<OrderNumberSequence>, DomainError> {
        Ok(self
            .store
            .find_order_number_sequence(sequence_id)
            .await?
            .map(Into::into))
    }

    /// Increments the sequence and returns the formatted number.
    #[tracing::instrument(skip(self))]
    pub async fn generate_order_number(
        &self,
        sequence_id: OrderNumberSequenceId,
    ) -> Result<OrderNumber, DomainError> {
        let sequence = self
            .store
            .increment_order_number_sequence(sequence_id)
            .await
            .map_err(|e| match e {
                StoreError::SequenceNotFound(id) => DomainError::OrderNumberSequenceNotFound(id),
                other => DomainError::Store(other),
            })?;

        Ok(format_order_number(&sequence.prefix, sequence.value))
    }
}
