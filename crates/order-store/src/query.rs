use chrono::{DateTime, Utc};

use common::OrderId;

/// Builder for order log queries.
///
/// Entries are always returned oldest first.
#[derive(Debug, Clone, Default)]
pub struct LogQuery {
    /// Filter by order.
    pub order_id: Option<OrderId>,

    /// Filter by event types (any of these types).
    pub event_types: Option<Vec<String>>,

    /// Entries at or after this timestamp.
    pub from_timestamp: Option<DateTime<Utc>>,

    /// Entries at or before this timestamp.
    pub to_timestamp: Option<DateTime<Utc>>,

    pub limit: Option<usize>,

    pub offset: Option<usize>,
}

impl LogQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for a single order's log.
    pub fn for_order(order_id: OrderId) -> Self {
        Self {
            order_id: Some(order_id),
            ..Default::default()
        }
    }

    /// Creates a query for entries of one event type across all orders.
    pub fn for_event_type(event_type: impl Into<String>) -> Self {
        Self {
            event_types: Some(vec![event_type.into()]),
            ..Default::default()
        }
    }

    pub fn order_id(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_types = Some(vec![event_type.into()]);
        self
    }

    pub fn event_types(mut self, event_types: Vec<String>) -> Self {
        self.event_types = Some(event_types);
        self
    }

    pub fn from_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.from_timestamp = Some(timestamp);
        self
    }

    pub fn to_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.to_timestamp = Some(timestamp);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns true if the entry passes every filter except paging.
    pub fn matches(&self, order_id: OrderId, event_type: &str, occurred_at: DateTime<Utc>) -> bool {
        if self.order_id.is_some_and(|id| id != order_id) {
            return false;
        }
        if let Some(types) = &self.event_types
            && !types.iter().any(|t| t == event_type)
        {
            return false;
        }
        if self.from_timestamp.is_some_and(|from| occurred_at < from) {
            return false;
        }
        if self.to_timestamp.is_some_and(|to| occurred_at > to) {
            return false;
        }
        true
    }
}
