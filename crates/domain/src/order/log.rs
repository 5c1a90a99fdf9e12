//! Append-only order log entries.

use chrono::{DateTime, Utc};
use common::{
    BadgeAwardingId, BadgeId, LogEntryId, OrderId, PaymentId, TicketBundleId, TicketCategoryId,
    TicketId, UserId,
};
use order_store::LogEntryRecord;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::{OrderError, PaymentState};

/// Kind of fact recorded in the order log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderLogEventType {
    OrderPlaced,
    OrderPaymentCreated,
    OrderPaid,
    OrderCanceledBeforePaid,
    OrderCanceledAfterPaid,
    OrderNoteAdded,
    OrderInvoiced,
    OrderInvoicedWithdrawn,
    OrderShipped,
    OrderShippedWithdrawn,
    TicketCreated,
    TicketRevoked,
    TicketBundleCreated,
    TicketBundleRevoked,
    BadgeAwarded,
}

impl OrderLogEventType {
    pub const ALL: [OrderLogEventType; 15] = [
        OrderLogEventType::OrderPlaced,
        OrderLogEventType::OrderPaymentCreated,
        OrderLogEventType::OrderPaid,
        OrderLogEventType::OrderCanceledBeforePaid,
        OrderLogEventType::OrderCanceledAfterPaid,
        OrderLogEventType::OrderNoteAdded,
        OrderLogEventType::OrderInvoiced,
        OrderLogEventType::OrderInvoicedWithdrawn,
        OrderLogEventType::OrderShipped,
        OrderLogEventType::OrderShippedWithdrawn,
        OrderLogEventType::TicketCreated,
        OrderLogEventType::TicketRevoked,
        OrderLogEventType::TicketBundleCreated,
        OrderLogEventType::TicketBundleRevoked,
        OrderLogEventType::BadgeAwarded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderLogEventType::OrderPlaced => "order-placed",
            OrderLogEventType::OrderPaymentCreated => "order-payment-created",
            OrderLogEventType::OrderPaid => "order-paid",
            OrderLogEventType::OrderCanceledBeforePaid => "order-canceled-before-paid",
            OrderLogEventType::OrderCanceledAfterPaid => "order-canceled-after-paid",
            OrderLogEventType::OrderNoteAdded => "order-note-added",
            OrderLogEventType::OrderInvoiced => "order-invoiced",
            OrderLogEventType::OrderInvoicedWithdrawn => "order-invoiced-withdrawn",
            OrderLogEventType::OrderShipped => "order-shipped",
            OrderLogEventType::OrderShippedWithdrawn => "order-shipped-withdrawn",
            OrderLogEventType::TicketCreated => "ticket-created",
            OrderLogEventType::TicketRevoked => "ticket-revoked",
            OrderLogEventType::TicketBundleCreated => "ticket-bundle-created",
            OrderLogEventType::TicketBundleRevoked => "ticket-bundle-revoked",
            OrderLogEventType::BadgeAwarded => "badge-awarded",
        }
    }
}

impl std::fmt::Display for OrderLogEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderLogEventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Unknown order log event type: {s}"))
    }
}

/// A single entry in an order's log.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderLogEntry {
    pub id: LogEntryId,
    pub occurred_at: DateTime<Utc>,
    pub event_type: OrderLogEventType,
    pub order_id: OrderId,
    pub data: Map<String, Value>,
}

impl OrderLogEntry {
    fn new(
        event_type: OrderLogEventType,
        order_id: OrderId,
        occurred_at: DateTime<Utc>,
        data: Value,
    ) -> Self {
        let data = match data {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            id: LogEntryId::new(),
            occurred_at,
            event_type,
            order_id,
            data,
        }
    }

    pub fn placed(order_id: OrderId, initiator_id: UserId, occurred_at: DateTime<Utc>) -> Self {
        Self::new(
            OrderLogEventType::OrderPlaced,
            order_id,
            occurred_at,
            json!({ "initiator_id": initiator_id }),
        )
    }

    pub fn payment_created(
        order_id: OrderId,
        payment_id: PaymentId,
        initiator_id: UserId,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self::new(
            OrderLogEventType::OrderPaymentCreated,
            order_id,
            occurred_at,
            json!({ "payment_id": payment_id, "initiator_id": initiator_id }),
        )
    }

    /// Gateway data is kept, but the lifecycle's own keys take precedence.
    pub fn paid(
        order_id: OrderId,
        former_payment_state: PaymentState,
        payment_method: &str,
        initiator_id: UserId,
        additional_data: Map<String, Value>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        let mut data = additional_data;
        data.insert(
            "former_payment_state".to_string(),
            json!(former_payment_state.as_str()),
        );
        data.insert("payment_method".to_string(), json!(payment_method));
        data.insert("initiator_id".to_string(), json!(initiator_id));

        Self::new(
            OrderLogEventType::OrderPaid,
            order_id,
            occurred_at,
            Value::Object(data),
        )
    }

    pub fn canceled(
        order_id: OrderId,
        former_payment_state: PaymentState,
        reason: &str,
        initiator_id: UserId,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        let event_type = if former_payment_state == PaymentState::Paid {
            OrderLogEventType::OrderCanceledAfterPaid
        } else {
            OrderLogEventType::OrderCanceledBeforePaid
        };
        Self::new(
            event_type,
            order_id,
            occurred_at,
            json!({
                "former_payment_state": former_payment_state.as_str(),
                "reason": reason,
                "initiator_id": initiator_id,
            }),
        )
    }

    pub fn note_added(
        order_id: OrderId,
        author_id: UserId,
        text: &str,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self::new(
            OrderLogEventType::OrderNoteAdded,
            order_id,
            occurred_at,
            json!({ "author_id": author_id, "text": text }),
        )
    }

    /// Invoiced and shipped flag changes only record who made them.
    pub fn flag_changed(
        event_type: OrderLogEventType,
        order_id: OrderId,
        initiator_id: UserId,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self::new(
            event_type,
            order_id,
            occurred_at,
            json!({ "initiator_id": initiator_id }),
        )
    }

    pub fn ticket_created(
        order_id: OrderId,
        ticket_id: TicketId,
        ticket_code: &str,
        ticket_category_id: TicketCategoryId,
        ticket_owner_id: UserId,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self::new(
            OrderLogEventType::TicketCreated,
            order_id,
            occurred_at,
            json!({
                "ticket_id": ticket_id,
                "ticket_code": ticket_code,
                "ticket_category_id": ticket_category_id,
                "ticket_owner_id": ticket_owner_id,
            }),
        )
    }

    pub fn ticket_revoked(
        order_id: OrderId,
        ticket_id: TicketId,
        ticket_code: &str,
        initiator_id: UserId,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self::new(
            OrderLogEventType::TicketRevoked,
            order_id,
            occurred_at,
            json!({
                "ticket_id": ticket_id,
                "ticket_code": ticket_code,
                "initiator_id": initiator_id,
            }),
        )
    }

    pub fn ticket_bundle_created(
        order_id: OrderId,
        ticket_bundle_id: TicketBundleId,
        ticket_category_id: TicketCategoryId,
        ticket_quantity: u32,
        owner_id: UserId,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self::new(
            OrderLogEventType::TicketBundleCreated,
            order_id,
            occurred_at,
            json!({
                "ticket_bundle_id": ticket_bundle_id,
                "ticket_bundle_category_id": ticket_category_id,
                "ticket_bundle_ticket_quantity": ticket_quantity,
                "ticket_bundle_owner_id": owner_id,
            }),
        )
    }

    pub fn ticket_bundle_revoked(
        order_id: OrderId,
        ticket_bundle_id: TicketBundleId,
        initiator_id: UserId,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self::new(
            OrderLogEventType::TicketBundleRevoked,
            order_id,
            occurred_at,
            json!({
                "ticket_bundle_id": ticket_bundle_id,
                "initiator_id": initiator_id,
            }),
        )
    }

    pub fn badge_awarded(
        order_id: OrderId,
        awarding_id: BadgeAwardingId,
        badge_id: BadgeId,
        awardee_id: UserId,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self::new(
            OrderLogEventType::BadgeAwarded,
            order_id,
            occurred_at,
            json!({
                "awarding_id": awarding_id,
                "badge_id": badge_id,
                "awardee_id": awardee_id,
            }),
        )
    }

    pub fn from_record(record: LogEntryRecord) -> Result<Self, OrderError> {
        let event_type = record
            .event_type
            .parse()
            .map_err(OrderError::InvalidRecord)?;
        let data = match record.data {
            Value::Object(map) => map,
            other => {
                return Err(OrderError::InvalidRecord(format!(
                    "Log entry {} has non-object data: {other}",
                    record.id
                )));
            }
        };

        Ok(Self {
            id: record.id,
            occurred_at: record.occurred_at,
            event_type,
            order_id: record.order_id,
            data,
        })
    }

    pub fn to_record(&self) -> LogEntryRecord {
        LogEntryRecord {
            id: self.id,
            occurred_at: self.occurred_at,
            event_type: self.event_type.as_str().to_string(),
            order_id: self.order_id,
            data: Value::Object(self.data.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_round_trips() {
        for event_type in OrderLogEventType::ALL {
            assert_eq!(event_type.as_str().parse::<OrderLogEventType>(), Ok(event_type));
            let json = serde_json::to_string(&event_type).unwrap();
            assert_eq!(json, format!("\"{}\"", event_type.as_str()));
        }
        assert!("order-refunded".parse::<OrderLogEventType>().is_err());
    }

    #[test]
    fn paid_entry_internal_keys_win() {
        let initiator_id = UserId::new();
        let mut gateway = Map::new();
        gateway.insert("payment_method".to_string(), json!("forged"));
        gateway.insert("transaction_id".to_string(), json!("tx-42"));

        let entry = OrderLogEntry::paid(
            OrderId::new(),
            PaymentState::Open,
            "bank_transfer",
            initiator_id,
            gateway,
            Utc::now(),
        );

        assert_eq!(entry.event_type, OrderLogEventType::OrderPaid);
        assert_eq!(entry.data["payment_method"], "bank_transfer");
        assert_eq!(entry.data["former_payment_state"], "open");
        assert_eq!(entry.data["transaction_id"], "tx-42");
        assert_eq!(entry.data["initiator_id"], json!(initiator_id));
    }

    #[test]
    fn canceled_entry_type_depends_on_former_state() {
        let order_id = OrderId::new();
        let user_id = UserId::new();
        let before =
            OrderLogEntry::canceled(order_id, PaymentState::Open, "dup", user_id, Utc::now());
        let after =
            OrderLogEntry::canceled(order_id, PaymentState::Paid, "dup", user_id, Utc::now());

        assert_eq!(before.event_type, OrderLogEventType::OrderCanceledBeforePaid);
        assert_eq!(after.event_type, OrderLogEventType::OrderCanceledAfterPaid);
        assert_eq!(after.data["reason"], "dup");
        assert_eq!(after.data["former_payment_state"], "paid");
    }

    #[test]
    fn record_mapping_rejects_unknown_types() {
        let entry = OrderLogEntry::placed(OrderId::new(), UserId::new(), Utc::now());
        let mut record = entry.to_record();
        assert_eq!(OrderLogEntry::from_record(record.clone()).unwrap(), entry);

        record.event_type = "something-else".to_string();
        assert!(matches!(
            OrderLogEntry::from_record(record),
            Err(OrderError::InvalidRecord(_))
        ));
    }
}
