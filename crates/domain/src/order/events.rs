//! Shop order domain events.

use chrono::{DateTime, Utc};
use common::{OrderId, OrderNumber, UserId};
use serde::{Deserialize, Serialize};

use crate::user::User;

/// A user as referenced by an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventUser {
    pub id: UserId,
    pub screen_name: Option<String>,
}

impl From<&User> for EventUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            screen_name: user.screen_name.clone(),
        }
    }
}

/// Emitted after an order was placed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopOrderPlaced {
    pub occurred_at: DateTime<Utc>,
    pub initiator: EventUser,
    pub order_id: OrderId,
    pub order_number: OrderNumber,
    pub orderer: EventUser,
}

/// Emitted after an order was marked as paid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopOrderPaid {
    pub occurred_at: DateTime<Utc>,
    pub initiator: EventUser,
    pub order_id: OrderId,
    pub order_number: OrderNumber,
    pub orderer: EventUser,
    pub payment_method: String,
}

/// Emitted after an order was canceled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopOrderCanceled {
    pub occurred_at: DateTime<Utc>,
    pub initiator: EventUser,
    pub order_id: OrderId,
    pub order_number: OrderNumber,
    pub orderer: EventUser,
}

/// Any shop order event, for fan-out to announcement collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ShopOrderEvent {
    Placed(ShopOrderPlaced),
    Paid(ShopOrderPaid),
    Canceled(ShopOrderCanceled),
}

impl ShopOrderEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ShopOrderEvent::Placed(_) => "shop-order-placed",
            ShopOrderEvent::Paid(_) => "shop-order-paid",
            ShopOrderEvent::Canceled(_) => "shop-order-canceled",
        }
    }

    pub fn order_id(&self) -> OrderId {
        match self {
            ShopOrderEvent::Placed(e) => e.order_id,
            ShopOrderEvent::Paid(e) => e.order_id,
            ShopOrderEvent::Canceled(e) => e.order_id,
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ShopOrderEvent::Placed(e) => e.occurred_at,
            ShopOrderEvent::Paid(e) => e.occurred_at,
            ShopOrderEvent::Canceled(e) => e.occurred_at,
        }
    }
}

impl From<ShopOrderPlaced> for ShopOrderEvent {
    fn from(event: ShopOrderPlaced) -> Self {
        ShopOrderEvent::Placed(event)
    }
}

impl From<ShopOrderPaid> for ShopOrderEvent {
    fn from(event: ShopOrderPaid) -> Self {
        ShopOrderEvent::Paid(event)
    }
}

impl From<ShopOrderCanceled> for ShopOrderEvent {
    fn from(event: ShopOrderCanceled) -> Self {
        ShopOrderEvent::Canceled(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let user = EventUser {
            id: UserId::new(),
            screen_name: Some("orderer".to_string()),
        };
        let event: ShopOrderEvent = ShopOrderPaid {
            occurred_at: Utc::now(),
            initiator: user.clone(),
            order_id: OrderId::new(),
            order_number: OrderNumber::new("ORDER-00001"),
            orderer: user,
            payment_method: "bank_transfer".to_string(),
        }
        .into();

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Paid");
        assert_eq!(json["data"]["payment_method"], "bank_transfer");

        let deserialized: ShopOrderEvent = serde_json::from_value(json).unwrap();
        assert_eq!(deserialized, event);
        assert_eq!(deserialized.event_type(), "shop-order-paid");
    }
}
