//! Fulfillment actions that can be registered for a product.

use common::{BadgeId, ProductId, TicketCategoryId};
use serde::{Deserialize, Serialize};

common::uuid_id!(
    /// Unique identifier for a registered fulfillment action.
    ActionId
);

/// A side effect to run when a line item for a product is paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FulfillmentAction {
    /// Award a badge to the orderer, once per line item.
    AwardBadge { badge_id: BadgeId },

    /// Create one ticket per purchased unit.
    CreateTickets { ticket_category_id: TicketCategoryId },

    /// Create one bundle of `ticket_quantity` tickets per purchased unit.
    CreateTicketBundles {
        ticket_category_id: TicketCategoryId,
        ticket_quantity: u32,
    },
}

impl FulfillmentAction {
    pub fn name(&self) -> &'static str {
        match self {
            FulfillmentAction::AwardBadge { .. } => "award_badge",
            FulfillmentAction::CreateTickets { .. } => "create_tickets",
            FulfillmentAction::CreateTicketBundles { .. } => "create_ticket_bundles",
        }
    }
}

impl std::fmt::Display for FulfillmentAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// An action bound to a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredAction {
    pub id: ActionId,
    pub product_id: ProductId,
    pub action: FulfillmentAction,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_serializes_with_kind_tag() {
        let badge_id = BadgeId::new();
        let json = serde_json::to_value(FulfillmentAction::AwardBadge { badge_id }).unwrap();

        assert_eq!(json["kind"], "award_badge");
        assert_eq!(json["badge_id"], serde_json::json!(badge_id));
    }

    #[test]
    fn action_names() {
        let action = FulfillmentAction::CreateTicketBundles {
            ticket_category_id: TicketCategoryId::new(),
            ticket_quantity: 4,
        };
        assert_eq!(action.to_string(), "create_ticket_bundles");
    }
}
