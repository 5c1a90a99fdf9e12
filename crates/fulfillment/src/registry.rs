//! Registry of fulfillment actions per product.

use std::sync::Arc;

use common::ProductId;
use parking_lot::RwLock;

use crate::action::{ActionId, FulfillmentAction, RegisteredAction};

/// Explicitly constructed registry, shared with the executor.
///
/// Clones share the same underlying registrations.
#[derive(Debug, Clone, Default)]
pub struct ActionRegistry {
    actions: Arc<RwLock<Vec<RegisteredAction>>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds an action to a product and returns its id.
    pub fn register(&self, product_id: ProductId, action: FulfillmentAction) -> ActionId {
        let registered = RegisteredAction {
            id: ActionId::new(),
            product_id,
            action,
        };
        let id = registered.id;
        tracing::debug!(%product_id, %action, action_id = %id, "Registered fulfillment action");
        self.actions.write().push(registered);
        id
    }

    /// Removes a single action. Returns `false` if it was not registered.
    pub fn unregister(&self, action_id: ActionId) -> bool {
        let mut actions = self.actions.write();
        let before = actions.len();
        actions.retain(|a| a.id != action_id);
        actions.len() != before
    }

    /// Removes every action bound to a product, returning how many were removed.
    pub fn remove_actions_for_product(&self, product_id: ProductId) -> usize {
        let mut actions = self.actions.write();
        let before = actions.len();
        actions.retain(|a| a.product_id != product_id);
        before - actions.len()
    }

    pub fn find(&self, action_id: ActionId) -> Option<RegisteredAction> {
        self.actions
            .read()
            .iter()
            .find(|a| a.id == action_id)
            .cloned()
    }

    /// Returns the product's actions in registration order.
    pub fn actions_for_product(&self, product_id: ProductId) -> Vec<RegisteredAction> {
        self.actions
            .read()
            .iter()
            .filter(|a| a.product_id == product_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.actions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{BadgeId, TicketCategoryId};

    #[test]
    fn test_register_and_find() {
        let registry = ActionRegistry::new();
        let product_id = ProductId::new();
        let action = FulfillmentAction::AwardBadge {
            badge_id: BadgeId::new(),
        };

        let id = registry.register(product_id, action);

        let found = registry.find(id).unwrap();
        assert_eq!(found.product_id, product_id);
        assert_eq!(found.action, action);
    }

    #[test]
    fn test_actions_for_product_keeps_registration_order() {
        let registry = ActionRegistry::new();
        let product_id = ProductId::new();
        let tickets = FulfillmentAction::CreateTickets {
            ticket_category_id: TicketCategoryId::new(),
        };
        let badge = FulfillmentAction::AwardBadge {
            badge_id: BadgeId::new(),
        };
        registry.register(product_id, tickets);
        registry.register(ProductId::new(), badge);
        registry.register(product_id, badge);

        let actions: Vec<_> = registry
            .actions_for_product(product_id)
            .into_iter()
            .map(|a| a.action)
            .collect();
        assert_eq!(actions, [tickets, badge]);
    }

    #[test]
    fn test_unregister() {
        let registry = ActionRegistry::new();
        let id = registry.register(
            ProductId::new(),
            FulfillmentAction::AwardBadge {
                badge_id: BadgeId::new(),
            },
        );

        assert!(registry.unregister(id));
        assert!(!registry.unregister(id));
        assert!(registry.find(id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_actions_for_product() {
        let registry = ActionRegistry::new();
        let product_id = ProductId::new();
        let other_product_id = ProductId::new();
        let badge = FulfillmentAction::AwardBadge {
            badge_id: BadgeId::new(),
        };
        registry.register(product_id, badge);
        registry.register(product_id, badge);
        registry.register(other_product_id, badge);

        assert_eq!(registry.remove_actions_for_product(product_id), 2);
        assert!(registry.actions_for_product(product_id).is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_clones_share_registrations() {
        let registry = ActionRegistry::new();
        let shared = registry.clone();
        registry.register(
            ProductId::new(),
            FulfillmentAction::AwardBadge {
                badge_id: BadgeId::new(),
            },
        );
        assert_eq!(shared.len(), 1);
    }
}
