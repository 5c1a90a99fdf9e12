//! Badge service trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{BadgeAwardingId, BadgeId, UserId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{FulfillmentError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badge {
    pub id: BadgeId,
    pub slug: String,
    pub label: String,
}

impl Badge {
    pub fn new(slug: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: BadgeId::new(),
            slug: slug.into(),
            label: label.into(),
        }
    }
}

/// Record of a badge being awarded to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeAwarding {
    pub id: BadgeAwardingId,
    pub badge_id: BadgeId,
    pub awardee_id: UserId,
    pub awarded_at: DateTime<Utc>,
}

/// Trait for awarding user badges.
#[async_trait]
pub trait BadgeService: Send + Sync {
    async fn award_badge(&self, badge_id: BadgeId, awardee_id: UserId) -> Result<BadgeAwarding>;
}

#[derive(Debug, Default)]
struct BadgeState {
    badges: HashMap<BadgeId, Badge>,
    awardings: Vec<BadgeAwarding>,
}

/// In-memory badge service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBadgeService {
    state: Arc<RwLock<BadgeState>>,
}

impl InMemoryBadgeService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_badge(&self, badge: Badge) {
        self.state.write().badges.insert(badge.id, badge);
    }

    pub fn awardings_for_user(&self, user_id: UserId) -> Vec<BadgeAwarding> {
        self.state
            .read()
            .awardings
            .iter()
            .filter(|a| a.awardee_id == user_id)
            .cloned()
            .collect()
    }

    pub fn awarding_count(&self) -> usize {
        self.state.read().awardings.len()
    }
}

#[async_trait]
impl BadgeService for InMemoryBadgeService {
    async fn award_badge(&self, badge_id: BadgeId, awardee_id: UserId) -> Result<BadgeAwarding> {
        let mut state = self.state.write();
        if !state.badges.contains_key(&badge_id) {
            return Err(FulfillmentError::BadgeNotFound(badge_id));
        }

        let awarding = BadgeAwarding {
            id: BadgeAwardingId::new(),
            badge_id,
            awardee_id,
            awarded_at: Utc::now(),
        };
        state.awardings.push(awarding.clone());
        Ok(awarding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_award_badge() {
        let service = InMemoryBadgeService::new();
        let badge = Badge::new("supporter", "Supporter");
        service.add_badge(badge.clone());
        let user_id = UserId::new();

        let awarding = service.award_badge(badge.id, user_id).await.unwrap();

        assert_eq!(awarding.badge_id, badge.id);
        assert_eq!(service.awardings_for_user(user_id), vec![awarding]);
    }

    #[tokio::test]
    async fn test_award_unknown_badge() {
        let service = InMemoryBadgeService::new();
        let result = service.award_badge(BadgeId::new(), UserId::new()).await;

        assert!(matches!(result, Err(FulfillmentError::BadgeNotFound(_))));
        assert_eq!(service.awarding_count(), 0);
    }
}
