//! Shop configuration loaded from environment variables.

use chrono::Duration;

/// Default number of days after which an unpaid order counts as overdue.
pub const DEFAULT_OVERDUE_DAYS: i64 = 14;

/// Order lifecycle configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `SHOP_ORDER_OVERDUE_DAYS`: days before an open order is overdue (default: `14`)
#[derive(Debug, Clone)]
pub struct ShopConfig {
    pub overdue_threshold: Duration,
}

impl ShopConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let days = std::env::var("SHOP_ORDER_OVERDUE_DAYS")
            .ok()
            .and_then(|d| d.parse::<i64>().ok())
            .filter(|d| *d > 0)
            .unwrap_or(DEFAULT_OVERDUE_DAYS);

        Self {
            overdue_threshold: Duration::days(days),
        }
    }

    pub fn with_overdue_threshold(mut self, threshold: Duration) -> Self {
        self.overdue_threshold = threshold;
        self
    }
}

impl Default for ShopConfig {
    fn default() -> Self {
        Self {
            overdue_threshold: Duration::days(DEFAULT_OVERDUE_DAYS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = ShopConfig::default();
        assert_eq!(config.overdue_threshold, Duration::days(14));
    }

    #[test]
    fn test_with_overdue_threshold() {
        let config = ShopConfig::default().with_overdue_threshold(Duration::days(3));
        assert_eq!(config.overdue_threshold, Duration::days(3));
    }
}
