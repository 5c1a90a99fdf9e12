//! Ticket code generation limits loaded from environment variables.

/// Default number of tries per ticket code.
pub const DEFAULT_MAX_CODE_ATTEMPTS: u32 = 4;

/// Default number of tries per batch of ticket codes.
pub const DEFAULT_MAX_BATCH_ATTEMPTS: u32 = 5;

/// Retry limits for ticket code generation.
///
/// Reads from environment variables:
/// - `TICKET_CODE_MAX_ATTEMPTS`: tries per code within a batch (default: `4`)
/// - `TICKET_CODE_MAX_BATCH_ATTEMPTS`: tries per batch (default: `5`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TicketCodeConfig {
    pub max_code_attempts: u32,
    pub max_batch_attempts: u32,
}

impl TicketCodeConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            max_code_attempts: env_attempts("TICKET_CODE_MAX_ATTEMPTS", DEFAULT_MAX_CODE_ATTEMPTS),
            max_batch_attempts: env_attempts(
                "TICKET_CODE_MAX_BATCH_ATTEMPTS",
                DEFAULT_MAX_BATCH_ATTEMPTS,
            ),
        }
    }
}

impl Default for TicketCodeConfig {
    fn default() -> Self {
        Self {
            max_code_attempts: DEFAULT_MAX_CODE_ATTEMPTS,
            max_batch_attempts: DEFAULT_MAX_BATCH_ATTEMPTS,
        }
    }
}

fn env_attempts(name: &str, default: u32) -> u32 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TicketCodeConfig::default();
        assert_eq!(config.max_code_attempts, 4);
        assert_eq!(config.max_batch_attempts, 5);
    }

    #[test]
    fn test_from_env_without_variables_uses_defaults() {
        // Variables are not set in the test environment.
        if std::env::var("TICKET_CODE_MAX_ATTEMPTS").is_err()
            && std::env::var("TICKET_CODE_MAX_BATCH_ATTEMPTS").is_err()
        {
            assert_eq!(TicketCodeConfig::from_env(), TicketCodeConfig::default());
        }
    }
}
