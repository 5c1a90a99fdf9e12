//! Order payment state machine and derived states.

use serde::{Deserialize, Serialize};

/// The payment state of an order.
///
/// State transitions:
/// ```text
/// Open ──┬──► Paid ──► CanceledAfterPaid
///        │
///        └──► CanceledBeforePaid
/// ```
/// An order never returns to `Open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    #[default]
    Open,
    Paid,
    CanceledBeforePaid,
    CanceledAfterPaid,
}

impl PaymentState {
    /// Returns true if the order can be marked as paid in this state.
    pub fn can_mark_as_paid(&self) -> bool {
        matches!(self, PaymentState::Open)
    }

    /// Returns true if the order can be canceled in this state.
    pub fn can_cancel(&self) -> bool {
        matches!(self, PaymentState::Open | PaymentState::Paid)
    }

    pub fn is_canceled(&self) -> bool {
        matches!(
            self,
            PaymentState::CanceledBeforePaid | PaymentState::CanceledAfterPaid
        )
    }

    /// The state an order moves to when canceled from this state.
    pub fn canceled_state(&self) -> PaymentState {
        match self {
            PaymentState::Paid | PaymentState::CanceledAfterPaid => PaymentState::CanceledAfterPaid,
            PaymentState::Open | PaymentState::CanceledBeforePaid => {
                PaymentState::CanceledBeforePaid
            }
        }
    }

    /// Returns the name under which the state is stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentState::Open => "open",
            PaymentState::Paid => "paid",
            PaymentState::CanceledBeforePaid => "canceled_before_paid",
            PaymentState::CanceledAfterPaid => "canceled_after_paid",
        }
    }
}

impl std::fmt::Display for PaymentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(PaymentState::Open),
            "paid" => Ok(PaymentState::Paid),
            "canceled_before_paid" => Ok(PaymentState::CanceledBeforePaid),
            "canceled_after_paid" => Ok(PaymentState::CanceledAfterPaid),
            other => Err(format!("Unknown payment state: {other}")),
        }
    }
}

/// Overall order state derived from payment and processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    Open,
    Canceled,
    Complete,
}

impl OrderState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderState::Open => "open",
            OrderState::Canceled => "canceled",
            OrderState::Complete => "complete",
        }
    }
}

impl std::fmt::Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Processing state of a single line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineItemProcessingState {
    NotApplicable,
    Pending,
    Complete,
    Canceled,
}
