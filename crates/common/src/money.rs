//! Monetary value objects.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An ISO 4217 currency code (e.g. `EUR`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency([u8; 3]);

/// Error returned when parsing an invalid currency code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid currency code: {0:?} (expected three upper-case ASCII letters)")]
pub struct ParseCurrencyError(pub String);

impl Currency {
    /// Euro.
    pub const EUR: Currency = Currency(*b"EUR");

    /// US dollar.
    pub const USD: Currency = Currency(*b"USD");

    /// Parses a three-letter currency code.
    pub fn parse(code: &str) -> Result<Self, ParseCurrencyError> {
        let bytes = code.as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(u8::is_ascii_uppercase) {
            return Err(ParseCurrencyError(code.to_string()));
        }
        Ok(Self([bytes[0], bytes[1], bytes[2]]))
    }

    /// Returns the currency code.
    pub fn code(&self) -> &str {
        // Only ever constructed from ASCII upper-case letters.
        std::str::from_utf8(&self.0).unwrap_or("???")
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for Currency {
    type Err = ParseCurrencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Currency {
    type Error = ParseCurrencyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.code().to_string()
    }
}

/// Error returned when combining amounts of different currencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Currency mismatch: {left} vs. {right}")]
pub struct CurrencyMismatch {
    pub left: Currency,
    pub right: Currency,
}

/// Money amount represented in minor units (cents) to avoid floating point issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    /// Amount in minor units (e.g., 1000 = 10.00 EUR)
    cents: i64,

    /// Currency of the amount.
    currency: Currency,
}

impl Money {
    /// Creates a new Money amount from minor units.
    pub fn from_cents(cents: i64, currency: Currency) -> Self {
        Self { cents, currency }
    }

    /// Returns zero money in the given currency.
    pub fn zero(currency: Currency) -> Self {
        Self { cents: 0, currency }
    }

    /// Returns the amount in minor units.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns the currency.
    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.cents > 0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.cents == 0
    }

    /// Adds another amount of the same currency.
    pub fn checked_add(&self, other: Money) -> Result<Money, CurrencyMismatch> {
        self.ensure_same_currency(other)?;
        Ok(Money {
            cents: self.cents + other.cents,
            currency: self.currency,
        })
    }

    /// Subtracts another amount of the same currency.
    pub fn checked_sub(&self, other: Money) -> Result<Money, CurrencyMismatch> {
        self.ensure_same_currency(other)?;
        Ok(Money {
            cents: self.cents - other.cents,
            currency: self.currency,
        })
    }

    /// Multiplies by a quantity, returning `None` on overflow.
    pub fn checked_multiply(&self, quantity: u32) -> Option<Money> {
        Some(Money {
            cents: self.cents.checked_mul(i64::from(quantity))?,
            currency: self.currency,
        })
    }

    fn ensure_same_currency(&self, other: Money) -> Result<(), CurrencyMismatch> {
        if self.currency != other.currency {
            return Err(CurrencyMismatch {
                left: self.currency,
                right: other.currency,
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.cents < 0 { "-" } else { "" };
        let abs = self.cents.abs();
        write!(f, "{sign}{}.{:02} {}", abs / 100, abs % 100, self.currency)
    }
}

/// A tax rate in basis points (1900 = 19%).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    pub fn from_basis_points(basis_points: u32) -> Self {
        Self(basis_points)
    }

    /// Creates a tax rate from whole percent.
    pub fn from_percent(percent: u32) -> Self {
        Self(percent * 100)
    }

    /// Returns the rate in basis points.
    pub fn basis_points(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for TaxRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}
