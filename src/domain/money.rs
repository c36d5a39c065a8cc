//! Money type
//!
//! Domain primitive for currency amounts stored as fixed-point decimals.
//! All amounts are validated at construction time, so a negative price or a
//! value with sub-minor-unit precision cannot exist in the system.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Minor-unit precision used for every stored amount (matches `NUMERIC(14, 2)`).
pub const MINOR_UNITS: u32 = 2;

/// Largest amount a single price or purchase may carry (fits `NUMERIC(14, 2)`).
const MAX_AMOUNT: &str = "999999999999.99";

fn max_amount() -> Decimal {
    Decimal::new(99_999_999_999_999, MINOR_UNITS)
}

/// Money represents a validated, non-negative currency amount.
///
/// # Invariants
/// - Value is never negative
/// - At most 2 decimal places, always stored with scale 2
/// - Value never exceeds `999999999999.99`
///
/// # Example
/// ```
/// use rust_decimal::Decimal;
/// use crm_engine::domain::Money;
///
/// let price = Money::new(Decimal::new(100_000, 0)).unwrap();
/// assert_eq!(price.to_string(), "100000.00");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Money(Decimal);

/// Errors that can occur when creating or combining Money values
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    #[error("Amount must not be negative (got {0})")]
    Negative(Decimal),

    #[error("Amount has too many decimal places (max {MINOR_UNITS}, got {0})")]
    TooManyDecimals(u32),

    #[error("Amount exceeds maximum allowed value ({MAX_AMOUNT})")]
    Overflow,

    #[error("Invalid amount format: {0}")]
    ParseError(String),
}

impl Money {
    /// Create a new Money value with validation.
    ///
    /// # Errors
    /// - `MoneyError::Negative` if value < 0
    /// - `MoneyError::TooManyDecimals` if more than 2 significant decimal places
    /// - `MoneyError::Overflow` if value exceeds the column range
    pub fn new(value: Decimal) -> Result<Self, MoneyError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(MoneyError::Negative(value));
        }

        let normalized = value.normalize();
        if normalized.scale() > MINOR_UNITS {
            return Err(MoneyError::TooManyDecimals(normalized.scale()));
        }

        if value > max_amount() {
            return Err(MoneyError::Overflow);
        }

        Ok(Self::rescaled(value))
    }

    /// Create a Money value by rounding to minor units first
    /// (midpoint away from zero, the usual commercial rounding).
    pub fn from_decimal_rounded(value: Decimal) -> Result<Self, MoneyError> {
        Self::new(value.round_dp_with_strategy(MINOR_UNITS, RoundingStrategy::MidpointAwayFromZero))
    }

    /// Create Money from a whole number of major units.
    pub fn from_major(value: i64) -> Result<Self, MoneyError> {
        Self::new(Decimal::from(value))
    }

    pub fn zero() -> Self {
        Self::rescaled(Decimal::ZERO)
    }

    /// Get the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Multiply by a unit count, failing if the result leaves the valid range.
    pub fn checked_mul(&self, units: i64) -> Result<Money, MoneyError> {
        let product = self
            .0
            .checked_mul(Decimal::from(units))
            .ok_or(MoneyError::Overflow)?;
        Money::new(product)
    }

    /// Subtract, failing if the result would be negative.
    pub fn checked_sub(&self, other: &Money) -> Result<Money, MoneyError> {
        Money::new(self.0 - other.0)
    }

    fn rescaled(value: Decimal) -> Self {
        let mut value = value;
        value.rescale(MINOR_UNITS);
        Self(value)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal = Decimal::from_str(s).map_err(|e| MoneyError::ParseError(e.to_string()))?;
        Money::new(decimal)
    }
}

impl TryFrom<String> for Money {
    type Error = MoneyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Money::from_str(&value)
    }
}

impl TryFrom<Decimal> for Money {
    type Error = MoneyError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Money::new(value)
    }
}

impl From<Money> for String {
    fn from(money: Money) -> Self {
        money.to_string()
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}
