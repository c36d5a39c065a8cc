//! Promo definitions
//!
//! A promo is a discount definition with an optional active window. Its
//! lifecycle status is derived from the clock and the `is_active` flag and is
//! never stored.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::money::{Money, MoneyError, MINOR_UNITS};

/// Storage representation of the discount kind (`promos.promo_type`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromoType {
    Percentage,
    FixedAmount,
}

impl PromoType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromoType::Percentage => "percentage",
            PromoType::FixedAmount => "fixed_amount",
        }
    }
}

impl fmt::Display for PromoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PromoType {
    type Err = PromoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percentage" => Ok(PromoType::Percentage),
            "fixed_amount" => Ok(PromoType::FixedAmount),
            other => Err(PromoError::UnknownType(other.to_string())),
        }
    }
}

/// A percentage in the closed range [0, 100] with at most 2 decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Percentage(Decimal);

impl Percentage {
    pub fn new(value: Decimal) -> Result<Self, PromoError> {
        if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
            return Err(PromoError::PercentageOutOfRange(value));
        }
        if value.normalize().scale() > MINOR_UNITS {
            return Err(PromoError::PercentageOutOfRange(value));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// The percentage as a fraction of one (12 → 0.12).
    pub fn as_fraction(&self) -> Decimal {
        self.0 / Decimal::ONE_HUNDRED
    }
}

/// The discount a promo grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discount {
    /// Share of the subtotal
    Percentage(Percentage),
    /// Flat amount off the subtotal
    FixedAmount(Money),
}

impl Discount {
    /// Build a discount from its stored `(promo_type, value)` pair.
    pub fn from_parts(promo_type: PromoType, value: Decimal) -> Result<Self, PromoError> {
        match promo_type {
            PromoType::Percentage => Ok(Discount::Percentage(Percentage::new(value)?)),
            PromoType::FixedAmount => Ok(Discount::FixedAmount(Money::new(value)?)),
        }
    }

    pub fn promo_type(&self) -> PromoType {
        match self {
            Discount::Percentage(_) => PromoType::Percentage,
            Discount::FixedAmount(_) => PromoType::FixedAmount,
        }
    }

    pub fn value(&self) -> Decimal {
        match self {
            Discount::Percentage(p) => p.value(),
            Discount::FixedAmount(m) => m.value(),
        }
    }
}

/// Derived lifecycle status of a promo at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromoStatus {
    /// Start date still in the future
    Scheduled,
    /// Inside its window and switched on
    Active,
    /// Switched off by an admin
    Inactive,
    /// End date has passed
    Expired,
}

/// Promo definition
#[derive(Debug, Clone, PartialEq)]
pub struct Promo {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub discount: Discount,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_by: Option<Uuid>,
}

impl Promo {
    pub fn has_expired(&self, now: DateTime<Utc>) -> bool {
        self.end_date.is_some_and(|end| now > end)
    }

    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        self.start_date.map_or(true, |start| now >= start)
    }

    /// Status at `now`. Expiry and deactivation take precedence over the window start.
    pub fn status(&self, now: DateTime<Utc>) -> PromoStatus {
        if self.has_expired(now) {
            PromoStatus::Expired
        } else if !self.is_active {
            PromoStatus::Inactive
        } else if !self.has_started(now) {
            PromoStatus::Scheduled
        } else {
            PromoStatus::Active
        }
    }
}

/// Record making a promo available to one customer, usable once
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoAssignment {
    pub id: Uuid,
    pub promo_id: Uuid,
    pub customer_id: Uuid,
    pub is_used: bool,
    pub assigned_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

/// Errors raised while building promo values
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PromoError {
    #[error("Unknown promo type: {0}")]
    UnknownType(String),

    #[error("Percentage must be between 0 and 100 with at most 2 decimals (got {0})")]
    PercentageOutOfRange(Decimal),

    #[error("Invalid fixed amount: {0}")]
    InvalidAmount(#[from] MoneyError),
}
