//! Promo Eligibility
//!
//! Decides whether a promo may be applied for a customer at a given instant.
//! The assignment record is passed in, so the decision needs no database.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::promo::{Promo, PromoAssignment};

/// Why a promo cannot be applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IneligibleReason {
    Expired,
    Inactive,
    NotStarted,
    NotAssigned,
    AlreadyUsed,
}

impl IneligibleReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            IneligibleReason::Expired => "expired",
            IneligibleReason::Inactive => "inactive",
            IneligibleReason::NotStarted => "not_started",
            IneligibleReason::NotAssigned => "not_assigned",
            IneligibleReason::AlreadyUsed => "already_used",
        }
    }
}

impl fmt::Display for IneligibleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of an eligibility check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    /// The promo can be applied by consuming this assignment
    Eligible { assignment_id: Uuid },
    Ineligible(IneligibleReason),
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Eligibility::Eligible { .. })
    }
}

/// Evaluate a promo for a customer.
///
/// Checks run in a fixed order and the first blocking condition wins:
/// store-wide state (expired, inactive, not started) before the
/// customer-specific assignment state (not assigned, already used).
/// An assignment belonging to another customer or promo counts as missing.
pub fn evaluate(
    promo: &Promo,
    assignment: Option<&PromoAssignment>,
    customer_id: Uuid,
    now: DateTime<Utc>,
) -> Eligibility {
    if promo.has_expired(now) {
        return Eligibility::Ineligible(IneligibleReason::Expired);
    }

    if !promo.is_active {
        return Eligibility::Ineligible(IneligibleReason::Inactive);
    }

    if !promo.has_started(now) {
        return Eligibility::Ineligible(IneligibleReason::NotStarted);
    }

    let assignment = match assignment {
        Some(a) if a.promo_id == promo.id && a.customer_id == customer_id => a,
        _ => return Eligibility::Ineligible(IneligibleReason::NotAssigned),
    };

    if assignment.is_used {
        return Eligibility::Ineligible(IneligibleReason::AlreadyUsed);
    }

    Eligibility::Eligible {
        assignment_id: assignment.id,
    }
}
