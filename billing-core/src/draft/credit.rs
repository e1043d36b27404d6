//! Advisory credit-limit check for credit sales.
//!
//! The check compares the client's projected debt against the limit of the
//! client's type. It reserves nothing remotely: another session invoicing the
//! same client concurrently is not accounted for.

use rust_decimal::Decimal;
use serde::Serialize;

/// Outcome of a credit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CreditDecision {
    /// Projected debt fits within the limit.
    Approved {
        limit: Decimal,
        current_debt: Decimal,
        projected_debt: Decimal,
        /// Credit left after this invoice
        available: Decimal,
    },

    /// Projected debt exceeds the limit by `shortfall`.
    Rejected {
        limit: Decimal,
        current_debt: Decimal,
        projected_debt: Decimal,
        shortfall: Decimal,
    },

    /// The client's type has no limit, or a limit of zero.
    NoLimitAssigned,
}

impl CreditDecision {
    pub fn is_approved(&self) -> bool {
        matches!(self, CreditDecision::Approved { .. })
    }

    /// User-facing explanation of the decision.
    pub fn message(&self) -> String {
        match self {
            CreditDecision::Approved { .. } => "Credit approved: the client still has credit available.".to_string(),
            CreditDecision::Rejected {
                limit,
                current_debt,
                projected_debt,
                ..
            } => format!(
                "Credit limit exceeded: current debt (${:.2}) + this invoice (${:.2}) exceeds the limit (${:.2}).",
                current_debt,
                projected_debt - current_debt,
                limit
            ),
            CreditDecision::NoLimitAssigned => {
                "This client has no credit limit assigned, or the limit is zero.".to_string()
            }
        }
    }
}

/// Evaluates whether `proposed_total` may be sold on credit.
///
/// # Arguments
///
/// * `limit` - Credit limit of the client's type, `None` when the type is unknown
/// * `current_debt` - Client's outstanding debt as reported by receivables
/// * `proposed_total` - Grand total of the invoice being drafted
///
/// # Returns
///
/// `Approved` iff `current_debt + proposed_total <= limit` for a positive
/// limit; `NoLimitAssigned` for a missing or non-positive limit; `Rejected`
/// with the shortfall otherwise.
pub fn check_credit_limit(
    limit: Option<Decimal>,
    current_debt: Decimal,
    proposed_total: Decimal,
) -> CreditDecision {
    let limit = match limit {
        Some(limit) if limit > Decimal::ZERO => limit,
        _ => return CreditDecision::NoLimitAssigned,
    };

    // A sum beyond the range of `Decimal` exceeds any limit.
    let projected_debt = current_debt.saturating_add(proposed_total);

    if projected_debt <= limit {
        CreditDecision::Approved {
            limit,
            current_debt,
            projected_debt,
            available: limit.saturating_sub(projected_debt),
        }
    } else {
        CreditDecision::Rejected {
            limit,
            current_debt,
            projected_debt,
            shortfall: projected_debt - limit,
        }
    }
}
