//! Commission base derivation.

use rust_decimal::Decimal;
use uuid::Uuid;

use service_core::error::AppError;

use super::store::CommissionStore;

/// The base a user's commission is computed against, and how much of it has
/// already been attributed to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseAmounts {
    /// Total of the lead's latest non-deleted invoice; zero when no invoice
    /// exists yet.
    pub invoice_total: Decimal,
    /// Sum of `base_amount` already recorded for this user on this lead.
    pub already_commissioned: Decimal,
    /// The unattributed remainder, clamped at zero. Invoice totals can
    /// shrink, but attributed commission is not clawed back.
    pub delta: Decimal,
}

/// Derive the delta base amount for (lead, user).
pub async fn base_amounts(
    store: &dyn CommissionStore,
    company_id: Uuid,
    lead_id: Uuid,
    user_id: Uuid,
) -> Result<BaseAmounts, AppError> {
    let invoice_total = store
        .latest_invoice_total(company_id, lead_id)
        .await?
        .unwrap_or(Decimal::ZERO);
    let already_commissioned = store
        .sum_commission_base(company_id, lead_id, user_id)
        .await?;
    let delta = (invoice_total - already_commissioned).max(Decimal::ZERO);

    Ok(BaseAmounts {
        invoice_total,
        already_commissioned,
        delta,
    })
}
