//! Commission configuration resolution.
//!
//! A user's applicable rule is layered: an assigned plan wins over a
//! location-specific override, which wins over the role-based fields on the
//! user record. Absence of all three is a valid terminal state, not an error.

use rust_decimal::Decimal;

use crate::models::{AssignmentRole, CommissionPlan, CommissionType, LocationUser, PaidWhen, User};

/// Where the resolved rule came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Plan,
    Location,
    Role,
}

/// The commission rule that applies to one user in one role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommission {
    pub commission_type: CommissionType,
    pub commission_rate: Option<Decimal>,
    pub flat_amount: Option<Decimal>,
    pub paid_when: PaidWhen,
    pub source: ConfigSource,
}

/// Pre-fetched rows the resolver works over, so resolution itself touches no
/// storage.
#[derive(Debug, Clone, Copy)]
pub struct UserCommissionContext<'a> {
    pub user: &'a User,
    /// The user's plan, already filtered to active and non-deleted.
    pub plan: Option<&'a CommissionPlan>,
    /// The user's membership at the lead's location, if any.
    pub location_user: Option<&'a LocationUser>,
}

/// Resolve the commission rule for a user in a role. First match wins; a
/// matching layer with an unrecognized type tag resolves to no commission
/// rather than falling through, so nothing is ever paid under an unknown
/// rule.
pub fn resolve(ctx: &UserCommissionContext<'_>, role: AssignmentRole) -> Option<ResolvedCommission> {
    if let Some(plan) = ctx.plan {
        let commission_type = CommissionType::parse(&plan.commission_type)?;
        return Some(ResolvedCommission {
            commission_type,
            commission_rate: plan.commission_rate,
            flat_amount: plan.flat_amount,
            paid_when: PaidWhen::from_string(&plan.paid_when),
            source: ConfigSource::Plan,
        });
    }

    if let Some(lu) = ctx.location_user.filter(|lu| lu.commission_enabled) {
        let commission_type = CommissionType::parse(lu.commission_type.as_deref()?)?;
        return Some(ResolvedCommission {
            commission_type,
            commission_rate: lu.commission_rate,
            flat_amount: lu.flat_commission_amount,
            paid_when: lu
                .paid_when
                .as_deref()
                .map(PaidWhen::from_string)
                .unwrap_or(PaidWhen::FinalPayment),
            source: ConfigSource::Location,
        });
    }

    let rates = ctx.user.role_rates(role);
    let commission_type = CommissionType::parse(rates.commission_type?)?;
    Some(ResolvedCommission {
        commission_type,
        commission_rate: rates.commission_rate,
        flat_amount: rates.flat_amount,
        paid_when: PaidWhen::FinalPayment,
        source: ConfigSource::Role,
    })
}
