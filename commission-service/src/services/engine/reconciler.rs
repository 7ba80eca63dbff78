//! Assignment reconciliation and override fan-out.

use anyhow::anyhow;
use rust_decimal::Decimal;
use tracing::instrument;
use uuid::Uuid;

use service_core::error::AppError;

use crate::models::{
    AssignmentRole, CommissionSlot, CommissionType, Lead, LeadCommission, LocationUser,
    NewLeadCommission, PaidWhen,
};

use super::base::base_amounts;
use super::calculator::calculate;
use super::resolver::{resolve, ResolvedCommission, UserCommissionContext};
use super::store::{CommissionAmounts, CommissionStore};

/// One reconciliation invocation: a (lead, role) slot and who now occupies it.
#[derive(Debug, Clone)]
pub struct ReconcileRequest {
    pub company_id: Uuid,
    pub lead_id: Uuid,
    /// `None` unassigns the slot and cancels outstanding commissions.
    pub user_id: Option<Uuid>,
    pub acting_user_id: Option<Uuid>,
    pub role: AssignmentRole,
    /// Suppress override fan-out and the cancellation of other users'
    /// commissions; used when re-running against a new invoice total.
    pub skip_cancel_others: bool,
}

/// Structured result of one reconciliation. Failures are reported here, not
/// raised: commission upkeep is a side effect of assignment and must never
/// fail the caller's primary action.
#[derive(Debug, Clone)]
pub struct AssignmentOutcome {
    pub slot: CommissionSlot,
    pub success: bool,
    pub message: String,
    pub commission: Option<LeadCommission>,
}

impl AssignmentOutcome {
    fn reconciled(slot: CommissionSlot, commission: LeadCommission) -> Self {
        Self {
            slot,
            success: true,
            message: format!("commission amount {}", commission.calculated_amount),
            commission: Some(commission),
        }
    }

    fn skipped(slot: CommissionSlot, message: impl Into<String>) -> Self {
        Self {
            slot,
            success: true,
            message: message.into(),
            commission: None,
        }
    }

    fn failed(slot: CommissionSlot, message: impl Into<String>) -> Self {
        Self {
            slot,
            success: false,
            message: message.into(),
            commission: None,
        }
    }
}

/// Reconcile the commission state of one role slot on a lead.
///
/// Every error is captured and converted into a failed [`AssignmentOutcome`];
/// this function does not return `Err`.
#[instrument(skip(store, req), fields(lead_id = %req.lead_id, slot = req.role.as_str()))]
pub async fn reconcile_assignment(
    store: &dyn CommissionStore,
    req: ReconcileRequest,
) -> AssignmentOutcome {
    let slot = req.role.slot();
    match reconcile_inner(store, &req).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(
                error = %e,
                lead_id = %req.lead_id,
                slot = req.role.as_str(),
                "Commission reconciliation failed"
            );
            AssignmentOutcome::failed(slot, e.to_string())
        }
    }
}

async fn reconcile_inner(
    store: &dyn CommissionStore,
    req: &ReconcileRequest,
) -> Result<AssignmentOutcome, AppError> {
    let slot = req.role.slot();

    let Some(user_id) = req.user_id else {
        let cancelled = cancel_open_commissions(
            store,
            req.company_id,
            req.lead_id,
            CancelScope::EveryRow,
            "Assignment removed",
        )
        .await;
        return Ok(AssignmentOutcome::skipped(
            slot,
            format!("unassigned, {} commission(s) cancelled", cancelled),
        ));
    };

    let lead = store
        .get_lead(req.company_id, req.lead_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow!("lead {} not found", req.lead_id)))?;

    // Override fan-out is anchored to the lead's sales rep even when the
    // slot being reconciled is a different role. Existence checks make
    // repeated fan-out a no-op.
    if !req.skip_cancel_others {
        fan_out_overrides(store, &lead).await;
    }

    let user = store
        .get_user(req.company_id, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow!("user {} not found", user_id)))?;

    let plan = match user.commission_plan_id {
        Some(plan_id) => store.get_active_plan(req.company_id, plan_id).await?,
        None => None,
    };
    let location_user = store
        .get_location_user(req.company_id, user_id, lead.location_id)
        .await?;

    let ctx = UserCommissionContext {
        user: &user,
        plan: plan.as_ref(),
        location_user: location_user.as_ref(),
    };
    let Some(config) = resolve(&ctx, req.role) else {
        return Ok(AssignmentOutcome::skipped(slot, "no commission configured"));
    };

    let amounts = base_amounts(store, req.company_id, req.lead_id, user_id).await?;

    // Reassignment invalidates every other user's outstanding role
    // commission on the lead, not only the displaced occupant of this slot.
    // Override rows stay: they are created once per lead and survive
    // reassignment.
    if !req.skip_cancel_others {
        cancel_open_commissions(
            store,
            req.company_id,
            req.lead_id,
            CancelScope::RoleSlotsExcept(user_id),
            "Lead reassigned",
        )
        .await;
    }

    let existing = store
        .find_open_commission(req.company_id, req.lead_id, user_id, slot)
        .await?;
    let commission = match existing {
        Some(row) => {
            let terms = topped_up_amounts(&config, &row, amounts.delta);
            if terms.base_amount == row.base_amount
                && terms.calculated_amount == row.calculated_amount
            {
                row
            } else {
                store
                    .update_commission_amounts(req.company_id, row.commission_id, terms)
                    .await?
            }
        }
        None => {
            let (base_amount, calculated_amount) = initial_amounts(&config, amounts.delta);
            store
                .insert_commission(
                    req.company_id,
                    NewLeadCommission {
                        lead_id: req.lead_id,
                        user_id,
                        assignment_field: slot,
                        commission_type: config.commission_type,
                        commission_rate: config.commission_rate,
                        flat_amount: config.flat_amount,
                        base_amount,
                        calculated_amount,
                        paid_when: config.paid_when,
                        notes: None,
                        created_by: req.acting_user_id,
                    },
                )
                .await?
        }
    };

    Ok(AssignmentOutcome::reconciled(slot, commission))
}

/// Re-run reconciliation for every assigned role slot on a lead, without
/// cancellations or fan-out. Used when the invoice total changes.
pub async fn refresh_lead_commissions(
    store: &dyn CommissionStore,
    lead: &Lead,
    acting_user_id: Option<Uuid>,
) -> Vec<AssignmentOutcome> {
    let mut outcomes = Vec::new();
    for (role, user_id) in lead.assigned_roles() {
        let outcome = reconcile_assignment(
            store,
            ReconcileRequest {
                company_id: lead.company_id,
                lead_id: lead.lead_id,
                user_id: Some(user_id),
                acting_user_id,
                role,
                skip_cancel_others: true,
            },
        )
        .await;
        outcomes.push(outcome);
    }
    outcomes
}

/// Amounts for a freshly inserted commission. Flat rules mirror the flat
/// amount into the base so the stored row stays self-consistent.
fn initial_amounts(config: &ResolvedCommission, delta: Decimal) -> (Decimal, Decimal) {
    if config.commission_type.is_flat() {
        let flat = config.flat_amount.unwrap_or(Decimal::ZERO);
        (flat, flat)
    } else {
        let amount = calculate(
            config.commission_type,
            config.commission_rate,
            config.flat_amount,
            delta,
        );
        (delta, amount)
    }
}

/// Replacement terms for an existing commission after adding the delta.
fn topped_up_amounts(
    config: &ResolvedCommission,
    row: &LeadCommission,
    delta: Decimal,
) -> CommissionAmounts {
    let (base_amount, calculated_amount) = if config.commission_type.is_flat() {
        let flat = config.flat_amount.unwrap_or(Decimal::ZERO);
        (flat, flat)
    } else {
        let base = row.base_amount + delta;
        let amount = calculate(
            config.commission_type,
            config.commission_rate,
            config.flat_amount,
            base,
        );
        (base, amount)
    };

    CommissionAmounts {
        commission_type: config.commission_type,
        commission_rate: config.commission_rate,
        flat_amount: config.flat_amount,
        base_amount,
        calculated_amount,
    }
}

/// Which open commissions a cancellation sweep covers.
#[derive(Debug, Clone, Copy)]
enum CancelScope {
    /// Unassignment: every open row on the lead, overrides included.
    EveryRow,
    /// Reassignment: other users' role-slot rows; override rows are created
    /// once per lead and are left alone.
    RoleSlotsExcept(Uuid),
}

impl CancelScope {
    fn covers(&self, row: &LeadCommission) -> bool {
        match self {
            CancelScope::EveryRow => true,
            CancelScope::RoleSlotsExcept(keep_user) => {
                row.user_id != *keep_user
                    && row.slot().and_then(|slot| slot.role()).is_some()
            }
        }
    }
}

/// Cancel open commissions on a lead. Cancellations are best effort: a
/// failed row is logged and skipped.
async fn cancel_open_commissions(
    store: &dyn CommissionStore,
    company_id: Uuid,
    lead_id: Uuid,
    scope: CancelScope,
    note: &str,
) -> usize {
    let rows = match store.list_open_commissions(company_id, lead_id).await {
        Ok(rows) => rows,
        Err(e) => {
            tracing::warn!(error = %e, lead_id = %lead_id, "Failed to list commissions for cancellation");
            return 0;
        }
    };

    let mut cancelled = 0;
    for row in rows {
        if !scope.covers(&row) {
            continue;
        }
        match store
            .cancel_commission(company_id, row.commission_id, note)
            .await
        {
            Ok(()) => cancelled += 1,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    commission_id = %row.commission_id,
                    "Failed to cancel commission"
                );
            }
        }
    }
    cancelled
}

/// Create office-manager and team-lead override commissions for a lead.
///
/// Runs once per lead in effect: every candidate is guarded by an existence
/// check keyed on (lead, user) across all slots. Candidate failures are
/// logged and processing continues; fan-out never fails the caller.
#[instrument(skip(store, lead), fields(lead_id = %lead.lead_id))]
pub async fn fan_out_overrides(store: &dyn CommissionStore, lead: &Lead) {
    let invoice_total = match store.latest_invoice_total(lead.company_id, lead.lead_id).await {
        Ok(total) => total.unwrap_or(Decimal::ZERO),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read invoice total for override fan-out");
            Decimal::ZERO
        }
    };

    match store
        .list_office_location_users(lead.company_id, lead.location_id)
        .await
    {
        Ok(members) => {
            for member in members {
                if let Err(e) = office_override(store, lead, &member, invoice_total).await {
                    tracing::warn!(
                        error = %e,
                        user_id = %member.user_id,
                        "Office override commission failed, continuing"
                    );
                }
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to list office managers for override fan-out");
        }
    }

    if let Err(e) = team_lead_override(store, lead, invoice_total).await {
        tracing::warn!(error = %e, "Team lead override commission failed");
    }
}

async fn office_override(
    store: &dyn CommissionStore,
    lead: &Lead,
    member: &LocationUser,
    invoice_total: Decimal,
) -> Result<(), AppError> {
    if !member.commission_enabled {
        return Ok(());
    }
    if store
        .has_commission_for_user(lead.company_id, lead.lead_id, member.user_id)
        .await?
    {
        return Ok(());
    }
    if !member.include_own_sales && lead.sales_rep_id == Some(member.user_id) {
        return Ok(());
    }
    let Some(commission_type) = member
        .commission_type
        .as_deref()
        .and_then(CommissionType::parse)
    else {
        return Ok(());
    };

    let (base_amount, calculated_amount) = if commission_type.is_flat() {
        let flat = member.flat_commission_amount.unwrap_or(Decimal::ZERO);
        (flat, flat)
    } else {
        let amount = calculate(
            commission_type,
            member.commission_rate,
            member.flat_commission_amount,
            invoice_total,
        );
        (invoice_total, amount)
    };

    store
        .insert_commission(
            lead.company_id,
            NewLeadCommission {
                lead_id: lead.lead_id,
                user_id: member.user_id,
                assignment_field: CommissionSlot::OfficeOverride,
                commission_type,
                commission_rate: member.commission_rate,
                flat_amount: member.flat_commission_amount,
                base_amount,
                calculated_amount,
                paid_when: member
                    .paid_when
                    .as_deref()
                    .map(PaidWhen::from_string)
                    .unwrap_or(PaidWhen::FinalPayment),
                notes: Some("Office manager override".to_string()),
                created_by: None,
            },
        )
        .await?;
    Ok(())
}

async fn team_lead_override(
    store: &dyn CommissionStore,
    lead: &Lead,
    invoice_total: Decimal,
) -> Result<(), AppError> {
    let Some(sales_rep_id) = lead.sales_rep_id else {
        return Ok(());
    };
    let Some(membership) = store
        .get_location_user(lead.company_id, sales_rep_id, lead.location_id)
        .await?
    else {
        return Ok(());
    };
    let Some(team_id) = membership.team_id else {
        return Ok(());
    };
    let Some(team) = store.get_team(lead.company_id, team_id).await? else {
        return Ok(());
    };

    if !team.is_active || team.commission_rate <= Decimal::ZERO {
        return Ok(());
    }
    if !team.include_own_sales && team.team_lead_id == sales_rep_id {
        return Ok(());
    }
    if store
        .has_commission_for_user(lead.company_id, lead.lead_id, team.team_lead_id)
        .await?
    {
        return Ok(());
    }

    let calculated_amount = calculate(
        CommissionType::Percentage,
        Some(team.commission_rate),
        None,
        invoice_total,
    );

    store
        .insert_commission(
            lead.company_id,
            NewLeadCommission {
                lead_id: lead.lead_id,
                user_id: team.team_lead_id,
                assignment_field: CommissionSlot::TeamLeadOverride,
                commission_type: CommissionType::Percentage,
                commission_rate: Some(team.commission_rate),
                flat_amount: None,
                base_amount: invoice_total,
                calculated_amount,
                paid_when: team
                    .paid_when
                    .as_deref()
                    .map(PaidWhen::from_string)
                    .unwrap_or(PaidWhen::FinalPayment),
                notes: Some("Team lead override".to_string()),
                created_by: None,
            },
        )
        .await?;
    Ok(())
}
