//! Persistence gateway consumed by the commission engine.

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use service_core::error::AppError;

use crate::models::{
    CommissionPlan, CommissionSlot, CommissionType, Lead, LeadCommission, LocationUser,
    NewLeadCommission, Team, User,
};

/// Replacement terms written when an existing commission is topped up.
///
/// The rate fields are rewritten together with the amounts so a stored row
/// always satisfies `calculated_amount == calculate(type, rate, flat, base)`.
#[derive(Debug, Clone)]
pub struct CommissionAmounts {
    pub commission_type: CommissionType,
    pub commission_rate: Option<Decimal>,
    pub flat_amount: Option<Decimal>,
    pub base_amount: Decimal,
    pub calculated_amount: Decimal,
}

/// Relational reads and writes the engine needs. All methods scope by
/// company and honor the soft-delete convention (`deleted_at IS NULL`).
#[async_trait]
pub trait CommissionStore: Send + Sync {
    async fn get_lead(&self, company_id: Uuid, lead_id: Uuid) -> Result<Option<Lead>, AppError>;

    async fn get_user(&self, company_id: Uuid, user_id: Uuid) -> Result<Option<User>, AppError>;

    /// Fetch a plan only if it is active and not deleted.
    async fn get_active_plan(
        &self,
        company_id: Uuid,
        plan_id: Uuid,
    ) -> Result<Option<CommissionPlan>, AppError>;

    async fn get_location_user(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        location_id: Uuid,
    ) -> Result<Option<LocationUser>, AppError>;

    /// Location members holding the office role with commission enabled.
    async fn list_office_location_users(
        &self,
        company_id: Uuid,
        location_id: Uuid,
    ) -> Result<Vec<LocationUser>, AppError>;

    async fn get_team(&self, company_id: Uuid, team_id: Uuid) -> Result<Option<Team>, AppError>;

    /// Total of the most recently created, non-deleted invoice for the lead.
    async fn latest_invoice_total(
        &self,
        company_id: Uuid,
        lead_id: Uuid,
    ) -> Result<Option<Decimal>, AppError>;

    /// Sum of `base_amount` over every non-deleted commission row for
    /// (lead, user), across all slots and statuses.
    async fn sum_commission_base(
        &self,
        company_id: Uuid,
        lead_id: Uuid,
        user_id: Uuid,
    ) -> Result<Decimal, AppError>;

    /// The pending/approved commission for an exact (lead, user, slot) tuple.
    async fn find_open_commission(
        &self,
        company_id: Uuid,
        lead_id: Uuid,
        user_id: Uuid,
        slot: CommissionSlot,
    ) -> Result<Option<LeadCommission>, AppError>;

    /// Whether the user has any non-deleted commission on the lead,
    /// regardless of slot or status.
    async fn has_commission_for_user(
        &self,
        company_id: Uuid,
        lead_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, AppError>;

    /// All pending/approved commissions on the lead.
    async fn list_open_commissions(
        &self,
        company_id: Uuid,
        lead_id: Uuid,
    ) -> Result<Vec<LeadCommission>, AppError>;

    async fn insert_commission(
        &self,
        company_id: Uuid,
        new: NewLeadCommission,
    ) -> Result<LeadCommission, AppError>;

    async fn update_commission_amounts(
        &self,
        company_id: Uuid,
        commission_id: Uuid,
        amounts: CommissionAmounts,
    ) -> Result<LeadCommission, AppError>;

    /// Transition a pending/approved commission to cancelled with a note.
    async fn cancel_commission(
        &self,
        company_id: Uuid,
        commission_id: Uuid,
        note: &str,
    ) -> Result<(), AppError>;
}
