//! In-memory `CommissionStore` used by engine unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use anyhow::anyhow;
use service_core::error::AppError;

use crate::models::{
    CommissionPlan, CommissionSlot, CommissionStatus, Lead, LeadCommission, LocationRole,
    LocationUser, NewLeadCommission, Team, User,
};

use super::store::{CommissionAmounts, CommissionStore};

#[derive(Default)]
struct State {
    users: Vec<User>,
    plans: Vec<CommissionPlan>,
    location_users: Vec<LocationUser>,
    teams: Vec<Team>,
    leads: Vec<Lead>,
    invoices: Vec<(Uuid, Uuid, Decimal)>,
    commissions: Vec<LeadCommission>,
    fail_slots: Vec<CommissionSlot>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, user: User) {
        self.state.lock().unwrap().users.push(user);
    }

    pub fn add_plan(&self, plan: CommissionPlan) {
        self.state.lock().unwrap().plans.push(plan);
    }

    pub fn add_location_user(&self, lu: LocationUser) {
        self.state.lock().unwrap().location_users.push(lu);
    }

    pub fn add_team(&self, team: Team) {
        self.state.lock().unwrap().teams.push(team);
    }

    pub fn add_lead(&self, lead: Lead) {
        self.state.lock().unwrap().leads.push(lead);
    }

    /// Record an invoice; the most recently added one wins.
    pub fn add_invoice(&self, company_id: Uuid, lead_id: Uuid, total: Decimal) {
        self.state
            .lock()
            .unwrap()
            .invoices
            .push((company_id, lead_id, total));
    }

    /// Inserts for these slots fail with a database error.
    pub fn fail_inserts_for(&self, slot: CommissionSlot) {
        self.state.lock().unwrap().fail_slots.push(slot);
    }

    pub fn commissions(&self) -> Vec<LeadCommission> {
        self.state.lock().unwrap().commissions.clone()
    }

    pub fn open_commissions(&self) -> Vec<LeadCommission> {
        self.commissions()
            .into_iter()
            .filter(|c| !c.status().is_terminal())
            .collect()
    }
}

// Row builders with everything optional zeroed out.

pub fn user(company_id: Uuid) -> User {
    User {
        user_id: Uuid::new_v4(),
        company_id,
        name: "Test User".into(),
        email: "user@example.com".into(),
        commission_plan_id: None,
        sales_commission_type: None,
        sales_commission_rate: None,
        sales_flat_commission_amount: None,
        marketing_commission_type: None,
        marketing_commission_rate: None,
        marketing_flat_commission_amount: None,
        production_commission_type: None,
        production_commission_rate: None,
        production_flat_commission_amount: None,
        created_utc: Utc::now(),
        updated_utc: Utc::now(),
    }
}

pub fn lead(company_id: Uuid, location_id: Uuid) -> Lead {
    Lead {
        lead_id: Uuid::new_v4(),
        company_id,
        location_id,
        customer_name: "Customer".into(),
        address: None,
        sales_rep_id: None,
        marketing_rep_id: None,
        sales_manager_id: None,
        production_manager_id: None,
        created_utc: Utc::now(),
        updated_utc: Utc::now(),
    }
}

pub fn location_user(
    company_id: Uuid,
    location_id: Uuid,
    user_id: Uuid,
    role: LocationRole,
) -> LocationUser {
    LocationUser {
        location_user_id: Uuid::new_v4(),
        company_id,
        location_id,
        user_id,
        role: role.as_str().into(),
        team_id: None,
        commission_enabled: false,
        commission_type: None,
        commission_rate: None,
        flat_commission_amount: None,
        paid_when: None,
        include_own_sales: true,
    }
}

pub fn team(company_id: Uuid, location_id: Uuid, team_lead_id: Uuid, rate: Decimal) -> Team {
    Team {
        team_id: Uuid::new_v4(),
        company_id,
        location_id,
        team_lead_id,
        commission_rate: rate,
        paid_when: None,
        include_own_sales: true,
        is_active: true,
    }
}

pub fn plan(company_id: Uuid, commission_type: &str, rate: Option<Decimal>) -> CommissionPlan {
    CommissionPlan {
        plan_id: Uuid::new_v4(),
        company_id,
        name: "Plan".into(),
        commission_type: commission_type.into(),
        commission_rate: rate,
        flat_amount: None,
        paid_when: "when_final_payment".into(),
        is_active: true,
        created_utc: Utc::now(),
        updated_utc: Utc::now(),
    }
}

#[async_trait]
impl CommissionStore for MemoryStore {
    async fn get_lead(&self, company_id: Uuid, lead_id: Uuid) -> Result<Option<Lead>, AppError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .leads
            .iter()
            .find(|l| l.company_id == company_id && l.lead_id == lead_id)
            .cloned())
    }

    async fn get_user(&self, company_id: Uuid, user_id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .users
            .iter()
            .find(|u| u.company_id == company_id && u.user_id == user_id)
            .cloned())
    }

    async fn get_active_plan(
        &self,
        company_id: Uuid,
        plan_id: Uuid,
    ) -> Result<Option<CommissionPlan>, AppError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .plans
            .iter()
            .find(|p| p.company_id == company_id && p.plan_id == plan_id && p.is_active)
            .cloned())
    }

    async fn get_location_user(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        location_id: Uuid,
    ) -> Result<Option<LocationUser>, AppError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .location_users
            .iter()
            .find(|lu| {
                lu.company_id == company_id
                    && lu.user_id == user_id
                    && lu.location_id == location_id
            })
            .cloned())
    }

    async fn list_office_location_users(
        &self,
        company_id: Uuid,
        location_id: Uuid,
    ) -> Result<Vec<LocationUser>, AppError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .location_users
            .iter()
            .filter(|lu| {
                lu.company_id == company_id
                    && lu.location_id == location_id
                    && lu.role() == LocationRole::Office
                    && lu.commission_enabled
            })
            .cloned()
            .collect())
    }

    async fn get_team(&self, company_id: Uuid, team_id: Uuid) -> Result<Option<Team>, AppError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .teams
            .iter()
            .find(|t| t.company_id == company_id && t.team_id == team_id)
            .cloned())
    }

    async fn latest_invoice_total(
        &self,
        company_id: Uuid,
        lead_id: Uuid,
    ) -> Result<Option<Decimal>, AppError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .invoices
            .iter()
            .filter(|(c, l, _)| *c == company_id && *l == lead_id)
            .next_back()
            .map(|(_, _, total)| *total))
    }

    async fn sum_commission_base(
        &self,
        company_id: Uuid,
        lead_id: Uuid,
        user_id: Uuid,
    ) -> Result<Decimal, AppError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .commissions
            .iter()
            .filter(|c| {
                c.company_id == company_id && c.lead_id == lead_id && c.user_id == user_id
            })
            .map(|c| c.base_amount)
            .sum())
    }

    async fn find_open_commission(
        &self,
        company_id: Uuid,
        lead_id: Uuid,
        user_id: Uuid,
        slot: CommissionSlot,
    ) -> Result<Option<LeadCommission>, AppError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .commissions
            .iter()
            .find(|c| {
                c.company_id == company_id
                    && c.lead_id == lead_id
                    && c.user_id == user_id
                    && c.slot() == Some(slot)
                    && !c.status().is_terminal()
            })
            .cloned())
    }

    async fn has_commission_for_user(
        &self,
        company_id: Uuid,
        lead_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, AppError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .commissions
            .iter()
            .any(|c| c.company_id == company_id && c.lead_id == lead_id && c.user_id == user_id))
    }

    async fn list_open_commissions(
        &self,
        company_id: Uuid,
        lead_id: Uuid,
    ) -> Result<Vec<LeadCommission>, AppError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .commissions
            .iter()
            .filter(|c| {
                c.company_id == company_id && c.lead_id == lead_id && !c.status().is_terminal()
            })
            .cloned()
            .collect())
    }

    async fn insert_commission(
        &self,
        company_id: Uuid,
        new: NewLeadCommission,
    ) -> Result<LeadCommission, AppError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_slots.contains(&new.assignment_field) {
            return Err(AppError::DatabaseError(anyhow!("injected insert failure")));
        }
        // Mirrors the partial unique index on live (lead, user, slot) tuples
        let duplicate = state.commissions.iter().any(|c| {
            c.company_id == company_id
                && c.lead_id == new.lead_id
                && c.user_id == new.user_id
                && c.slot() == Some(new.assignment_field)
                && !c.status().is_terminal()
        });
        if duplicate {
            return Err(AppError::Conflict(anyhow!(
                "open commission already exists for this slot"
            )));
        }

        let row = LeadCommission {
            commission_id: Uuid::new_v4(),
            company_id,
            lead_id: new.lead_id,
            user_id: new.user_id,
            assignment_field: new.assignment_field.as_str().into(),
            commission_type: new.commission_type.as_str().into(),
            commission_rate: new.commission_rate,
            flat_amount: new.flat_amount,
            base_amount: new.base_amount,
            calculated_amount: new.calculated_amount,
            paid_when: new.paid_when.as_str().into(),
            status: CommissionStatus::Pending.as_str().into(),
            notes: new.notes,
            created_by: new.created_by,
            created_utc: Utc::now(),
            updated_utc: Utc::now(),
        };
        state.commissions.push(row.clone());
        Ok(row)
    }

    async fn update_commission_amounts(
        &self,
        company_id: Uuid,
        commission_id: Uuid,
        amounts: CommissionAmounts,
    ) -> Result<LeadCommission, AppError> {
        let mut state = self.state.lock().unwrap();
        let row = state
            .commissions
            .iter_mut()
            .find(|c| c.company_id == company_id && c.commission_id == commission_id)
            .ok_or_else(|| AppError::NotFound(anyhow!("commission {} not found", commission_id)))?;

        row.commission_type = amounts.commission_type.as_str().into();
        row.commission_rate = amounts.commission_rate;
        row.flat_amount = amounts.flat_amount;
        row.base_amount = amounts.base_amount;
        row.calculated_amount = amounts.calculated_amount;
        row.updated_utc = Utc::now();
        Ok(row.clone())
    }

    async fn cancel_commission(
        &self,
        company_id: Uuid,
        commission_id: Uuid,
        note: &str,
    ) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        let row = state
            .commissions
            .iter_mut()
            .find(|c| {
                c.company_id == company_id
                    && c.commission_id == commission_id
                    && !c.status().is_terminal()
            })
            .ok_or_else(|| AppError::NotFound(anyhow!("commission {} not found", commission_id)))?;

        row.status = CommissionStatus::Cancelled.as_str().into();
        row.notes = Some(note.to_string());
        row.updated_utc = Utc::now();
        Ok(())
    }
}
