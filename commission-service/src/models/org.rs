//! Users, location memberships and teams.
//!
//! These tables are owned by the admin settings surface; the commission
//! engine only reads them, but the store exposes typed writes for seeding.

use crate::models::AssignmentRole;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub user_id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub email: String,
    pub commission_plan_id: Option<Uuid>,
    pub sales_commission_type: Option<String>,
    pub sales_commission_rate: Option<Decimal>,
    pub sales_flat_commission_amount: Option<Decimal>,
    pub marketing_commission_type: Option<String>,
    pub marketing_commission_rate: Option<Decimal>,
    pub marketing_flat_commission_amount: Option<Decimal>,
    pub production_commission_type: Option<String>,
    pub production_commission_rate: Option<Decimal>,
    pub production_flat_commission_amount: Option<Decimal>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// The per-role commission fields carried on a user record.
#[derive(Debug, Clone, Copy)]
pub struct RoleRates<'a> {
    pub commission_type: Option<&'a str>,
    pub commission_rate: Option<Decimal>,
    pub flat_amount: Option<Decimal>,
}

impl User {
    /// The rate fields that apply to a role slot. Sales managers are paid
    /// from the sales fields.
    pub fn role_rates(&self, role: AssignmentRole) -> RoleRates<'_> {
        match role {
            AssignmentRole::SalesRep | AssignmentRole::SalesManager => RoleRates {
                commission_type: self.sales_commission_type.as_deref(),
                commission_rate: self.sales_commission_rate,
                flat_amount: self.sales_flat_commission_amount,
            },
            AssignmentRole::MarketingRep => RoleRates {
                commission_type: self.marketing_commission_type.as_deref(),
                commission_rate: self.marketing_commission_rate,
                flat_amount: self.marketing_flat_commission_amount,
            },
            AssignmentRole::ProductionManager => RoleRates {
                commission_type: self.production_commission_type.as_deref(),
                commission_rate: self.production_commission_rate,
                flat_amount: self.production_flat_commission_amount,
            },
        }
    }
}

/// Input for creating a user.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub commission_plan_id: Option<Uuid>,
    pub sales_commission_type: Option<String>,
    pub sales_commission_rate: Option<Decimal>,
    pub sales_flat_commission_amount: Option<Decimal>,
    pub marketing_commission_type: Option<String>,
    pub marketing_commission_rate: Option<Decimal>,
    pub marketing_flat_commission_amount: Option<Decimal>,
    pub production_commission_type: Option<String>,
    pub production_commission_rate: Option<Decimal>,
    pub production_flat_commission_amount: Option<Decimal>,
}

/// Role a user holds at a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationRole {
    Office,
    Sales,
    Marketing,
    Production,
}

impl LocationRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationRole::Office => "office",
            LocationRole::Sales => "sales",
            LocationRole::Marketing => "marketing",
            LocationRole::Production => "production",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "office" => LocationRole::Office,
            "marketing" => LocationRole::Marketing,
            "production" => LocationRole::Production,
            _ => LocationRole::Sales,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct LocationUser {
    pub location_user_id: Uuid,
    pub company_id: Uuid,
    pub location_id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub team_id: Option<Uuid>,
    pub commission_enabled: bool,
    pub commission_type: Option<String>,
    pub commission_rate: Option<Decimal>,
    pub flat_commission_amount: Option<Decimal>,
    pub paid_when: Option<String>,
    pub include_own_sales: bool,
}

impl LocationUser {
    pub fn role(&self) -> LocationRole {
        LocationRole::from_string(&self.role)
    }
}

/// Input for binding a user to a location.
#[derive(Debug, Clone)]
pub struct NewLocationUser {
    pub location_id: Uuid,
    pub user_id: Uuid,
    pub role: LocationRole,
    pub team_id: Option<Uuid>,
    pub commission_enabled: bool,
    pub commission_type: Option<String>,
    pub commission_rate: Option<Decimal>,
    pub flat_commission_amount: Option<Decimal>,
    pub paid_when: Option<String>,
    pub include_own_sales: bool,
}

#[derive(Debug, Clone, FromRow)]
pub struct Team {
    pub team_id: Uuid,
    pub company_id: Uuid,
    pub location_id: Uuid,
    pub team_lead_id: Uuid,
    pub commission_rate: Decimal,
    pub paid_when: Option<String>,
    pub include_own_sales: bool,
    pub is_active: bool,
}

/// Input for creating a team.
#[derive(Debug, Clone)]
pub struct NewTeam {
    pub location_id: Uuid,
    pub team_lead_id: Uuid,
    pub commission_rate: Decimal,
    pub paid_when: Option<String>,
    pub include_own_sales: bool,
    pub is_active: bool,
}
