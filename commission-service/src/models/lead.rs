//! Lead and customer invoice models.

use crate::grpc::proto;
use crate::models::datetime_to_timestamp;
use crate::models::AssignmentRole;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, FromRow)]
pub struct Lead {
    pub lead_id: Uuid,
    pub company_id: Uuid,
    pub location_id: Uuid,
    pub customer_name: String,
    pub address: Option<String>,
    pub sales_rep_id: Option<Uuid>,
    pub marketing_rep_id: Option<Uuid>,
    pub sales_manager_id: Option<Uuid>,
    pub production_manager_id: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Lead {
    /// Current occupant of a role slot.
    pub fn assignee(&self, role: AssignmentRole) -> Option<Uuid> {
        match role {
            AssignmentRole::SalesRep => self.sales_rep_id,
            AssignmentRole::MarketingRep => self.marketing_rep_id,
            AssignmentRole::SalesManager => self.sales_manager_id,
            AssignmentRole::ProductionManager => self.production_manager_id,
        }
    }

    /// All role slots that currently have an occupant, in slot order.
    pub fn assigned_roles(&self) -> Vec<(AssignmentRole, Uuid)> {
        AssignmentRole::ALL
            .iter()
            .filter_map(|role| self.assignee(*role).map(|user_id| (*role, user_id)))
            .collect()
    }
}

impl From<Lead> for proto::Lead {
    fn from(l: Lead) -> Self {
        Self {
            lead_id: l.lead_id.to_string(),
            company_id: l.company_id.to_string(),
            location_id: l.location_id.to_string(),
            customer_name: l.customer_name,
            address: l.address.unwrap_or_default(),
            sales_rep_id: l.sales_rep_id.map(|u| u.to_string()),
            marketing_rep_id: l.marketing_rep_id.map(|u| u.to_string()),
            sales_manager_id: l.sales_manager_id.map(|u| u.to_string()),
            production_manager_id: l.production_manager_id.map(|u| u.to_string()),
            created_utc: Some(datetime_to_timestamp(l.created_utc)),
            updated_utc: Some(datetime_to_timestamp(l.updated_utc)),
        }
    }
}

/// Input for creating a lead.
#[derive(Debug, Clone, Validate)]
pub struct NewLead {
    pub location_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub customer_name: String,
    pub address: Option<String>,
    pub sales_rep_id: Option<Uuid>,
    pub marketing_rep_id: Option<Uuid>,
    pub sales_manager_id: Option<Uuid>,
    pub production_manager_id: Option<Uuid>,
}

#[derive(Debug, Clone, FromRow)]
pub struct CustomerInvoice {
    pub invoice_id: Uuid,
    pub company_id: Uuid,
    pub lead_id: Uuid,
    pub total: Decimal,
    pub description: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl From<CustomerInvoice> for proto::CustomerInvoice {
    fn from(i: CustomerInvoice) -> Self {
        Self {
            invoice_id: i.invoice_id.to_string(),
            company_id: i.company_id.to_string(),
            lead_id: i.lead_id.to_string(),
            total: i.total.to_string(),
            description: i.description.unwrap_or_default(),
            created_utc: Some(datetime_to_timestamp(i.created_utc)),
        }
    }
}

/// Input for recording a customer invoice.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub lead_id: Uuid,
    pub total: Decimal,
    pub description: Option<String>,
}
