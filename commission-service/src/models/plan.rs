//! Commission plan model.

use crate::grpc::proto;
use crate::models::datetime_to_timestamp;
use crate::models::{CommissionType, PaidWhen};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// A named, reusable commission rule. Many users may reference one plan;
/// commission creation never mutates it.
#[derive(Debug, Clone, FromRow)]
pub struct CommissionPlan {
    pub plan_id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub commission_type: String,
    pub commission_rate: Option<Decimal>,
    pub flat_amount: Option<Decimal>,
    pub paid_when: String,
    pub is_active: bool,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl From<CommissionPlan> for proto::CommissionPlan {
    fn from(p: CommissionPlan) -> Self {
        let commission_type = CommissionType::parse(&p.commission_type)
            .map(proto::CommissionType::from)
            .unwrap_or(proto::CommissionType::Unspecified);

        Self {
            plan_id: p.plan_id.to_string(),
            company_id: p.company_id.to_string(),
            name: p.name,
            commission_type: commission_type.into(),
            commission_rate: p.commission_rate.map(|d| d.to_string()),
            flat_amount: p.flat_amount.map(|d| d.to_string()),
            paid_when: proto::PaidWhen::from(PaidWhen::from_string(&p.paid_when)).into(),
            is_active: p.is_active,
            created_utc: Some(datetime_to_timestamp(p.created_utc)),
            updated_utc: Some(datetime_to_timestamp(p.updated_utc)),
        }
    }
}

/// Input for creating a commission plan.
#[derive(Debug, Clone, Validate)]
pub struct CreatePlan {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    pub commission_type: CommissionType,
    pub commission_rate: Option<Decimal>,
    pub flat_amount: Option<Decimal>,
    pub paid_when: PaidWhen,
}
