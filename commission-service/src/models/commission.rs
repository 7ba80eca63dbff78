//! Commission records and the closed enums they are keyed by.

use crate::grpc::proto;
use crate::models::datetime_to_timestamp;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ============================================================================
// Enums
// ============================================================================

/// How a commission amount is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommissionType {
    Percentage,
    FlatAmount,
    FlatPerJob,
}

impl CommissionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommissionType::Percentage => "percentage",
            CommissionType::FlatAmount => "flat_amount",
            CommissionType::FlatPerJob => "flat_per_job",
        }
    }

    /// Parse a stored type tag. Unrecognized tags yield `None`, which the
    /// engine treats as "no commission configured" rather than an error.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "percentage" => Some(CommissionType::Percentage),
            "flat_amount" => Some(CommissionType::FlatAmount),
            "flat_per_job" => Some(CommissionType::FlatPerJob),
            _ => None,
        }
    }

    /// Flat variants pay the configured amount regardless of the base.
    pub fn is_flat(&self) -> bool {
        matches!(self, CommissionType::FlatAmount | CommissionType::FlatPerJob)
    }
}

impl From<CommissionType> for proto::CommissionType {
    fn from(t: CommissionType) -> Self {
        match t {
            CommissionType::Percentage => proto::CommissionType::Percentage,
            CommissionType::FlatAmount => proto::CommissionType::FlatAmount,
            CommissionType::FlatPerJob => proto::CommissionType::FlatPerJob,
        }
    }
}

impl TryFrom<proto::CommissionType> for CommissionType {
    type Error = ();

    fn try_from(t: proto::CommissionType) -> Result<Self, Self::Error> {
        match t {
            proto::CommissionType::Percentage => Ok(CommissionType::Percentage),
            proto::CommissionType::FlatAmount => Ok(CommissionType::FlatAmount),
            proto::CommissionType::FlatPerJob => Ok(CommissionType::FlatPerJob),
            proto::CommissionType::Unspecified => Err(()),
        }
    }
}

/// Business trigger at which a commission becomes payable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaidWhen {
    DepositPaid,
    JobCompleted,
    FinalPayment,
}

impl PaidWhen {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaidWhen::DepositPaid => "when_deposit_paid",
            PaidWhen::JobCompleted => "when_job_completed",
            PaidWhen::FinalPayment => "when_final_payment",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "when_deposit_paid" => PaidWhen::DepositPaid,
            "when_job_completed" => PaidWhen::JobCompleted,
            _ => PaidWhen::FinalPayment,
        }
    }
}

impl From<PaidWhen> for proto::PaidWhen {
    fn from(p: PaidWhen) -> Self {
        match p {
            PaidWhen::DepositPaid => proto::PaidWhen::DepositPaid,
            PaidWhen::JobCompleted => proto::PaidWhen::JobCompleted,
            PaidWhen::FinalPayment => proto::PaidWhen::FinalPayment,
        }
    }
}

impl From<proto::PaidWhen> for PaidWhen {
    fn from(p: proto::PaidWhen) -> Self {
        match p {
            proto::PaidWhen::DepositPaid => PaidWhen::DepositPaid,
            proto::PaidWhen::JobCompleted => PaidWhen::JobCompleted,
            _ => PaidWhen::FinalPayment,
        }
    }
}

/// Lifecycle of a commission record.
///
/// `pending → {approved → paid} | cancelled`; paid rows are immutable and
/// cancelled rows stay cancelled forever (a fresh row may follow).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommissionStatus {
    Pending,
    Approved,
    Paid,
    Cancelled,
}

impl CommissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommissionStatus::Pending => "pending",
            CommissionStatus::Approved => "approved",
            CommissionStatus::Paid => "paid",
            CommissionStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "approved" => CommissionStatus::Approved,
            "paid" => CommissionStatus::Paid,
            "cancelled" => CommissionStatus::Cancelled,
            _ => CommissionStatus::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CommissionStatus::Paid | CommissionStatus::Cancelled)
    }

    pub fn can_transition(&self, next: CommissionStatus) -> bool {
        matches!(
            (self, next),
            (CommissionStatus::Pending, CommissionStatus::Approved)
                | (CommissionStatus::Pending, CommissionStatus::Cancelled)
                | (CommissionStatus::Approved, CommissionStatus::Paid)
                | (CommissionStatus::Approved, CommissionStatus::Cancelled)
        )
    }
}

impl From<CommissionStatus> for proto::CommissionStatus {
    fn from(s: CommissionStatus) -> Self {
        match s {
            CommissionStatus::Pending => proto::CommissionStatus::Pending,
            CommissionStatus::Approved => proto::CommissionStatus::Approved,
            CommissionStatus::Paid => proto::CommissionStatus::Paid,
            CommissionStatus::Cancelled => proto::CommissionStatus::Cancelled,
        }
    }
}

impl TryFrom<proto::CommissionStatus> for CommissionStatus {
    type Error = ();

    fn try_from(s: proto::CommissionStatus) -> Result<Self, Self::Error> {
        match s {
            proto::CommissionStatus::Pending => Ok(CommissionStatus::Pending),
            proto::CommissionStatus::Approved => Ok(CommissionStatus::Approved),
            proto::CommissionStatus::Paid => Ok(CommissionStatus::Paid),
            proto::CommissionStatus::Cancelled => Ok(CommissionStatus::Cancelled),
            proto::CommissionStatus::Unspecified => Err(()),
        }
    }
}

/// Role slot a user can be assigned to on a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentRole {
    SalesRep,
    MarketingRep,
    SalesManager,
    ProductionManager,
}

impl AssignmentRole {
    pub const ALL: [AssignmentRole; 4] = [
        AssignmentRole::SalesRep,
        AssignmentRole::MarketingRep,
        AssignmentRole::SalesManager,
        AssignmentRole::ProductionManager,
    ];

    pub fn slot(&self) -> CommissionSlot {
        match self {
            AssignmentRole::SalesRep => CommissionSlot::SalesRep,
            AssignmentRole::MarketingRep => CommissionSlot::MarketingRep,
            AssignmentRole::SalesManager => CommissionSlot::SalesManager,
            AssignmentRole::ProductionManager => CommissionSlot::ProductionManager,
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.slot().as_str()
    }
}

impl TryFrom<proto::AssignmentRole> for AssignmentRole {
    type Error = ();

    fn try_from(r: proto::AssignmentRole) -> Result<Self, Self::Error> {
        match r {
            proto::AssignmentRole::SalesRep => Ok(AssignmentRole::SalesRep),
            proto::AssignmentRole::MarketingRep => Ok(AssignmentRole::MarketingRep),
            proto::AssignmentRole::SalesManager => Ok(AssignmentRole::SalesManager),
            proto::AssignmentRole::ProductionManager => Ok(AssignmentRole::ProductionManager),
            proto::AssignmentRole::Unspecified => Err(()),
        }
    }
}

/// Which slot a commission record was created for: one of the four role
/// assignments, or a layered override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommissionSlot {
    SalesRep,
    MarketingRep,
    SalesManager,
    ProductionManager,
    OfficeOverride,
    TeamLeadOverride,
}

impl CommissionSlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommissionSlot::SalesRep => "sales_rep_id",
            CommissionSlot::MarketingRep => "marketing_rep_id",
            CommissionSlot::SalesManager => "sales_manager_id",
            CommissionSlot::ProductionManager => "production_manager_id",
            CommissionSlot::OfficeOverride => "office_override",
            CommissionSlot::TeamLeadOverride => "team_lead_override",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sales_rep_id" => Some(CommissionSlot::SalesRep),
            "marketing_rep_id" => Some(CommissionSlot::MarketingRep),
            "sales_manager_id" => Some(CommissionSlot::SalesManager),
            "production_manager_id" => Some(CommissionSlot::ProductionManager),
            "office_override" => Some(CommissionSlot::OfficeOverride),
            "team_lead_override" => Some(CommissionSlot::TeamLeadOverride),
            _ => None,
        }
    }

    pub fn role(&self) -> Option<AssignmentRole> {
        match self {
            CommissionSlot::SalesRep => Some(AssignmentRole::SalesRep),
            CommissionSlot::MarketingRep => Some(AssignmentRole::MarketingRep),
            CommissionSlot::SalesManager => Some(AssignmentRole::SalesManager),
            CommissionSlot::ProductionManager => Some(AssignmentRole::ProductionManager),
            CommissionSlot::OfficeOverride | CommissionSlot::TeamLeadOverride => None,
        }
    }
}

impl From<CommissionSlot> for proto::CommissionSlot {
    fn from(s: CommissionSlot) -> Self {
        match s {
            CommissionSlot::SalesRep => proto::CommissionSlot::SalesRep,
            CommissionSlot::MarketingRep => proto::CommissionSlot::MarketingRep,
            CommissionSlot::SalesManager => proto::CommissionSlot::SalesManager,
            CommissionSlot::ProductionManager => proto::CommissionSlot::ProductionManager,
            CommissionSlot::OfficeOverride => proto::CommissionSlot::OfficeOverride,
            CommissionSlot::TeamLeadOverride => proto::CommissionSlot::TeamLeadOverride,
        }
    }
}

// ============================================================================
// Rows
// ============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct LeadCommission {
    pub commission_id: Uuid,
    pub company_id: Uuid,
    pub lead_id: Uuid,
    pub user_id: Uuid,
    pub assignment_field: String,
    pub commission_type: String,
    pub commission_rate: Option<Decimal>,
    pub flat_amount: Option<Decimal>,
    pub base_amount: Decimal,
    pub calculated_amount: Decimal,
    pub paid_when: String,
    pub status: String,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl LeadCommission {
    pub fn status(&self) -> CommissionStatus {
        CommissionStatus::from_string(&self.status)
    }

    pub fn slot(&self) -> Option<CommissionSlot> {
        CommissionSlot::parse(&self.assignment_field)
    }
}

impl From<LeadCommission> for proto::LeadCommission {
    fn from(c: LeadCommission) -> Self {
        let slot = c
            .slot()
            .map(proto::CommissionSlot::from)
            .unwrap_or(proto::CommissionSlot::Unspecified);
        let commission_type = CommissionType::parse(&c.commission_type)
            .map(proto::CommissionType::from)
            .unwrap_or(proto::CommissionType::Unspecified);

        Self {
            commission_id: c.commission_id.to_string(),
            company_id: c.company_id.to_string(),
            lead_id: c.lead_id.to_string(),
            user_id: c.user_id.to_string(),
            assignment_field: slot.into(),
            commission_type: commission_type.into(),
            commission_rate: c.commission_rate.map(|d| d.to_string()),
            flat_amount: c.flat_amount.map(|d| d.to_string()),
            base_amount: c.base_amount.to_string(),
            calculated_amount: c.calculated_amount.to_string(),
            paid_when: proto::PaidWhen::from(PaidWhen::from_string(&c.paid_when)).into(),
            status: proto::CommissionStatus::from(c.status()).into(),
            notes: c.notes,
            created_by: c.created_by.map(|u| u.to_string()),
            created_utc: Some(datetime_to_timestamp(c.created_utc)),
            updated_utc: Some(datetime_to_timestamp(c.updated_utc)),
        }
    }
}

/// Input for inserting a commission record.
#[derive(Debug, Clone)]
pub struct NewLeadCommission {
    pub lead_id: Uuid,
    pub user_id: Uuid,
    pub assignment_field: CommissionSlot,
    pub commission_type: CommissionType,
    pub commission_rate: Option<Decimal>,
    pub flat_amount: Option<Decimal>,
    pub base_amount: Decimal,
    pub calculated_amount: Decimal,
    pub paid_when: PaidWhen,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commission_type_round_trips_known_tags() {
        for t in [
            CommissionType::Percentage,
            CommissionType::FlatAmount,
            CommissionType::FlatPerJob,
        ] {
            assert_eq!(CommissionType::parse(t.as_str()), Some(t));
        }
        assert_eq!(CommissionType::parse("tiered"), None);
    }

    #[test]
    fn status_machine_allows_only_forward_transitions() {
        use CommissionStatus::*;

        assert!(Pending.can_transition(Approved));
        assert!(Pending.can_transition(Cancelled));
        assert!(Approved.can_transition(Paid));
        assert!(Approved.can_transition(Cancelled));

        // paid is immutable, cancelled is terminal
        assert!(!Paid.can_transition(Cancelled));
        assert!(!Paid.can_transition(Pending));
        assert!(!Cancelled.can_transition(Pending));
        assert!(!Cancelled.can_transition(Approved));
        // paying straight from pending skips approval
        assert!(!Pending.can_transition(Paid));
    }

    #[test]
    fn slot_maps_roles_both_ways() {
        for role in AssignmentRole::ALL {
            assert_eq!(role.slot().role(), Some(role));
        }
        assert_eq!(CommissionSlot::OfficeOverride.role(), None);
        assert_eq!(CommissionSlot::parse("office_override"), Some(CommissionSlot::OfficeOverride));
        assert_eq!(CommissionSlot::parse("garbage"), None);
    }
}
