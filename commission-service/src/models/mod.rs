//! Domain models for commission-service.

mod commission;
mod lead;
mod org;
mod plan;

pub use commission::{
    AssignmentRole, CommissionSlot, CommissionStatus, CommissionType, LeadCommission,
    NewLeadCommission, PaidWhen,
};
pub use lead::{CustomerInvoice, Lead, NewInvoice, NewLead};
pub use org::{LocationRole, LocationUser, NewLocationUser, NewTeam, NewUser, Team, User};
pub use plan::{CommissionPlan, CreatePlan};

use chrono::{DateTime, Utc};
use prost_types::Timestamp;

pub(crate) fn datetime_to_timestamp(dt: DateTime<Utc>) -> Timestamp {
    Timestamp {
        seconds: dt.timestamp(),
        nanos: dt.timestamp_subsec_nanos() as i32,
    }
}
