//! Capability definitions for commission-service.
//!
//! Re-exports shared capability infrastructure from service-core and
//! provides service-specific capability constants.

pub use service_core::grpc::{AuthContext, CapabilityChecker};

/// Commission service capabilities.
pub mod capabilities {
    /// Create leads.
    pub const COMMISSION_LEAD_CREATE: &str = "commission.lead:create";

    /// Read leads.
    pub const COMMISSION_LEAD_READ: &str = "commission.lead:read";

    /// Assign or unassign lead role slots.
    pub const COMMISSION_ASSIGNMENT_WRITE: &str = "commission.assignment:write";

    /// Record customer invoices.
    pub const COMMISSION_INVOICE_WRITE: &str = "commission.invoice:write";

    /// Read commission records.
    pub const COMMISSION_RECORD_READ: &str = "commission.record:read";

    /// Approve, pay or cancel commission records.
    pub const COMMISSION_RECORD_MANAGE: &str = "commission.record:manage";

    /// Create commission plans.
    pub const COMMISSION_PLAN_CREATE: &str = "commission.plan:create";

    /// Read commission plans.
    pub const COMMISSION_PLAN_READ: &str = "commission.plan:read";

    /// Update or archive commission plans.
    pub const COMMISSION_PLAN_UPDATE: &str = "commission.plan:update";
}
