//! CommissionService gRPC implementation.

use crate::grpc::capability_check::{capabilities, CapabilityChecker};
use crate::grpc::proto::commission_service_server::CommissionService;
use crate::grpc::proto::{self, *};
use crate::models::{
    AssignmentRole, CommissionStatus, CommissionType, CreatePlan, NewInvoice, NewLead, PaidWhen,
};
use crate::services::engine::{
    reconcile_assignment, refresh_lead_commissions, AssignmentOutcome, CommissionStore,
    ReconcileRequest,
};
use crate::services::{
    record_assignment_outcome, record_commission_amount, record_commission_operation,
    record_error, record_grpc_request, record_grpc_request_duration, record_plan_operation,
    Database,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use service_core::error::AppError;
use service_core::grpc::IntoStatus;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tonic::{Request, Response, Status};
use uuid::Uuid;
use validator::Validate;

/// CommissionService implementation.
pub struct CommissionServiceImpl {
    db: Arc<Database>,
    capability_checker: Arc<CapabilityChecker>,
}

impl CommissionServiceImpl {
    /// Create a new CommissionServiceImpl.
    pub fn new(db: Arc<Database>, capability_checker: Arc<CapabilityChecker>) -> Self {
        Self {
            db,
            capability_checker,
        }
    }
}

// Helper functions for type conversions

#[allow(clippy::result_large_err)]
fn parse_uuid(s: &str) -> Result<Uuid, Status> {
    Uuid::parse_str(s).map_err(|_| Status::invalid_argument(format!("Invalid UUID: {}", s)))
}

#[allow(clippy::result_large_err)]
fn parse_decimal(s: &str) -> Result<Decimal, Status> {
    Decimal::from_str(s).map_err(|_| Status::invalid_argument(format!("Invalid decimal: {}", s)))
}

#[allow(clippy::result_large_err)]
fn parse_opt_uuid(s: Option<&str>) -> Result<Option<Uuid>, Status> {
    match s {
        None | Some("") => Ok(None),
        Some(s) => parse_uuid(s).map(Some),
    }
}

#[allow(clippy::result_large_err)]
fn parse_opt_decimal(s: Option<&str>) -> Result<Option<Decimal>, Status> {
    match s {
        None | Some("") => Ok(None),
        Some(s) => parse_decimal(s).map(Some),
    }
}

#[allow(clippy::result_large_err)]
fn parse_tenant_id(auth: &crate::grpc::capability_check::AuthContext) -> Result<Uuid, Status> {
    Uuid::parse_str(&auth.tenant_id)
        .map_err(|_| Status::internal(format!("Invalid tenant_id: {}", auth.tenant_id)))
}

/// The acting user for audit fields; non-UUID principals (service accounts,
/// the BFF fallback) record as no actor.
fn acting_user(auth: &crate::grpc::capability_check::AuthContext) -> Option<Uuid> {
    Uuid::parse_str(&auth.user_id).ok()
}

fn outcome_to_proto(outcome: AssignmentOutcome) -> proto::AssignmentOutcome {
    proto::AssignmentOutcome {
        slot: proto::CommissionSlot::from(outcome.slot).into(),
        success: outcome.success,
        message: outcome.message,
        commission: outcome.commission.map(proto::LeadCommission::from),
    }
}

fn outcome_label(outcome: &AssignmentOutcome) -> &'static str {
    if !outcome.success {
        "failed"
    } else if outcome.commission.is_some() {
        "reconciled"
    } else {
        "skipped"
    }
}

impl CommissionServiceImpl {
    /// Reconcile the given role slot and record the per-tenant metrics.
    async fn reconcile_and_record(
        &self,
        tenant_id: Uuid,
        lead_id: Uuid,
        user_id: Option<Uuid>,
        acting_user_id: Option<Uuid>,
        role: AssignmentRole,
        skip_cancel_others: bool,
    ) -> AssignmentOutcome {
        let outcome = reconcile_assignment(
            &*self.db,
            ReconcileRequest {
                company_id: tenant_id,
                lead_id,
                user_id,
                acting_user_id,
                role,
                skip_cancel_others,
            },
        )
        .await;

        record_assignment_outcome(
            &tenant_id.to_string(),
            outcome.slot.as_str(),
            outcome_label(&outcome),
        );
        if let Some(commission) = &outcome.commission {
            record_commission_amount(
                &tenant_id.to_string(),
                outcome.slot.as_str(),
                commission.calculated_amount.to_f64().unwrap_or(0.0),
            );
        }

        outcome
    }
}

#[tonic::async_trait]
impl CommissionService for CommissionServiceImpl {
    // =========================================================================
    // Lead intake and role assignment
    // =========================================================================

    #[tracing::instrument(skip(self, request), fields(method = "CreateLead"))]
    async fn create_lead(
        &self,
        request: Request<CreateLeadRequest>,
    ) -> Result<Response<CreateLeadResponse>, Status> {
        let start = Instant::now();
        let method = "CreateLead";

        let auth = self
            .capability_checker
            .require_capability(&request, capabilities::COMMISSION_LEAD_CREATE)
            .await?;
        let tenant_id = parse_tenant_id(&auth)?;
        let acting_user_id = acting_user(&auth);

        let req = request.into_inner();
        tracing::info!(tenant_id = %tenant_id, customer = %req.customer_name, "Creating lead");

        let input = NewLead {
            location_id: parse_uuid(&req.location_id)?,
            customer_name: req.customer_name,
            address: if req.address.is_empty() {
                None
            } else {
                Some(req.address)
            },
            sales_rep_id: parse_opt_uuid(req.sales_rep_id.as_deref())?,
            marketing_rep_id: parse_opt_uuid(req.marketing_rep_id.as_deref())?,
            sales_manager_id: parse_opt_uuid(req.sales_manager_id.as_deref())?,
            production_manager_id: parse_opt_uuid(req.production_manager_id.as_deref())?,
        };
        input
            .validate()
            .map_err(|e| AppError::ValidationError(e).into_status())?;

        let lead = self.db.create_lead(tenant_id, &input).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to create lead");
            record_error("database", method);
            record_grpc_request(method, "error");
            record_grpc_request_duration(method, start.elapsed().as_secs_f64());
            e.into_status()
        })?;

        // Role slots provided at intake are reconciled like assignments. The
        // first slot carries the override fan-out; the rest skip it along
        // with the reassignment sweep, which has nothing to cancel on a
        // fresh lead.
        let mut outcomes = Vec::new();
        let mut first = true;
        for (role, user_id) in lead.assigned_roles() {
            let outcome = self
                .reconcile_and_record(
                    tenant_id,
                    lead.lead_id,
                    Some(user_id),
                    acting_user_id,
                    role,
                    !first,
                )
                .await;
            first = false;
            outcomes.push(outcome_to_proto(outcome));
        }

        record_commission_operation(&tenant_id.to_string(), "lead_created");
        record_grpc_request(method, "ok");
        record_grpc_request_duration(method, start.elapsed().as_secs_f64());

        Ok(Response::new(CreateLeadResponse {
            lead: Some(lead.into()),
            outcomes,
        }))
    }

    #[tracing::instrument(skip(self, request), fields(method = "GetLead"))]
    async fn get_lead(
        &self,
        request: Request<GetLeadRequest>,
    ) -> Result<Response<GetLeadResponse>, Status> {
        let start = Instant::now();
        let method = "GetLead";

        let auth = self
            .capability_checker
            .require_capability(&request, capabilities::COMMISSION_LEAD_READ)
            .await?;
        let tenant_id = parse_tenant_id(&auth)?;

        let req = request.into_inner();
        let lead_id = parse_uuid(&req.lead_id)?;

        tracing::debug!(tenant_id = %tenant_id, lead_id = %lead_id, "Getting lead");

        let lead = self.db.get_lead(tenant_id, lead_id).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to get lead");
            record_error("database", method);
            record_grpc_request(method, "error");
            record_grpc_request_duration(method, start.elapsed().as_secs_f64());
            e.into_status()
        })?;

        let lead = lead.ok_or_else(|| {
            record_grpc_request(method, "not_found");
            record_grpc_request_duration(method, start.elapsed().as_secs_f64());
            Status::not_found("Lead not found")
        })?;

        record_grpc_request(method, "ok");
        record_grpc_request_duration(method, start.elapsed().as_secs_f64());

        Ok(Response::new(GetLeadResponse {
            lead: Some(lead.into()),
        }))
    }

    #[tracing::instrument(skip(self, request), fields(method = "AssignLeadRole"))]
    async fn assign_lead_role(
        &self,
        request: Request<AssignLeadRoleRequest>,
    ) -> Result<Response<AssignLeadRoleResponse>, Status> {
        let start = Instant::now();
        let method = "AssignLeadRole";

        let auth = self
            .capability_checker
            .require_capability(&request, capabilities::COMMISSION_ASSIGNMENT_WRITE)
            .await?;
        let tenant_id = parse_tenant_id(&auth)?;
        let acting_user_id = acting_user(&auth);

        let req = request.into_inner();
        let lead_id = parse_uuid(&req.lead_id)?;
        let role = AssignmentRole::try_from(req.role())
            .map_err(|_| Status::invalid_argument("Assignment role must be specified"))?;
        let user_id = parse_opt_uuid(req.user_id.as_deref())?;

        tracing::info!(
            tenant_id = %tenant_id,
            lead_id = %lead_id,
            slot = role.as_str(),
            assigned = user_id.is_some(),
            "Assigning lead role"
        );

        // Write the slot on the lead first so the reconciler (and any
        // concurrent fan-out) sees the new occupant.
        let lead = self
            .db
            .set_lead_role(tenant_id, lead_id, role, user_id)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to set lead role");
                record_error("database", method);
                record_grpc_request(method, "error");
                record_grpc_request_duration(method, start.elapsed().as_secs_f64());
                e.into_status()
            })?;
        if lead.is_none() {
            record_grpc_request(method, "not_found");
            record_grpc_request_duration(method, start.elapsed().as_secs_f64());
            return Err(Status::not_found("Lead not found"));
        }

        let outcome = self
            .reconcile_and_record(
                tenant_id,
                lead_id,
                user_id,
                acting_user_id,
                role,
                req.skip_cancel_others,
            )
            .await;

        record_grpc_request(method, "ok");
        record_grpc_request_duration(method, start.elapsed().as_secs_f64());

        Ok(Response::new(AssignLeadRoleResponse {
            outcome: Some(outcome_to_proto(outcome)),
        }))
    }

    // =========================================================================
    // Invoices
    // =========================================================================

    #[tracing::instrument(skip(self, request), fields(method = "RecordCustomerInvoice"))]
    async fn record_customer_invoice(
        &self,
        request: Request<RecordCustomerInvoiceRequest>,
    ) -> Result<Response<RecordCustomerInvoiceResponse>, Status> {
        let start = Instant::now();
        let method = "RecordCustomerInvoice";

        let auth = self
            .capability_checker
            .require_capability(&request, capabilities::COMMISSION_INVOICE_WRITE)
            .await?;
        let tenant_id = parse_tenant_id(&auth)?;
        let acting_user_id = acting_user(&auth);

        let req = request.into_inner();
        let lead_id = parse_uuid(&req.lead_id)?;
        let total = parse_decimal(&req.total)?;
        if total < Decimal::ZERO {
            return Err(Status::invalid_argument("Invoice total must not be negative"));
        }

        tracing::info!(tenant_id = %tenant_id, lead_id = %lead_id, total = %total, "Recording invoice");

        let lead = self
            .db
            .get_lead(tenant_id, lead_id)
            .await
            .map_err(|e| {
                record_error("database", method);
                record_grpc_request(method, "error");
                record_grpc_request_duration(method, start.elapsed().as_secs_f64());
                e.into_status()
            })?
            .ok_or_else(|| {
                record_grpc_request(method, "not_found");
                record_grpc_request_duration(method, start.elapsed().as_secs_f64());
                Status::not_found("Lead not found")
            })?;

        let invoice = self
            .db
            .insert_invoice(
                tenant_id,
                &NewInvoice {
                    lead_id,
                    total,
                    description: if req.description.is_empty() {
                        None
                    } else {
                        Some(req.description)
                    },
                },
            )
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to insert invoice");
                record_error("database", method);
                record_grpc_request(method, "error");
                record_grpc_request_duration(method, start.elapsed().as_secs_f64());
                e.into_status()
            })?;

        // Top up every assigned role against the new total. Failures are
        // reported in the outcomes, never as an RPC error: the invoice is
        // already recorded.
        let outcomes = refresh_lead_commissions(&*self.db, &lead, acting_user_id).await;
        for outcome in &outcomes {
            record_assignment_outcome(
                &tenant_id.to_string(),
                outcome.slot.as_str(),
                outcome_label(outcome),
            );
        }

        record_commission_operation(&tenant_id.to_string(), "invoice_recorded");
        record_grpc_request(method, "ok");
        record_grpc_request_duration(method, start.elapsed().as_secs_f64());

        Ok(Response::new(RecordCustomerInvoiceResponse {
            invoice: Some(invoice.into()),
            outcomes: outcomes.into_iter().map(outcome_to_proto).collect(),
        }))
    }

    #[tracing::instrument(skip(self, request), fields(method = "RefreshLeadCommissions"))]
    async fn refresh_lead_commissions(
        &self,
        request: Request<RefreshLeadCommissionsRequest>,
    ) -> Result<Response<RefreshLeadCommissionsResponse>, Status> {
        let start = Instant::now();
        let method = "RefreshLeadCommissions";

        let auth = self
            .capability_checker
            .require_capability(&request, capabilities::COMMISSION_ASSIGNMENT_WRITE)
            .await?;
        let tenant_id = parse_tenant_id(&auth)?;
        let acting_user_id = acting_user(&auth);

        let req = request.into_inner();
        let lead_id = parse_uuid(&req.lead_id)?;

        tracing::info!(tenant_id = %tenant_id, lead_id = %lead_id, "Refreshing lead commissions");

        let lead = self
            .db
            .get_lead(tenant_id, lead_id)
            .await
            .map_err(|e| {
                record_error("database", method);
                record_grpc_request(method, "error");
                record_grpc_request_duration(method, start.elapsed().as_secs_f64());
                e.into_status()
            })?
            .ok_or_else(|| {
                record_grpc_request(method, "not_found");
                record_grpc_request_duration(method, start.elapsed().as_secs_f64());
                Status::not_found("Lead not found")
            })?;

        let outcomes = refresh_lead_commissions(&*self.db, &lead, acting_user_id).await;
        for outcome in &outcomes {
            record_assignment_outcome(
                &tenant_id.to_string(),
                outcome.slot.as_str(),
                outcome_label(outcome),
            );
        }

        record_grpc_request(method, "ok");
        record_grpc_request_duration(method, start.elapsed().as_secs_f64());

        Ok(Response::new(RefreshLeadCommissionsResponse {
            outcomes: outcomes.into_iter().map(outcome_to_proto).collect(),
        }))
    }

    // =========================================================================
    // Commission records
    // =========================================================================

    #[tracing::instrument(skip(self, request), fields(method = "ListLeadCommissions"))]
    async fn list_lead_commissions(
        &self,
        request: Request<ListLeadCommissionsRequest>,
    ) -> Result<Response<ListLeadCommissionsResponse>, Status> {
        let start = Instant::now();
        let method = "ListLeadCommissions";

        let auth = self
            .capability_checker
            .require_capability(&request, capabilities::COMMISSION_RECORD_READ)
            .await?;
        let tenant_id = parse_tenant_id(&auth)?;

        let req = request.into_inner();
        let lead_id = parse_uuid(&req.lead_id)?;

        tracing::debug!(tenant_id = %tenant_id, lead_id = %lead_id, "Listing lead commissions");

        let commissions = self
            .db
            .list_lead_commissions(tenant_id, lead_id)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to list commissions");
                record_error("database", method);
                record_grpc_request(method, "error");
                record_grpc_request_duration(method, start.elapsed().as_secs_f64());
                e.into_status()
            })?;

        record_grpc_request(method, "ok");
        record_grpc_request_duration(method, start.elapsed().as_secs_f64());

        Ok(Response::new(ListLeadCommissionsResponse {
            commissions: commissions.into_iter().map(Into::into).collect(),
        }))
    }

    #[tracing::instrument(skip(self, request), fields(method = "GetLeadCommission"))]
    async fn get_lead_commission(
        &self,
        request: Request<GetLeadCommissionRequest>,
    ) -> Result<Response<GetLeadCommissionResponse>, Status> {
        let start = Instant::now();
        let method = "GetLeadCommission";

        let auth = self
            .capability_checker
            .require_capability(&request, capabilities::COMMISSION_RECORD_READ)
            .await?;
        let tenant_id = parse_tenant_id(&auth)?;

        let req = request.into_inner();
        let commission_id = parse_uuid(&req.commission_id)?;

        let commission = self
            .db
            .get_commission(tenant_id, commission_id)
            .await
            .map_err(|e| {
                record_error("database", method);
                record_grpc_request(method, "error");
                record_grpc_request_duration(method, start.elapsed().as_secs_f64());
                e.into_status()
            })?
            .ok_or_else(|| {
                record_grpc_request(method, "not_found");
                record_grpc_request_duration(method, start.elapsed().as_secs_f64());
                Status::not_found("Commission not found")
            })?;

        record_grpc_request(method, "ok");
        record_grpc_request_duration(method, start.elapsed().as_secs_f64());

        Ok(Response::new(GetLeadCommissionResponse {
            commission: Some(commission.into()),
        }))
    }

    #[tracing::instrument(skip(self, request), fields(method = "UpdateCommissionStatus"))]
    async fn update_commission_status(
        &self,
        request: Request<UpdateCommissionStatusRequest>,
    ) -> Result<Response<UpdateCommissionStatusResponse>, Status> {
        let start = Instant::now();
        let method = "UpdateCommissionStatus";

        let auth = self
            .capability_checker
            .require_capability(&request, capabilities::COMMISSION_RECORD_MANAGE)
            .await?;
        let tenant_id = parse_tenant_id(&auth)?;

        let req = request.into_inner();
        let commission_id = parse_uuid(&req.commission_id)?;
        let next = CommissionStatus::try_from(req.status())
            .map_err(|_| Status::invalid_argument("Commission status must be specified"))?;

        tracing::info!(
            tenant_id = %tenant_id,
            commission_id = %commission_id,
            status = next.as_str(),
            "Updating commission status"
        );

        let current = self
            .db
            .get_commission(tenant_id, commission_id)
            .await
            .map_err(|e| {
                record_error("database", method);
                record_grpc_request(method, "error");
                record_grpc_request_duration(method, start.elapsed().as_secs_f64());
                e.into_status()
            })?
            .ok_or_else(|| {
                record_grpc_request(method, "not_found");
                record_grpc_request_duration(method, start.elapsed().as_secs_f64());
                Status::not_found("Commission not found")
            })?;

        if !current.status().can_transition(next) {
            record_grpc_request(method, "failed_precondition");
            record_grpc_request_duration(method, start.elapsed().as_secs_f64());
            return Err(Status::failed_precondition(format!(
                "Cannot transition commission from {} to {}",
                current.status,
                next.as_str()
            )));
        }

        let commission = self
            .db
            .update_commission_status(tenant_id, commission_id, next, req.notes.as_deref())
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to update commission status");
                record_error("database", method);
                record_grpc_request(method, "error");
                record_grpc_request_duration(method, start.elapsed().as_secs_f64());
                e.into_status()
            })?;

        record_commission_operation(&tenant_id.to_string(), next.as_str());
        record_grpc_request(method, "ok");
        record_grpc_request_duration(method, start.elapsed().as_secs_f64());

        Ok(Response::new(UpdateCommissionStatusResponse {
            commission: Some(commission.into()),
        }))
    }

    // =========================================================================
    // Commission plans
    // =========================================================================

    #[tracing::instrument(skip(self, request), fields(method = "CreateCommissionPlan"))]
    async fn create_commission_plan(
        &self,
        request: Request<CreateCommissionPlanRequest>,
    ) -> Result<Response<CreateCommissionPlanResponse>, Status> {
        let start = Instant::now();
        let method = "CreateCommissionPlan";

        let auth = self
            .capability_checker
            .require_capability(&request, capabilities::COMMISSION_PLAN_CREATE)
            .await?;
        let tenant_id = parse_tenant_id(&auth)?;

        let req = request.into_inner();
        let commission_type = CommissionType::try_from(req.commission_type())
            .map_err(|_| Status::invalid_argument("Commission type must be specified"))?;

        tracing::info!(tenant_id = %tenant_id, name = %req.name, "Creating commission plan");

        let paid_when = PaidWhen::from(req.paid_when());
        let input = CreatePlan {
            name: req.name,
            commission_type,
            commission_rate: parse_opt_decimal(req.commission_rate.as_deref())?,
            flat_amount: parse_opt_decimal(req.flat_amount.as_deref())?,
            paid_when,
        };
        input
            .validate()
            .map_err(|e| AppError::ValidationError(e).into_status())?;

        let plan = self.db.create_plan(tenant_id, &input).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to create plan");
            record_error("database", method);
            record_grpc_request(method, "error");
            record_grpc_request_duration(method, start.elapsed().as_secs_f64());
            e.into_status()
        })?;

        record_plan_operation(&tenant_id.to_string(), "created");
        record_grpc_request(method, "ok");
        record_grpc_request_duration(method, start.elapsed().as_secs_f64());

        Ok(Response::new(CreateCommissionPlanResponse {
            plan: Some(plan.into()),
        }))
    }

    #[tracing::instrument(skip(self, request), fields(method = "GetCommissionPlan"))]
    async fn get_commission_plan(
        &self,
        request: Request<GetCommissionPlanRequest>,
    ) -> Result<Response<GetCommissionPlanResponse>, Status> {
        let start = Instant::now();
        let method = "GetCommissionPlan";

        let auth = self
            .capability_checker
            .require_capability(&request, capabilities::COMMISSION_PLAN_READ)
            .await?;
        let tenant_id = parse_tenant_id(&auth)?;

        let req = request.into_inner();
        let plan_id = parse_uuid(&req.plan_id)?;

        let plan = self
            .db
            .get_plan(tenant_id, plan_id)
            .await
            .map_err(|e| {
                record_error("database", method);
                record_grpc_request(method, "error");
                record_grpc_request_duration(method, start.elapsed().as_secs_f64());
                e.into_status()
            })?
            .ok_or_else(|| {
                record_grpc_request(method, "not_found");
                record_grpc_request_duration(method, start.elapsed().as_secs_f64());
                Status::not_found("Plan not found")
            })?;

        record_grpc_request(method, "ok");
        record_grpc_request_duration(method, start.elapsed().as_secs_f64());

        Ok(Response::new(GetCommissionPlanResponse {
            plan: Some(plan.into()),
        }))
    }

    #[tracing::instrument(skip(self, request), fields(method = "ListCommissionPlans"))]
    async fn list_commission_plans(
        &self,
        request: Request<ListCommissionPlansRequest>,
    ) -> Result<Response<ListCommissionPlansResponse>, Status> {
        let start = Instant::now();
        let method = "ListCommissionPlans";

        let auth = self
            .capability_checker
            .require_capability(&request, capabilities::COMMISSION_PLAN_READ)
            .await?;
        let tenant_id = parse_tenant_id(&auth)?;

        let req = request.into_inner();
        let page_size = if req.page_size > 0 { req.page_size } else { 50 };
        let page_token = match req.page_token.as_deref() {
            None | Some("") => None,
            Some(token) => Some(parse_uuid(token)?),
        };

        tracing::debug!(tenant_id = %tenant_id, "Listing commission plans");

        let (plans, next_page_token) = self
            .db
            .list_plans(tenant_id, req.include_archived, page_size, page_token)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to list plans");
                record_error("database", method);
                record_grpc_request(method, "error");
                record_grpc_request_duration(method, start.elapsed().as_secs_f64());
                e.into_status()
            })?;

        record_grpc_request(method, "ok");
        record_grpc_request_duration(method, start.elapsed().as_secs_f64());

        Ok(Response::new(ListCommissionPlansResponse {
            plans: plans.into_iter().map(Into::into).collect(),
            next_page_token,
        }))
    }

    #[tracing::instrument(skip(self, request), fields(method = "ArchiveCommissionPlan"))]
    async fn archive_commission_plan(
        &self,
        request: Request<ArchiveCommissionPlanRequest>,
    ) -> Result<Response<ArchiveCommissionPlanResponse>, Status> {
        let start = Instant::now();
        let method = "ArchiveCommissionPlan";

        let auth = self
            .capability_checker
            .require_capability(&request, capabilities::COMMISSION_PLAN_UPDATE)
            .await?;
        let tenant_id = parse_tenant_id(&auth)?;

        let req = request.into_inner();
        let plan_id = parse_uuid(&req.plan_id)?;

        tracing::info!(tenant_id = %tenant_id, plan_id = %plan_id, "Archiving commission plan");

        let plan = self
            .db
            .archive_plan(tenant_id, plan_id)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to archive plan");
                record_error("database", method);
                record_grpc_request(method, "error");
                record_grpc_request_duration(method, start.elapsed().as_secs_f64());
                e.into_status()
            })?
            .ok_or_else(|| {
                record_grpc_request(method, "not_found");
                record_grpc_request_duration(method, start.elapsed().as_secs_f64());
                Status::not_found("Plan not found")
            })?;

        record_plan_operation(&tenant_id.to_string(), "archived");
        record_grpc_request(method, "ok");
        record_grpc_request_duration(method, start.elapsed().as_secs_f64());

        Ok(Response::new(ArchiveCommissionPlanResponse {
            plan: Some(plan.into()),
        }))
    }
}
