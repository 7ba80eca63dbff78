//! Integration tests for lead role assignment and commission reconciliation.

mod common;

use commission_service::grpc::proto::commission_service_client::CommissionServiceClient;
use commission_service::grpc::proto::*;
use common::{dec, seed_percentage_sales_rep, seed_unconfigured_user, spawn_app, with_tenant};
use tonic::transport::Channel;
use uuid::Uuid;

type Client = CommissionServiceClient<Channel>;

/// Create a bare lead and return its ID.
async fn create_lead(client: &mut Client, tenant_id: &Uuid, location_id: Uuid) -> String {
    let request = with_tenant(
        CreateLeadRequest {
            location_id: location_id.to_string(),
            customer_name: "Homeowner".to_string(),
            address: "12 Shingle Way".to_string(),
            sales_rep_id: None,
            marketing_rep_id: None,
            sales_manager_id: None,
            production_manager_id: None,
        },
        tenant_id,
    );

    client
        .create_lead(request)
        .await
        .unwrap()
        .into_inner()
        .lead
        .unwrap()
        .lead_id
}

async fn record_invoice(client: &mut Client, tenant_id: &Uuid, lead_id: &str, total: &str) {
    let request = with_tenant(
        RecordCustomerInvoiceRequest {
            lead_id: lead_id.to_string(),
            total: total.to_string(),
            description: String::new(),
        },
        tenant_id,
    );
    client.record_customer_invoice(request).await.unwrap();
}

async fn assign_sales_rep(
    client: &mut Client,
    tenant_id: &Uuid,
    lead_id: &str,
    user_id: Uuid,
) -> AssignmentOutcome {
    let request = with_tenant(
        AssignLeadRoleRequest {
            lead_id: lead_id.to_string(),
            role: AssignmentRole::SalesRep as i32,
            user_id: Some(user_id.to_string()),
            skip_cancel_others: false,
        },
        tenant_id,
    );
    client
        .assign_lead_role(request)
        .await
        .unwrap()
        .into_inner()
        .outcome
        .unwrap()
}

async fn list_commissions(
    client: &mut Client,
    tenant_id: &Uuid,
    lead_id: &str,
) -> Vec<LeadCommission> {
    let request = with_tenant(
        ListLeadCommissionsRequest {
            lead_id: lead_id.to_string(),
        },
        tenant_id,
    );
    client
        .list_lead_commissions(request)
        .await
        .unwrap()
        .into_inner()
        .commissions
}

#[tokio::test]
async fn assigning_sales_rep_creates_pending_commission() {
    let app = spawn_app().await;
    let mut client = app.grpc_client.clone();

    let rep = seed_percentage_sales_rep(&app.db, app.tenant_id, "10").await;
    let lead_id = create_lead(&mut client, &app.tenant_id, Uuid::new_v4()).await;
    record_invoice(&mut client, &app.tenant_id, &lead_id, "2000").await;

    let outcome = assign_sales_rep(&mut client, &app.tenant_id, &lead_id, rep).await;
    assert!(outcome.success, "{}", outcome.message);

    let commission = outcome.commission.unwrap();
    assert_eq!(dec(&commission.base_amount), dec("2000"));
    assert_eq!(dec(&commission.calculated_amount), dec("200"));
    assert_eq!(commission.status, CommissionStatus::Pending as i32);
    assert_eq!(commission.assignment_field, CommissionSlot::SalesRep as i32);
    assert_eq!(commission.user_id, rep.to_string());
}

#[tokio::test]
async fn repeated_assignment_does_not_duplicate_commissions() {
    let app = spawn_app().await;
    let mut client = app.grpc_client.clone();

    let rep = seed_percentage_sales_rep(&app.db, app.tenant_id, "10").await;
    let lead_id = create_lead(&mut client, &app.tenant_id, Uuid::new_v4()).await;
    record_invoice(&mut client, &app.tenant_id, &lead_id, "2000").await;

    assign_sales_rep(&mut client, &app.tenant_id, &lead_id, rep).await;
    let second = assign_sales_rep(&mut client, &app.tenant_id, &lead_id, rep).await;
    assert!(second.success);

    let commissions = list_commissions(&mut client, &app.tenant_id, &lead_id).await;
    assert_eq!(commissions.len(), 1);
    assert_eq!(dec(&commissions[0].base_amount), dec("2000"));
    assert_eq!(dec(&commissions[0].calculated_amount), dec("200"));
}

#[tokio::test]
async fn reassignment_cancels_the_displaced_rep() {
    let app = spawn_app().await;
    let mut client = app.grpc_client.clone();

    let rep_a = seed_percentage_sales_rep(&app.db, app.tenant_id, "10").await;
    let rep_b = seed_percentage_sales_rep(&app.db, app.tenant_id, "8").await;
    let lead_id = create_lead(&mut client, &app.tenant_id, Uuid::new_v4()).await;
    record_invoice(&mut client, &app.tenant_id, &lead_id, "1000").await;

    assign_sales_rep(&mut client, &app.tenant_id, &lead_id, rep_a).await;
    let outcome = assign_sales_rep(&mut client, &app.tenant_id, &lead_id, rep_b).await;
    assert!(outcome.success);

    let commissions = list_commissions(&mut client, &app.tenant_id, &lead_id).await;
    assert_eq!(commissions.len(), 2);

    let cancelled: Vec<_> = commissions
        .iter()
        .filter(|c| c.status == CommissionStatus::Cancelled as i32)
        .collect();
    assert_eq!(cancelled.len(), 1);
    assert_eq!(cancelled[0].user_id, rep_a.to_string());

    let open: Vec<_> = commissions
        .iter()
        .filter(|c| c.status == CommissionStatus::Pending as i32)
        .collect();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].user_id, rep_b.to_string());
    assert_eq!(dec(&open[0].base_amount), dec("1000"));
}

#[tokio::test]
async fn unassignment_cancels_all_open_commissions() {
    let app = spawn_app().await;
    let mut client = app.grpc_client.clone();

    let rep = seed_percentage_sales_rep(&app.db, app.tenant_id, "10").await;
    let lead_id = create_lead(&mut client, &app.tenant_id, Uuid::new_v4()).await;
    record_invoice(&mut client, &app.tenant_id, &lead_id, "2000").await;
    assign_sales_rep(&mut client, &app.tenant_id, &lead_id, rep).await;

    let request = with_tenant(
        AssignLeadRoleRequest {
            lead_id: lead_id.clone(),
            role: AssignmentRole::SalesRep as i32,
            user_id: None,
            skip_cancel_others: false,
        },
        &app.tenant_id,
    );
    let outcome = client
        .assign_lead_role(request)
        .await
        .unwrap()
        .into_inner()
        .outcome
        .unwrap();
    assert!(outcome.success);
    assert!(outcome.commission.is_none());

    let commissions = list_commissions(&mut client, &app.tenant_id, &lead_id).await;
    assert!(!commissions.is_empty());
    assert!(commissions
        .iter()
        .all(|c| c.status == CommissionStatus::Cancelled as i32));

    // the slot on the lead itself is cleared too
    let lead = client
        .get_lead(with_tenant(
            GetLeadRequest {
                lead_id: lead_id.clone(),
            },
            &app.tenant_id,
        ))
        .await
        .unwrap()
        .into_inner()
        .lead
        .unwrap();
    assert!(lead.sales_rep_id.is_none());
}

#[tokio::test]
async fn unconfigured_user_assignment_succeeds_without_commission() {
    let app = spawn_app().await;
    let mut client = app.grpc_client.clone();

    let user = seed_unconfigured_user(&app.db, app.tenant_id).await;
    let lead_id = create_lead(&mut client, &app.tenant_id, Uuid::new_v4()).await;
    record_invoice(&mut client, &app.tenant_id, &lead_id, "2000").await;

    let outcome = assign_sales_rep(&mut client, &app.tenant_id, &lead_id, user).await;
    assert!(outcome.success);
    assert!(outcome.commission.is_none());

    let commissions = list_commissions(&mut client, &app.tenant_id, &lead_id).await;
    assert!(commissions.is_empty());
}

#[tokio::test]
async fn create_lead_with_rep_reconciles_at_intake() {
    let app = spawn_app().await;
    let mut client = app.grpc_client.clone();

    let rep = seed_percentage_sales_rep(&app.db, app.tenant_id, "10").await;

    let request = with_tenant(
        CreateLeadRequest {
            location_id: Uuid::new_v4().to_string(),
            customer_name: "Homeowner".to_string(),
            address: String::new(),
            sales_rep_id: Some(rep.to_string()),
            marketing_rep_id: None,
            sales_manager_id: None,
            production_manager_id: None,
        },
        &app.tenant_id,
    );
    let response = client.create_lead(request).await.unwrap().into_inner();
    let lead = response.lead.unwrap();
    assert_eq!(lead.sales_rep_id, Some(rep.to_string()));

    // no invoice yet: the commission is created with a zero base
    assert_eq!(response.outcomes.len(), 1);
    let commission = response.outcomes[0].commission.clone().unwrap();
    assert_eq!(dec(&commission.base_amount), dec("0"));
    assert_eq!(dec(&commission.calculated_amount), dec("0"));
    assert_eq!(commission.status, CommissionStatus::Pending as i32);
}

#[tokio::test]
async fn assigning_role_on_missing_lead_is_not_found() {
    let app = spawn_app().await;
    let mut client = app.grpc_client.clone();

    let rep = seed_percentage_sales_rep(&app.db, app.tenant_id, "10").await;
    let request = with_tenant(
        AssignLeadRoleRequest {
            lead_id: Uuid::new_v4().to_string(),
            role: AssignmentRole::SalesRep as i32,
            user_id: Some(rep.to_string()),
            skip_cancel_others: false,
        },
        &app.tenant_id,
    );

    let response = client.assign_lead_role(request).await;
    assert!(response.is_err());
    assert_eq!(response.unwrap_err().code(), tonic::Code::NotFound);
}

#[tokio::test]
async fn tenant_isolation_for_leads() {
    let app = spawn_app().await;
    let mut client = app.grpc_client.clone();

    let lead_id = create_lead(&mut client, &app.tenant_id, Uuid::new_v4()).await;

    let other_tenant = Uuid::new_v4();
    let response = client
        .get_lead(with_tenant(GetLeadRequest { lead_id }, &other_tenant))
        .await;
    assert!(response.is_err());
    assert_eq!(response.unwrap_err().code(), tonic::Code::NotFound);
}
