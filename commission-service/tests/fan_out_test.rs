//! Integration tests for office-manager and team-lead override fan-out.

mod common;

use commission_service::grpc::proto::commission_service_client::CommissionServiceClient;
use commission_service::grpc::proto::*;
use common::{
    dec, seed_office_manager, seed_percentage_sales_rep, seed_team_for, spawn_app, with_tenant,
};
use tonic::transport::Channel;
use uuid::Uuid;

type Client = CommissionServiceClient<Channel>;

async fn create_lead_with_rep(
    client: &mut Client,
    tenant_id: &Uuid,
    location_id: Uuid,
    rep: Uuid,
) -> String {
    let request = with_tenant(
        CreateLeadRequest {
            location_id: location_id.to_string(),
            customer_name: "Homeowner".to_string(),
            address: String::new(),
            sales_rep_id: Some(rep.to_string()),
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
async fn assignment_fans_out_office_and_team_overrides() {
    let app = spawn_app().await;
    let mut client = app.grpc_client.clone();
    let location_id = Uuid::new_v4();

    let rep = seed_percentage_sales_rep(&app.db, app.tenant_id, "10").await;
    let office = seed_office_manager(&app.db, app.tenant_id, location_id, "50", true).await;
    let team_lead = seed_team_for(&app.db, app.tenant_id, location_id, rep, "5").await;

    let lead_id = create_lead_with_rep(&mut client, &app.tenant_id, location_id, rep).await;
    record_invoice(&mut client, &app.tenant_id, &lead_id, "2000").await;

    // re-assign to force a second fan-out pass; existence checks keep it
    // a no-op
    let assign = with_tenant(
        AssignLeadRoleRequest {
            lead_id: lead_id.clone(),
            role: AssignmentRole::SalesRep as i32,
            user_id: Some(rep.to_string()),
            skip_cancel_others: false,
        },
        &app.tenant_id,
    );
    client.assign_lead_role(assign).await.unwrap();

    let commissions = list_commissions(&mut client, &app.tenant_id, &lead_id).await;
    assert_eq!(commissions.len(), 3);

    let office_rows: Vec<_> = commissions
        .iter()
        .filter(|c| c.assignment_field == CommissionSlot::OfficeOverride as i32)
        .collect();
    assert_eq!(office_rows.len(), 1);
    assert_eq!(office_rows[0].user_id, office.to_string());
    assert_eq!(dec(&office_rows[0].calculated_amount), dec("50"));
    assert_eq!(dec(&office_rows[0].base_amount), dec("50"));

    let team_rows: Vec<_> = commissions
        .iter()
        .filter(|c| c.assignment_field == CommissionSlot::TeamLeadOverride as i32)
        .collect();
    assert_eq!(team_rows.len(), 1);
    assert_eq!(team_rows[0].user_id, team_lead.to_string());
}

#[tokio::test]
async fn office_manager_does_not_earn_on_own_sale() {
    let app = spawn_app().await;
    let mut client = app.grpc_client.clone();
    let location_id = Uuid::new_v4();

    // the office manager is also the lead's sales rep, with own-sale
    // overrides disabled
    let office = seed_office_manager(&app.db, app.tenant_id, location_id, "50", false).await;

    let lead_id = create_lead_with_rep(&mut client, &app.tenant_id, location_id, office).await;
    record_invoice(&mut client, &app.tenant_id, &lead_id, "2000").await;

    let commissions = list_commissions(&mut client, &app.tenant_id, &lead_id).await;
    let office_rows: Vec<_> = commissions
        .iter()
        .filter(|c| c.assignment_field == CommissionSlot::OfficeOverride as i32)
        .collect();
    assert!(office_rows.is_empty());
}

#[tokio::test]
async fn overrides_survive_sales_rep_reassignment() {
    let app = spawn_app().await;
    let mut client = app.grpc_client.clone();
    let location_id = Uuid::new_v4();

    let rep_a = seed_percentage_sales_rep(&app.db, app.tenant_id, "10").await;
    let rep_b = seed_percentage_sales_rep(&app.db, app.tenant_id, "8").await;
    let office = seed_office_manager(&app.db, app.tenant_id, location_id, "50", true).await;

    let lead_id = create_lead_with_rep(&mut client, &app.tenant_id, location_id, rep_a).await;
    record_invoice(&mut client, &app.tenant_id, &lead_id, "2000").await;

    let assign = with_tenant(
        AssignLeadRoleRequest {
            lead_id: lead_id.clone(),
            role: AssignmentRole::SalesRep as i32,
            user_id: Some(rep_b.to_string()),
            skip_cancel_others: false,
        },
        &app.tenant_id,
    );
    client.assign_lead_role(assign).await.unwrap();

    let commissions = list_commissions(&mut client, &app.tenant_id, &lead_id).await;
    let office_row = commissions
        .iter()
        .find(|c| c.user_id == office.to_string())
        .unwrap();
    assert_eq!(office_row.status, CommissionStatus::Pending as i32);
}
