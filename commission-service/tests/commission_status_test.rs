//! Integration tests for manual commission status transitions.

mod common;

use commission_service::grpc::proto::commission_service_client::CommissionServiceClient;
use commission_service::grpc::proto::*;
use common::{seed_percentage_sales_rep, spawn_app, with_tenant};
use tonic::transport::Channel;
use uuid::Uuid;

type Client = CommissionServiceClient<Channel>;

/// Create a lead with an assigned rep and an invoice; returns the pending
/// commission's ID.
async fn pending_commission(client: &mut Client, app: &common::TestApp) -> String {
    let rep = seed_percentage_sales_rep(&app.db, app.tenant_id, "10").await;

    let lead = client
        .create_lead(with_tenant(
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
        ))
        .await
        .unwrap()
        .into_inner()
        .lead
        .unwrap();

    let response = client
        .record_customer_invoice(with_tenant(
            RecordCustomerInvoiceRequest {
                lead_id: lead.lead_id,
                total: "2000".to_string(),
                description: String::new(),
            },
            &app.tenant_id,
        ))
        .await
        .unwrap()
        .into_inner();

    response
        .outcomes
        .iter()
        .find_map(|o| o.commission.clone())
        .unwrap()
        .commission_id
}

async fn transition(
    client: &mut Client,
    tenant_id: &Uuid,
    commission_id: &str,
    status: CommissionStatus,
) -> Result<LeadCommission, tonic::Status> {
    client
        .update_commission_status(with_tenant(
            UpdateCommissionStatusRequest {
                commission_id: commission_id.to_string(),
                status: status as i32,
                notes: None,
            },
            tenant_id,
        ))
        .await
        .map(|r| r.into_inner().commission.unwrap())
}

#[tokio::test]
async fn approve_then_pay() {
    let app = spawn_app().await;
    let mut client = app.grpc_client.clone();
    let commission_id = pending_commission(&mut client, &app).await;

    let approved = transition(
        &mut client,
        &app.tenant_id,
        &commission_id,
        CommissionStatus::Approved,
    )
    .await
    .unwrap();
    assert_eq!(approved.status, CommissionStatus::Approved as i32);

    let paid = transition(
        &mut client,
        &app.tenant_id,
        &commission_id,
        CommissionStatus::Paid,
    )
    .await
    .unwrap();
    assert_eq!(paid.status, CommissionStatus::Paid as i32);
}

#[tokio::test]
async fn paying_straight_from_pending_is_rejected() {
    let app = spawn_app().await;
    let mut client = app.grpc_client.clone();
    let commission_id = pending_commission(&mut client, &app).await;

    let result = transition(
        &mut client,
        &app.tenant_id,
        &commission_id,
        CommissionStatus::Paid,
    )
    .await;
    assert!(result.is_err());
    assert_eq!(
        result.unwrap_err().code(),
        tonic::Code::FailedPrecondition
    );
}

#[tokio::test]
async fn paid_commission_is_immutable() {
    let app = spawn_app().await;
    let mut client = app.grpc_client.clone();
    let commission_id = pending_commission(&mut client, &app).await;

    transition(
        &mut client,
        &app.tenant_id,
        &commission_id,
        CommissionStatus::Approved,
    )
    .await
    .unwrap();
    transition(
        &mut client,
        &app.tenant_id,
        &commission_id,
        CommissionStatus::Paid,
    )
    .await
    .unwrap();

    let result = transition(
        &mut client,
        &app.tenant_id,
        &commission_id,
        CommissionStatus::Cancelled,
    )
    .await;
    assert!(result.is_err());
    assert_eq!(
        result.unwrap_err().code(),
        tonic::Code::FailedPrecondition
    );
}

#[tokio::test]
async fn cancelled_commission_stays_cancelled() {
    let app = spawn_app().await;
    let mut client = app.grpc_client.clone();
    let commission_id = pending_commission(&mut client, &app).await;

    let cancelled = transition(
        &mut client,
        &app.tenant_id,
        &commission_id,
        CommissionStatus::Cancelled,
    )
    .await
    .unwrap();
    assert_eq!(cancelled.status, CommissionStatus::Cancelled as i32);

    let result = transition(
        &mut client,
        &app.tenant_id,
        &commission_id,
        CommissionStatus::Approved,
    )
    .await;
    assert!(result.is_err());
    assert_eq!(
        result.unwrap_err().code(),
        tonic::Code::FailedPrecondition
    );
}

#[tokio::test]
async fn status_notes_are_recorded() {
    let app = spawn_app().await;
    let mut client = app.grpc_client.clone();
    let commission_id = pending_commission(&mut client, &app).await;

    let approved = client
        .update_commission_status(with_tenant(
            UpdateCommissionStatusRequest {
                commission_id: commission_id.clone(),
                status: CommissionStatus::Approved as i32,
                notes: Some("Verified against signed contract".to_string()),
            },
            &app.tenant_id,
        ))
        .await
        .unwrap()
        .into_inner()
        .commission
        .unwrap();

    assert_eq!(
        approved.notes.as_deref(),
        Some("Verified against signed contract")
    );

    let fetched = client
        .get_lead_commission(with_tenant(
            GetLeadCommissionRequest { commission_id },
            &app.tenant_id,
        ))
        .await
        .unwrap()
        .into_inner()
        .commission
        .unwrap();
    assert_eq!(fetched.status, CommissionStatus::Approved as i32);
}

#[tokio::test]
async fn updating_missing_commission_is_not_found() {
    let app = spawn_app().await;
    let mut client = app.grpc_client.clone();

    let result = transition(
        &mut client,
        &app.tenant_id,
        &Uuid::new_v4().to_string(),
        CommissionStatus::Approved,
    )
    .await;
    assert!(result.is_err());
    assert_eq!(result.unwrap_err().code(), tonic::Code::NotFound);
}
