//! Integration tests for commission plan management and plan-based resolution.

mod common;

use commission_service::grpc::proto::commission_service_client::CommissionServiceClient;
use commission_service::grpc::proto::*;
use commission_service::models::NewUser;
use common::{dec, spawn_app, with_tenant};
use tonic::transport::Channel;
use uuid::Uuid;

type Client = CommissionServiceClient<Channel>;

async fn create_plan(client: &mut Client, tenant_id: &Uuid, name: &str, rate: &str) -> String {
    let request = with_tenant(
        CreateCommissionPlanRequest {
            name: name.to_string(),
            commission_type: CommissionType::Percentage as i32,
            commission_rate: Some(rate.to_string()),
            flat_amount: None,
            paid_when: PaidWhen::DepositPaid as i32,
        },
        tenant_id,
    );
    client
        .create_commission_plan(request)
        .await
        .unwrap()
        .into_inner()
        .plan
        .unwrap()
        .plan_id
}

#[tokio::test]
async fn create_and_get_plan() {
    let app = spawn_app().await;
    let mut client = app.grpc_client.clone();

    let plan_id = create_plan(&mut client, &app.tenant_id, "Standard 12", "12").await;

    let plan = client
        .get_commission_plan(with_tenant(
            GetCommissionPlanRequest {
                plan_id: plan_id.clone(),
            },
            &app.tenant_id,
        ))
        .await
        .unwrap()
        .into_inner()
        .plan
        .unwrap();

    assert_eq!(plan.plan_id, plan_id);
    assert_eq!(plan.name, "Standard 12");
    assert_eq!(plan.commission_type, CommissionType::Percentage as i32);
    assert_eq!(dec(plan.commission_rate.as_deref().unwrap()), dec("12"));
    assert_eq!(plan.paid_when, PaidWhen::DepositPaid as i32);
    assert!(plan.is_active);
}

#[tokio::test]
async fn list_plans_hides_archived_by_default() {
    let app = spawn_app().await;
    let mut client = app.grpc_client.clone();

    let keep = create_plan(&mut client, &app.tenant_id, "Keep", "10").await;
    let archive = create_plan(&mut client, &app.tenant_id, "Archive", "15").await;

    client
        .archive_commission_plan(with_tenant(
            ArchiveCommissionPlanRequest {
                plan_id: archive.clone(),
            },
            &app.tenant_id,
        ))
        .await
        .unwrap();

    let active = client
        .list_commission_plans(with_tenant(
            ListCommissionPlansRequest {
                page_size: 50,
                page_token: None,
                include_archived: false,
            },
            &app.tenant_id,
        ))
        .await
        .unwrap()
        .into_inner()
        .plans;
    assert!(active.iter().any(|p| p.plan_id == keep));
    assert!(!active.iter().any(|p| p.plan_id == archive));

    let all = client
        .list_commission_plans(with_tenant(
            ListCommissionPlansRequest {
                page_size: 50,
                page_token: None,
                include_archived: true,
            },
            &app.tenant_id,
        ))
        .await
        .unwrap()
        .into_inner()
        .plans;
    assert!(all.iter().any(|p| p.plan_id == archive && !p.is_active));
}

#[tokio::test]
async fn plan_overrides_role_rate_when_assigning() {
    let app = spawn_app().await;
    let mut client = app.grpc_client.clone();

    let plan_id = create_plan(&mut client, &app.tenant_id, "Plan 12", "12").await;

    // the user carries both a plan and a role rate; the plan wins
    let user = app
        .db
        .create_user(
            app.tenant_id,
            &NewUser {
                name: "Planned Rep".to_string(),
                email: "planned@example.com".to_string(),
                commission_plan_id: Some(Uuid::parse_str(&plan_id).unwrap()),
                sales_commission_type: Some("percentage".to_string()),
                sales_commission_rate: Some(dec("10")),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let lead = client
        .create_lead(with_tenant(
            CreateLeadRequest {
                location_id: Uuid::new_v4().to_string(),
                customer_name: "Homeowner".to_string(),
                address: String::new(),
                sales_rep_id: Some(user.user_id.to_string()),
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

    let commission = response
        .outcomes
        .iter()
        .find_map(|o| o.commission.clone())
        .unwrap();
    assert_eq!(dec(&commission.calculated_amount), dec("240"));
    // plan-sourced terms carry the plan's payout trigger
    assert_eq!(commission.paid_when, PaidWhen::DepositPaid as i32);
}

#[tokio::test]
async fn archived_plan_falls_back_to_role_rate() {
    let app = spawn_app().await;
    let mut client = app.grpc_client.clone();

    let plan_id = create_plan(&mut client, &app.tenant_id, "Retired", "12").await;
    client
        .archive_commission_plan(with_tenant(
            ArchiveCommissionPlanRequest {
                plan_id: plan_id.clone(),
            },
            &app.tenant_id,
        ))
        .await
        .unwrap();

    let user = app
        .db
        .create_user(
            app.tenant_id,
            &NewUser {
                name: "Fallback Rep".to_string(),
                email: "fallback@example.com".to_string(),
                commission_plan_id: Some(Uuid::parse_str(&plan_id).unwrap()),
                sales_commission_type: Some("percentage".to_string()),
                sales_commission_rate: Some(dec("10")),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let lead = client
        .create_lead(with_tenant(
            CreateLeadRequest {
                location_id: Uuid::new_v4().to_string(),
                customer_name: "Homeowner".to_string(),
                address: String::new(),
                sales_rep_id: Some(user.user_id.to_string()),
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

    let commission = response
        .outcomes
        .iter()
        .find_map(|o| o.commission.clone())
        .unwrap();
    assert_eq!(dec(&commission.calculated_amount), dec("200"));
}

#[tokio::test]
async fn get_plan_from_another_tenant_is_not_found() {
    let app = spawn_app().await;
    let mut client = app.grpc_client.clone();

    let plan_id = create_plan(&mut client, &app.tenant_id, "Private", "10").await;

    let other_tenant = Uuid::new_v4();
    let response = client
        .get_commission_plan(with_tenant(
            GetCommissionPlanRequest { plan_id },
            &other_tenant,
        ))
        .await;
    assert!(response.is_err());
    assert_eq!(response.unwrap_err().code(), tonic::Code::NotFound);
}
