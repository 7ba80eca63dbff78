//! Common test utilities for commission-service integration tests.

use commission_service::config::{AuthConfig, CommissionConfig, DatabaseConfig};
use commission_service::grpc::proto::commission_service_client::CommissionServiceClient;
use commission_service::models::{LocationRole, NewLocationUser, NewTeam, NewUser};
use commission_service::services::Database;
use commission_service::startup::Application;
use rust_decimal::Decimal;
use service_core::config::Config as CommonConfig;
use std::str::FromStr;
use std::sync::Once;
use tonic::transport::Channel;
use uuid::Uuid;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,commission_service=debug,sqlx=warn")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Test configuration with empty auth endpoint (disables capability checking).
fn test_config() -> CommissionConfig {
    let database_url = std::env::var("TEST_DATABASE_URL")
        .expect("TEST_DATABASE_URL must be set to run integration tests");

    CommissionConfig {
        common: CommonConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        service_name: "commission-service-test".to_string(),
        service_version: "test".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            url: database_url,
            max_connections: 2,
            min_connections: 1,
        },
        auth: AuthConfig {
            auth_service_endpoint: String::new(), // Empty = disable capability checking
        },
    }
}

/// Test application wrapper.
#[allow(dead_code)]
pub struct TestApp {
    pub grpc_client: CommissionServiceClient<Channel>,
    pub db: Database,
    pub tenant_id: Uuid,
    pub http_port: u16,
    pub grpc_port: u16,
}

/// Spawn a test application and return the gRPC client with a unique tenant ID.
///
/// Migrations run on startup; concurrent test binaries are safe because sqlx
/// serializes them behind an advisory lock.
pub async fn spawn_app() -> TestApp {
    init_tracing();

    let config = test_config();

    let app = Application::build(config)
        .await
        .expect("Failed to build application");

    let http_port = app.http_port();
    let grpc_port = app.grpc_port();
    let db = app.db().clone();
    let grpc_addr = format!("http://127.0.0.1:{}", grpc_port);

    // Start the application in the background
    tokio::spawn(async move {
        app.run_until_stopped().await.ok();
    });

    // Wait for server to be ready with retry
    let grpc_client = {
        let mut attempts = 0;
        loop {
            match CommissionServiceClient::connect(grpc_addr.clone()).await {
                Ok(client) => break client,
                Err(_) if attempts < 20 => {
                    attempts += 1;
                    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
                }
                Err(e) => panic!("Failed to connect gRPC client after 20 attempts: {}", e),
            }
        }
    };

    let tenant_id = Uuid::new_v4();
    TestApp {
        grpc_client,
        db,
        tenant_id,
        http_port,
        grpc_port,
    }
}

/// Helper to inject tenant ID and user ID into request metadata.
/// Capability checking is disabled in tests, so the auth context comes from
/// these headers (BFF trust model).
pub fn with_tenant<T>(request: T, tenant_id: &Uuid) -> tonic::Request<T> {
    let mut req = tonic::Request::new(request);
    req.metadata_mut()
        .insert("x-tenant-id", tenant_id.to_string().parse().unwrap());
    req.metadata_mut()
        .insert("x-user-id", "test-user".parse().unwrap());
    req
}

#[allow(dead_code)]
pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

// ============================================================================
// Seeding helpers
//
// Users, location memberships and teams are owned by the admin settings
// surface, which is not part of this service's API; tests seed them through
// the store's typed writes.
// ============================================================================

/// Seed a user with a percentage sales commission.
#[allow(dead_code)]
pub async fn seed_percentage_sales_rep(db: &Database, tenant_id: Uuid, rate: &str) -> Uuid {
    let user = db
        .create_user(
            tenant_id,
            &NewUser {
                name: "Sales Rep".to_string(),
                email: "rep@example.com".to_string(),
                sales_commission_type: Some("percentage".to_string()),
                sales_commission_rate: Some(dec(rate)),
                ..Default::default()
            },
        )
        .await
        .expect("Failed to seed sales rep");
    user.user_id
}

/// Seed a user with no commission configuration at all.
#[allow(dead_code)]
pub async fn seed_unconfigured_user(db: &Database, tenant_id: Uuid) -> Uuid {
    let user = db
        .create_user(
            tenant_id,
            &NewUser {
                name: "Unconfigured".to_string(),
                email: "nobody@example.com".to_string(),
                ..Default::default()
            },
        )
        .await
        .expect("Failed to seed user");
    user.user_id
}

/// Seed an office manager at a location with a flat override commission.
#[allow(dead_code)]
pub async fn seed_office_manager(
    db: &Database,
    tenant_id: Uuid,
    location_id: Uuid,
    flat: &str,
    include_own_sales: bool,
) -> Uuid {
    let user = db
        .create_user(
            tenant_id,
            &NewUser {
                name: "Office Manager".to_string(),
                email: "office@example.com".to_string(),
                ..Default::default()
            },
        )
        .await
        .expect("Failed to seed office manager");

    db.create_location_user(
        tenant_id,
        &NewLocationUser {
            location_id,
            user_id: user.user_id,
            role: LocationRole::Office,
            team_id: None,
            commission_enabled: true,
            commission_type: Some("flat_amount".to_string()),
            commission_rate: None,
            flat_commission_amount: Some(dec(flat)),
            paid_when: None,
            include_own_sales,
        },
    )
    .await
    .expect("Failed to seed office membership");

    user.user_id
}

/// Put a sales rep on a team at a location; returns the team lead's user id.
#[allow(dead_code)]
pub async fn seed_team_for(
    db: &Database,
    tenant_id: Uuid,
    location_id: Uuid,
    sales_rep_id: Uuid,
    rate: &str,
) -> Uuid {
    let team_lead = db
        .create_user(
            tenant_id,
            &NewUser {
                name: "Team Lead".to_string(),
                email: "lead@example.com".to_string(),
                ..Default::default()
            },
        )
        .await
        .expect("Failed to seed team lead");

    let team = db
        .create_team(
            tenant_id,
            &NewTeam {
                location_id,
                team_lead_id: team_lead.user_id,
                commission_rate: dec(rate),
                paid_when: None,
                include_own_sales: true,
                is_active: true,
            },
        )
        .await
        .expect("Failed to seed team");

    db.create_location_user(
        tenant_id,
        &NewLocationUser {
            location_id,
            user_id: sales_rep_id,
            role: LocationRole::Sales,
            team_id: Some(team.team_id),
            commission_enabled: false,
            commission_type: None,
            commission_rate: None,
            flat_commission_amount: None,
            paid_when: None,
            include_own_sales: true,
        },
    )
    .await
    .expect("Failed to seed team membership");

    team_lead.user_id
}
