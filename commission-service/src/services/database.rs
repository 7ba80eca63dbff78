//! Database service for commission-service.

use async_trait::async_trait;
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::models::{
    AssignmentRole, CommissionPlan, CommissionSlot, CommissionStatus, CreatePlan, CustomerInvoice,
    Lead, LeadCommission, LocationUser, NewInvoice, NewLead, NewLeadCommission, NewLocationUser,
    NewTeam, NewUser, Team, User,
};
use crate::services::engine::{CommissionAmounts, CommissionStore};
use crate::services::metrics::DB_QUERY_DURATION;

const LEAD_COLUMNS: &str = "lead_id, company_id, location_id, customer_name, address, \
     sales_rep_id, marketing_rep_id, sales_manager_id, production_manager_id, \
     created_utc, updated_utc";

const USER_COLUMNS: &str = "user_id, company_id, name, email, commission_plan_id, \
     sales_commission_type, sales_commission_rate, sales_flat_commission_amount, \
     marketing_commission_type, marketing_commission_rate, marketing_flat_commission_amount, \
     production_commission_type, production_commission_rate, production_flat_commission_amount, \
     created_utc, updated_utc";

const PLAN_COLUMNS: &str = "plan_id, company_id, name, commission_type, commission_rate, \
     flat_amount, paid_when, is_active, created_utc, updated_utc";

const LOCATION_USER_COLUMNS: &str = "location_user_id, company_id, location_id, user_id, role, \
     team_id, commission_enabled, commission_type, commission_rate, flat_commission_amount, \
     paid_when, include_own_sales";

const TEAM_COLUMNS: &str = "team_id, company_id, location_id, team_lead_id, commission_rate, \
     paid_when, include_own_sales, is_active";

const COMMISSION_COLUMNS: &str = "commission_id, company_id, lead_id, user_id, assignment_field, \
     commission_type, commission_rate, flat_amount, base_amount, calculated_amount, paid_when, \
     status, notes, created_by, created_utc, updated_utc";

fn db_error(context: &str, e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.is_unique_violation() {
            return AppError::Conflict(anyhow::anyhow!("{}: {}", context, db_err));
        }
    }
    AppError::DatabaseError(anyhow::anyhow!("{}: {}", context, e))
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "commission-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["health_check"])
            .start_timer();

        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;

        timer.observe_duration();
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // =========================================================================
    // Leads
    // =========================================================================

    #[instrument(skip(self, new), fields(company_id = %company_id))]
    pub async fn create_lead(&self, company_id: Uuid, new: &NewLead) -> Result<Lead, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_lead"])
            .start_timer();

        let lead = sqlx::query_as::<_, Lead>(&format!(
            "INSERT INTO leads (lead_id, company_id, location_id, customer_name, address, \
             sales_rep_id, marketing_rep_id, sales_manager_id, production_manager_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {LEAD_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(company_id)
        .bind(new.location_id)
        .bind(&new.customer_name)
        .bind(&new.address)
        .bind(new.sales_rep_id)
        .bind(new.marketing_rep_id)
        .bind(new.sales_manager_id)
        .bind(new.production_manager_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to create lead", e))?;

        timer.observe_duration();
        info!(lead_id = %lead.lead_id, "Lead created");

        Ok(lead)
    }

    /// Write a role slot on a lead. `None` clears the slot.
    #[instrument(skip(self), fields(company_id = %company_id, lead_id = %lead_id))]
    pub async fn set_lead_role(
        &self,
        company_id: Uuid,
        lead_id: Uuid,
        role: AssignmentRole,
        user_id: Option<Uuid>,
    ) -> Result<Option<Lead>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["set_lead_role"])
            .start_timer();

        // The column name comes from the closed role enum, never from input.
        let lead = sqlx::query_as::<_, Lead>(&format!(
            "UPDATE leads SET {column} = $3, updated_utc = NOW() \
             WHERE company_id = $1 AND lead_id = $2 AND deleted_at IS NULL \
             RETURNING {LEAD_COLUMNS}",
            column = role.as_str()
        ))
        .bind(company_id)
        .bind(lead_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to set lead role", e))?;

        timer.observe_duration();

        Ok(lead)
    }

    // =========================================================================
    // Invoices
    // =========================================================================

    #[instrument(skip(self, new), fields(company_id = %company_id, lead_id = %new.lead_id))]
    pub async fn insert_invoice(
        &self,
        company_id: Uuid,
        new: &NewInvoice,
    ) -> Result<CustomerInvoice, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, CustomerInvoice>(
            "INSERT INTO customer_invoices (invoice_id, company_id, lead_id, total, description) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING invoice_id, company_id, lead_id, total, description, created_utc",
        )
        .bind(Uuid::new_v4())
        .bind(company_id)
        .bind(new.lead_id)
        .bind(new.total)
        .bind(&new.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to insert invoice", e))?;

        timer.observe_duration();
        info!(invoice_id = %invoice.invoice_id, total = %invoice.total, "Invoice recorded");

        Ok(invoice)
    }

    // =========================================================================
    // Commission records
    // =========================================================================

    #[instrument(skip(self), fields(company_id = %company_id, commission_id = %commission_id))]
    pub async fn get_commission(
        &self,
        company_id: Uuid,
        commission_id: Uuid,
    ) -> Result<Option<LeadCommission>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_commission"])
            .start_timer();

        let commission = sqlx::query_as::<_, LeadCommission>(&format!(
            "SELECT {COMMISSION_COLUMNS} FROM lead_commissions \
             WHERE company_id = $1 AND commission_id = $2 AND deleted_at IS NULL"
        ))
        .bind(company_id)
        .bind(commission_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get commission", e))?;

        timer.observe_duration();

        Ok(commission)
    }

    /// Every non-deleted commission row on a lead, terminal states included.
    #[instrument(skip(self), fields(company_id = %company_id, lead_id = %lead_id))]
    pub async fn list_lead_commissions(
        &self,
        company_id: Uuid,
        lead_id: Uuid,
    ) -> Result<Vec<LeadCommission>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_lead_commissions"])
            .start_timer();

        let commissions = sqlx::query_as::<_, LeadCommission>(&format!(
            "SELECT {COMMISSION_COLUMNS} FROM lead_commissions \
             WHERE company_id = $1 AND lead_id = $2 AND deleted_at IS NULL \
             ORDER BY created_utc"
        ))
        .bind(company_id)
        .bind(lead_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list commissions", e))?;

        timer.observe_duration();

        Ok(commissions)
    }

    #[instrument(skip(self), fields(company_id = %company_id, commission_id = %commission_id))]
    pub async fn update_commission_status(
        &self,
        company_id: Uuid,
        commission_id: Uuid,
        status: CommissionStatus,
        notes: Option<&str>,
    ) -> Result<LeadCommission, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_commission_status"])
            .start_timer();

        let commission = sqlx::query_as::<_, LeadCommission>(&format!(
            "UPDATE lead_commissions \
             SET status = $3, notes = COALESCE($4, notes), updated_utc = NOW() \
             WHERE company_id = $1 AND commission_id = $2 AND deleted_at IS NULL \
             RETURNING {COMMISSION_COLUMNS}"
        ))
        .bind(company_id)
        .bind(commission_id)
        .bind(status.as_str())
        .bind(notes)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to update commission status", e))?
        .ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!("commission {} not found", commission_id))
        })?;

        timer.observe_duration();
        info!(status = status.as_str(), "Commission status updated");

        Ok(commission)
    }

    // =========================================================================
    // Commission plans
    // =========================================================================

    #[instrument(skip(self, new), fields(company_id = %company_id))]
    pub async fn create_plan(
        &self,
        company_id: Uuid,
        new: &CreatePlan,
    ) -> Result<CommissionPlan, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_plan"])
            .start_timer();

        let plan = sqlx::query_as::<_, CommissionPlan>(&format!(
            "INSERT INTO commission_plans (plan_id, company_id, name, commission_type, \
             commission_rate, flat_amount, paid_when) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {PLAN_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(company_id)
        .bind(&new.name)
        .bind(new.commission_type.as_str())
        .bind(new.commission_rate)
        .bind(new.flat_amount)
        .bind(new.paid_when.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to create plan", e))?;

        timer.observe_duration();
        info!(plan_id = %plan.plan_id, name = %plan.name, "Commission plan created");

        Ok(plan)
    }

    #[instrument(skip(self), fields(company_id = %company_id, plan_id = %plan_id))]
    pub async fn get_plan(
        &self,
        company_id: Uuid,
        plan_id: Uuid,
    ) -> Result<Option<CommissionPlan>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_plan"])
            .start_timer();

        let plan = sqlx::query_as::<_, CommissionPlan>(&format!(
            "SELECT {PLAN_COLUMNS} FROM commission_plans \
             WHERE company_id = $1 AND plan_id = $2 AND deleted_at IS NULL"
        ))
        .bind(company_id)
        .bind(plan_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get plan", e))?;

        timer.observe_duration();

        Ok(plan)
    }

    /// Keyset-paginated plan listing; returns one extra row to detect the
    /// next page.
    #[instrument(skip(self), fields(company_id = %company_id))]
    pub async fn list_plans(
        &self,
        company_id: Uuid,
        include_archived: bool,
        page_size: i32,
        page_token: Option<Uuid>,
    ) -> Result<(Vec<CommissionPlan>, Option<String>), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_plans"])
            .start_timer();

        let limit = page_size.clamp(1, 100) as i64;

        let mut plans = sqlx::query_as::<_, CommissionPlan>(&format!(
            "SELECT {PLAN_COLUMNS} FROM commission_plans \
             WHERE company_id = $1 AND deleted_at IS NULL \
             AND (is_active OR $2) \
             AND ($3::uuid IS NULL OR plan_id > $3) \
             ORDER BY plan_id \
             LIMIT $4"
        ))
        .bind(company_id)
        .bind(include_archived)
        .bind(page_token)
        .bind(limit + 1)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list plans", e))?;

        let next_page_token = if plans.len() as i64 > limit {
            plans.truncate(limit as usize);
            plans.last().map(|p| p.plan_id.to_string())
        } else {
            None
        };

        timer.observe_duration();

        Ok((plans, next_page_token))
    }

    /// Archive a plan. Archived plans stop resolving for their users but
    /// existing commission rows are untouched.
    #[instrument(skip(self), fields(company_id = %company_id, plan_id = %plan_id))]
    pub async fn archive_plan(
        &self,
        company_id: Uuid,
        plan_id: Uuid,
    ) -> Result<Option<CommissionPlan>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["archive_plan"])
            .start_timer();

        let plan = sqlx::query_as::<_, CommissionPlan>(&format!(
            "UPDATE commission_plans SET is_active = FALSE, updated_utc = NOW() \
             WHERE company_id = $1 AND plan_id = $2 AND deleted_at IS NULL \
             RETURNING {PLAN_COLUMNS}"
        ))
        .bind(company_id)
        .bind(plan_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to archive plan", e))?;

        timer.observe_duration();

        Ok(plan)
    }

    // =========================================================================
    // Org entities (owned by the admin surface; typed writes for seeding)
    // =========================================================================

    #[instrument(skip(self, new), fields(company_id = %company_id))]
    pub async fn create_user(&self, company_id: Uuid, new: &NewUser) -> Result<User, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_user"])
            .start_timer();

        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (user_id, company_id, name, email, commission_plan_id, \
             sales_commission_type, sales_commission_rate, sales_flat_commission_amount, \
             marketing_commission_type, marketing_commission_rate, marketing_flat_commission_amount, \
             production_commission_type, production_commission_rate, production_flat_commission_amount) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(company_id)
        .bind(&new.name)
        .bind(&new.email)
        .bind(new.commission_plan_id)
        .bind(&new.sales_commission_type)
        .bind(new.sales_commission_rate)
        .bind(new.sales_flat_commission_amount)
        .bind(&new.marketing_commission_type)
        .bind(new.marketing_commission_rate)
        .bind(new.marketing_flat_commission_amount)
        .bind(&new.production_commission_type)
        .bind(new.production_commission_rate)
        .bind(new.production_flat_commission_amount)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to create user", e))?;

        timer.observe_duration();

        Ok(user)
    }

    #[instrument(skip(self, new), fields(company_id = %company_id))]
    pub async fn create_location_user(
        &self,
        company_id: Uuid,
        new: &NewLocationUser,
    ) -> Result<LocationUser, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_location_user"])
            .start_timer();

        let location_user = sqlx::query_as::<_, LocationUser>(&format!(
            "INSERT INTO location_users (location_user_id, company_id, location_id, user_id, \
             role, team_id, commission_enabled, commission_type, commission_rate, \
             flat_commission_amount, paid_when, include_own_sales) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING {LOCATION_USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(company_id)
        .bind(new.location_id)
        .bind(new.user_id)
        .bind(new.role.as_str())
        .bind(new.team_id)
        .bind(new.commission_enabled)
        .bind(&new.commission_type)
        .bind(new.commission_rate)
        .bind(new.flat_commission_amount)
        .bind(&new.paid_when)
        .bind(new.include_own_sales)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to create location user", e))?;

        timer.observe_duration();

        Ok(location_user)
    }

    #[instrument(skip(self, new), fields(company_id = %company_id))]
    pub async fn create_team(&self, company_id: Uuid, new: &NewTeam) -> Result<Team, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_team"])
            .start_timer();

        let team = sqlx::query_as::<_, Team>(&format!(
            "INSERT INTO teams (team_id, company_id, location_id, team_lead_id, commission_rate, \
             paid_when, include_own_sales, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {TEAM_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(company_id)
        .bind(new.location_id)
        .bind(new.team_lead_id)
        .bind(new.commission_rate)
        .bind(&new.paid_when)
        .bind(new.include_own_sales)
        .bind(new.is_active)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to create team", e))?;

        timer.observe_duration();

        Ok(team)
    }
}

// =============================================================================
// Persistence gateway consumed by the commission engine
// =============================================================================

#[async_trait]
impl CommissionStore for Database {
    async fn get_lead(&self, company_id: Uuid, lead_id: Uuid) -> Result<Option<Lead>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_lead"])
            .start_timer();

        let lead = sqlx::query_as::<_, Lead>(&format!(
            "SELECT {LEAD_COLUMNS} FROM leads \
             WHERE company_id = $1 AND lead_id = $2 AND deleted_at IS NULL"
        ))
        .bind(company_id)
        .bind(lead_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get lead", e))?;

        timer.observe_duration();

        Ok(lead)
    }

    async fn get_user(&self, company_id: Uuid, user_id: Uuid) -> Result<Option<User>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_user"])
            .start_timer();

        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE company_id = $1 AND user_id = $2 AND deleted_at IS NULL"
        ))
        .bind(company_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get user", e))?;

        timer.observe_duration();

        Ok(user)
    }

    async fn get_active_plan(
        &self,
        company_id: Uuid,
        plan_id: Uuid,
    ) -> Result<Option<CommissionPlan>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_active_plan"])
            .start_timer();

        let plan = sqlx::query_as::<_, CommissionPlan>(&format!(
            "SELECT {PLAN_COLUMNS} FROM commission_plans \
             WHERE company_id = $1 AND plan_id = $2 AND is_active AND deleted_at IS NULL"
        ))
        .bind(company_id)
        .bind(plan_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get active plan", e))?;

        timer.observe_duration();

        Ok(plan)
    }

    async fn get_location_user(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        location_id: Uuid,
    ) -> Result<Option<LocationUser>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_location_user"])
            .start_timer();

        let location_user = sqlx::query_as::<_, LocationUser>(&format!(
            "SELECT {LOCATION_USER_COLUMNS} FROM location_users \
             WHERE company_id = $1 AND user_id = $2 AND location_id = $3 AND deleted_at IS NULL \
             LIMIT 1"
        ))
        .bind(company_id)
        .bind(user_id)
        .bind(location_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get location user", e))?;

        timer.observe_duration();

        Ok(location_user)
    }

    async fn list_office_location_users(
        &self,
        company_id: Uuid,
        location_id: Uuid,
    ) -> Result<Vec<LocationUser>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_office_location_users"])
            .start_timer();

        let members = sqlx::query_as::<_, LocationUser>(&format!(
            "SELECT {LOCATION_USER_COLUMNS} FROM location_users \
             WHERE company_id = $1 AND location_id = $2 AND role = 'office' \
             AND commission_enabled AND deleted_at IS NULL"
        ))
        .bind(company_id)
        .bind(location_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list office location users", e))?;

        timer.observe_duration();

        Ok(members)
    }

    async fn get_team(&self, company_id: Uuid, team_id: Uuid) -> Result<Option<Team>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_team"])
            .start_timer();

        let team = sqlx::query_as::<_, Team>(&format!(
            "SELECT {TEAM_COLUMNS} FROM teams \
             WHERE company_id = $1 AND team_id = $2 AND deleted_at IS NULL"
        ))
        .bind(company_id)
        .bind(team_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get team", e))?;

        timer.observe_duration();

        Ok(team)
    }

    async fn latest_invoice_total(
        &self,
        company_id: Uuid,
        lead_id: Uuid,
    ) -> Result<Option<Decimal>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["latest_invoice_total"])
            .start_timer();

        let total = sqlx::query_scalar::<_, Decimal>(
            "SELECT total FROM customer_invoices \
             WHERE company_id = $1 AND lead_id = $2 AND deleted_at IS NULL \
             ORDER BY created_utc DESC \
             LIMIT 1",
        )
        .bind(company_id)
        .bind(lead_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to read latest invoice total", e))?;

        timer.observe_duration();

        Ok(total)
    }

    async fn sum_commission_base(
        &self,
        company_id: Uuid,
        lead_id: Uuid,
        user_id: Uuid,
    ) -> Result<Decimal, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["sum_commission_base"])
            .start_timer();

        let sum = sqlx::query_scalar::<_, Decimal>(
            "SELECT COALESCE(SUM(base_amount), 0) FROM lead_commissions \
             WHERE company_id = $1 AND lead_id = $2 AND user_id = $3 AND deleted_at IS NULL",
        )
        .bind(company_id)
        .bind(lead_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to sum commission base", e))?;

        timer.observe_duration();

        Ok(sum)
    }

    async fn find_open_commission(
        &self,
        company_id: Uuid,
        lead_id: Uuid,
        user_id: Uuid,
        slot: CommissionSlot,
    ) -> Result<Option<LeadCommission>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_open_commission"])
            .start_timer();

        let commission = sqlx::query_as::<_, LeadCommission>(&format!(
            "SELECT {COMMISSION_COLUMNS} FROM lead_commissions \
             WHERE company_id = $1 AND lead_id = $2 AND user_id = $3 \
             AND assignment_field = $4 AND status IN ('pending', 'approved') \
             AND deleted_at IS NULL"
        ))
        .bind(company_id)
        .bind(lead_id)
        .bind(user_id)
        .bind(slot.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find open commission", e))?;

        timer.observe_duration();

        Ok(commission)
    }

    async fn has_commission_for_user(
        &self,
        company_id: Uuid,
        lead_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["has_commission_for_user"])
            .start_timer();

        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM lead_commissions \
             WHERE company_id = $1 AND lead_id = $2 AND user_id = $3 AND deleted_at IS NULL)",
        )
        .bind(company_id)
        .bind(lead_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to check existing commission", e))?;

        timer.observe_duration();

        Ok(exists)
    }

    async fn list_open_commissions(
        &self,
        company_id: Uuid,
        lead_id: Uuid,
    ) -> Result<Vec<LeadCommission>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_open_commissions"])
            .start_timer();

        let commissions = sqlx::query_as::<_, LeadCommission>(&format!(
            "SELECT {COMMISSION_COLUMNS} FROM lead_commissions \
             WHERE company_id = $1 AND lead_id = $2 AND status IN ('pending', 'approved') \
             AND deleted_at IS NULL \
             ORDER BY created_utc"
        ))
        .bind(company_id)
        .bind(lead_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list open commissions", e))?;

        timer.observe_duration();

        Ok(commissions)
    }

    async fn insert_commission(
        &self,
        company_id: Uuid,
        new: NewLeadCommission,
    ) -> Result<LeadCommission, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_commission"])
            .start_timer();

        let commission = sqlx::query_as::<_, LeadCommission>(&format!(
            "INSERT INTO lead_commissions (commission_id, company_id, lead_id, user_id, \
             assignment_field, commission_type, commission_rate, flat_amount, base_amount, \
             calculated_amount, paid_when, status, notes, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             RETURNING {COMMISSION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(company_id)
        .bind(new.lead_id)
        .bind(new.user_id)
        .bind(new.assignment_field.as_str())
        .bind(new.commission_type.as_str())
        .bind(new.commission_rate)
        .bind(new.flat_amount)
        .bind(new.base_amount)
        .bind(new.calculated_amount)
        .bind(new.paid_when.as_str())
        .bind(CommissionStatus::Pending.as_str())
        .bind(&new.notes)
        .bind(new.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to insert commission", e))?;

        timer.observe_duration();
        info!(
            commission_id = %commission.commission_id,
            slot = %commission.assignment_field,
            amount = %commission.calculated_amount,
            "Commission created"
        );

        Ok(commission)
    }

    async fn update_commission_amounts(
        &self,
        company_id: Uuid,
        commission_id: Uuid,
        amounts: CommissionAmounts,
    ) -> Result<LeadCommission, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_commission_amounts"])
            .start_timer();

        let commission = sqlx::query_as::<_, LeadCommission>(&format!(
            "UPDATE lead_commissions \
             SET commission_type = $3, commission_rate = $4, flat_amount = $5, \
             base_amount = $6, calculated_amount = $7, updated_utc = NOW() \
             WHERE company_id = $1 AND commission_id = $2 AND deleted_at IS NULL \
             RETURNING {COMMISSION_COLUMNS}"
        ))
        .bind(company_id)
        .bind(commission_id)
        .bind(amounts.commission_type.as_str())
        .bind(amounts.commission_rate)
        .bind(amounts.flat_amount)
        .bind(amounts.base_amount)
        .bind(amounts.calculated_amount)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to update commission amounts", e))?
        .ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!("commission {} not found", commission_id))
        })?;

        timer.observe_duration();

        Ok(commission)
    }

    async fn cancel_commission(
        &self,
        company_id: Uuid,
        commission_id: Uuid,
        note: &str,
    ) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["cancel_commission"])
            .start_timer();

        let result = sqlx::query(
            "UPDATE lead_commissions \
             SET status = 'cancelled', notes = $3, updated_utc = NOW() \
             WHERE company_id = $1 AND commission_id = $2 \
             AND status IN ('pending', 'approved') AND deleted_at IS NULL",
        )
        .bind(company_id)
        .bind(commission_id)
        .bind(note)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to cancel commission", e))?;

        timer.observe_duration();

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "commission {} not open",
                commission_id
            )));
        }

        Ok(())
    }
}
