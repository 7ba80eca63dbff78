//! Services module for commission-service.

pub mod database;
pub mod engine;
pub mod metrics;

pub use database::Database;
pub use metrics::{
    get_metrics, init_metrics, record_assignment_outcome, record_commission_amount,
    record_commission_operation, record_error, record_grpc_request, record_grpc_request_duration,
    record_plan_operation,
};
