//! Commission Service - automatic commission computation and reconciliation
//! for the roofing CRM lead pipeline.

pub mod config;
pub mod grpc;
pub mod models;
pub mod services;
pub mod startup;
