//! gRPC utilities for roofcrm microservices.
//!
//! This module provides shared gRPC infrastructure including:
//! - Error conversion between `AppError` and `tonic::Status`
//! - Auth service client for service-to-service communication
//! - Capability checking with a BFF trust-model fallback

pub mod auth_client;
pub mod capability_checker;
pub mod error;

// Include the generated proto code for clients
pub mod proto {
    pub mod auth {
        tonic::include_proto!("roofcrm.auth.v1");
    }
}

pub use auth_client::{AuthClient, AuthClientConfig};
pub use capability_checker::{AuthContext, CapabilityChecker};
pub use error::{GrpcResult, IntoStatus};

// Re-export commonly used tonic types
pub use tonic::{Code, Request, Response, Status};
