//! Shared capability checking infrastructure for roofcrm services.
//!
//! When enabled, validates bearer tokens and checks capabilities via
//! auth-service. By default, services use a BFF trust model where the
//! upstream service handles authorization and the tenant context arrives
//! in request metadata.

use std::sync::Arc;
use tokio::sync::RwLock;
use tonic::{Request, Status};

use super::auth_client::AuthClient;

/// Metadata key carrying the tenant id under the BFF trust model.
pub const TENANT_ID_KEY: &str = "x-tenant-id";
/// Metadata key carrying the user id under the BFF trust model.
pub const USER_ID_KEY: &str = "x-user-id";

/// Authentication context returned after a successful capability check.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
    pub tenant_id: String,
}

/// Capability checker that delegates to auth-service.
///
/// When enabled, validates tokens and checks capabilities via auth-service.
/// When disabled, uses the BFF trust model (tenant context headers only).
/// The auth connection is established lazily on first use so construction
/// stays synchronous.
#[derive(Clone)]
pub struct CapabilityChecker {
    endpoint: Option<String>,
    client: Arc<RwLock<Option<AuthClient>>>,
}

impl CapabilityChecker {
    /// Create a new capability checker.
    ///
    /// An empty `auth_endpoint` disables enforcement (BFF trust model).
    pub fn new(auth_endpoint: &str) -> Self {
        if auth_endpoint.is_empty() {
            tracing::info!("Capability enforcement disabled (BFF trust model)");
            Self::disabled()
        } else {
            tracing::info!(
                auth_endpoint = auth_endpoint,
                "Capability enforcement enabled via auth-service"
            );
            Self {
                endpoint: Some(auth_endpoint.to_string()),
                client: Arc::new(RwLock::new(None)),
            }
        }
    }

    /// Create a disabled checker (BFF trust model).
    pub fn disabled() -> Self {
        Self {
            endpoint: None,
            client: Arc::new(RwLock::new(None)),
        }
    }

    /// Check if capability enforcement is enabled.
    pub fn is_enabled(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Require capability for the given request.
    ///
    /// If capability checking is enabled:
    /// - Extracts the bearer token from the authorization header
    /// - Validates the token via auth-service
    /// - Checks if the user has the required capability
    ///
    /// If capability checking is disabled, returns the tenant context taken
    /// from request metadata (trusts the BFF).
    pub async fn require_capability<T>(
        &self,
        request: &Request<T>,
        capability: &str,
    ) -> Result<AuthContext, Status> {
        let endpoint = match &self.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => return Ok(auth_context_from_metadata(request)),
        };

        let token = extract_bearer_token(request)?;

        let mut auth_client = self.connected_client(&endpoint).await?;
        let validate_response = auth_client
            .validate_token(token)
            .await
            .map_err(|e| Status::internal(format!("Failed to validate token: {}", e)))?;

        if !validate_response.valid {
            return Err(Status::unauthenticated("Invalid or expired token"));
        }

        let claims = validate_response
            .claims
            .ok_or_else(|| Status::internal("Token valid but missing claims"))?;

        let check_response = auth_client
            .check_capability(&claims.sub, &claims.tenant_id, capability.to_string())
            .await
            .map_err(|e| {
                tracing::warn!(
                    user_id = %claims.sub,
                    capability = capability,
                    error = %e,
                    "Capability check failed"
                );
                Status::internal(format!("Failed to check capability: {}", e))
            })?;

        if !check_response.allowed {
            tracing::warn!(
                user_id = %claims.sub,
                capability = capability,
                "Permission denied: missing capability"
            );
            return Err(Status::permission_denied(format!(
                "Missing capability: {}",
                capability
            )));
        }

        Ok(AuthContext {
            user_id: claims.sub,
            tenant_id: claims.tenant_id,
        })
    }

    /// Get the cached auth client, connecting on first use.
    async fn connected_client(&self, endpoint: &str) -> Result<AuthClient, Status> {
        if let Some(client) = self.client.read().await.as_ref() {
            return Ok(client.clone());
        }

        let mut guard = self.client.write().await;
        // Another task may have connected while we waited for the write lock
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }

        let client = AuthClient::connect(endpoint).await.map_err(|e| {
            tracing::error!(endpoint = endpoint, error = %e, "Failed to connect to auth-service");
            Status::unavailable("Auth service unavailable")
        })?;
        *guard = Some(client.clone());
        Ok(client)
    }
}

/// Extract the bearer token from the authorization metadata entry.
#[allow(clippy::result_large_err)]
fn extract_bearer_token<T>(request: &Request<T>) -> Result<String, Status> {
    let value = request
        .metadata()
        .get("authorization")
        .ok_or_else(|| Status::unauthenticated("Missing authorization header"))?
        .to_str()
        .map_err(|_| Status::unauthenticated("Malformed authorization header"))?;

    value
        .strip_prefix("Bearer ")
        .map(|t| t.to_string())
        .ok_or_else(|| Status::unauthenticated("Authorization header must be a bearer token"))
}

/// Build an auth context from request metadata (BFF trust model).
fn auth_context_from_metadata<T>(request: &Request<T>) -> AuthContext {
    let get = |key: &str| {
        request
            .metadata()
            .get(key)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    };

    AuthContext {
        user_id: get(USER_ID_KEY).unwrap_or_else(|| "system".to_string()),
        tenant_id: get(TENANT_ID_KEY).unwrap_or_default(),
    }
}
