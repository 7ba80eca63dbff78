//! Auth service gRPC client for service-to-service communication.

use std::time::Duration;
use tonic::Request;
use tonic::transport::{Channel, Endpoint};

use super::proto::auth::auth_service_client::AuthServiceClient;
use super::proto::auth::{
    CheckCapabilityRequest, CheckCapabilityResponse, ValidateTokenRequest, ValidateTokenResponse,
};

/// Configuration for the auth service client.
#[derive(Clone, Debug)]
pub struct AuthClientConfig {
    /// The gRPC endpoint of the auth service (e.g., "http://auth-service:50051").
    pub endpoint: String,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Request timeout.
    pub request_timeout: Duration,
}

impl Default for AuthClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:50051".to_string(),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Auth service client for calling auth-service via gRPC.
#[derive(Clone)]
pub struct AuthClient {
    client: AuthServiceClient<Channel>,
}

impl AuthClient {
    /// Create a new auth client with the given configuration.
    pub async fn new(config: AuthClientConfig) -> Result<Self, tonic::transport::Error> {
        let channel = Endpoint::from_shared(config.endpoint)?
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .connect()
            .await?;

        Ok(Self {
            client: AuthServiceClient::new(channel),
        })
    }

    /// Create a new auth client connecting to the specified endpoint.
    pub async fn connect(endpoint: &str) -> Result<Self, tonic::transport::Error> {
        Self::new(AuthClientConfig {
            endpoint: endpoint.to_string(),
            ..Default::default()
        })
        .await
    }

    /// Validate an access token.
    pub async fn validate_token(
        &mut self,
        access_token: String,
    ) -> Result<ValidateTokenResponse, tonic::Status> {
        let request = Request::new(ValidateTokenRequest { access_token });
        let response = self.client.validate_token(request).await?;
        Ok(response.into_inner())
    }

    /// Check if a user has a specific capability within a tenant.
    pub async fn check_capability(
        &mut self,
        user_id: &str,
        tenant_id: &str,
        capability: String,
    ) -> Result<CheckCapabilityResponse, tonic::Status> {
        let request = Request::new(CheckCapabilityRequest {
            user_id: user_id.to_string(),
            tenant_id: tenant_id.to_string(),
            capability,
        });
        let response = self.client.check_capability(request).await?;
        Ok(response.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_client_config_default() {
        let config = AuthClientConfig::default();
        assert_eq!(config.endpoint, "http://localhost:50051");
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }
}
