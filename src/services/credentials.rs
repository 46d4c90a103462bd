//! Tenant-scoped ERP credentials.
//!
//! The sync core treats credentials as opaque: issuance, refresh and
//! storage live elsewhere. This module only defines the handle the core
//! passes through to the API client, plus an env-backed provider for
//! single-tenant deployments.

use async_trait::async_trait;
use std::env;
use thiserror::Error;

/// Opaque bearer credential for the remote ERP API.
#[derive(Clone)]
pub struct ApiCredential {
    token: String,
}

impl ApiCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

// Keep tokens out of logs
impl std::fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredential").field("token", &"***").finish()
    }
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("no credential configured for tenant {0}")]
    Missing(String),
}

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn credential_for(&self, tenant_id: &str) -> Result<ApiCredential, CredentialError>;
}

/// Reads `ERP_API_TOKEN` (or `ERP_API_TOKEN_<TENANT>` when present) from the
/// environment.
pub struct EnvCredentialProvider;

#[async_trait]
impl CredentialProvider for EnvCredentialProvider {
    async fn credential_for(&self, tenant_id: &str) -> Result<ApiCredential, CredentialError> {
        let per_tenant = format!(
            "ERP_API_TOKEN_{}",
            tenant_id.to_uppercase().replace('-', "_")
        );

        env::var(&per_tenant)
            .or_else(|_| env::var("ERP_API_TOKEN"))
            .map(ApiCredential::new)
            .map_err(|_| CredentialError::Missing(tenant_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_token() {
        let cred = ApiCredential::new("super-secret");
        let rendered = format!("{:?}", cred);
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("***"));
    }
}
