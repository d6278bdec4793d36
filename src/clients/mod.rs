//! # External Collaborators
//!
//! Contracts for the services the lifecycle handlers call out to: the
//! registry (group identifiers), the session manager (OIDC mappings) and the
//! tenant manager (offboarding and deletion). Transport implementations live
//! outside this crate; handlers only see these traits.
//!
//! RPC collaborators answer with a [`ServiceResponse`] when they were reached
//! and a [`ClientError`] when they were not. Handlers treat the two
//! differently: a reached service that refuses is a terminal rejection, a
//! transport error is retried.

pub mod tenant_manager;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

use crate::context::RequestContext;
use crate::store::StoreError;

pub use tenant_manager::StoreTenantManager;

/// Outcome reported by a reachable service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceResponse {
    pub success: bool,
    pub message: String,
}

impl ServiceResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: String::new(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Transport status of a failed collaborator call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    Unavailable,
    DeadlineExceeded,
    NotFound,
    PermissionDenied,
    Internal,
    Unknown,
}

impl StatusCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unavailable => "unavailable",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::NotFound => "not_found",
            Self::PermissionDenied => "permission_denied",
            Self::Internal => "internal",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct ClientError {
    pub code: StatusCode,
    pub message: String,
}

impl ClientError {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Unavailable, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Internal, message)
    }

    pub fn is_internal(&self) -> bool {
        self.code == StatusCode::Internal
    }
}

/// Receives the IAM identifiers of a tenant's default groups
#[async_trait]
pub trait RegistryClient: Send + Sync {
    async fn set_tenant_user_groups(
        &self,
        ctx: &RequestContext,
        tenant_id: &str,
        groups: Vec<String>,
    ) -> Result<ServiceResponse, ClientError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyOidcMappingRequest {
    pub tenant_id: String,
    pub issuer: String,
    pub jwks_uri: Option<String>,
    pub audiences: Vec<String>,
    pub properties: HashMap<String, String>,
}

/// OIDC mapping operations of the session manager
#[async_trait]
pub trait SessionManagerClient: Send + Sync {
    async fn apply_oidc_mapping(
        &self,
        ctx: &RequestContext,
        request: ApplyOidcMappingRequest,
    ) -> Result<ServiceResponse, ClientError>;

    async fn block_oidc_mapping(
        &self,
        ctx: &RequestContext,
        tenant_id: &str,
    ) -> Result<ServiceResponse, ClientError>;

    async fn unblock_oidc_mapping(
        &self,
        ctx: &RequestContext,
        tenant_id: &str,
    ) -> Result<ServiceResponse, ClientError>;

    async fn remove_oidc_mapping(
        &self,
        ctx: &RequestContext,
        tenant_id: &str,
    ) -> Result<ServiceResponse, ClientError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OffboardingStatus {
    Processing,
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffboardingResult {
    pub status: OffboardingStatus,
}

impl OffboardingResult {
    pub fn new(status: OffboardingStatus) -> Self {
        Self { status }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TenantManagerError {
    #[error("no tenant in request scope")]
    MissingTenant,
    #[error("tenant manager store failure: {0}")]
    Store(#[from] StoreError),
    #[error("tenant manager call failed: {0}")]
    Client(#[from] ClientError),
}

/// Two-phase tenant teardown. Both operations read the tenant from `ctx`.
#[async_trait]
pub trait TenantManager: Send + Sync {
    async fn offboard_tenant(
        &self,
        ctx: &RequestContext,
    ) -> Result<OffboardingResult, TenantManagerError>;

    async fn delete_tenant(&self, ctx: &RequestContext) -> Result<(), TenantManagerError>;
}
