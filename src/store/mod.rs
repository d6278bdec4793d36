//! # Tenant Store
//!
//! Storage collaborator used by the probe and the lifecycle handlers.
//!
//! ## Conflict-as-success
//!
//! Creation operations return a [`CreateOutcome`] instead of folding a
//! uniqueness violation into the error channel. `AlreadyExists` means another
//! delivery of the same task (or a concurrent duplicate) already performed the
//! step, which is what makes the create handler safe under at-least-once
//! delivery. Only genuine failures come back as [`StoreError`].
//!
//! ## Implementations
//!
//! - [`PgTenantStore`]: PostgreSQL, one schema per tenant
//! - [`InMemoryTenantStore`]: process-local, same uniqueness semantics

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::context::RequestContext;
use crate::models::{GroupType, Tenant};
use crate::schema_name::SchemaNameError;

pub use memory::InMemoryTenantStore;
pub use postgres::PgTenantStore;

/// Result of an idempotent creation step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// This call performed the creation
    Created,
    /// The uniqueness constraint reported that the resource already exists
    AlreadyExists,
}

impl CreateOutcome {
    pub fn was_created(&self) -> bool {
        matches!(self, Self::Created)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store is not initialized")]
    Uninitialized,

    #[error("store operation timed out: {operation}")]
    Timeout { operation: String },

    #[error("store query failed: {operation}: {message}")]
    Query { operation: String, message: String },

    #[error("invalid schema name: {0}")]
    InvalidSchemaName(#[from] SchemaNameError),

    #[error("no tenant in request scope")]
    MissingTenantScope,
}

impl StoreError {
    pub fn query(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Query {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// Classify a driver error raised while running `operation`
    pub fn from_sqlx(operation: &str, error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::PoolClosed => Self::Uninitialized,
            sqlx::Error::PoolTimedOut => Self::timeout(operation),
            other => Self::query(operation, other.to_string()),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        Self::from_sqlx("database", error)
    }
}

/// Persisted tenant state.
///
/// Every method is a single blocking round trip under the caller's task; the
/// store imposes no locking beyond its own constraint enforcement.
#[async_trait]
pub trait TenantStore: Send + Sync {
    /// Whether a tenant owns `schema_name`
    async fn schema_exists(&self, schema_name: &str) -> Result<bool, StoreError>;

    /// Whether `group` exists inside the tenant's schema
    async fn group_exists(&self, tenant_id: &str, group: GroupType) -> Result<bool, StoreError>;

    /// Register the tenant and create its schema in one unit of work
    async fn create_schema(
        &self,
        ctx: &RequestContext,
        tenant: &Tenant,
    ) -> Result<CreateOutcome, StoreError>;

    /// Create the admin and auditor groups of the tenant in `ctx` scope, as a pair
    async fn create_default_groups(&self, ctx: &RequestContext)
        -> Result<CreateOutcome, StoreError>;

    async fn find_tenant(&self, tenant_id: &str) -> Result<Option<Tenant>, StoreError>;

    /// Start a unit of work spanning tenant updates and an external call
    async fn begin(&self) -> Result<Box<dyn TenantTransaction>, StoreError>;

    /// Drop the tenant's schema; `false` if it was already gone
    async fn drop_schema(&self, tenant_id: &str) -> Result<bool, StoreError>;

    /// Remove the tenant record; `false` if it was already gone
    async fn delete_tenant(&self, tenant_id: &str) -> Result<bool, StoreError>;
}

/// Open unit of work. Dropping it without `commit` discards staged changes.
#[async_trait]
pub trait TenantTransaction: Send {
    /// Set the tenant's issuer URL; `false` when no tenant matched
    async fn patch_issuer_url(
        &mut self,
        tenant_id: &str,
        issuer_url: &str,
    ) -> Result<bool, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
