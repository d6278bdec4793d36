//! # Tenant Probe
//!
//! Read-only inspection of provisioning progress. The create handler runs the
//! probe on every delivery and derives the remaining work from its result;
//! nothing about progress is held in memory between deliveries.
//!
//! Each axis is checked under its own deadline so a slow store surfaces as a
//! [`ProbeError::Timeout`] instead of stalling the handler.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ProbeConfig;
use crate::constants::DEFAULT_PROBE_TIMEOUT;
use crate::context::RequestContext;
use crate::models::{GroupType, Tenant};
use crate::store::{StoreError, TenantStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaStatus {
    NotFound,
    Exists,
    CheckFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupsStatus {
    #[default]
    NotFound,
    Exists,
    CheckFailed,
}

/// Snapshot of both provisioning axes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    pub schema: SchemaStatus,
    pub groups: GroupsStatus,
}

impl ProbeResult {
    pub fn is_complete(&self) -> bool {
        self.schema == SchemaStatus::Exists && self.groups == GroupsStatus::Exists
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("tenant probe timed out during {stage}")]
    Timeout { stage: &'static str },

    #[error("schema check failed: {0}")]
    SchemaCheck(StoreError),

    #[error("groups check failed: {0}")]
    GroupsCheck(StoreError),
}

impl ProbeError {
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::SchemaCheck(StoreError::Timeout { .. })
                | Self::GroupsCheck(StoreError::Timeout { .. })
        )
    }

    /// The status the failing axis would report
    pub fn partial_result(&self) -> ProbeResult {
        match self {
            Self::Timeout { stage } if *stage == SCHEMA_STAGE => ProbeResult {
                schema: SchemaStatus::CheckFailed,
                groups: GroupsStatus::NotFound,
            },
            Self::SchemaCheck(_) => ProbeResult {
                schema: SchemaStatus::CheckFailed,
                groups: GroupsStatus::NotFound,
            },
            Self::Timeout { .. } | Self::GroupsCheck(_) => ProbeResult {
                schema: SchemaStatus::Exists,
                groups: GroupsStatus::CheckFailed,
            },
        }
    }
}

const SCHEMA_STAGE: &str = "schema check";
const GROUPS_STAGE: &str = "groups check";

pub struct TenantProbe {
    store: Arc<dyn TenantStore>,
    schema_timeout: Duration,
    groups_timeout: Duration,
}

impl TenantProbe {
    pub fn new(store: Arc<dyn TenantStore>) -> Self {
        Self {
            store,
            schema_timeout: DEFAULT_PROBE_TIMEOUT,
            groups_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn from_config(store: Arc<dyn TenantStore>, config: &ProbeConfig) -> Self {
        Self {
            store,
            schema_timeout: Duration::from_millis(config.schema_timeout_ms),
            groups_timeout: Duration::from_millis(config.groups_timeout_ms),
        }
    }

    pub fn with_timeouts(mut self, schema_timeout: Duration, groups_timeout: Duration) -> Self {
        self.schema_timeout = schema_timeout;
        self.groups_timeout = groups_timeout;
        self
    }

    /// Inspect the tenant's schema and, only if it exists, its default groups.
    pub async fn check(
        &self,
        _ctx: &RequestContext,
        tenant: &Tenant,
    ) -> Result<ProbeResult, ProbeError> {
        let schema = self.check_schema(tenant).await?;
        if schema != SchemaStatus::Exists {
            debug!(tenant_id = %tenant.id, ?schema, "schema missing, skipping groups check");
            return Ok(ProbeResult {
                schema,
                groups: GroupsStatus::default(),
            });
        }

        let groups = self.check_groups(tenant).await?;
        debug!(tenant_id = %tenant.id, ?schema, ?groups, "tenant probe completed");

        Ok(ProbeResult { schema, groups })
    }

    async fn check_schema(&self, tenant: &Tenant) -> Result<SchemaStatus, ProbeError> {
        let exists = bounded(
            SCHEMA_STAGE,
            self.schema_timeout,
            self.store.schema_exists(&tenant.schema_name),
        )
        .await?
        .map_err(|error| {
            warn!(tenant_id = %tenant.id, %error, "schema existence check failed");
            ProbeError::SchemaCheck(error)
        })?;

        Ok(if exists {
            SchemaStatus::Exists
        } else {
            SchemaStatus::NotFound
        })
    }

    async fn check_groups(&self, tenant: &Tenant) -> Result<GroupsStatus, ProbeError> {
        let lookups = async {
            let admin = self.store.group_exists(&tenant.id, GroupType::Admin).await?;
            let auditor = self
                .store
                .group_exists(&tenant.id, GroupType::Auditor)
                .await?;
            Ok::<_, StoreError>(admin && auditor)
        };

        let all_exist = bounded(GROUPS_STAGE, self.groups_timeout, lookups)
            .await?
            .map_err(|error| {
                warn!(tenant_id = %tenant.id, %error, "group existence check failed");
                ProbeError::GroupsCheck(error)
            })?;

        Ok(if all_exist {
            GroupsStatus::Exists
        } else {
            GroupsStatus::NotFound
        })
    }
}

async fn bounded<T>(
    stage: &'static str,
    limit: Duration,
    fut: impl Future<Output = T>,
) -> Result<T, ProbeError> {
    tokio::time::timeout(limit, fut).await.map_err(|_| {
        warn!(stage, timeout_ms = limit.as_millis() as u64, "tenant probe deadline exceeded");
        ProbeError::Timeout { stage }
    })
}
