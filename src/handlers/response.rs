//! Working-state tags and directive builders.
//!
//! The tag strings are persisted by the dispatch framework and watched by
//! monitoring; changing one is a breaking change.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error, warn};

use crate::config::ReconcileConfig;
use crate::context::RequestContext;
use crate::dispatch::HandlerResponse;
use crate::logging::log_tenant_operation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkingState {
    InvalidTaskData,
    TenantCreating,
    TenantCreated,
    ProbingFailed,
    SchemaCreationFailed,
    GroupCreationFailed,
    SendingGroupsFailed,
    AuthApplied,
    ApplyingAuthFailed,
    TenantBlocked,
    BlockingFailed,
    TenantUnblocked,
    UnblockingFailed,
    TenantTerminated,
    RemovingMappingFailed,
    WaitingForOffboarding,
    OffboardingFailed,
    DeletionFailed,
}

impl WorkingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidTaskData => "invalid task data",
            Self::TenantCreating => "tenant is being created",
            Self::TenantCreated => "tenant created successfully",
            Self::ProbingFailed => "tenant probing failed",
            Self::SchemaCreationFailed => "schema creation failed",
            Self::GroupCreationFailed => "group creation failed",
            Self::SendingGroupsFailed => "failed to send groups",
            Self::AuthApplied => "tenant auth applied",
            Self::ApplyingAuthFailed => "applying tenant auth failed",
            Self::TenantBlocked => "tenant blocked",
            Self::BlockingFailed => "blocking tenant failed",
            Self::TenantUnblocked => "tenant unblocked",
            Self::UnblockingFailed => "unblocking tenant failed",
            Self::TenantTerminated => "tenant terminated",
            Self::RemovingMappingFailed => "removing oidc mapping failed",
            Self::WaitingForOffboarding => "waiting for offboarding",
            Self::OffboardingFailed => "tenant offboarding failed",
            Self::DeletionFailed => "tenant deletion failed",
        }
    }

    /// Parse a persisted working state back into its tag
    pub fn from_bytes(raw: &[u8]) -> Option<Self> {
        let raw = std::str::from_utf8(raw).ok()?;
        ALL_STATES.into_iter().find(|state| state.as_str() == raw)
    }
}

const ALL_STATES: [WorkingState; 18] = [
    WorkingState::InvalidTaskData,
    WorkingState::TenantCreating,
    WorkingState::TenantCreated,
    WorkingState::ProbingFailed,
    WorkingState::SchemaCreationFailed,
    WorkingState::GroupCreationFailed,
    WorkingState::SendingGroupsFailed,
    WorkingState::AuthApplied,
    WorkingState::ApplyingAuthFailed,
    WorkingState::TenantBlocked,
    WorkingState::BlockingFailed,
    WorkingState::TenantUnblocked,
    WorkingState::UnblockingFailed,
    WorkingState::TenantTerminated,
    WorkingState::RemovingMappingFailed,
    WorkingState::WaitingForOffboarding,
    WorkingState::OffboardingFailed,
    WorkingState::DeletionFailed,
];

impl fmt::Display for WorkingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<WorkingState> for Vec<u8> {
    fn from(state: WorkingState) -> Self {
        state.as_str().as_bytes().to_vec()
    }
}

/// Redelivery delays, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileDelays {
    /// In-progress provisioning steps
    pub processing: u64,
    /// Downstream failures
    pub error: u64,
}

impl Default for ReconcileDelays {
    fn default() -> Self {
        Self::from(&ReconcileConfig::default())
    }
}

impl From<&ReconcileConfig> for ReconcileDelays {
    fn from(config: &ReconcileConfig) -> Self {
        Self {
            processing: config.processing_delay_seconds,
            error: config.error_delay_seconds,
        }
    }
}

/// Terminal success, recorded as a tenant operation
pub(crate) fn done(ctx: &RequestContext, state: WorkingState) -> HandlerResponse {
    log_tenant_operation(
        "reconcile",
        ctx.task_id(),
        ctx.tenant_id(),
        state.as_str(),
        None,
    );
    HandlerResponse::done(state)
}

/// Continue-and-wait on the expected path
pub(crate) fn processing(
    ctx: &RequestContext,
    state: WorkingState,
    reconcile_after_seconds: u64,
) -> HandlerResponse {
    debug!(
        task_id = ?ctx.task_id(),
        tenant_id = ?ctx.tenant_id(),
        working_state = %state,
        reconcile_after_seconds,
        "task still processing"
    );
    HandlerResponse::processing(state, reconcile_after_seconds)
}

/// Continue-and-wait after a transient failure
pub(crate) fn retry(
    ctx: &RequestContext,
    state: WorkingState,
    reconcile_after_seconds: u64,
    cause: &dyn fmt::Display,
) -> HandlerResponse {
    warn!(
        task_id = ?ctx.task_id(),
        tenant_id = ?ctx.tenant_id(),
        working_state = %state,
        reconcile_after_seconds,
        error = %cause,
        "task step failed, will retry"
    );
    HandlerResponse::processing(state, reconcile_after_seconds)
}

/// Terminal failure; the cause becomes the task's error message
pub(crate) fn fail(
    ctx: &RequestContext,
    state: WorkingState,
    cause: &dyn fmt::Display,
) -> HandlerResponse {
    error!(
        task_id = ?ctx.task_id(),
        tenant_id = ?ctx.tenant_id(),
        working_state = %state,
        error = %cause,
        "task failed"
    );
    HandlerResponse::failed(state, format!("{state}: {cause}"))
}
