use tracing::{instrument, Span};

use super::response::{self, WorkingState};
use super::{decode_payload, TaskDataError, TenantOperator};
use crate::clients::{ClientError, ServiceResponse};
use crate::context::RequestContext;
use crate::dispatch::{HandlerRequest, HandlerResponse};
use crate::models::TenantReference;

/// Decode a tenant reference payload; an empty id is malformed
pub(super) fn decode_reference(data: &[u8]) -> Result<String, TaskDataError> {
    let reference: TenantReference = decode_payload(data)?;
    if reference.id.is_empty() {
        return Err(TaskDataError::MissingTenantId);
    }
    Ok(reference.id)
}

/// Which session-manager toggle a task performs
#[derive(Debug, Clone, Copy)]
enum AccessChange {
    Block,
    Unblock,
}

impl AccessChange {
    fn succeeded(self) -> WorkingState {
        match self {
            Self::Block => WorkingState::TenantBlocked,
            Self::Unblock => WorkingState::TenantUnblocked,
        }
    }

    fn failed(self) -> WorkingState {
        match self {
            Self::Block => WorkingState::BlockingFailed,
            Self::Unblock => WorkingState::UnblockingFailed,
        }
    }

    fn verb(self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::Unblock => "unblock",
        }
    }
}

impl TenantOperator {
    /// Block the tenant's OIDC mapping. Transport errors are always retried so
    /// a failed block never leaves access open.
    #[instrument(skip_all, fields(task_id = ?ctx.task_id(), tenant_id))]
    pub async fn block_tenant(
        &self,
        ctx: &RequestContext,
        request: &HandlerRequest,
    ) -> HandlerResponse {
        self.change_access(ctx, request, AccessChange::Block).await
    }

    #[instrument(skip_all, fields(task_id = ?ctx.task_id(), tenant_id))]
    pub async fn unblock_tenant(
        &self,
        ctx: &RequestContext,
        request: &HandlerRequest,
    ) -> HandlerResponse {
        self.change_access(ctx, request, AccessChange::Unblock).await
    }

    async fn change_access(
        &self,
        ctx: &RequestContext,
        request: &HandlerRequest,
        change: AccessChange,
    ) -> HandlerResponse {
        let tenant_id = match decode_reference(&request.data) {
            Ok(tenant_id) => tenant_id,
            Err(error) => return response::fail(ctx, WorkingState::InvalidTaskData, &error),
        };
        Span::current().record("tenant_id", tenant_id.as_str());
        let ctx = ctx.clone().with_tenant(tenant_id.clone());

        let reply: Result<ServiceResponse, ClientError> = match change {
            AccessChange::Block => {
                self.session_manager
                    .block_oidc_mapping(&ctx, &tenant_id)
                    .await
            }
            AccessChange::Unblock => {
                self.session_manager
                    .unblock_oidc_mapping(&ctx, &tenant_id)
                    .await
            }
        };

        match reply {
            Ok(reply) if reply.success => response::done(&ctx, change.succeeded()),
            Ok(reply) => response::fail(
                &ctx,
                change.failed(),
                &format!(
                    "session manager could not {} OIDC mapping: {}",
                    change.verb(),
                    reply.message
                ),
            ),
            Err(error) => response::retry(&ctx, change.failed(), self.delays.error, &error),
        }
    }
}
