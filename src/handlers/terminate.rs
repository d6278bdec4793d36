use tracing::{error, info, instrument, Span};

use super::block::decode_reference;
use super::response::{self, WorkingState};
use super::TenantOperator;
use crate::clients::OffboardingStatus;
use crate::context::RequestContext;
use crate::dispatch::{HandlerRequest, HandlerResponse};

impl TenantOperator {
    /// Remove the OIDC mapping, offboard, then delete the tenant.
    ///
    /// Deletion only runs after offboarding reports success. Once offboarding
    /// succeeded, every later failure is retried so termination converges.
    #[instrument(skip_all, fields(task_id = ?ctx.task_id(), tenant_id))]
    pub async fn terminate_tenant(
        &self,
        ctx: &RequestContext,
        request: &HandlerRequest,
    ) -> HandlerResponse {
        let tenant_id = match decode_reference(&request.data) {
            Ok(tenant_id) => tenant_id,
            Err(error) => return response::fail(ctx, WorkingState::InvalidTaskData, &error),
        };
        Span::current().record("tenant_id", tenant_id.as_str());
        let ctx = ctx.clone().with_tenant(tenant_id.clone());

        match self
            .session_manager
            .remove_oidc_mapping(&ctx, &tenant_id)
            .await
        {
            Ok(reply) if reply.success => {}
            Ok(reply) => {
                return response::fail(
                    &ctx,
                    WorkingState::RemovingMappingFailed,
                    &format!("session manager could not remove OIDC mapping: {}", reply.message),
                )
            }
            Err(error) if error.is_internal() => {
                error!(%error, "removing OIDC mapping failed with internal error");
                return response::fail(&ctx, WorkingState::RemovingMappingFailed, &error);
            }
            Err(error) => {
                return response::retry(
                    &ctx,
                    WorkingState::RemovingMappingFailed,
                    self.delays.error,
                    &error,
                )
            }
        }

        let offboarding = match self.tenant_manager.offboard_tenant(&ctx).await {
            Ok(result) => result,
            Err(error) => {
                return response::retry(
                    &ctx,
                    WorkingState::WaitingForOffboarding,
                    self.delays.error,
                    &error,
                )
            }
        };

        match offboarding.status {
            OffboardingStatus::Processing => {
                response::processing(&ctx, WorkingState::WaitingForOffboarding, self.delays.processing)
            }
            OffboardingStatus::Failed => response::fail(
                &ctx,
                WorkingState::OffboardingFailed,
                &"tenant manager reported offboarding failure",
            ),
            OffboardingStatus::Success => match self.tenant_manager.delete_tenant(&ctx).await {
                Ok(()) => {
                    info!("tenant offboarded and deleted");
                    response::done(&ctx, WorkingState::TenantTerminated)
                }
                Err(error) => {
                    response::retry(&ctx, WorkingState::DeletionFailed, self.delays.error, &error)
                }
            },
        }
    }
}
