use tracing::{debug, info, instrument, Span};

use super::response::{self, WorkingState};
use super::{decode_payload, TaskDataError, TenantOperator};
use crate::context::RequestContext;
use crate::dispatch::{HandlerRequest, HandlerResponse};
use crate::models::{GroupType, Tenant, TenantMessage};
use crate::probe::{GroupsStatus, SchemaStatus};

fn decode_tenant(data: &[u8]) -> Result<Tenant, TaskDataError> {
    let message: TenantMessage = decode_payload(data)?;
    Ok(Tenant::from_message(message)?)
}

impl TenantOperator {
    /// Provision a tenant: schema, default groups, then registry hand-off.
    ///
    /// Progress is re-derived from the probe on every delivery. Each call does
    /// whatever is missing and asks to be called again; the call that finds
    /// everything in place finalizes.
    #[instrument(skip_all, fields(task_id = ?ctx.task_id(), tenant_id))]
    pub async fn create_tenant(
        &self,
        ctx: &RequestContext,
        request: &HandlerRequest,
    ) -> HandlerResponse {
        let tenant = match decode_tenant(&request.data) {
            Ok(tenant) => tenant,
            Err(error) => return response::fail(ctx, WorkingState::InvalidTaskData, &error),
        };
        Span::current().record("tenant_id", tenant.id.as_str());
        let ctx = ctx.clone().with_tenant(tenant.id.clone());

        let probe = match self.probe.check(&ctx, &tenant).await {
            Ok(probe) => probe,
            Err(error) => {
                return response::retry(
                    &ctx,
                    WorkingState::ProbingFailed,
                    self.delays.processing,
                    &error,
                )
            }
        };

        if probe.is_complete() {
            return self.finalize_provisioning(&ctx, &tenant.id).await;
        }

        if probe.schema != SchemaStatus::Exists {
            match self.store.create_schema(&ctx, &tenant).await {
                Ok(outcome) if outcome.was_created() => {
                    info!(schema_name = %tenant.schema_name, "tenant schema created");
                }
                Ok(_) => info!("schema creation already in progress elsewhere, continuing"),
                Err(error) => {
                    return response::retry(
                        &ctx,
                        WorkingState::SchemaCreationFailed,
                        self.delays.error,
                        &error,
                    )
                }
            }
        }

        if probe.groups != GroupsStatus::Exists {
            match self.store.create_default_groups(&ctx).await {
                Ok(outcome) if outcome.was_created() => info!("default groups created"),
                Ok(_) => info!("group creation already in progress elsewhere, continuing"),
                Err(error) => {
                    return response::retry(
                        &ctx,
                        WorkingState::GroupCreationFailed,
                        self.delays.error,
                        &error,
                    )
                }
            }
        }

        response::processing(&ctx, WorkingState::TenantCreating, self.delays.processing)
    }

    /// Hand the tenant's group identifiers to the registry.
    async fn finalize_provisioning(&self, ctx: &RequestContext, tenant_id: &str) -> HandlerResponse {
        let groups: Vec<String> = GroupType::REQUIRED
            .iter()
            .map(|group| group.iam_identifier(tenant_id))
            .collect();

        match self
            .registry
            .set_tenant_user_groups(ctx, tenant_id, groups)
            .await
        {
            Ok(reply) if reply.success => {
                debug!("sent user groups to registry");
                response::done(ctx, WorkingState::TenantCreated)
            }
            Ok(reply) => response::retry(
                ctx,
                WorkingState::SendingGroupsFailed,
                self.delays.processing,
                &format!("registry rejected groups: {}", reply.message),
            ),
            Err(error) => response::retry(
                ctx,
                WorkingState::SendingGroupsFailed,
                self.delays.processing,
                &error,
            ),
        }
    }
}
