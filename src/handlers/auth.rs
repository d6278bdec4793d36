use thiserror::Error;
use tracing::{info, instrument, Span};

use super::response::{self, WorkingState};
use super::{decode_payload, TaskDataError, TenantOperator};
use crate::clients::{ApplyOidcMappingRequest, ClientError};
use crate::context::RequestContext;
use crate::dispatch::{HandlerRequest, HandlerResponse};
use crate::models::AuthMessage;
use crate::oidc::OidcConfig;
use crate::store::StoreError;

/// Why applying an OIDC configuration did not complete
#[derive(Debug, Error)]
enum ApplyAuthError {
    /// Terminal: the tenant is unknown or the session manager refused
    #[error("failed to apply OIDC: {0}")]
    Rejected(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("session manager unreachable: {0}")]
    Transport(#[from] ClientError),
}

fn decode_auth(data: &[u8]) -> Result<(String, OidcConfig), TaskDataError> {
    let message: AuthMessage = decode_payload(data)?;
    if message.tenant_id.is_empty() {
        return Err(TaskDataError::MissingTenantId);
    }
    let config = OidcConfig::extract(message.properties.as_ref())?;
    Ok((message.tenant_id, config))
}

impl TenantOperator {
    #[instrument(skip_all, fields(task_id = ?ctx.task_id(), tenant_id))]
    pub async fn apply_tenant_auth(
        &self,
        ctx: &RequestContext,
        request: &HandlerRequest,
    ) -> HandlerResponse {
        let (tenant_id, config) = match decode_auth(&request.data) {
            Ok(decoded) => decoded,
            Err(error) => return response::fail(ctx, WorkingState::InvalidTaskData, &error),
        };
        Span::current().record("tenant_id", tenant_id.as_str());
        let ctx = ctx.clone().with_tenant(tenant_id.clone());

        match self.apply_oidc(&ctx, &tenant_id, config).await {
            Ok(()) => response::done(&ctx, WorkingState::AuthApplied),
            Err(error @ ApplyAuthError::Rejected(_)) => {
                response::fail(&ctx, WorkingState::ApplyingAuthFailed, &error)
            }
            Err(error) => response::retry(
                &ctx,
                WorkingState::ApplyingAuthFailed,
                self.delays.error,
                &error,
            ),
        }
    }

    /// Patch the issuer URL and push the mapping to the session manager in one
    /// unit of work. The patch is only committed when the mapping was applied.
    async fn apply_oidc(
        &self,
        ctx: &RequestContext,
        tenant_id: &str,
        config: OidcConfig,
    ) -> Result<(), ApplyAuthError> {
        let mut tx = self.store.begin().await?;

        let patched = match tx.patch_issuer_url(tenant_id, &config.issuer).await {
            Ok(patched) => patched,
            Err(error) => {
                tx.rollback().await?;
                return Err(error.into());
            }
        };
        if !patched {
            tx.rollback().await?;
            return Err(ApplyAuthError::Rejected(
                "could not update tenant issuer URL in database".to_string(),
            ));
        }

        let request = ApplyOidcMappingRequest {
            tenant_id: tenant_id.to_string(),
            issuer: config.issuer,
            jwks_uri: Some(config.jwks_uri),
            audiences: config.audiences,
            properties: config.additional_properties,
        };
        let reply = match self.session_manager.apply_oidc_mapping(ctx, request).await {
            Ok(reply) => reply,
            Err(error) => {
                tx.rollback().await?;
                return Err(error.into());
            }
        };
        if !reply.success {
            tx.rollback().await?;
            return Err(ApplyAuthError::Rejected(reply.message));
        }

        tx.commit().await?;
        info!("tenant issuer URL updated and OIDC mapping applied");
        Ok(())
    }
}
