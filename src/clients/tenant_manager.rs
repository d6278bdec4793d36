use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use super::{OffboardingResult, OffboardingStatus, TenantManager, TenantManagerError};
use crate::context::RequestContext;
use crate::store::TenantStore;

/// Tenant manager backed directly by the tenant store.
///
/// Offboarding drops the tenant schema; deletion removes the catalog row.
/// Both are idempotent, so a redelivered terminate task converges.
pub struct StoreTenantManager {
    store: Arc<dyn TenantStore>,
}

impl StoreTenantManager {
    pub fn new(store: Arc<dyn TenantStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TenantManager for StoreTenantManager {
    async fn offboard_tenant(
        &self,
        ctx: &RequestContext,
    ) -> Result<OffboardingResult, TenantManagerError> {
        let tenant_id = ctx.tenant_id().ok_or(TenantManagerError::MissingTenant)?;

        let dropped = self.store.drop_schema(tenant_id).await?;
        info!(tenant_id, dropped, "tenant schema offboarded");

        Ok(OffboardingResult::new(OffboardingStatus::Success))
    }

    async fn delete_tenant(&self, ctx: &RequestContext) -> Result<(), TenantManagerError> {
        let tenant_id = ctx.tenant_id().ok_or(TenantManagerError::MissingTenant)?;

        if !self.store.delete_tenant(tenant_id).await? {
            warn!(tenant_id, "tenant record already removed");
        }
        Ok(())
    }
}
