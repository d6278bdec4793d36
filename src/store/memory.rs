//! Process-local tenant store.
//!
//! Enforces the same uniqueness rules as the PostgreSQL store: one tenant per
//! id, one tenant per schema name, one group pair per tenant. Uniqueness is
//! decided under the dashmap shard lock of the tenant's entry, so concurrent
//! duplicate creations observe exactly one `Created`.
//!
//! ```rust
//! use tenant_reconciler::models::{Tenant, TenantMessage, TenantRole};
//! use tenant_reconciler::store::{CreateOutcome, InMemoryTenantStore, TenantStore};
//! use tenant_reconciler::RequestContext;
//!
//! # tokio_test::block_on(async {
//! let store = InMemoryTenantStore::new();
//! let tenant = Tenant::from_message(TenantMessage {
//!     id: "tenant-1".to_string(),
//!     region: "eu-west-1".to_string(),
//!     owner_type: "customer".to_string(),
//!     owner_id: "owner-1".to_string(),
//!     role: TenantRole::Live,
//! })
//! .unwrap();
//!
//! let ctx = RequestContext::new().with_system_actor();
//! assert_eq!(store.create_schema(&ctx, &tenant).await.unwrap(), CreateOutcome::Created);
//! assert_eq!(store.create_schema(&ctx, &tenant).await.unwrap(), CreateOutcome::AlreadyExists);
//! # });
//! ```

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use std::sync::Arc;

use super::{CreateOutcome, StoreError, TenantStore, TenantTransaction};
use crate::context::RequestContext;
use crate::models::{Group, GroupType, Tenant};

#[derive(Debug, Default)]
struct Tables {
    /// Public tenant catalog, keyed by tenant id
    tenants: DashMap<String, Tenant>,
    /// Catalog index: schema name -> tenant id, kept until the tenant is deleted
    schemas: DashMap<String, String>,
    /// Schemas physically present; offboarding drops them ahead of the catalog row
    live_schemas: DashSet<String>,
    /// tenant id -> groups of that tenant's schema
    groups: DashMap<String, Vec<Group>>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryTenantStore {
    tables: Arc<Tables>,
}

impl InMemoryTenantStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tenant schemas currently present
    pub fn schema_count(&self) -> usize {
        self.tables.live_schemas.len()
    }

    /// Groups currently stored for a tenant
    pub fn groups_of(&self, tenant_id: &str) -> Vec<Group> {
        self.tables
            .groups
            .get(tenant_id)
            .map(|groups| groups.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TenantStore for InMemoryTenantStore {
    async fn schema_exists(&self, schema_name: &str) -> Result<bool, StoreError> {
        Ok(self.tables.schemas.contains_key(schema_name))
    }

    async fn group_exists(&self, tenant_id: &str, group: GroupType) -> Result<bool, StoreError> {
        Ok(self
            .tables
            .groups
            .get(tenant_id)
            .is_some_and(|groups| groups.iter().any(|g| g.name == group.name())))
    }

    async fn create_schema(
        &self,
        _ctx: &RequestContext,
        tenant: &Tenant,
    ) -> Result<CreateOutcome, StoreError> {
        match self.tables.tenants.entry(tenant.id.clone()) {
            Entry::Occupied(_) => Ok(CreateOutcome::AlreadyExists),
            Entry::Vacant(vacant) => match self.tables.schemas.entry(tenant.schema_name.clone()) {
                Entry::Occupied(_) => Ok(CreateOutcome::AlreadyExists),
                Entry::Vacant(schema) => {
                    schema.insert(tenant.id.clone());
                    self.tables.live_schemas.insert(tenant.schema_name.clone());
                    vacant.insert(tenant.clone());
                    Ok(CreateOutcome::Created)
                }
            },
        }
    }

    async fn create_default_groups(
        &self,
        ctx: &RequestContext,
    ) -> Result<CreateOutcome, StoreError> {
        let tenant_id = ctx.tenant_id().ok_or(StoreError::MissingTenantScope)?;

        let schema_name = self
            .tables
            .tenants
            .get(tenant_id)
            .map(|tenant| tenant.schema_name.clone());
        if !schema_name.is_some_and(|name| self.tables.live_schemas.contains(&name)) {
            return Err(StoreError::query(
                "create groups",
                format!("schema of tenant {tenant_id} does not exist"),
            ));
        }

        match self.tables.groups.entry(tenant_id.to_string()) {
            Entry::Occupied(_) => Ok(CreateOutcome::AlreadyExists),
            Entry::Vacant(vacant) => {
                let groups = GroupType::REQUIRED
                    .iter()
                    .map(|group_type| {
                        Group::new_default(*group_type, tenant_id, ctx.audit_actor_id())
                    })
                    .collect();
                vacant.insert(groups);
                Ok(CreateOutcome::Created)
            }
        }
    }

    async fn find_tenant(&self, tenant_id: &str) -> Result<Option<Tenant>, StoreError> {
        Ok(self
            .tables
            .tenants
            .get(tenant_id)
            .map(|tenant| tenant.clone()))
    }

    async fn begin(&self) -> Result<Box<dyn TenantTransaction>, StoreError> {
        Ok(Box::new(InMemoryTransaction {
            tables: Arc::clone(&self.tables),
            issuer_patches: Vec::new(),
        }))
    }

    async fn drop_schema(&self, tenant_id: &str) -> Result<bool, StoreError> {
        let schema_name = match self.tables.tenants.get(tenant_id) {
            Some(tenant) => tenant.schema_name.clone(),
            None => return Ok(false),
        };

        self.tables.groups.remove(tenant_id);
        Ok(self.tables.live_schemas.remove(&schema_name).is_some())
    }

    async fn delete_tenant(&self, tenant_id: &str) -> Result<bool, StoreError> {
        let removed = self.tables.tenants.remove(tenant_id);
        if let Some((_, tenant)) = &removed {
            self.tables.schemas.remove(&tenant.schema_name);
            self.tables.live_schemas.remove(&tenant.schema_name);
            self.tables.groups.remove(tenant_id);
        }
        Ok(removed.is_some())
    }
}

/// Buffers issuer patches until commit
struct InMemoryTransaction {
    tables: Arc<Tables>,
    issuer_patches: Vec<(String, String)>,
}

#[async_trait]
impl TenantTransaction for InMemoryTransaction {
    async fn patch_issuer_url(
        &mut self,
        tenant_id: &str,
        issuer_url: &str,
    ) -> Result<bool, StoreError> {
        if !self.tables.tenants.contains_key(tenant_id) {
            return Ok(false);
        }
        self.issuer_patches
            .push((tenant_id.to_string(), issuer_url.to_string()));
        Ok(true)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        for (tenant_id, issuer_url) in self.issuer_patches {
            if let Some(mut tenant) = self.tables.tenants.get_mut(&tenant_id) {
                tenant.issuer_url = issuer_url;
            }
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
