//! Mock collaborators for exercising the lifecycle handlers
//!
//! Each mock records the calls it receives and answers with a programmable
//! response, so tests can script downstream failures and assert which calls
//! were (or were not) made.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tenant_reconciler::clients::{
    ApplyOidcMappingRequest, ClientError, OffboardingResult, OffboardingStatus, RegistryClient,
    ServiceResponse, SessionManagerClient, TenantManager, TenantManagerError,
};
use tenant_reconciler::models::{GroupType, Tenant};
use tenant_reconciler::store::{
    CreateOutcome, InMemoryTenantStore, StoreError, TenantStore, TenantTransaction,
};
use tenant_reconciler::RequestContext;

pub type RpcResult = Result<ServiceResponse, ClientError>;

/// Mock registry state for tracking submitted groups
#[derive(Debug)]
pub struct MockRegistryState {
    pub calls: Vec<(String, Vec<String>)>,
    pub response: RpcResult,
}

#[derive(Debug, Clone)]
pub struct MockRegistry {
    state: Arc<Mutex<MockRegistryState>>,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockRegistryState {
                calls: Vec::new(),
                response: Ok(ServiceResponse::ok()),
            })),
        }
    }

    pub fn respond_with(&self, response: RpcResult) {
        self.state.lock().unwrap().response = response;
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.state.lock().unwrap().calls.clone()
    }
}

#[async_trait]
impl RegistryClient for MockRegistry {
    async fn set_tenant_user_groups(
        &self,
        _ctx: &RequestContext,
        tenant_id: &str,
        groups: Vec<String>,
    ) -> RpcResult {
        let mut state = self.state.lock().unwrap();
        state.calls.push((tenant_id.to_string(), groups));
        state.response.clone()
    }
}

/// Session manager operations, as recorded by [`MockSessionManager`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionOp {
    Apply,
    Block,
    Unblock,
    Remove,
}

#[derive(Debug, Default)]
pub struct MockSessionState {
    pub calls: Vec<(SessionOp, String)>,
    pub applied: Vec<ApplyOidcMappingRequest>,
    pub responses: HashMap<SessionOp, RpcResult>,
}

#[derive(Debug, Clone, Default)]
pub struct MockSessionManager {
    state: Arc<Mutex<MockSessionState>>,
}

impl MockSessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the answer of one operation; unscripted operations succeed
    pub fn respond_with(&self, op: SessionOp, response: RpcResult) {
        self.state.lock().unwrap().responses.insert(op, response);
    }

    pub fn calls(&self) -> Vec<(SessionOp, String)> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self, op: SessionOp) -> usize {
        self.calls().iter().filter(|(called, _)| *called == op).count()
    }

    pub fn applied(&self) -> Vec<ApplyOidcMappingRequest> {
        self.state.lock().unwrap().applied.clone()
    }

    fn record(&self, op: SessionOp, tenant_id: &str) -> RpcResult {
        let mut state = self.state.lock().unwrap();
        state.calls.push((op, tenant_id.to_string()));
        state
            .responses
            .get(&op)
            .cloned()
            .unwrap_or_else(|| Ok(ServiceResponse::ok()))
    }
}

#[async_trait]
impl SessionManagerClient for MockSessionManager {
    async fn apply_oidc_mapping(
        &self,
        _ctx: &RequestContext,
        request: ApplyOidcMappingRequest,
    ) -> RpcResult {
        let tenant_id = request.tenant_id.clone();
        self.state.lock().unwrap().applied.push(request);
        self.record(SessionOp::Apply, &tenant_id)
    }

    async fn block_oidc_mapping(&self, _ctx: &RequestContext, tenant_id: &str) -> RpcResult {
        self.record(SessionOp::Block, tenant_id)
    }

    async fn unblock_oidc_mapping(&self, _ctx: &RequestContext, tenant_id: &str) -> RpcResult {
        self.record(SessionOp::Unblock, tenant_id)
    }

    async fn remove_oidc_mapping(&self, _ctx: &RequestContext, tenant_id: &str) -> RpcResult {
        self.record(SessionOp::Remove, tenant_id)
    }
}

#[derive(Debug)]
pub struct MockTenantManagerState {
    /// Tenant ids read from the context of each offboarding call
    pub offboard_calls: Vec<Option<String>>,
    /// Tenant ids read from the context of each deletion call
    pub delete_calls: Vec<Option<String>>,
    pub offboard_response: Result<OffboardingResult, TenantManagerError>,
    pub delete_response: Result<(), TenantManagerError>,
}

#[derive(Debug, Clone)]
pub struct MockTenantManager {
    state: Arc<Mutex<MockTenantManagerState>>,
}

impl MockTenantManager {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockTenantManagerState {
                offboard_calls: Vec::new(),
                delete_calls: Vec::new(),
                offboard_response: Ok(OffboardingResult::new(OffboardingStatus::Success)),
                delete_response: Ok(()),
            })),
        }
    }

    pub fn offboard_with(&self, response: Result<OffboardingResult, TenantManagerError>) {
        self.state.lock().unwrap().offboard_response = response;
    }

    pub fn offboarding_status(&self, status: OffboardingStatus) {
        self.offboard_with(Ok(OffboardingResult::new(status)));
    }

    pub fn delete_with(&self, response: Result<(), TenantManagerError>) {
        self.state.lock().unwrap().delete_response = response;
    }

    pub fn offboard_calls(&self) -> Vec<Option<String>> {
        self.state.lock().unwrap().offboard_calls.clone()
    }

    pub fn delete_calls(&self) -> Vec<Option<String>> {
        self.state.lock().unwrap().delete_calls.clone()
    }
}

#[async_trait]
impl TenantManager for MockTenantManager {
    async fn offboard_tenant(
        &self,
        ctx: &RequestContext,
    ) -> Result<OffboardingResult, TenantManagerError> {
        let mut state = self.state.lock().unwrap();
        state.offboard_calls.push(ctx.tenant_id().map(String::from));
        state.offboard_response.clone()
    }

    async fn delete_tenant(&self, ctx: &RequestContext) -> Result<(), TenantManagerError> {
        let mut state = self.state.lock().unwrap();
        state.delete_calls.push(ctx.tenant_id().map(String::from));
        state.delete_response.clone()
    }
}

/// Faults injected into [`FaultyStore`] operations
#[derive(Debug, Default, Clone)]
pub struct StoreFaults {
    pub schema_exists: Option<StoreError>,
    pub group_exists: Option<StoreError>,
    pub create_schema: Option<StoreError>,
    pub create_groups: Option<StoreError>,
    /// Added latency of every existence lookup
    pub lookup_delay: Option<Duration>,
    /// Existence lookups answer `false` regardless of stored state, as a
    /// replica lagging behind a concurrent provisioning would
    pub stale_lookups: bool,
}

/// In-memory store with programmable failures and latency
#[derive(Debug, Clone, Default)]
pub struct FaultyStore {
    inner: InMemoryTenantStore,
    faults: Arc<Mutex<StoreFaults>>,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &InMemoryTenantStore {
        &self.inner
    }

    pub fn set_faults(&self, faults: StoreFaults) {
        *self.faults.lock().unwrap() = faults;
    }

    pub fn clear_faults(&self) {
        self.set_faults(StoreFaults::default());
    }

    fn faults(&self) -> StoreFaults {
        self.faults.lock().unwrap().clone()
    }

    async fn lookup_latency(&self) {
        if let Some(delay) = self.faults().lookup_delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl TenantStore for FaultyStore {
    async fn schema_exists(&self, schema_name: &str) -> Result<bool, StoreError> {
        self.lookup_latency().await;
        let faults = self.faults();
        if let Some(error) = faults.schema_exists {
            return Err(error);
        }
        if faults.stale_lookups {
            return Ok(false);
        }
        self.inner.schema_exists(schema_name).await
    }

    async fn group_exists(&self, tenant_id: &str, group: GroupType) -> Result<bool, StoreError> {
        self.lookup_latency().await;
        let faults = self.faults();
        if let Some(error) = faults.group_exists {
            return Err(error);
        }
        if faults.stale_lookups {
            return Ok(false);
        }
        self.inner.group_exists(tenant_id, group).await
    }

    async fn create_schema(
        &self,
        ctx: &RequestContext,
        tenant: &Tenant,
    ) -> Result<CreateOutcome, StoreError> {
        if let Some(error) = self.faults().create_schema {
            return Err(error);
        }
        self.inner.create_schema(ctx, tenant).await
    }

    async fn create_default_groups(
        &self,
        ctx: &RequestContext,
    ) -> Result<CreateOutcome, StoreError> {
        if let Some(error) = self.faults().create_groups {
            return Err(error);
        }
        self.inner.create_default_groups(ctx).await
    }

    async fn find_tenant(&self, tenant_id: &str) -> Result<Option<Tenant>, StoreError> {
        self.inner.find_tenant(tenant_id).await
    }

    async fn begin(&self) -> Result<Box<dyn TenantTransaction>, StoreError> {
        self.inner.begin().await
    }

    async fn drop_schema(&self, tenant_id: &str) -> Result<bool, StoreError> {
        self.inner.drop_schema(tenant_id).await
    }

    async fn delete_tenant(&self, tenant_id: &str) -> Result<bool, StoreError> {
        self.inner.delete_tenant(tenant_id).await
    }
}
