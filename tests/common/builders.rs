//! Test data builders and a wired-up operator harness

use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tenant_reconciler::config::ReconcilerConfig;
use tenant_reconciler::dispatch::{ActionType, Dispatcher, HandlerRequest, HandlerResponse};
use tenant_reconciler::models::{Tenant, TenantMessage, TenantRole};
use tenant_reconciler::{RequestContext, TenantOperator, TenantStore};

use super::mock_collaborators::{FaultyStore, MockRegistry, MockSessionManager, MockTenantManager};

pub fn tenant_message(id: &str) -> TenantMessage {
    TenantMessage {
        id: id.to_string(),
        region: "eu10".to_string(),
        owner_type: "customer".to_string(),
        owner_id: format!("owner-of-{id}"),
        role: TenantRole::Live,
    }
}

pub fn provision_request(id: &str) -> HandlerRequest {
    HandlerRequest::json(ActionType::ProvisionTenant, &tenant_message(id)).unwrap()
}

/// Block, unblock or terminate request for `id`
pub fn reference_request(action: ActionType, id: &str) -> HandlerRequest {
    HandlerRequest::new(action, json!({ "id": id }).to_string().into_bytes())
}

pub fn auth_request(tenant_id: &str, properties: Option<HashMap<String, String>>) -> HandlerRequest {
    HandlerRequest::new(
        ActionType::ApplyAuth,
        json!({ "tenant_id": tenant_id, "properties": properties })
            .to_string()
            .into_bytes(),
    )
}

pub fn properties(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Operator wired to mock collaborators over a fault-injecting store
pub struct Harness {
    pub store: FaultyStore,
    pub registry: MockRegistry,
    pub sessions: MockSessionManager,
    pub tenant_manager: MockTenantManager,
    pub operator: Arc<TenantOperator>,
    pub dispatcher: Dispatcher,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ReconcilerConfig::default())
    }

    pub fn with_config(config: ReconcilerConfig) -> Self {
        let store = FaultyStore::new();
        let registry = MockRegistry::new();
        let sessions = MockSessionManager::new();
        let tenant_manager = MockTenantManager::new();

        let operator = Arc::new(
            TenantOperator::builder()
                .store(Arc::new(store.clone()))
                .registry(Arc::new(registry.clone()))
                .session_manager(Arc::new(sessions.clone()))
                .tenant_manager(Arc::new(tenant_manager.clone()))
                .config(config)
                .build()
                .expect("operator should build with every dependency"),
        );

        let mut dispatcher = Dispatcher::new();
        operator
            .register_handlers(&mut dispatcher)
            .expect("handlers should register once");

        Self {
            store,
            registry,
            sessions,
            tenant_manager,
            operator,
            dispatcher,
        }
    }

    /// Deliver through the dispatcher, as the framework would
    pub async fn deliver(&self, request: &HandlerRequest) -> HandlerResponse {
        self.dispatcher.dispatch(request).await
    }

    /// Provision schema and groups directly in the store
    pub async fn seed_tenant(&self, id: &str) -> Tenant {
        let tenant = Tenant::from_message(tenant_message(id)).unwrap();
        let ctx = RequestContext::new().with_tenant(id);
        self.store.create_schema(&ctx, &tenant).await.unwrap();
        self.store.create_default_groups(&ctx).await.unwrap();
        tenant
    }
}
