//! # Tenant Lifecycle Handlers
//!
//! One handler per lifecycle action. Handlers keep no state between calls:
//! every delivery decodes its payload, re-reads whatever it needs from the
//! store or the probe and answers with a directive. Re-running a handler from
//! scratch is always safe, which is what at-least-once delivery requires.
//!
//! ## Directive policy
//!
//! | Situation | Result |
//! |---|---|
//! | Malformed payload | `Failed`, "invalid task data" |
//! | Transient dependency failure | `Processing`, retried after a delay |
//! | Explicit rejection by a reachable service | `Failed` |
//! | Uniqueness conflict on creation | treated as success |
//!
//! Collaborators are injected through [`TenantOperatorBuilder`], which rejects
//! missing dependencies at construction time.

mod auth;
mod block;
mod create;
pub mod response;
mod terminate;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::clients::{RegistryClient, SessionManagerClient, TenantManager};
use crate::config::ReconcilerConfig;
use crate::context::RequestContext;
use crate::dispatch::{ActionType, Dispatcher, HandlerRequest, HandlerResponse, TaskHandler, TaskSource};
use crate::error::{ReconcilerError, Result};
use crate::oidc::OidcConfigError;
use crate::probe::TenantProbe;
use crate::schema_name::SchemaNameError;
use crate::store::TenantStore;

pub use response::{ReconcileDelays, WorkingState};

/// Why a payload could not be turned into work
#[derive(Debug, Error)]
pub enum TaskDataError {
    #[error("payload could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("tenant id is required")]
    MissingTenantId,
    #[error("schema name could not be derived: {0}")]
    SchemaName(#[from] SchemaNameError),
    #[error("invalid auth properties: {0}")]
    AuthProperties(#[from] OidcConfigError),
}

pub(crate) fn decode_payload<T: DeserializeOwned>(data: &[u8]) -> std::result::Result<T, TaskDataError> {
    Ok(serde_json::from_slice(data)?)
}

/// The lifecycle handlers and the collaborators they share
pub struct TenantOperator {
    store: Arc<dyn TenantStore>,
    probe: TenantProbe,
    registry: Arc<dyn RegistryClient>,
    session_manager: Arc<dyn SessionManagerClient>,
    tenant_manager: Arc<dyn TenantManager>,
    delays: ReconcileDelays,
}

impl std::fmt::Debug for TenantOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantOperator")
            .field("delays", &self.delays)
            .finish_non_exhaustive()
    }
}

impl TenantOperator {
    pub fn builder() -> TenantOperatorBuilder {
        TenantOperatorBuilder::default()
    }

    pub fn delays(&self) -> ReconcileDelays {
        self.delays
    }

    /// Route one delivery to the handler for `action`
    pub async fn handle(
        &self,
        action: ActionType,
        ctx: &RequestContext,
        request: &HandlerRequest,
    ) -> HandlerResponse {
        match action {
            ActionType::ProvisionTenant => self.create_tenant(ctx, request).await,
            ActionType::ApplyAuth => self.apply_tenant_auth(ctx, request).await,
            ActionType::BlockTenant => self.block_tenant(ctx, request).await,
            ActionType::UnblockTenant => self.unblock_tenant(ctx, request).await,
            ActionType::TerminateTenant => self.terminate_tenant(ctx, request).await,
        }
    }

    /// Register one handler per lifecycle action
    pub fn register_handlers(self: &Arc<Self>, dispatcher: &mut Dispatcher) -> Result<()> {
        for action in ActionType::ALL {
            let handler = OperatorHandler {
                operator: Arc::clone(self),
                action,
            };
            dispatcher.register(action.as_str(), Arc::new(handler))?;
        }
        Ok(())
    }

    /// Serve tasks from `source` until `shutdown` resolves or the source closes
    pub async fn run<S, F>(self: &Arc<Self>, source: &S, shutdown: F) -> Result<()>
    where
        S: TaskSource + ?Sized,
        F: Future<Output = ()>,
    {
        info!("initializing operator");
        let mut dispatcher = Dispatcher::new();
        self.register_handlers(&mut dispatcher)?;

        dispatcher.listen_and_respond(source, shutdown).await
    }
}

struct OperatorHandler {
    operator: Arc<TenantOperator>,
    action: ActionType,
}

#[async_trait]
impl TaskHandler for OperatorHandler {
    async fn handle(&self, ctx: &RequestContext, request: &HandlerRequest) -> HandlerResponse {
        self.operator.handle(self.action, ctx, request).await
    }
}

/// Collects collaborators and validates them on [`TenantOperatorBuilder::build`]
#[derive(Default)]
pub struct TenantOperatorBuilder {
    store: Option<Arc<dyn TenantStore>>,
    registry: Option<Arc<dyn RegistryClient>>,
    session_manager: Option<Arc<dyn SessionManagerClient>>,
    tenant_manager: Option<Arc<dyn TenantManager>>,
    config: Option<ReconcilerConfig>,
}

impl TenantOperatorBuilder {
    pub fn store(mut self, store: Arc<dyn TenantStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn registry(mut self, registry: Arc<dyn RegistryClient>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn session_manager(mut self, session_manager: Arc<dyn SessionManagerClient>) -> Self {
        self.session_manager = Some(session_manager);
        self
    }

    pub fn tenant_manager(mut self, tenant_manager: Arc<dyn TenantManager>) -> Self {
        self.tenant_manager = Some(tenant_manager);
        self
    }

    /// Probe deadlines and reconcile delays; defaults apply when unset
    pub fn config(mut self, config: ReconcilerConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> Result<TenantOperator> {
        let store = self.store.ok_or(ReconcilerError::MissingDependency("tenant store"))?;
        let registry = self
            .registry
            .ok_or(ReconcilerError::MissingDependency("registry client"))?;
        let session_manager = self
            .session_manager
            .ok_or(ReconcilerError::MissingDependency("session manager client"))?;
        let tenant_manager = self
            .tenant_manager
            .ok_or(ReconcilerError::MissingDependency("tenant manager"))?;

        let config = self.config.unwrap_or_default();
        config.validate()?;

        Ok(TenantOperator {
            probe: TenantProbe::from_config(Arc::clone(&store), &config.probe),
            store,
            registry,
            session_manager,
            tenant_manager,
            delays: ReconcileDelays::from(&config.reconcile),
        })
    }
}
