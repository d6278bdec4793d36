//! # Task Dispatch
//!
//! Binds lifecycle actions to handlers and drives them from a [`TaskSource`].
//!
//! The dispatch framework delivers a task at least once and keeps delivering
//! it for as long as the handler answers [`TaskResult::Processing`]. Handlers
//! therefore never see a "resume" signal; each call starts from the payload and
//! whatever is persisted.
//!
//! ## Registration
//!
//! Handlers are registered by the action's wire string. Unknown strings and
//! double registration fail at startup with
//! [`ReconcilerError::UnknownAction`] and [`ReconcilerError::DuplicateHandler`].
//! Every registered handler is wrapped in [`SystemActorHandler`] so downstream
//! writes are attributed to the reconciler.

pub mod source;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::context::RequestContext;
use crate::error::{ReconcilerError, Result};

pub use source::{ChannelTaskSource, TaskSource, TaskSubmitter};

/// Lifecycle actions, identified on the wire by kebab-case strings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionType {
    ProvisionTenant,
    BlockTenant,
    UnblockTenant,
    TerminateTenant,
    ApplyAuth,
}

impl ActionType {
    pub const ALL: [ActionType; 5] = [
        ActionType::ProvisionTenant,
        ActionType::BlockTenant,
        ActionType::UnblockTenant,
        ActionType::TerminateTenant,
        ActionType::ApplyAuth,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProvisionTenant => "provision-tenant",
            Self::BlockTenant => "block-tenant",
            Self::UnblockTenant => "unblock-tenant",
            Self::TerminateTenant => "terminate-tenant",
            Self::ApplyAuth => "apply-auth",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = ReconcilerError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| ReconcilerError::UnknownAction(s.to_string()))
    }
}

/// A single delivery of a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerRequest {
    pub task_id: Uuid,
    pub action_type: String,
    /// Opaque payload, JSON for every action this crate handles
    pub data: Vec<u8>,
}

impl HandlerRequest {
    pub fn new(action: ActionType, data: Vec<u8>) -> Self {
        Self {
            task_id: Uuid::new_v4(),
            action_type: action.as_str().to_string(),
            data,
        }
    }

    /// Build a request whose payload is `payload` serialized as JSON
    pub fn json<T: Serialize>(action: ActionType, payload: &T) -> serde_json::Result<Self> {
        Ok(Self::new(action, serde_json::to_vec(payload)?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskResult {
    /// Task finished; no further deliveries
    Done,
    /// Redeliver after `reconcile_after_seconds`
    Processing,
    /// Task finished unsuccessfully; no further deliveries
    Failed,
}

impl TaskResult {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Processing)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerResponse {
    pub result: TaskResult,
    /// Free-form diagnostic persisted by the framework
    pub working_state: Vec<u8>,
    /// Only meaningful for `Processing`
    pub reconcile_after_seconds: u64,
    /// Only set for `Failed`
    pub error_message: Option<String>,
}

impl HandlerResponse {
    pub fn done(working_state: impl Into<Vec<u8>>) -> Self {
        Self {
            result: TaskResult::Done,
            working_state: working_state.into(),
            reconcile_after_seconds: 0,
            error_message: None,
        }
    }

    pub fn processing(working_state: impl Into<Vec<u8>>, reconcile_after_seconds: u64) -> Self {
        Self {
            result: TaskResult::Processing,
            working_state: working_state.into(),
            reconcile_after_seconds,
            error_message: None,
        }
    }

    pub fn failed(working_state: impl Into<Vec<u8>>, error_message: impl Into<String>) -> Self {
        Self {
            result: TaskResult::Failed,
            working_state: working_state.into(),
            reconcile_after_seconds: 0,
            error_message: Some(error_message.into()),
        }
    }

    pub fn working_state_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.working_state)
    }
}

#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Process one delivery. Expected failures are expressed in the response.
    async fn handle(&self, ctx: &RequestContext, request: &HandlerRequest) -> HandlerResponse;
}

/// Runs the wrapped handler with the system actor in context
pub struct SystemActorHandler {
    inner: Arc<dyn TaskHandler>,
}

impl SystemActorHandler {
    pub fn new(inner: Arc<dyn TaskHandler>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl TaskHandler for SystemActorHandler {
    async fn handle(&self, ctx: &RequestContext, request: &HandlerRequest) -> HandlerResponse {
        let ctx = ctx.clone().with_system_actor();
        self.inner.handle(&ctx, request).await
    }
}

#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<ActionType, Arc<dyn TaskHandler>>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("actions", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for the action named `action_type` on the wire
    pub fn register(&mut self, action_type: &str, handler: Arc<dyn TaskHandler>) -> Result<()> {
        let action = action_type.parse::<ActionType>()?;
        self.register_action(action, handler)
    }

    pub fn register_action(
        &mut self,
        action: ActionType,
        handler: Arc<dyn TaskHandler>,
    ) -> Result<()> {
        if self.handlers.contains_key(&action) {
            return Err(ReconcilerError::DuplicateHandler(action));
        }

        info!(action = %action, "registering handler");
        self.handlers
            .insert(action, Arc::new(SystemActorHandler::new(handler)));
        Ok(())
    }

    pub fn is_registered(&self, action: ActionType) -> bool {
        self.handlers.contains_key(&action)
    }

    pub fn registered_actions(&self) -> Vec<ActionType> {
        let mut actions: Vec<_> = self.handlers.keys().copied().collect();
        actions.sort_by_key(|action| action.as_str());
        actions
    }

    /// Route one delivery to its handler
    pub async fn dispatch(&self, request: &HandlerRequest) -> HandlerResponse {
        let handler = request
            .action_type
            .parse::<ActionType>()
            .ok()
            .and_then(|action| self.handlers.get(&action));

        let Some(handler) = handler else {
            error!(
                task_id = %request.task_id,
                action = %request.action_type,
                "no handler registered for action"
            );
            return HandlerResponse::failed(
                "unhandled action",
                format!("no handler registered for action {}", request.action_type),
            );
        };

        let ctx = RequestContext::for_task(request.task_id);
        handler.handle(&ctx, request).await
    }

    /// Receive, dispatch and answer tasks until `shutdown` resolves or the
    /// source closes. Both are a clean exit.
    pub async fn listen_and_respond<S, F>(&self, source: &S, shutdown: F) -> Result<()>
    where
        S: TaskSource + ?Sized,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(actions = ?self.registered_actions(), "listening for tasks");

        loop {
            let request = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("task listener shutting down");
                    return Ok(());
                }
                next = source.receive() => next,
            };

            let Some(request) = request else {
                warn!("task source closed, stopping listener");
                return Ok(());
            };

            debug!(task_id = %request.task_id, action = %request.action_type, "task received");
            let response = self.dispatch(&request).await;
            source.respond(&request, response).await?;
        }
    }
}
