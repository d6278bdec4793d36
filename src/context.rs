//! # Request Context
//!
//! Per-invocation values that travel with a handler call: the task being
//! processed, the acting identity and the tenant the call is scoped to.
//! Downstream writes read the actor for audit fields and the tenant scope for
//! per-tenant lookups.

use crate::constants::{SYSTEM_ACTOR_ID, UNKNOWN_ACTOR_ID};
use std::fmt;
use uuid::Uuid;

/// Identity on whose behalf a call is made
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    /// The reconciler itself
    System,
    /// An external user or service account
    User(String),
}

impl Actor {
    pub fn id(&self) -> &str {
        match self {
            Actor::System => SYSTEM_ACTOR_ID,
            Actor::User(id) => id,
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Actor::System)
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    task_id: Option<Uuid>,
    actor: Option<Actor>,
    tenant_id: Option<String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_task(task_id: Uuid) -> Self {
        Self {
            task_id: Some(task_id),
            ..Self::default()
        }
    }

    pub fn with_actor(mut self, actor: Actor) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn with_system_actor(self) -> Self {
        self.with_actor(Actor::System)
    }

    /// Scope the context to a single tenant
    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn task_id(&self) -> Option<Uuid> {
        self.task_id
    }

    pub fn actor(&self) -> Option<&Actor> {
        self.actor.as_ref()
    }

    /// Actor id for audit columns, `"unknown"` when nobody is in scope
    pub fn audit_actor_id(&self) -> &str {
        self.actor.as_ref().map_or(UNKNOWN_ACTOR_ID, Actor::id)
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }
}
