#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Tenant Reconciler
//!
//! Idempotent, resumable tenant lifecycle handlers for a multi-tenant
//! key-management platform.
//!
//! ## Overview
//!
//! Each tenant owns an isolated schema in a shared PostgreSQL database plus
//! an administrator and an auditor group. Lifecycle changes arrive as tasks
//! from an external dispatch framework which keeps redelivering a task until
//! its handler reports `Done` or `Failed`. The handlers here provision,
//! authenticate, block, unblock and terminate tenants under at-least-once
//! delivery and concurrent duplicates.
//!
//! ## Module Organization
//!
//! - [`probe`] - Read-only inspection of provisioning progress
//! - [`oidc`] - Auth property parsing
//! - [`handlers`] - Lifecycle handlers and the [`TenantOperator`]
//! - [`dispatch`] - Action registration, system-actor injection, listen loop
//! - [`store`] - Tenant persistence with conflict-as-success creation
//! - [`clients`] - Registry, session manager and tenant manager contracts
//! - [`config`] - Layered configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tenant_reconciler::clients::{RegistryClient, SessionManagerClient, StoreTenantManager};
//! use tenant_reconciler::config::ConfigManager;
//! use tenant_reconciler::dispatch::ChannelTaskSource;
//! use tenant_reconciler::store::PgTenantStore;
//! use tenant_reconciler::TenantOperator;
//!
//! # async fn example(
//! #     registry: Arc<dyn RegistryClient>,
//! #     sessions: Arc<dyn SessionManagerClient>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigManager::load_from("config/reconciler.toml")?.into_config();
//! let store = Arc::new(PgTenantStore::connect(&config.database).await?);
//! store.ensure_catalog().await?;
//!
//! let operator = Arc::new(
//!     TenantOperator::builder()
//!         .store(store.clone())
//!         .registry(registry)
//!         .session_manager(sessions)
//!         .tenant_manager(Arc::new(StoreTenantManager::new(store)))
//!         .config(config.clone())
//!         .build()?,
//! );
//!
//! let (source, _submitter) = ChannelTaskSource::from_config(&config.dispatcher);
//! operator.run(&source, async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! # Ok(())
//! # }
//! ```

pub mod clients;
pub mod config;
pub mod constants;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod models;
pub mod oidc;
pub mod probe;
pub mod schema_name;
pub mod store;

pub use config::{ConfigManager, ReconcilerConfig};
pub use context::{Actor, RequestContext};
pub use dispatch::{
    ActionType, Dispatcher, HandlerRequest, HandlerResponse, TaskHandler, TaskResult, TaskSource,
};
pub use error::{ReconcilerError, Result};
pub use handlers::{TenantOperator, TenantOperatorBuilder, WorkingState};
pub use probe::{GroupsStatus, ProbeResult, SchemaStatus, TenantProbe};
pub use store::{CreateOutcome, StoreError, TenantStore};
