//! # Task Payloads
//!
//! Payloads carried in the `data` field of a handler request. They are JSON
//! documents; unknown fields are ignored so the issuer can evolve them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::tenant::TenantRole;

/// Payload of a provision-tenant task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantMessage {
    pub id: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub owner_type: String,
    #[serde(default)]
    pub owner_id: String,
    #[serde(default)]
    pub role: TenantRole,
}

/// Payload of block, unblock and terminate tasks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantReference {
    pub id: String,
}

/// Payload of an apply-auth task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthMessage {
    #[serde(default)]
    pub tenant_id: String,
    /// `None` when the issuer sent no property map at all
    #[serde(default)]
    pub properties: Option<HashMap<String, String>>,
}
