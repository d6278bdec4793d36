//! # Data Models
//!
//! Tenant and access-group entities plus the task payloads that carry them.

pub mod group;
pub mod messages;
pub mod tenant;

pub use group::{iam_identifier, Group, GroupType};
pub use messages::{AuthMessage, TenantMessage, TenantReference};
pub use tenant::{Tenant, TenantRole, TenantStatus};
