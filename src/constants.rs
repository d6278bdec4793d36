//! # System Constants
//!
//! Well-known names and default operational values shared by the probe, the
//! stores and the lifecycle handlers. The group names and the IAM identifier
//! format are part of the contract with the registry service and must stay
//! stable.

use std::time::Duration;

/// Name of the per-tenant administrator group
pub const TENANT_ADMIN_GROUP: &str = "TenantAdministrator";

/// Name of the per-tenant auditor group
pub const TENANT_AUDITOR_GROUP: &str = "TenantAuditor";

/// Role assigned to the administrator group
pub const TENANT_ADMIN_ROLE: &str = "TENANT_ADMINISTRATOR";

/// Role assigned to the auditor group
pub const TENANT_AUDITOR_ROLE: &str = "TENANT_AUDITOR";

/// Prefix used when building group IAM identifiers
pub const IAM_IDENTIFIER_PREFIX: &str = "KMS";

/// Identity injected into every handler invocation
pub const SYSTEM_ACTOR_ID: &str = "system";

/// Audit value used when a write happens without any actor in scope
pub const UNKNOWN_ACTOR_ID: &str = "unknown";

/// Default delays handed back to the dispatch framework
pub mod reconcile {
    /// Short delay for in-progress provisioning steps
    pub const PROCESSING_DELAY_SECONDS: u64 = 3;
    /// Long delay after a downstream service error
    pub const ERROR_DELAY_SECONDS: u64 = 15;
}

/// Default per-step probe timeout
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
