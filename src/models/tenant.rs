use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::messages::TenantMessage;
use crate::schema_name::{self, SchemaNameError};

/// Lifecycle status of a tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    Active,
    Blocked,
    Terminated,
}

impl TenantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Blocked => "blocked",
            Self::Terminated => "terminated",
        }
    }
}

impl fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TenantStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "blocked" => Ok(Self::Blocked),
            "terminated" => Ok(Self::Terminated),
            _ => Err(format!("Invalid tenant status: {s}")),
        }
    }
}

/// Commercial role of a tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantRole {
    #[default]
    Unspecified,
    Live,
    Test,
    Trial,
}

impl TenantRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unspecified => "unspecified",
            Self::Live => "live",
            Self::Test => "test",
            Self::Trial => "trial",
        }
    }
}

impl fmt::Display for TenantRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TenantRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unspecified" => Ok(Self::Unspecified),
            "live" => Ok(Self::Live),
            "test" => Ok(Self::Test),
            "trial" => Ok(Self::Trial),
            _ => Err(format!("Invalid tenant role: {s}")),
        }
    }
}

/// Tenant represents an isolated customer account.
/// Maps to the public `tenants` table; the tenant's own data lives in `schema_name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
    pub region: String,
    pub status: TenantStatus,
    pub owner_type: String,
    pub owner_id: String,
    pub role: TenantRole,
    /// Empty until an auth configuration has been applied
    pub issuer_url: String,
    pub schema_name: String,
    pub domain_url: String,
}

impl Tenant {
    /// Build the tenant to provision from a provisioning message.
    ///
    /// New tenants always start `active`; the schema and domain names are
    /// derived from the identifier.
    pub fn from_message(message: TenantMessage) -> Result<Self, SchemaNameError> {
        let schema_name = schema_name::encode(&message.id)?;

        Ok(Self {
            id: message.id,
            region: message.region,
            status: TenantStatus::Active,
            owner_type: message.owner_type,
            owner_id: message.owner_id,
            role: message.role,
            issuer_url: String::new(),
            domain_url: schema_name.clone(),
            schema_name,
        })
    }
}
