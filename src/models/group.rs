use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{
    IAM_IDENTIFIER_PREFIX, TENANT_ADMIN_GROUP, TENANT_ADMIN_ROLE, TENANT_AUDITOR_GROUP,
    TENANT_AUDITOR_ROLE,
};

/// The two access groups every tenant owns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupType {
    Admin,
    Auditor,
}

impl GroupType {
    /// Required groups, in the order they are created and reported
    pub const REQUIRED: [GroupType; 2] = [GroupType::Admin, GroupType::Auditor];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Admin => TENANT_ADMIN_GROUP,
            Self::Auditor => TENANT_AUDITOR_GROUP,
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            Self::Admin => TENANT_ADMIN_ROLE,
            Self::Auditor => TENANT_AUDITOR_ROLE,
        }
    }

    pub fn iam_identifier(&self, tenant_id: &str) -> String {
        iam_identifier(self.name(), tenant_id)
    }
}

/// `KMS_<group>_<tenant>`
pub fn iam_identifier(group_name: &str, tenant_id: &str) -> String {
    format!("{IAM_IDENTIFIER_PREFIX}_{group_name}_{tenant_id}")
}

/// Group represents an access-control group inside a tenant schema.
/// Maps to the `groups` table of each tenant schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub role: String,
    pub iam_identifier: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl Group {
    pub fn new_default(group_type: GroupType, tenant_id: &str, created_by: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: group_type.name().to_string(),
            role: group_type.role().to_string(),
            iam_identifier: group_type.iam_identifier(tenant_id),
            created_by: created_by.to_string(),
            created_at: Utc::now(),
        }
    }
}
