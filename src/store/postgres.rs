//! PostgreSQL tenant store.
//!
//! Tenants are registered in the public `tenants` table, whose unique `id` and
//! `schema_name` columns are the constraints that turn concurrent duplicate
//! provisioning into [`CreateOutcome::AlreadyExists`]. Each tenant's groups
//! live in a `groups` table inside its own schema.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::time::Duration;
use tracing::{debug, info};

use super::{CreateOutcome, StoreError, TenantStore, TenantTransaction};
use crate::config::DatabaseConfig;
use crate::context::RequestContext;
use crate::models::{Group, GroupType, Tenant};
use crate::schema_name;

/// SQLSTATE raised by `CREATE SCHEMA` for an existing schema
const DUPLICATE_SCHEMA: &str = "42P06";

const CREATE_CATALOG_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS tenants (
        id TEXT PRIMARY KEY,
        region TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL,
        owner_type TEXT NOT NULL DEFAULT '',
        owner_id TEXT NOT NULL DEFAULT '',
        role TEXT NOT NULL,
        issuer_url TEXT NOT NULL DEFAULT '',
        schema_name TEXT NOT NULL UNIQUE,
        domain_url TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
"#;

/// Row shape of the `tenants` table
#[derive(Debug, FromRow)]
struct TenantRow {
    id: String,
    region: String,
    status: String,
    owner_type: String,
    owner_id: String,
    role: String,
    issuer_url: String,
    schema_name: String,
    domain_url: String,
}

impl TryFrom<TenantRow> for Tenant {
    type Error = StoreError;

    fn try_from(row: TenantRow) -> Result<Self, Self::Error> {
        Ok(Tenant {
            status: row
                .status
                .parse()
                .map_err(|e: String| StoreError::query("decode tenant", e))?,
            role: row
                .role
                .parse()
                .map_err(|e: String| StoreError::query("decode tenant", e))?,
            id: row.id,
            region: row.region,
            owner_type: row.owner_type,
            owner_id: row.owner_id,
            issuer_url: row.issuer_url,
            schema_name: row.schema_name,
            domain_url: row.domain_url,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PgTenantStore {
    pool: PgPool,
}

impl PgTenantStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool sized and bounded by `config`
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
            .connect(&config.url)
            .await
            .map_err(|e| StoreError::from_sqlx("connect", e))?;

        info!(
            max_connections = config.max_connections,
            "Connected tenant store to PostgreSQL"
        );

        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the public tenant catalog if it is missing
    pub async fn ensure_catalog(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_CATALOG_SQL)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::from_sqlx("create tenant catalog", e))?;
        Ok(())
    }

    fn check_initialized(&self) -> Result<(), StoreError> {
        if self.pool.is_closed() {
            return Err(StoreError::Uninitialized);
        }
        Ok(())
    }
}

/// Whether `error` is the store's "already exists" signal
fn is_conflict(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db) => {
            db.is_unique_violation() || db.code().as_deref() == Some(DUPLICATE_SCHEMA)
        }
        _ => false,
    }
}

/// Double-quoted schema identifier; only called with validated names
fn quoted_schema(schema_name: &str) -> Result<String, StoreError> {
    schema_name::validate(schema_name)?;
    Ok(format!("\"{schema_name}\""))
}

async fn insert_tenant(
    tx: &mut Transaction<'static, Postgres>,
    tenant: &Tenant,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO tenants
            (id, region, status, owner_type, owner_id, role, issuer_url, schema_name, domain_url)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(&tenant.id)
    .bind(&tenant.region)
    .bind(tenant.status.as_str())
    .bind(&tenant.owner_type)
    .bind(&tenant.owner_id)
    .bind(tenant.role.as_str())
    .bind(&tenant.issuer_url)
    .bind(&tenant.schema_name)
    .bind(&tenant.domain_url)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn create_tenant_schema(
    tx: &mut Transaction<'static, Postgres>,
    schema: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(&format!("CREATE SCHEMA {schema}"))
        .execute(&mut **tx)
        .await?;

    sqlx::query(&format!(
        r#"
        CREATE TABLE {schema}.groups (
            id UUID PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            role TEXT NOT NULL,
            iam_identifier TEXT NOT NULL UNIQUE,
            created_by TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#
    ))
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn insert_group(
    tx: &mut Transaction<'static, Postgres>,
    schema: &str,
    group: &Group,
) -> Result<(), sqlx::Error> {
    sqlx::query(&format!(
        "INSERT INTO {schema}.groups (id, name, role, iam_identifier, created_by, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6)"
    ))
    .bind(group.id)
    .bind(&group.name)
    .bind(&group.role)
    .bind(&group.iam_identifier)
    .bind(&group.created_by)
    .bind(group.created_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[async_trait]
impl TenantStore for PgTenantStore {
    async fn schema_exists(&self, schema_name: &str) -> Result<bool, StoreError> {
        self.check_initialized()?;

        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM tenants WHERE schema_name = $1)")
            .bind(schema_name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::from_sqlx("schema lookup", e))
    }

    async fn group_exists(&self, tenant_id: &str, group: GroupType) -> Result<bool, StoreError> {
        self.check_initialized()?;
        let schema = quoted_schema(&schema_name::encode(tenant_id)?)?;

        sqlx::query_scalar::<_, bool>(&format!(
            "SELECT EXISTS(SELECT 1 FROM {schema}.groups WHERE name = $1)"
        ))
        .bind(group.name())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::from_sqlx("group lookup", e))
    }

    async fn create_schema(
        &self,
        _ctx: &RequestContext,
        tenant: &Tenant,
    ) -> Result<CreateOutcome, StoreError> {
        self.check_initialized()?;
        let schema = quoted_schema(&tenant.schema_name)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::from_sqlx("begin schema creation", e))?;

        let created = async {
            insert_tenant(&mut tx, tenant).await?;
            create_tenant_schema(&mut tx, &schema).await
        }
        .await;

        match created {
            Ok(()) => {}
            Err(e) if is_conflict(&e) => {
                debug!(tenant_id = %tenant.id, "Tenant schema already registered");
                tx.rollback()
                    .await
                    .map_err(|e| StoreError::from_sqlx("rollback schema creation", e))?;
                return Ok(CreateOutcome::AlreadyExists);
            }
            Err(e) => return Err(StoreError::from_sqlx("create schema", e)),
        }

        match tx.commit().await {
            Ok(()) => {
                info!(tenant_id = %tenant.id, schema_name = %tenant.schema_name, "Tenant schema created");
                Ok(CreateOutcome::Created)
            }
            Err(e) if is_conflict(&e) => Ok(CreateOutcome::AlreadyExists),
            Err(e) => Err(StoreError::from_sqlx("commit schema creation", e)),
        }
    }

    async fn create_default_groups(
        &self,
        ctx: &RequestContext,
    ) -> Result<CreateOutcome, StoreError> {
        self.check_initialized()?;
        let tenant_id = ctx.tenant_id().ok_or(StoreError::MissingTenantScope)?;
        let schema = quoted_schema(&schema_name::encode(tenant_id)?)?;

        let groups: Vec<Group> = GroupType::REQUIRED
            .iter()
            .map(|group_type| Group::new_default(*group_type, tenant_id, ctx.audit_actor_id()))
            .collect();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::from_sqlx("begin group creation", e))?;

        for group in &groups {
            match insert_group(&mut tx, &schema, group).await {
                Ok(()) => {}
                Err(e) if is_conflict(&e) => {
                    debug!(tenant_id, group = %group.name, "Tenant group already exists");
                    tx.rollback()
                        .await
                        .map_err(|e| StoreError::from_sqlx("rollback group creation", e))?;
                    return Ok(CreateOutcome::AlreadyExists);
                }
                Err(e) => return Err(StoreError::from_sqlx("create groups", e)),
            }
        }

        match tx.commit().await {
            Ok(()) => Ok(CreateOutcome::Created),
            Err(e) if is_conflict(&e) => Ok(CreateOutcome::AlreadyExists),
            Err(e) => Err(StoreError::from_sqlx("commit group creation", e)),
        }
    }

    async fn find_tenant(&self, tenant_id: &str) -> Result<Option<Tenant>, StoreError> {
        self.check_initialized()?;

        let row = sqlx::query_as::<_, TenantRow>(
            r#"
            SELECT id, region, status, owner_type, owner_id, role, issuer_url, schema_name, domain_url
            FROM tenants
            WHERE id = $1
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::from_sqlx("find tenant", e))?;

        row.map(Tenant::try_from).transpose()
    }

    async fn begin(&self) -> Result<Box<dyn TenantTransaction>, StoreError> {
        self.check_initialized()?;

        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::from_sqlx("begin transaction", e))?;

        Ok(Box::new(PgTenantTransaction { tx }))
    }

    async fn drop_schema(&self, tenant_id: &str) -> Result<bool, StoreError> {
        self.check_initialized()?;
        let name = schema_name::encode(tenant_id)?;
        let schema = quoted_schema(&name)?;

        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM information_schema.schemata WHERE schema_name = $1)",
        )
        .bind(&name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::from_sqlx("schema catalog lookup", e))?;

        if !exists {
            return Ok(false);
        }

        sqlx::query(&format!("DROP SCHEMA IF EXISTS {schema} CASCADE"))
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::from_sqlx("drop schema", e))?;

        info!(tenant_id, schema_name = %name, "Tenant schema dropped");
        Ok(true)
    }

    async fn delete_tenant(&self, tenant_id: &str) -> Result<bool, StoreError> {
        self.check_initialized()?;

        let result = sqlx::query("DELETE FROM tenants WHERE id = $1")
            .bind(tenant_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::from_sqlx("delete tenant", e))?;

        Ok(result.rows_affected() > 0)
    }
}

pub struct PgTenantTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl TenantTransaction for PgTenantTransaction {
    async fn patch_issuer_url(
        &mut self,
        tenant_id: &str,
        issuer_url: &str,
    ) -> Result<bool, StoreError> {
        let result =
            sqlx::query("UPDATE tenants SET issuer_url = $2, updated_at = NOW() WHERE id = $1")
                .bind(tenant_id)
                .bind(issuer_url)
                .execute(&mut *self.tx)
                .await
                .map_err(|e| StoreError::from_sqlx("patch issuer url", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| StoreError::from_sqlx("commit transaction", e))
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| StoreError::from_sqlx("rollback transaction", e))
    }
}
