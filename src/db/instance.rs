//! Instance registry: maps a provider instance to its token and tenant

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};
use serde::Serialize;
use serde_json::Value;

use super::{DbPool, parse_datetime};
use crate::tenant::Tenant;
use crate::{Error, Result};

/// A registered messaging instance
#[derive(Debug, Clone, Serialize)]
pub struct Instance {
    pub instance_id: String,
    #[serde(skip_serializing)]
    pub token: String,
    #[serde(flatten)]
    pub tenant: Tenant,
    pub webhook_url: Option<String>,
    /// Last status snapshot reported by the provider
    pub status: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields written by an upsert
///
/// An empty `token` keeps the stored one; `webhook_url: None` keeps the stored URL.
#[derive(Debug, Clone)]
pub struct InstanceUpsert<'a> {
    pub instance_id: &'a str,
    pub token: &'a str,
    pub tenant: Tenant,
    pub webhook_url: Option<&'a str>,
}

/// Repository for instance registry operations
#[derive(Clone)]
pub struct InstanceRepo {
    pool: DbPool,
}

const COLUMNS: &str =
    "instance_id, token, org_id, flow_id, webhook_url, status, created_at, updated_at";

impl InstanceRepo {
    /// Create a new instance repository
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert or update a registry row
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn upsert(&self, row: &InstanceUpsert<'_>) -> Result<()> {
        let conn = super::conn(&self.pool)?;

        conn.execute(
            "INSERT INTO wa_instances (instance_id, token, org_id, flow_id, webhook_url)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(instance_id) DO UPDATE SET
                token = COALESCE(NULLIF(excluded.token, ''), wa_instances.token),
                org_id = excluded.org_id,
                flow_id = excluded.flow_id,
                webhook_url = COALESCE(excluded.webhook_url, wa_instances.webhook_url),
                updated_at = datetime('now')",
            params![
                row.instance_id,
                row.token,
                row.tenant.org_id,
                row.tenant.flow_id,
                row.webhook_url,
            ],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        tracing::debug!(
            instance = row.instance_id,
            org_id = row.tenant.org_id,
            flow_id = row.tenant.flow_id,
            "instance registry upserted"
        );

        Ok(())
    }

    /// Look up an instance by id
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn find(&self, instance_id: &str) -> Result<Option<Instance>> {
        let conn = super::conn(&self.pool)?;

        conn.query_row(
            &format!("SELECT {COLUMNS} FROM wa_instances WHERE instance_id = ?1"),
            params![instance_id],
            Self::row_to_instance,
        )
        .optional()
        .map_err(|e| Error::Database(e.to_string()))
    }

    /// Store the latest provider status snapshot
    ///
    /// Returns `false` when the instance is not registered.
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn set_status(&self, instance_id: &str, status: &Value) -> Result<bool> {
        let conn = super::conn(&self.pool)?;

        let changed = conn
            .execute(
                "UPDATE wa_instances SET status = ?2, updated_at = datetime('now')
                 WHERE instance_id = ?1",
                params![instance_id, status.to_string()],
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(changed > 0)
    }

    /// List instances owned by a tenant, newest first
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn list_for_tenant(&self, tenant: Tenant) -> Result<Vec<Instance>> {
        let conn = super::conn(&self.pool)?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {COLUMNS} FROM wa_instances
                 WHERE org_id = ?1 AND flow_id = ?2
                 ORDER BY created_at DESC, instance_id"
            ))
            .map_err(|e| Error::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![tenant.org_id, tenant.flow_id], Self::row_to_instance)
            .map_err(|e| Error::Database(e.to_string()))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Database(e.to_string()))
    }

    fn row_to_instance(row: &Row<'_>) -> rusqlite::Result<Instance> {
        let status: Option<String> = row.get(5)?;
        let created_at: String = row.get(6)?;
        let updated_at: String = row.get(7)?;

        Ok(Instance {
            instance_id: row.get(0)?,
            token: row.get(1)?,
            tenant: Tenant::new(row.get(2)?, row.get(3)?),
            webhook_url: row.get(4)?,
            status: status.and_then(|s| serde_json::from_str(&s).ok()),
            created_at: parse_datetime(&created_at),
            updated_at: parse_datetime(&updated_at),
        })
    }
}
