//! Database schema and migrations

use rusqlite::Connection;

use crate::Result;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Initialize the database schema
///
/// # Errors
///
/// Returns error if migration fails
pub fn init(conn: &Connection) -> Result<()> {
    let version: i32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- Provisioned messaging instances, one tenant each
        CREATE TABLE IF NOT EXISTS wa_instances (
            instance_id TEXT PRIMARY KEY,
            token TEXT NOT NULL,
            org_id INTEGER NOT NULL DEFAULT 1,
            flow_id INTEGER NOT NULL DEFAULT 1,
            webhook_url TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_wa_instances_tenant ON wa_instances(org_id, flow_id);

        -- Raw inbound provider events, append-only
        CREATE TABLE IF NOT EXISTS webhooks_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source TEXT NOT NULL,
            instance_id TEXT,
            payload BLOB NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_webhooks_log_time ON webhooks_log(created_at);

        -- Catalog rows created from committed pending products
        CREATE TABLE IF NOT EXISTS products (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            org_id INTEGER NOT NULL,
            flow_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            slug TEXT,
            status TEXT NOT NULL DEFAULT 'active',
            image_url TEXT,
            price_cents INTEGER NOT NULL DEFAULT 0,
            stock INTEGER NOT NULL DEFAULT 0,
            category TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_products_tenant ON products(org_id, flow_id);

        PRAGMA user_version = 1;
        ",
    )?;

    tracing::info!("migrated to schema v1");
    Ok(())
}

fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- Last connection status snapshot reported by the provider (JSON)
        ALTER TABLE wa_instances ADD COLUMN status TEXT;

        PRAGMA user_version = 2;
        ",
    )?;

    tracing::info!("migrated to schema v2");
    Ok(())
}
