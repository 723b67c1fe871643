//! Product catalog rows

use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::Serialize;

use super::{DbPool, parse_datetime};
use crate::tenant::Tenant;
use crate::{Error, Result};

/// Status assigned to products committed from chat
pub const STATUS_ACTIVE: &str = "active";

/// A stored catalog product
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: i64,
    #[serde(flatten)]
    pub tenant: Tenant,
    pub title: String,
    pub slug: String,
    pub status: String,
    pub image_url: String,
    pub price_cents: i64,
    pub stock: i64,
    pub category: String,
    pub created_at: DateTime<Utc>,
}

/// Fields for a new catalog row
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub tenant: Tenant,
    pub title: String,
    pub slug: String,
    pub image_url: String,
    pub price_cents: i64,
    pub category: String,
}

/// Repository for catalog operations
#[derive(Clone)]
pub struct CatalogRepo {
    pool: DbPool,
}

impl CatalogRepo {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert an active product with zero stock
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn insert(&self, product: NewProduct) -> Result<Product> {
        let conn = super::conn(&self.pool)?;

        conn.execute(
            "INSERT INTO products
                (org_id, flow_id, title, slug, status, image_url, price_cents, stock, category)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8)",
            params![
                product.tenant.org_id,
                product.tenant.flow_id,
                product.title,
                product.slug,
                STATUS_ACTIVE,
                product.image_url,
                product.price_cents,
                product.category,
            ],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        let id = conn.last_insert_rowid();
        tracing::info!(
            product_id = id,
            org_id = product.tenant.org_id,
            flow_id = product.tenant.flow_id,
            price_cents = product.price_cents,
            "catalog product created"
        );

        Ok(Product {
            id,
            tenant: product.tenant,
            title: product.title,
            slug: product.slug,
            status: STATUS_ACTIVE.to_string(),
            image_url: product.image_url,
            price_cents: product.price_cents,
            stock: 0,
            category: product.category,
            created_at: Utc::now(),
        })
    }

    /// Products owned by a tenant, newest first
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn list(&self, tenant: Tenant) -> Result<Vec<Product>> {
        let conn = super::conn(&self.pool)?;

        let mut stmt = conn
            .prepare(
                "SELECT id, org_id, flow_id, title, COALESCE(slug, ''), status,
                        COALESCE(image_url, ''), price_cents, stock, COALESCE(category, ''),
                        created_at
                 FROM products WHERE org_id = ?1 AND flow_id = ?2
                 ORDER BY id DESC",
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![tenant.org_id, tenant.flow_id], |row| {
                let created_at: String = row.get(10)?;
                Ok(Product {
                    id: row.get(0)?,
                    tenant: Tenant::new(row.get(1)?, row.get(2)?),
                    title: row.get(3)?,
                    slug: row.get(4)?,
                    status: row.get(5)?,
                    image_url: row.get(6)?,
                    price_cents: row.get(7)?,
                    stock: row.get(8)?,
                    category: row.get(9)?,
                    created_at: parse_datetime(&created_at),
                })
            })
            .map_err(|e| Error::Database(e.to_string()))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Database(e.to_string()))
    }
}
