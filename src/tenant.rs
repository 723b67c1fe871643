//! Tenant scoping
//!
//! Every instance, pending product and catalog row belongs to an
//! organization plus a sub-scope ("flow"). HTTP callers carry both on the
//! `X-Org-ID` / `X-Flow-ID` headers.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};

/// Header carrying the organization id
pub const ORG_HEADER: &str = "X-Org-ID";

/// Header carrying the flow id
pub const FLOW_HEADER: &str = "X-Flow-ID";

/// Tenant used when a request carries no tenant headers
pub const DEFAULT_TENANT_ID: i64 = 1;

/// Organization plus flow that owns a piece of data
///
/// `Tenant::default()` is the anonymous (zero) tenant, used when an inbound
/// webhook names an instance the registry does not know.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tenant {
    pub org_id: i64,
    pub flow_id: i64,
}

impl Tenant {
    #[must_use]
    pub const fn new(org_id: i64, flow_id: i64) -> Self {
        Self { org_id, flow_id }
    }

    /// Resolve the tenant from request headers, falling back to tenant `1`
    /// for absent or unparseable values
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            org_id: header_id(headers, ORG_HEADER),
            flow_id: header_id(headers, FLOW_HEADER),
        }
    }

    /// Whether this is the anonymous tenant
    #[must_use]
    pub const fn is_anonymous(&self) -> bool {
        self.org_id == 0 && self.flow_id == 0
    }
}

fn header_id(headers: &HeaderMap, name: &str) -> i64 {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_TENANT_ID)
}

impl<S> FromRequestParts<S> for Tenant
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}
