//! Shopchat Gateway - multi-tenant chat commerce over messaging providers
//!
//! This library provides the core functionality for the shopchat gateway:
//! - Messaging instance lifecycle against an external provider (or mocks)
//! - Inbound webhook ingestion and relay to a downstream AI agent
//! - Conversational cataloging: image in, AI suggestion, price, catalog row
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                     HTTP API                         │
//! │  /wa/instances  │  /webhooks/wa  │  /chat  │  /vision │
//! └─────────┬───────────────┬───────────────┬────────────┘
//!           │               │               │
//! ┌─────────▼──────┐ ┌──────▼───────┐ ┌─────▼──────────────┐
//! │ InstanceManager│ │WebhookIngest │ │ VisionIntake       │
//! │ ProviderGateway│ │AgentForwarder│ │ ChatRouter/Pending │
//! └─────────┬──────┘ └──────┬───────┘ └─────┬──────────────┘
//!           └───────────────┼───────────────┘
//!                    SQLite (registry, event log, catalog)
//! ```

pub mod ai;
pub mod api;
pub mod commerce;
pub mod config;
pub mod db;
pub mod error;
pub mod forwarder;
pub mod ingest;
pub mod instances;
pub mod provider;
pub mod tenant;
pub mod text;

pub use config::Config;
pub use db::{DbConn, DbPool};
pub use error::{Error, Result};
pub use tenant::Tenant;
