//! Typed configuration for the Pylon gateway.
//!
//! - TOML and JSON files, strict about unknown fields
//! - `PYLON__SECTION__KEY` environment overrides and `.env` support
//! - Validation after loading
//!
//! # Configuration File Format
//!
//! ```toml
//! [service]
//! name = "library.example.com"
//! config_id = "2024-05-01r0"
//! producer_project_id = "library-prod"
//!
//! [api_key]
//! query_params = ["key", "api_key"]
//! headers = ["x-api-key"]
//! validity_policy = "optimistic"
//!
//! [control]
//! check_timeout_ms = 1000
//! failure_policy = "fail_closed"
//! report_enabled = true
//!
//! [platform]
//! compute_platform = "kubernetes"
//! zone = "us-central1-a"
//!
//! [telemetry.logging]
//! level = "info"
//! format = "json"
//!
//! [[methods]]
//! selector = "items.get"
//! http_method = "GET"
//! path = "/v1/items/{id}"
//! metric_costs = { read_requests = 1 }
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::{GatewayConfig, GatewayConfigBuilder};
pub use error::{ConfigError, Format, Origin};
pub use loader::ConfigLoader;
pub use schema::*;
