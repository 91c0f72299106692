//! # Stockroom
//!
//! Items REST service with dependency-aware health reporting.
//!
//! ## Features
//!
//! - Items CRUD with field-level validation and pagination
//! - Read-through cache (Redis or in-process) that degrades instead of failing
//! - Liveness, readiness and detailed health with a tri-state verdict
//! - Prometheus metrics endpoint
//! - Correlation ids on every request, log line and response
//!
//! ## Example
//!
//! ```ignore
//! use stockroom::config::Config;
//! use stockroom::cache::CacheClient;
//!
//! let config = Config::from_env()?;
//! let cache = CacheClient::from_config(&config.cache);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌────────┐     ┌──────────────────────────────┐
//! │ client │────▶│ Stockroom                    │
//! └────────┘     │  ├─ request id / metrics     │     ┌───────┐
//!                │  ├─ items ─▶ store           │     │       │
//!                │  │        └▶ cache ─────────│────▶│ Redis │
//!                │  └─ health ─▶ checks ───────│────▶│       │
//!                └──────────────────────────────┘     └───────┘
//! ```

// Modules
pub mod cache;
pub mod config;
pub mod error;
pub mod health;
pub mod items;
pub mod logging;
pub mod metrics;
pub mod prelude;
pub mod server;

// Re-exports for convenience
pub use error::{CacheError, FieldError, ItemError, Result, StockroomError, ValidationErrors};
