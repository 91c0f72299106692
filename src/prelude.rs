//! Prelude module for common imports.
//!
//! ```ignore
//! use stockroom::prelude::*;
//! ```

// Error types
pub use crate::error::{CacheError, ItemError, Result, StockroomError, ValidationErrors};

// Configuration
pub use crate::config::{AppConfig, CacheConfig, Config, ServerConfig};

// Cache
pub use crate::cache::{CacheBackend, CacheClient, CacheLookup};

// Items
pub use crate::items::{CreateItem, Item, ItemService, ItemStore, PageRequest, UpdateItem};

// Health
pub use crate::health::{DependencyCheck, HealthAggregator, HealthStatus, HealthVerdict};

// Metrics
pub use crate::metrics::Metrics;

// Server
pub use crate::server::{AppState, Server};

// Common external crates
pub use std::sync::Arc;
pub use tracing::{debug, error, info, trace, warn};
