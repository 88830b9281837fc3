// ============================================================================
// Activity Store Library
// ============================================================================

//! Backend of an activity provider: per-activity instance records and an
//! append-only access log, kept in one JSON file.
//!
//! Reads go through [`CachingProxy`], which serves a cached snapshot for up
//! to a second before reloading it from disk, and writes the whole snapshot
//! back atomically after every mutation.
//!
//! ```no_run
//! use activity_store::{ActivityService, DEFAULT_CACHE_TTL};
//!
//! # async fn run() -> activity_store::Result<()> {
//! let service = ActivityService::open("data/store.json", DEFAULT_CACHE_TTL, "").await?;
//! service.resolve_instance("TESTE123", None, None).await?;
//! service.track_access("TESTE123", Some("u1")).await?;
//!
//! let report = service.query_analytics("TESTE123", None, Some("events_count")).await?;
//! assert_eq!(report.events_count, Some(1));
//! # Ok(())
//! # }
//! ```

pub mod analytics;
pub mod config;
pub mod core;
pub mod registry;
pub mod service;
pub mod storage;
pub mod web;

// Re-export main types for convenience
pub use analytics::{AnalyticsQueryEngine, AnalyticsReport, QueryName};
pub use crate::core::{
    derive_instance_id, Clock, Event, EventKind, InstanceRecord, ManualClock, Result,
    StoreError, StoreSnapshot, SystemClock,
};
pub use registry::InstanceRegistry;
pub use service::{ActivityService, UserUrl};
pub use storage::{CachingProxy, JsonFileStore, SnapshotStore, DEFAULT_CACHE_TTL};
pub use web::{build_router, AppState};
