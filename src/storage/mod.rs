pub mod durable;
pub mod proxy;

pub use durable::{JsonFileStore, SnapshotStore};
pub use proxy::{CachingProxy, DEFAULT_CACHE_TTL};
