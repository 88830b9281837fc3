//! Caching proxy in front of a [`SnapshotStore`].
//!
//! Reads are served from an in-memory snapshot that is reloaded from disk
//! once it is older than the TTL. Every mutation runs refresh, mutate and
//! flush while holding the write lock, so two writers can never both start
//! from the same stale snapshot and silently drop each other's update. If
//! the flush fails the in-memory change is undone before the lock is
//! released, which keeps memory from running ahead of disk.

use crate::core::{Clock, Event, InstanceRecord, Result, StoreError, StoreSnapshot, SystemClock};
use crate::storage::durable::{JsonFileStore, SnapshotStore};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

/// Maximum age of the cached snapshot before a read goes back to disk.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(1);

struct CacheState {
    snapshot: StoreSnapshot,
    /// `None` until the first load, or after [`CachingProxy::invalidate`].
    refreshed_at: Option<DateTime<Utc>>,
}

pub struct CachingProxy<S = JsonFileStore> {
    store: S,
    clock: Arc<dyn Clock>,
    ttl: chrono::Duration,
    state: RwLock<CacheState>,
}

impl<S: SnapshotStore> CachingProxy<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            ttl: to_chrono(DEFAULT_CACHE_TTL),
            state: RwLock::new(CacheState {
                snapshot: StoreSnapshot::new(),
                refreshed_at: None,
            }),
        }
    }

    /// Use `clock` for staleness checks.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Set how long a loaded snapshot is trusted.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = to_chrono(ttl);
        self
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    pub async fn get_instance(&self, instance_id: &str) -> Result<Option<InstanceRecord>> {
        let state = self.read_fresh().await?;
        Ok(state.snapshot.instance(instance_id).cloned())
    }

    /// Events in append order. `None` filters match everything.
    pub async fn list_events(
        &self,
        activity_id: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<Vec<Event>> {
        let state = self.read_fresh().await?;
        Ok(state
            .snapshot
            .events_matching(activity_id, user_id)
            .cloned()
            .collect())
    }

    pub async fn count_events(
        &self,
        activity_id: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<usize> {
        let state = self.read_fresh().await?;
        Ok(state.snapshot.events_matching(activity_id, user_id).count())
    }

    /// Copy of the whole cached snapshot.
    pub async fn snapshot(&self) -> Result<StoreSnapshot> {
        let state = self.read_fresh().await?;
        Ok(state.snapshot.clone())
    }

    // ------------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------------

    /// Insert or fully replace one instance record, then flush.
    pub async fn upsert_instance(&self, instance_id: &str, record: InstanceRecord) -> Result<()> {
        let mut state = self.write_fresh().await?;
        check_owner(&state.snapshot, instance_id, &record)?;

        let previous = state
            .snapshot
            .instances
            .insert(instance_id.to_string(), record);
        if let Err(err) = self.flush(&mut state).await {
            restore_instance(&mut state.snapshot, instance_id, previous);
            warn!(instance_id, error = %err, "upsert rolled back");
            return Err(err);
        }
        debug!(instance_id, "instance upserted");
        Ok(())
    }

    /// Read-modify-write of one record inside the write critical section.
    ///
    /// `apply` receives the current record (if any) and returns the record to
    /// store. Concurrent updates to the same instance are applied one after
    /// the other, each seeing the previous result.
    pub async fn update_instance<F>(&self, instance_id: &str, apply: F) -> Result<InstanceRecord>
    where
        F: FnOnce(Option<InstanceRecord>) -> InstanceRecord + Send,
    {
        let mut state = self.write_fresh().await?;
        let current = state.snapshot.instance(instance_id).cloned();
        let updated = apply(current);
        check_owner(&state.snapshot, instance_id, &updated)?;

        let previous = state
            .snapshot
            .instances
            .insert(instance_id.to_string(), updated.clone());
        if let Err(err) = self.flush(&mut state).await {
            restore_instance(&mut state.snapshot, instance_id, previous);
            warn!(instance_id, error = %err, "instance update rolled back");
            return Err(err);
        }
        debug!(instance_id, access_count = updated.access_count, "instance updated");
        Ok(updated)
    }

    /// [`update_instance`](Self::update_instance) plus appending `event`,
    /// committed by a single flush. Either both changes reach disk or
    /// neither does.
    pub async fn update_instance_and_append<F>(
        &self,
        instance_id: &str,
        apply: F,
        event: Event,
    ) -> Result<InstanceRecord>
    where
        F: FnOnce(Option<InstanceRecord>) -> InstanceRecord + Send,
    {
        let mut state = self.write_fresh().await?;
        let current = state.snapshot.instance(instance_id).cloned();
        let updated = apply(current);
        check_owner(&state.snapshot, instance_id, &updated)?;

        let previous = state
            .snapshot
            .instances
            .insert(instance_id.to_string(), updated.clone());
        state.snapshot.events.push(event);
        if let Err(err) = self.flush(&mut state).await {
            state.snapshot.events.pop();
            restore_instance(&mut state.snapshot, instance_id, previous);
            warn!(instance_id, error = %err, "instance update and event append rolled back");
            return Err(err);
        }
        debug!(
            instance_id,
            access_count = updated.access_count,
            events = state.snapshot.events.len(),
            "instance updated with event"
        );
        Ok(updated)
    }

    pub async fn append_event(&self, event: Event) -> Result<()> {
        let mut state = self.write_fresh().await?;
        state.snapshot.events.push(event);
        if let Err(err) = self.flush(&mut state).await {
            state.snapshot.events.pop();
            warn!(error = %err, "event append rolled back");
            return Err(err);
        }
        debug!(events = state.snapshot.events.len(), "event appended");
        Ok(())
    }

    /// Drop freshness so the next call reloads from disk.
    pub async fn invalidate(&self) {
        self.state.write().await.refreshed_at = None;
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn is_fresh(&self, state: &CacheState) -> bool {
        let Some(refreshed_at) = state.refreshed_at else {
            return false;
        };
        // A clock that stepped backwards cannot vouch for the cache.
        let age = self.clock.now().signed_duration_since(refreshed_at);
        age >= chrono::Duration::zero() && age <= self.ttl
    }

    async fn refresh_if_stale(&self, state: &mut CacheState) -> Result<()> {
        if self.is_fresh(state) {
            return Ok(());
        }
        state.snapshot = self.store.read_all().await?;
        state.refreshed_at = Some(self.clock.now());
        debug!(
            instances = state.snapshot.instances.len(),
            events = state.snapshot.events.len(),
            "cache refreshed"
        );
        Ok(())
    }

    async fn read_fresh(&self) -> Result<RwLockReadGuard<'_, CacheState>> {
        {
            let state = self.state.read().await;
            if self.is_fresh(&state) {
                return Ok(state);
            }
        }
        // Another task may refresh between the two locks; refresh_if_stale
        // re-checks before touching the disk.
        let mut state = self.state.write().await;
        self.refresh_if_stale(&mut state).await?;
        Ok(RwLockWriteGuard::downgrade(state))
    }

    async fn write_fresh(&self) -> Result<RwLockWriteGuard<'_, CacheState>> {
        let mut state = self.state.write().await;
        self.refresh_if_stale(&mut state).await?;
        Ok(state)
    }

    async fn flush(&self, state: &mut CacheState) -> Result<()> {
        self.store.write_all(&state.snapshot).await?;
        state.refreshed_at = Some(self.clock.now());
        Ok(())
    }
}

fn to_chrono(ttl: Duration) -> chrono::Duration {
    chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(365 * 100))
}

fn check_owner(snapshot: &StoreSnapshot, instance_id: &str, record: &InstanceRecord) -> Result<()> {
    match snapshot.instance(instance_id) {
        Some(existing) if existing.activity_id != record.activity_id => {
            Err(StoreError::InstanceConflict {
                instance_id: instance_id.to_string(),
                existing: existing.activity_id.clone(),
                requested: record.activity_id.clone(),
            })
        }
        _ => Ok(()),
    }
}

fn restore_instance(
    snapshot: &mut StoreSnapshot,
    instance_id: &str,
    previous: Option<InstanceRecord>,
) {
    match previous {
        Some(record) => {
            snapshot.instances.insert(instance_id.to_string(), record);
        }
        None => {
            snapshot.instances.remove(instance_id);
        }
    }
}
