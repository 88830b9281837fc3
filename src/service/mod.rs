//! Activity provider use cases, in front of the proxy, the registry and the
//! analytics engine. HTTP handlers only ever talk to [`ActivityService`].

pub mod game;
pub mod pages;

use crate::analytics::{AnalyticsDescriptor, AnalyticsQueryEngine, AnalyticsReport};
use crate::core::{ActivityId, Clock, Event, InstanceRecord, Result, UserId};
use crate::registry::InstanceRegistry;
use crate::storage::{CachingProxy, JsonFileStore, SnapshotStore};
use game::GameConfigBuilder;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Answer of the deploy / user-url operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserUrl {
    #[serde(rename = "activityID")]
    pub activity_id: String,
    pub entry_url: String,
    pub instance_id: String,
}

pub struct ActivityService<S = JsonFileStore> {
    proxy: Arc<CachingProxy<S>>,
    registry: Arc<InstanceRegistry>,
    analytics: AnalyticsQueryEngine<S>,
    builder: GameConfigBuilder,
    base_url: String,
}

impl ActivityService<JsonFileStore> {
    /// Open (or create) the store file at `data_path` and wire a service on it.
    pub async fn open<P: AsRef<Path>>(data_path: P, cache_ttl: Duration, base_url: &str) -> Result<Self> {
        let store = JsonFileStore::open(data_path).await?;
        info!(path = %store.path().display(), ttl_ms = cache_ttl.as_millis() as u64, "store opened");
        let proxy = Arc::new(CachingProxy::new(store).with_ttl(cache_ttl));
        Ok(Self::new(proxy, Arc::new(InstanceRegistry::new()), base_url))
    }
}

impl<S: SnapshotStore> ActivityService<S> {
    pub fn new(proxy: Arc<CachingProxy<S>>, registry: Arc<InstanceRegistry>, base_url: &str) -> Self {
        let analytics = AnalyticsQueryEngine::new(Arc::clone(&proxy), Arc::clone(&registry));
        Self {
            proxy,
            registry,
            analytics,
            builder: GameConfigBuilder::new(),
            base_url: base_url.trim().trim_end_matches('/').to_string(),
        }
    }

    pub fn with_builder(mut self, builder: GameConfigBuilder) -> Self {
        self.builder = builder;
        self
    }

    pub fn proxy(&self) -> &Arc<CachingProxy<S>> {
        &self.proxy
    }

    pub fn registry(&self) -> &Arc<InstanceRegistry> {
        &self.registry
    }

    fn clock(&self) -> &Arc<dyn Clock> {
        self.proxy.clock()
    }

    /// Request-derived base URL first, then the configured one, then none
    /// (relative links).
    pub fn effective_base_url(&self, public_base_url: Option<&str>) -> String {
        match public_base_url.map(|base| base.trim().trim_end_matches('/')) {
            Some(base) if !base.is_empty() => base.to_string(),
            _ => self.base_url.clone(),
        }
    }

    fn new_record(&self, activity_id: &str) -> InstanceRecord {
        InstanceRecord::new(activity_id, self.builder.build_value(), self.clock().now())
    }

    /// Resolve the activity's instance, creating its record on first use,
    /// and build the entry URL for the learner.
    pub async fn resolve_instance(
        &self,
        activity_id: &str,
        user_id: Option<&str>,
        public_base_url: Option<&str>,
    ) -> Result<UserUrl> {
        let activity = ActivityId::parse(activity_id)?;
        let user = UserId::parse(user_id);
        let instance_id = self.registry.resolve(activity.as_str())?;

        if self.proxy.get_instance(&instance_id).await?.is_none() {
            // Re-checked under the proxy's write lock: a concurrent creator wins.
            let record = self
                .proxy
                .update_instance(&instance_id, |current| {
                    current.unwrap_or_else(|| self.new_record(activity.as_str()))
                })
                .await?;
            info!(activity_id = %activity, instance_id = %record.instance_id, "instance created");
        }

        let base = self.effective_base_url(public_base_url);
        let path = format!("/game/{}", urlencoding::encode(activity.as_str()));
        let mut entry_url = pages::link(&base, &path);
        if let Some(user) = &user {
            entry_url.push_str(&format!("?userID={}", urlencoding::encode(user.as_str())));
        }

        Ok(UserUrl {
            activity_id: activity.to_string(),
            entry_url,
            instance_id,
        })
    }

    /// Count one access: bump the instance counter (creating the instance if
    /// needed) and append a `game_access` event, in one store write.
    pub async fn track_access(&self, activity_id: &str, user_id: Option<&str>) -> Result<InstanceRecord> {
        let activity = ActivityId::parse(activity_id)?;
        let user = UserId::parse(user_id);
        let instance_id = self.registry.resolve(activity.as_str())?;
        let now = self.clock().now();

        let event = Event::game_access(activity.as_str(), user.as_ref().map(UserId::as_str), now);
        let record = self
            .proxy
            .update_instance_and_append(
                &instance_id,
                |current| {
                    let mut record = current.unwrap_or_else(|| self.new_record(activity.as_str()));
                    record.record_access(now);
                    record
                },
                event,
            )
            .await?;

        info!(
            activity_id = %activity,
            user_id = user.as_ref().map(UserId::as_str).unwrap_or("-"),
            access_count = record.access_count,
            "access tracked"
        );
        Ok(record)
    }

    pub async fn query_analytics(
        &self,
        activity_id: &str,
        user_id: Option<&str>,
        query_name: Option<&str>,
    ) -> Result<AnalyticsReport> {
        let activity = ActivityId::parse(activity_id)?;
        let user = UserId::parse(user_id);
        let query_name = query_name.map(str::trim).filter(|q| !q.is_empty()).unwrap_or("default");
        self.analytics
            .query(activity.as_str(), user.as_ref().map(UserId::as_str), query_name)
            .await
    }

    pub fn list_analytics(&self) -> &'static [AnalyticsDescriptor] {
        self.analytics.catalogue()
    }

    pub fn params_schema(&self) -> serde_json::Value {
        self.builder.params_schema()
    }

    pub fn config_page(&self, public_base_url: Option<&str>) -> String {
        pages::config_page(&self.effective_base_url(public_base_url))
    }
}
