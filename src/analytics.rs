//! Aggregate analytics over instances and the event log.
//!
//! Unknown query names are not an error: they produce a report that only
//! echoes the activity and the query.

use crate::core::{InstanceRecord, Result};
use crate::registry::InstanceRegistry;
use crate::storage::{CachingProxy, JsonFileStore, SnapshotStore};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryName {
    Default,
    AccessCount,
    EventsCount,
    UserEventsCount,
    Unknown(String),
}

impl QueryName {
    /// Missing or blank names select [`QueryName::Default`].
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim).unwrap_or("") {
            "" | "default" => QueryName::Default,
            "access_count" => QueryName::AccessCount,
            "events_count" => QueryName::EventsCount,
            "user_events_count" => QueryName::UserEventsCount,
            other => QueryName::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            QueryName::Default => "default",
            QueryName::AccessCount => "access_count",
            QueryName::EventsCount => "events_count",
            QueryName::UserEventsCount => "user_events_count",
            QueryName::Unknown(name) => name,
        }
    }

    fn wants_access(&self) -> bool {
        matches!(self, QueryName::Default | QueryName::AccessCount)
    }

    fn wants_events(&self) -> bool {
        matches!(self, QueryName::Default | QueryName::EventsCount)
    }

    fn wants_user_events(&self) -> bool {
        matches!(self, QueryName::UserEventsCount)
    }
}

impl fmt::Display for QueryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one analytics query. Fields the query did not ask for are
/// left out of the JSON entirely; `created_at` and `userID` are emitted as
/// `null` when asked for but unknown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsReport {
    #[serde(rename = "activityID")]
    pub activity_id: String,
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Option<DateTime<Utc>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_events_count: Option<usize>,
    #[serde(rename = "userID", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Option<String>>,
}

impl AnalyticsReport {
    fn empty(activity_id: &str, query: &QueryName) -> Self {
        Self {
            activity_id: activity_id.to_string(),
            query: query.as_str().to_string(),
            access_count: None,
            created_at: None,
            events_count: None,
            user_events_count: None,
            user_id: None,
        }
    }
}

/// One entry of the analytics catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalyticsDescriptor {
    pub id: &'static str,
    pub label: &'static str,
    pub method: &'static str,
    pub params: &'static [&'static str],
}

const CATALOGUE: [AnalyticsDescriptor; 3] = [
    AnalyticsDescriptor {
        id: "access_count",
        label: "Total accesses (per activity)",
        method: "POST analytics",
        params: &["activityID"],
    },
    AnalyticsDescriptor {
        id: "events_count",
        label: "Total events (per activity)",
        method: "POST analytics",
        params: &["activityID"],
    },
    AnalyticsDescriptor {
        id: "user_events_count",
        label: "Events per learner (activityID + userID)",
        method: "POST analytics",
        params: &["activityID", "userID"],
    },
];

pub struct AnalyticsQueryEngine<S = JsonFileStore> {
    proxy: Arc<CachingProxy<S>>,
    registry: Arc<InstanceRegistry>,
}

impl<S: SnapshotStore> AnalyticsQueryEngine<S> {
    pub fn new(proxy: Arc<CachingProxy<S>>, registry: Arc<InstanceRegistry>) -> Self {
        Self { proxy, registry }
    }

    pub fn catalogue(&self) -> &'static [AnalyticsDescriptor] {
        &CATALOGUE
    }

    pub async fn query(
        &self,
        activity_id: &str,
        user_id: Option<&str>,
        query_name: &str,
    ) -> Result<AnalyticsReport> {
        let query = QueryName::parse(Some(query_name));
        let mut report = AnalyticsReport::empty(activity_id, &query);

        if query.wants_access() {
            let instance_id = self.registry.lookup_or_derive(activity_id)?;
            let instance: Option<InstanceRecord> = self.proxy.get_instance(&instance_id).await?;
            report.access_count = Some(instance.as_ref().map_or(0, |record| record.access_count));
            report.created_at = Some(instance.map(|record| record.created_at));
        }
        if query.wants_events() {
            report.events_count = Some(self.proxy.count_events(Some(activity_id), None).await?);
        }
        if query.wants_user_events() {
            report.user_events_count =
                Some(self.proxy.count_events(Some(activity_id), user_id).await?);
            report.user_id = Some(user_id.map(str::to_string));
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Event;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn at() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    async fn engine(temp_dir: &TempDir) -> AnalyticsQueryEngine {
        let proxy = Arc::new(CachingProxy::new(JsonFileStore::new(
            temp_dir.path().join("store.json"),
        )));
        let mut record = InstanceRecord::new("A", serde_json::json!({}), at());
        record.access_count = 3;
        proxy.upsert_instance("inst_A", record).await.unwrap();
        for user in [Some("u1"), Some("u2"), Some("u1"), None] {
            proxy.append_event(Event::game_access("A", user, at())).await.unwrap();
        }
        proxy.append_event(Event::game_access("B", Some("u1"), at())).await.unwrap();
        AnalyticsQueryEngine::new(proxy, Arc::new(InstanceRegistry::new()))
    }

    #[test]
    fn test_query_name_parsing() {
        assert_eq!(QueryName::parse(None), QueryName::Default);
        assert_eq!(QueryName::parse(Some("  ")), QueryName::Default);
        assert_eq!(QueryName::parse(Some("events_count")), QueryName::EventsCount);
        assert_eq!(
            QueryName::parse(Some("hints_used")),
            QueryName::Unknown("hints_used".to_string())
        );
    }

    #[tokio::test]
    async fn test_default_query_populates_access_and_events() {
        let temp_dir = TempDir::new().unwrap();
        let report = engine(&temp_dir).await.query("A", None, "default").await.unwrap();
        assert_eq!(report.access_count, Some(3));
        assert_eq!(report.created_at, Some(Some(at())));
        assert_eq!(report.events_count, Some(4));
        assert_eq!(report.user_events_count, None);
    }

    #[tokio::test]
    async fn test_access_count_without_instance() {
        let temp_dir = TempDir::new().unwrap();
        let report = engine(&temp_dir).await.query("Z", None, "access_count").await.unwrap();
        assert_eq!(report.access_count, Some(0));
        assert_eq!(report.created_at, Some(None));
        assert_eq!(report.events_count, None);

        let json = serde_json::to_value(&report).unwrap();
        assert!(json["created_at"].is_null());
        assert!(json.get("events_count").is_none());
    }

    #[tokio::test]
    async fn test_user_events_count_filters_by_user() {
        let temp_dir = TempDir::new().unwrap();
        let engine = engine(&temp_dir).await;
        let report = engine.query("A", Some("u1"), "user_events_count").await.unwrap();
        assert_eq!(report.user_events_count, Some(2));
        assert_eq!(report.user_id, Some(Some("u1".to_string())));
        assert_eq!(report.access_count, None);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["userID"], "u1");
        assert_eq!(json["activityID"], "A");
    }

    #[tokio::test]
    async fn test_unknown_query_yields_empty_report() {
        let temp_dir = TempDir::new().unwrap();
        let report = engine(&temp_dir).await.query("A", Some("u1"), "completed_words").await.unwrap();
        assert_eq!(report.query, "completed_words");
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            serde_json::json!({"activityID": "A", "query": "completed_words"})
        );
    }

    #[tokio::test]
    async fn test_registry_override_is_honoured() {
        let temp_dir = TempDir::new().unwrap();
        let engine = engine(&temp_dir).await;
        engine.registry.set_instance_id("C", "inst_A").unwrap();
        let report = engine.query("C", None, "access_count").await.unwrap();
        assert_eq!(report.access_count, Some(3));
    }

    #[test]
    fn test_catalogue_lists_supported_queries() {
        let ids: Vec<&str> = CATALOGUE.iter().map(|entry| entry.id).collect();
        assert_eq!(ids, vec!["access_count", "events_count", "user_events_count"]);
        assert_eq!(CATALOGUE[2].params, &["activityID", "userID"]);
    }
}
