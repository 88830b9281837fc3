use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix of every derived instance identifier.
pub const INSTANCE_ID_PREFIX: &str = "inst_";

/// Derive the instance identifier owned by an activity.
///
/// One instance exists per activity, so the mapping is a pure function of
/// the activity identifier and survives process restarts without being
/// persisted anywhere.
pub fn derive_instance_id(activity_id: &str) -> String {
    format!("{INSTANCE_ID_PREFIX}{activity_id}")
}

// ============================================================================
// Instance Records
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub instance_id: String,
    #[serde(rename = "activityID")]
    pub activity_id: String,
    pub created_at: DateTime<Utc>,
    /// Opaque to the store; written once at creation.
    pub game_config: serde_json::Value,
    #[serde(default)]
    pub last_access: Option<DateTime<Utc>>,
    #[serde(default)]
    pub access_count: u64,
}

impl InstanceRecord {
    pub fn new(
        activity_id: &str,
        game_config: serde_json::Value,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            instance_id: derive_instance_id(activity_id),
            activity_id: activity_id.to_string(),
            created_at,
            game_config,
            last_access: None,
            access_count: 0,
        }
    }

    /// Count one access at `at`. `last_access` never moves backwards, even
    /// if the wall clock does.
    pub fn record_access(&mut self, at: DateTime<Utc>) {
        self.access_count = self.access_count.saturating_add(1);
        self.last_access = Some(match self.last_access {
            Some(previous) if previous > at => previous,
            _ => at,
        });
    }
}

// ============================================================================
// Events
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    GameAccess,
    Other(String),
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::GameAccess => "game_access",
            EventKind::Other(name) => name,
        }
    }
}

impl From<String> for EventKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "game_access" => EventKind::GameAccess,
            _ => EventKind::Other(value),
        }
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::GameAccess => "game_access".to_string(),
            EventKind::Other(name) => name,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub ts: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(rename = "activityID", default)]
    pub activity_id: Option<String>,
    #[serde(rename = "userID", default)]
    pub user_id: Option<String>,
}

impl Event {
    pub fn game_access(activity_id: &str, user_id: Option<&str>, ts: DateTime<Utc>) -> Self {
        Self {
            ts,
            kind: EventKind::GameAccess,
            activity_id: Some(activity_id.to_string()),
            user_id: user_id.map(str::to_string),
        }
    }

    /// Both filters must hold when present; an absent filter matches anything.
    pub fn matches(&self, activity_id: Option<&str>, user_id: Option<&str>) -> bool {
        if let Some(activity_id) = activity_id {
            if self.activity_id.as_deref() != Some(activity_id) {
                return false;
            }
        }
        if let Some(user_id) = user_id {
            if self.user_id.as_deref() != Some(user_id) {
                return false;
            }
        }
        true
    }
}

// ============================================================================
// Store Snapshot
// ============================================================================

/// Everything the store knows: instances keyed by id plus the event log in
/// append order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub instances: BTreeMap<String, InstanceRecord>,
    #[serde(default)]
    pub events: Vec<Event>,
}

impl StoreSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instance(&self, instance_id: &str) -> Option<&InstanceRecord> {
        self.instances.get(instance_id)
    }

    pub fn events_matching<'a>(
        &'a self,
        activity_id: Option<&'a str>,
        user_id: Option<&'a str>,
    ) -> impl Iterator<Item = &'a Event> + 'a {
        self.events
            .iter()
            .filter(move |event| event.matches(activity_id, user_id))
    }
}
