//! Event type/aggregate/event value types. Construction never fails - event
//! type strings are only validated against the `{noun}-{action}` shape
//! lazily, at route-derivation time in [`super::broker`].
//!
//! Grounded on `event/event.go`, `event/event_types.go`, `event/aggregates.go`.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventType(String);

impl EventType {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventType {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AggregateId(String);

impl AggregateId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AggregateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AggregateId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A domain event. `metadata` carries trace/context propagation the same way
/// a [`crate::message::Message`]'s headers do; the original implementation's
/// `event.go` struct definition omits this field but every call site that
/// constructs or reads one relies on it, so it is kept here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub aggregate_id: AggregateId,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub body: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Event {
    pub fn new(aggregate_id: AggregateId, event_type: EventType, body: serde_json::Value) -> Self {
        Self { aggregate_id, event_type, body, timestamp: Utc::now(), metadata: BTreeMap::new() }
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_round_trips_through_json_with_type_renamed() {
        let event = Event::new(AggregateId::from("user-1"), EventType::from("user-created"), serde_json::json!({"name": "a"}));
        let serialized = serde_json::to_value(&event).unwrap();
        assert_eq!(serialized["type"], "user-created");
        let deserialized: Event = serde_json::from_value(serialized).unwrap();
        assert_eq!(deserialized, event);
    }

    #[test]
    fn metadata_defaults_to_empty_when_absent_in_json() {
        let raw = serde_json::json!({
            "aggregate_id": "user-1",
            "type": "user-created",
            "body": {},
            "timestamp": Utc::now().to_rfc3339(),
        });
        let event: Event = serde_json::from_value(raw).unwrap();
        assert!(event.metadata.is_empty());
    }
}
