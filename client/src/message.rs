use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Addressing triple for a topic on the broker: exchange, exchange type, and
/// the routing key used to bind a queue or publish to it. Immutable once
/// constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Route {
    pub exchange_name: String,
    pub exchange_type: String,
    pub routing_key: String,
}

impl Route {
    pub fn new(exchange_name: impl Into<String>, exchange_type: impl Into<String>, routing_key: impl Into<String>) -> Self {
        Self { exchange_name: exchange_name.into(), exchange_type: exchange_type.into(), routing_key: routing_key.into() }
    }

    /// A topic route for `exchange_name`, the exchange type used throughout
    /// this crate for every declared exchange.
    pub fn topic(exchange_name: impl Into<String>, routing_key: impl Into<String>) -> Self {
        Self::new(exchange_name, "topic", routing_key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentType {
    #[serde(rename = "application/json")]
    Json,
    #[serde(rename = "text/plain")]
    Text,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Json => "application/json",
            ContentType::Text => "text/plain",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message moving through the publish/consume pipeline. Headers carry
/// trace metadata (`string -> string`); non-string AMQP header values are
/// discarded on extraction, never on construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(flatten)]
    pub route: Route,
    pub body: Vec<u8>,
    pub content_type: ContentType,
    pub timestamp: DateTime<Utc>,
    pub headers: BTreeMap<String, String>,
}

impl Message {
    pub fn new(route: Route, body: Vec<u8>, content_type: ContentType) -> Self {
        Self { route, body, content_type, timestamp: Utc::now(), headers: BTreeMap::new() }
    }

    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_route_has_topic_type() {
        let route = Route::topic("article", "article.event.created");
        assert_eq!(route.exchange_name, "article");
        assert_eq!(route.exchange_type, "topic");
        assert_eq!(route.routing_key, "article.event.created");
    }

    #[test]
    fn content_type_round_trips_through_json() {
        let msg = Message::new(Route::topic("test", "test.event.ping"), br#"{"x":1}"#.to_vec(), ContentType::Json);
        let serialized = serde_json::to_vec(&msg).unwrap();
        let deserialized: Message = serde_json::from_slice(&serialized).unwrap();
        assert_eq!(deserialized, msg);
    }

    #[test]
    fn content_type_display_matches_mime_string() {
        assert_eq!(ContentType::Json.to_string(), "application/json");
        assert_eq!(ContentType::Text.to_string(), "text/plain");
    }

    #[test]
    fn headers_default_to_empty() {
        let msg = Message::new(Route::topic("test", "test.event.ping"), vec![], ContentType::Text);
        assert!(msg.headers.is_empty());
    }

    #[test]
    fn with_headers_replaces_map() {
        let mut headers = BTreeMap::new();
        headers.insert("traceparent".to_string(), "00-abc-def-01".to_string());
        let msg = Message::new(Route::topic("test", "test.event.ping"), vec![], ContentType::Json).with_headers(headers.clone());
        assert_eq!(msg.headers, headers);
    }
}
