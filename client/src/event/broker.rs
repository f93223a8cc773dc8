//! Facade translating domain events to/from [`crate::message::Message`]s,
//! deriving routes from the `{noun}-{action}` event type convention.
//!
//! Grounded on `event/broker/broker.go` and `event/broker/message.go`.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::client::Client;
use crate::error::ClientError;
use crate::message::{ContentType, Message, Route};

use super::types::{AggregateId, Event, EventType};

/// Splits an event type on its first `-` into `(noun, action)`, the
/// convention `article-created` -> exchange `article`, routing key
/// `article.event.created`. Mirrors `routeFromEvent`.
fn route_from_event_type(event_type: &EventType) -> Result<Route, ClientError> {
    let raw = event_type.as_str();
    match raw.split_once('-') {
        Some((noun, action)) if !noun.is_empty() && !action.is_empty() => {
            Ok(Route::topic(noun, format!("{noun}.event.{action}")))
        }
        _ => Err(ClientError::InvalidInput(format!("event type '{raw}' does not follow {{noun}}-{{action}} format"))),
    }
}

fn message_from_event(event: &Event) -> Result<Message, ClientError> {
    let route = route_from_event_type(&event.event_type)?;
    let body = serde_json::to_vec(event)?;
    Ok(Message::new(route, body, ContentType::Json).with_headers(event.metadata.clone()))
}

fn event_from_message(msg: &Message) -> Result<Event, ClientError> {
    let mut event: Event = serde_json::from_slice(&msg.body)?;
    event.metadata = msg.headers.clone();
    Ok(event)
}

/// Thin wrapper over [`Client`] that speaks events instead of raw messages.
pub struct EventBroker {
    client: Arc<Client>,
}

impl EventBroker {
    pub fn new(client: Arc<Client>) -> Self {
        Self { client }
    }

    pub async fn publish(&self, event: &Event) -> Result<(), ClientError> {
        self.client.publish(message_from_event(event)?).await
    }

    pub fn resilient_publish(&self, event: &Event) -> Result<(), ClientError> {
        self.client.resilient_publish(message_from_event(event)?)
    }

    /// Subscribes to `event_type`'s derived route under `queue_name`,
    /// translating each delivered message back into an `Event`. Messages
    /// that fail to deserialize are dropped and logged rather than
    /// propagated, since a malformed delivery must not stall the stream.
    pub async fn consume(&self, queue_name: &str, event_type: EventType) -> Result<mpsc::Receiver<Event>, ClientError> {
        let route = route_from_event_type(&event_type)?;
        let mut messages = self.client.consume(queue_name, route).await?;
        let (tx, rx) = mpsc::channel(64);

        tokio::spawn(async move {
            while let Some(msg) = messages.recv().await {
                match event_from_message(&msg) {
                    Ok(event) => {
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "dropping undeserializable event delivery");
                    }
                }
            }
        });

        Ok(rx)
    }
}

pub fn make_event(aggregate_id: AggregateId, event_type: EventType, body: serde_json::Value) -> Result<Event, ClientError> {
    route_from_event_type(&event_type)?;
    Ok(Event::new(aggregate_id, event_type, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_derives_exchange_and_topic_routing_key() {
        let route = route_from_event_type(&EventType::from("article-created")).unwrap();
        assert_eq!(route.exchange_name, "article");
        assert_eq!(route.exchange_type, "topic");
        assert_eq!(route.routing_key, "article.event.created");
    }

    #[test]
    fn event_type_without_hyphen_is_rejected() {
        let err = route_from_event_type(&EventType::from("articlecreated")).unwrap_err();
        assert!(matches!(err, ClientError::InvalidInput(_)));
    }

    #[test]
    fn event_type_with_only_leading_hyphen_is_rejected() {
        let err = route_from_event_type(&EventType::from("-created")).unwrap_err();
        assert!(matches!(err, ClientError::InvalidInput(_)));
    }

    #[test]
    fn route_uses_first_hyphen_only() {
        let route = route_from_event_type(&EventType::from("user-profile-updated")).unwrap();
        assert_eq!(route.exchange_name, "user");
        assert_eq!(route.routing_key, "user.event.profile-updated");
    }

    #[test]
    fn message_round_trips_back_into_the_same_event() {
        let event = Event::new(AggregateId::from("user-1"), EventType::from("user-created"), serde_json::json!({"name": "a"}));
        let msg = message_from_event(&event).unwrap();
        let recovered = event_from_message(&msg).unwrap();
        assert_eq!(recovered, event);
    }

    #[test]
    fn make_event_rejects_malformed_event_type() {
        assert!(make_event(AggregateId::from("x"), EventType::from("noaction"), serde_json::json!({})).is_err());
    }
}
