//! Consumption side: declare a queue bound to a route, then stream acked
//! deliveries out as [`Message`]s on a channel that is never allowed to
//! block the broker connection.
//!
//! Grounded on `Consume`/`prepareQueue` in
//! `original_source/rabbitmq/pubsub.go`.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::StreamExt;
use lapin::options::{BasicAckOptions, BasicConsumeOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info_span, warn, Instrument};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::connection::ConnectionManager;
use crate::error::ClientError;
use crate::message::{ContentType, Message, Route};
use crate::telemetry::Logger;
use crate::trace::extract_context;

fn exchange_kind(exchange_type: &str) -> lapin::ExchangeKind {
    match exchange_type {
        "direct" => lapin::ExchangeKind::Direct,
        "fanout" => lapin::ExchangeKind::Fanout,
        "headers" => lapin::ExchangeKind::Headers,
        "topic" => lapin::ExchangeKind::Topic,
        other => lapin::ExchangeKind::Custom(other.to_string()),
    }
}

/// Declares `queue_name`, ensures `route`'s exchange exists, binds the queue
/// to the routing key, and starts a manual-ack delivery subscription.
/// Returns a receiver that yields delivered messages; it closes once
/// `cancel` fires.
pub async fn consume(
    connection: Arc<ConnectionManager>,
    logger: Arc<dyn Logger>,
    queue_name: String,
    route: Route,
    cancel: CancellationToken,
) -> Result<mpsc::Receiver<Message>, ClientError> {
    let channel = connection.acquire_channel().await?;

    let permit = connection.breaker().acquire().map_err(|_| ClientError::Transport("circuit breaker open".to_string()))?;
    let prepare_result = prepare_queue(&channel, &queue_name, &route).await;
    match &prepare_result {
        Ok(()) => permit.release(true),
        Err(err) => permit.release(!ClientError::is_connection_fault_err(err)),
    }
    prepare_result?;

    let consume_permit = connection.breaker().acquire().map_err(|_| ClientError::Transport("circuit breaker open".to_string()))?;
    let consumer_result = channel
        .basic_consume(
            queue_name.as_str().into(),
            "resilient-amqp-consumer".into(),
            BasicConsumeOptions { no_local: false, no_ack: false, exclusive: false, nowait: false },
            FieldTable::default(),
        )
        .await;

    let mut consumer = match consumer_result {
        Ok(consumer) => {
            consume_permit.release(true);
            consumer
        }
        Err(err) => {
            let client_err = ClientError::from_lapin(err);
            consume_permit.release(!ClientError::is_connection_fault_err(&client_err));
            return Err(client_err);
        }
    };

    // Size 1, not a large buffer: the slow-consumer policy requires a
    // delivery to drop as soon as no receiver is ready for it, mirroring the
    // original's unbuffered `chan Message` + `select`/`default`.
    let (tx, rx) = mpsc::channel(1);

    tokio::spawn(async move {
        loop {
            let delivery = tokio::select! {
                delivery = consumer.next() => delivery,
                _ = cancel.cancelled() => break,
            };

            let Some(delivery) = delivery else { break };
            let delivery = match delivery {
                Ok(delivery) => delivery,
                Err(err) => {
                    logger.log("consumer delivery error", &[("err", &err.to_string())]);
                    warn!(error = %err, "error receiving AMQP delivery");
                    continue;
                }
            };

            let headers: BTreeMap<String, String> = delivery
                .properties
                .headers()
                .as_ref()
                .map(|table| {
                    table
                        .into_iter()
                        .filter_map(|(key, value)| match value {
                            lapin::types::AMQPValue::LongString(s) => Some((key.to_string(), s.to_string())),
                            lapin::types::AMQPValue::ShortString(s) => Some((key.to_string(), s.to_string())),
                            _ => None,
                        })
                        .collect()
                })
                .unwrap_or_default();

            let parent_cx = extract_context(&headers);
            let span = info_span!("amqp.consume", queue = %queue_name);
            span.set_parent(parent_cx);

            async {
                if let Err(err) = delivery.acker.ack(BasicAckOptions { multiple: false }).await {
                    warn!(error = %err, "failed to ack delivery");
                }

                let content_type = delivery
                    .properties
                    .content_type()
                    .as_ref()
                    .map(|ct| if ct.as_str() == "text/plain" { ContentType::Text } else { ContentType::Json })
                    .unwrap_or(ContentType::Json);

                let msg = Message::new(route.clone(), delivery.data, content_type).with_headers(headers);

                if tx.try_send(msg).is_err() {
                    warn!(queue = %queue_name, "dropping delivery: consumer channel full or closed");
                }
            }
            .instrument(span)
            .await;
        }
    });

    Ok(rx)
}

async fn prepare_queue(channel: &lapin::Channel, queue_name: &str, route: &Route) -> Result<(), ClientError> {
    channel
        .exchange_declare(
            route.exchange_name.as_str().into(),
            exchange_kind(&route.exchange_type),
            ExchangeDeclareOptions { durable: true, auto_delete: false, internal: false, nowait: false, passive: false },
            FieldTable::default(),
        )
        .await
        .map_err(ClientError::from_lapin)?;

    channel
        .queue_declare(
            queue_name.into(),
            QueueDeclareOptions { passive: false, durable: false, exclusive: false, auto_delete: false, nowait: false },
            FieldTable::default(),
        )
        .await
        .map_err(ClientError::from_lapin)?;

    channel
        .queue_bind(
            queue_name.into(),
            route.exchange_name.as_str().into(),
            route.routing_key.as_str().into(),
            QueueBindOptions { nowait: false },
            FieldTable::default(),
        )
        .await
        .map_err(ClientError::from_lapin)?;

    Ok(())
}
