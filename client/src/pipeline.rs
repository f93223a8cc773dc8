//! Two worker-capped stages that drain the publish queue: declare the
//! exchange, then publish. Both stages re-enqueue on connection faults and
//! drop (with a log) on protocol faults, per the resolved Open Question on
//! where NACKed/rejected messages should go.
//!
//! Grounded on `publishPipelined`/`prepareExchangePipelined` in
//! `original_source/rabbitmq/pipeline.go`.

use std::sync::Arc;

use lapin::options::{BasicPublishOptions, ExchangeDeclareOptions};
use lapin::types::FieldTable;
use lapin::BasicProperties;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{info_span, warn, Instrument};

use crate::connection::ConnectionManager;
use crate::error::ClientError;
use crate::message::Message;
use crate::queue::PublishQueue;
use crate::telemetry::Logger;
use crate::trace::inject_headers;

/// Spawns stage 1 (ensure-exchange) and stage 2 (publish), wiring the queue's
/// receiver through an intermediate channel between them. Returns once both
/// background tasks are running; they stop when `cancel` fires.
pub fn spawn(
    queue: Arc<PublishQueue>,
    connection: Arc<ConnectionManager>,
    logger: Arc<dyn Logger>,
    max_workers: usize,
    cancel: CancellationToken,
) {
    let (prepared_tx, prepared_rx) = mpsc::channel::<Message>(max_workers.max(1));

    tokio::spawn(stage_ensure_exchange(queue.clone(), connection.clone(), logger.clone(), prepared_tx, max_workers, cancel.clone()));
    tokio::spawn(stage_publish(prepared_rx, queue, connection, logger, max_workers, cancel));
}

async fn stage_ensure_exchange(
    queue: Arc<PublishQueue>,
    connection: Arc<ConnectionManager>,
    logger: Arc<dyn Logger>,
    prepared: mpsc::Sender<Message>,
    max_workers: usize,
    cancel: CancellationToken,
) {
    let Some(mut receiver) = queue.take_receiver().await else {
        return;
    };
    let limiter = Arc::new(Semaphore::new(max_workers.max(1)));

    loop {
        let msg = tokio::select! {
            msg = receiver.recv() => match msg {
                Some(msg) => msg,
                None => return,
            },
            _ = cancel.cancelled() => return,
        };

        let connection = connection.clone();
        let logger = logger.clone();
        let queue = queue.clone();
        let prepared = prepared.clone();
        let limiter = limiter.clone();

        tokio::spawn(async move {
            let _permit = limiter.acquire_owned().await;
            match ensure_exchange(&connection, &msg).await {
                Ok(()) => {
                    let _ = prepared.send(msg).await;
                }
                Err(err) if ClientError::is_connection_fault_err(&err) => {
                    logger.log("exchange declare failed, re-enqueuing", &[("err", &err.to_string())]);
                    if let Err(requeue_err) = queue.enqueue(msg) {
                        warn!(error = %requeue_err, "dropped message: queue full after connection fault");
                    }
                }
                Err(err) => {
                    logger.log("exchange declare rejected, dropping message", &[("err", &err.to_string())]);
                    warn!(error = %err, exchange = %msg.route.exchange_name, "dropping message after protocol fault");
                }
            }
        });
    }
}

fn exchange_kind(exchange_type: &str) -> lapin::ExchangeKind {
    match exchange_type {
        "direct" => lapin::ExchangeKind::Direct,
        "fanout" => lapin::ExchangeKind::Fanout,
        "headers" => lapin::ExchangeKind::Headers,
        "topic" => lapin::ExchangeKind::Topic,
        other => lapin::ExchangeKind::Custom(other.to_string()),
    }
}

/// Synchronous publish used by `Client::publish`: declares the exchange,
/// then publishes, without going through the background pipeline stages.
pub async fn publish_now(connection: &ConnectionManager, msg: &Message) -> Result<(), ClientError> {
    ensure_exchange(connection, msg).await?;
    publish_one(connection, msg).await
}

async fn ensure_exchange(connection: &ConnectionManager, msg: &Message) -> Result<(), ClientError> {
    let permit = connection.breaker().acquire().map_err(|_| ClientError::Transport("circuit breaker open".to_string()))?;
    let channel = connection.acquire_channel().await?;

    let result = channel
        .exchange_declare(
            msg.route.exchange_name.as_str().into(),
            exchange_kind(&msg.route.exchange_type),
            ExchangeDeclareOptions { durable: true, auto_delete: false, internal: false, nowait: false, passive: false },
            FieldTable::default(),
        )
        .await;

    match result {
        Ok(()) => {
            permit.release(true);
            Ok(())
        }
        Err(err) => {
            let client_err = ClientError::from_lapin(err);
            permit.release(!ClientError::is_connection_fault_err(&client_err));
            Err(client_err)
        }
    }
}

async fn stage_publish(
    mut prepared: mpsc::Receiver<Message>,
    queue: Arc<PublishQueue>,
    connection: Arc<ConnectionManager>,
    logger: Arc<dyn Logger>,
    max_workers: usize,
    cancel: CancellationToken,
) {
    let limiter = Arc::new(Semaphore::new(max_workers.max(1)));

    loop {
        let msg = tokio::select! {
            msg = prepared.recv() => match msg {
                Some(msg) => msg,
                None => return,
            },
            _ = cancel.cancelled() => return,
        };

        let connection = connection.clone();
        let logger = logger.clone();
        let queue = queue.clone();
        let limiter = limiter.clone();

        tokio::spawn(async move {
            let _permit = limiter.acquire_owned().await;
            match publish_one(&connection, &msg).await {
                Ok(()) => {}
                Err(err) if ClientError::is_connection_fault_err(&err) => {
                    logger.log("publish failed, re-enqueuing", &[("err", &err.to_string())]);
                    if let Err(requeue_err) = queue.enqueue(msg) {
                        warn!(error = %requeue_err, "dropped message: queue full after connection fault");
                    }
                }
                Err(err) => {
                    logger.log("publish rejected, dropping message", &[("err", &err.to_string())]);
                    warn!(error = %err, exchange = %msg.route.exchange_name, "dropping message after protocol fault");
                }
            }
        });
    }
}

async fn publish_one(connection: &ConnectionManager, msg: &Message) -> Result<(), ClientError> {
    let span = info_span!("amqp.publish", exchange = %msg.route.exchange_name, routing_key = %msg.route.routing_key);

    async {
        let permit = connection.breaker().acquire().map_err(|_| ClientError::Transport("circuit breaker open".to_string()))?;
        let channel = connection.acquire_channel().await?;

        let mut headers = msg.headers.clone();
        headers.extend(inject_headers(&tracing::Span::current()));
        let mut amqp_headers = lapin::types::FieldTable::default();
        for (key, value) in &headers {
            amqp_headers.insert(key.as_str().into(), lapin::types::AMQPValue::LongString(value.as_str().into()));
        }

        let properties = BasicProperties::default().with_content_type(msg.content_type.to_string().into()).with_headers(amqp_headers);

        let result = channel
            .basic_publish(
                msg.route.exchange_name.as_str().into(),
                msg.route.routing_key.as_str().into(),
                BasicPublishOptions { mandatory: false, immediate: false },
                &msg.body,
                properties,
            )
            .await;

        match result {
            Ok(_) => {
                permit.release(true);
                Ok(())
            }
            Err(err) => {
                let client_err = ClientError::from_lapin(err);
                permit.release(!ClientError::is_connection_fault_err(&client_err));
                Err(client_err)
            }
        }
    }
    .instrument(span)
    .await
}
