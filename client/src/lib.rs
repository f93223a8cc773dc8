//! Resilient AMQP 0-9-1 messaging client: reconnect loop, circuit breaker,
//! bounded republish queue, worker-capped publish/consume pipelines, plus
//! the domain-event facade, dispatcher, JWT validator and glue utilities
//! layered on top.

pub mod auth;
pub mod breaker;
pub mod client;
pub mod config;
pub mod connection;
pub mod consumer;
pub mod error;
pub mod event;
pub mod health;
pub mod message;
pub mod pipeline;
pub mod queue;
pub mod telemetry;
pub mod trace;
pub mod util;

pub use client::{with_logger, with_tracer, Client, ClientOption};
pub use config::ClientConfig;
pub use error::ClientError;
pub use message::{ContentType, Message, Route};
