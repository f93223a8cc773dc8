//! Bidirectional mapping between trace metadata and AMQP headers.
//!
//! Every `Message` carries a `string -> string` header map used for W3C
//! trace-context propagation. This module lets the publish path inject the
//! current span's context into that map, and the consume path extract it
//! back into a fresh context, mirroring `injectAMQPHeaders`/
//! `extractAMQPHeaders` in the original implementation.

use std::collections::BTreeMap;

use opentelemetry::propagation::{Extractor, Injector};
use opentelemetry::Context;
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Adapts a `BTreeMap<String, String>` header map to OpenTelemetry's
/// `Extractor`/`Injector` traits. Non-string AMQP header values never reach
/// this carrier - they are filtered out before extraction, at the AMQP
/// boundary in [`crate::connection`].
pub struct HeaderCarrier<'a> {
    headers: &'a mut BTreeMap<String, String>,
}

impl<'a> HeaderCarrier<'a> {
    pub fn new(headers: &'a mut BTreeMap<String, String>) -> Self {
        Self { headers }
    }
}

impl Extractor for HeaderCarrier<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    fn keys(&self) -> Vec<&str> {
        self.headers.keys().map(String::as_str).collect()
    }
}

impl Injector for HeaderCarrier<'_> {
    fn set(&mut self, key: &str, value: String) {
        self.headers.insert(key.to_string(), value);
    }
}

/// Injects the current tracing span's context into a fresh header map
/// suitable for publishing on a `Message`.
pub fn inject_headers(span: &tracing::Span) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    let cx = span.context();
    opentelemetry::global::get_text_map_propagator(|propagator| {
        propagator.inject_context(&cx, &mut HeaderCarrier::new(&mut headers));
    });
    headers
}

/// Extracts a parent `Context` from a delivered message's headers, for a
/// consumer to set as the parent of its per-delivery span.
pub fn extract_context(headers: &BTreeMap<String, String>) -> Context {
    let mut headers = headers.clone();
    opentelemetry::global::get_text_map_propagator(|propagator| propagator.extract(&HeaderCarrier::new(&mut headers)))
}
