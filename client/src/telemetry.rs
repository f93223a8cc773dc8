//! Logger/tracer seams the client accepts via `ClientOption`, plus no-op
//! defaults and the ambient `tracing_subscriber` bootstrap used by the demo
//! binary. Grounded on the original implementation's `Logger` interface and
//! null logger/tracer (`rabbitmq/config.go`, `rabbitmq/null.go`), and on the
//! teacher's `main.rs` log-level mapping.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

/// A structured logger seam. The default is [`NullLogger`]; callers that
/// want output supply their own via `with_logger`, or rely on the ambient
/// `tracing` macros the client itself uses internally.
pub trait Logger: Send + Sync {
    fn log(&self, message: &str, fields: &[(&str, &str)]);
}

/// No-op logger used when the caller supplies none.
#[derive(Debug, Default)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn log(&self, _message: &str, _fields: &[(&str, &str)]) {}
}

/// A minimal tracer seam distinct from the ambient OTel tracing bootstrap:
/// callers that want to hook span creation into their own system implement
/// this instead of (or alongside) global OTel propagation.
pub trait ClientTracer: Send + Sync {
    fn on_span_start(&self, name: &str);
}

/// No-op tracer used when the caller supplies none.
#[derive(Debug, Default)]
pub struct NullTracer;

impl ClientTracer for NullTracer {
    fn on_span_start(&self, _name: &str) {}
}

pub(crate) fn default_logger() -> Arc<dyn Logger> {
    Arc::new(NullLogger)
}

pub(crate) fn default_tracer() -> Arc<dyn ClientTracer> {
    Arc::new(NullTracer)
}

/// Maps the Python-style `LOG_LEVEL` values the rest of this repository's
/// services use onto `tracing`'s level names, following the teacher's
/// `build_tracing_filter`.
pub fn build_tracing_filter(log_level: &str, crate_name: &str) -> String {
    let rust_level = match log_level.to_uppercase().as_str() {
        "DEBUG" => "debug",
        "INFO" => "info",
        "WARNING" | "WARN" => "warn",
        "ERROR" => "error",
        "CRITICAL" => "error",
        _ => "info",
    };
    let lapin_level = if rust_level == "debug" { "info" } else { "warn" };
    format!("{crate_name}={rust_level},lapin={lapin_level}")
}

/// Initializes the global `tracing` subscriber with a JSON formatter honoring
/// `LOG_LEVEL`. Idempotent guard omitted deliberately: calling this twice in
/// one process is a caller bug, not something to paper over.
pub fn init_tracing(crate_name: &str) {
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string());
    let filter = build_tracing_filter(&log_level, crate_name);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(false)
        .with_line_number(true)
        .json()
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_logger_accepts_any_call() {
        let logger = NullLogger;
        logger.log("anything", &[("key", "value")]);
    }

    #[test]
    fn null_tracer_accepts_any_call() {
        let tracer = NullTracer;
        tracer.on_span_start("anything");
    }

    #[test]
    fn filter_maps_debug() {
        assert_eq!(build_tracing_filter("debug", "resilient_amqp"), "resilient_amqp=debug,lapin=info");
    }

    #[test]
    fn filter_maps_info() {
        assert_eq!(build_tracing_filter("info", "resilient_amqp"), "resilient_amqp=info,lapin=warn");
    }

    #[test]
    fn filter_maps_python_levels() {
        assert_eq!(build_tracing_filter("WARNING", "resilient_amqp"), "resilient_amqp=warn,lapin=warn");
        assert_eq!(build_tracing_filter("CRITICAL", "resilient_amqp"), "resilient_amqp=error,lapin=warn");
        assert_eq!(build_tracing_filter("INVALID", "resilient_amqp"), "resilient_amqp=info,lapin=warn");
    }
}
