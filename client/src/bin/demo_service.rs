//! Reference consumer of the `resilient_amqp` library: wires a `Client`,
//! the event broker facade, and a health endpoint together behind a
//! signal-driven shutdown handle.
//!
//! Grounded on the teacher's `extractor/src/main.rs` shutdown-handle and
//! ASCII-art startup pattern, adapted to a messaging client instead of a
//! data extractor.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::signal;
use tracing::{error, info};

use resilient_amqp::client::{with_logger, Client};
use resilient_amqp::config::ClientConfig;
use resilient_amqp::event::{make_event, AggregateId, EventBroker, EventType};
use resilient_amqp::health::HealthServer;
use resilient_amqp::telemetry::{init_tracing, Logger, NullLogger};

/// Demo service wrapping the resilient AMQP client.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// AMQP broker host.
    #[clap(long, env = "AMQP_HOST", default_value = "localhost")]
    host: String,

    /// AMQP broker port.
    #[clap(long, env = "AMQP_PORT", default_value_t = 5672)]
    port: u16,

    /// AMQP broker username.
    #[clap(long, env = "AMQP_USER", default_value = "guest")]
    user: String,

    /// AMQP broker password.
    #[clap(long, env = "AMQP_PASS", default_value = "guest")]
    pass: String,

    /// Consumer tag this service registers with the broker.
    #[clap(long, env = "AMQP_CONSUMER_NAME", default_value = "demo-service")]
    consumer_name: String,

    /// Port the health/readiness/metrics endpoint listens on.
    #[clap(long, env = "HEALTH_PORT", default_value_t = 8080)]
    health_port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing("resilient_amqp");
    print_ascii_art();

    info!("starting resilient AMQP demo service");

    let config = match ClientConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let logger: Arc<dyn Logger> = Arc::new(NullLogger);
    let client = Arc::new(
        Client::new(
            &args.consumer_name,
            &args.user,
            &args.pass,
            &args.host,
            args.port,
            config,
            vec![with_logger(logger)],
        )
        .await?,
    );

    let health_server = HealthServer::new(args.health_port, client.connection(), client.publish_queue());
    let health_handle = tokio::spawn(async move {
        if let Err(e) = health_server.run().await {
            error!("health server error: {}", e);
        }
    });

    let broker = EventBroker::new(client.clone());
    demo_publish(&broker).await;

    let shutdown = setup_shutdown_handler();
    shutdown.notified().await;

    info!("shutting down demo service");
    health_handle.abort();
    client.close().await?;

    info!("demo service shutdown complete");
    Ok(())
}

/// Publishes one sample event so the demo service does something observable
/// on startup, matching the happy-path scenario from the test suite.
async fn demo_publish(broker: &EventBroker) {
    let event = match make_event(AggregateId::from("demo"), EventType::from("article-created"), serde_json::json!({"id": 1})) {
        Ok(event) => event,
        Err(err) => {
            error!("failed to build demo event: {}", err);
            return;
        }
    };

    if let Err(err) = broker.resilient_publish(&event) {
        error!("failed to publish demo event: {}", err);
    }
}

fn setup_shutdown_handler() -> Arc<tokio::sync::Notify> {
    let shutdown = Arc::new(tokio::sync::Notify::new());
    let shutdown_clone = shutdown.clone();

    tokio::spawn(async move {
        let _ = signal::ctrl_c().await;
        info!("received shutdown signal");
        shutdown_clone.notify_waiters();
    });

    shutdown
}

fn print_ascii_art() {
    println!(
        r#"
██████╗ ███████╗███████╗██╗██╗     ██╗███████╗███╗   ██╗████████╗
██╔══██╗██╔════╝██╔════╝██║██║     ██║██╔════╝████╗  ██║╚══██╔══╝
██████╔╝█████╗  ███████╗██║██║     ██║█████╗  ██╔██╗ ██║   ██║
██╔══██╗██╔══╝  ╚════██║██║██║     ██║██╔══╝  ██║╚██╗██║   ██║
██║  ██║███████╗███████║██║███████╗██║███████╗██║ ╚████║   ██║
╚═╝  ╚═╝╚══════╝╚══════╝╚═╝╚══════╝╚═╝╚══════╝╚═╝  ╚═══╝   ╚═╝

 █████╗ ███╗   ███╗ ██████╗ ██████╗
██╔══██╗████╗ ████║██╔═══██╗██╔══██╗
███████║██╔████╔██║██║   ██║██████╔╝
██╔══██║██║╚██╔╝██║██║   ██║██╔═══╝
██║  ██║██║ ╚═╝ ██║╚██████╔╝██║
╚═╝  ╚═╝╚═╝     ╚═╝ ╚═════╝ ╚═╝
"#
    );
}
