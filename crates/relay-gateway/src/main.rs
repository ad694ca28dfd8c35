use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use relay_broker::{AmqpSettings, AmqpSource, Backoff, Binding, Consumer, LocalBroker, MessageSource};
use relay_core::RelayConfig;
use relay_hub::Hub;
use relay_gateway::{app, AppState};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{error, info, warn};

/// In-flight messages buffered between `/publish` and the consumer.
const INGEST_QUEUE: usize = 256;

#[derive(Debug, Parser)]
#[command(name = "relay-gateway", version, about = "Broker-to-SSE event relay")]
struct Cli {
    /// Path to relay.toml (falls back to RELAY_CONFIG, then ./relay.toml).
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "relay_gateway=info,relay_hub=info,relay_broker=info,tower_http=debug".into()
            }),
        )
        .init();

    // load config: --config > RELAY_CONFIG env > ./relay.toml
    let cli = Cli::parse();
    let config_path = cli.config.or_else(|| std::env::var("RELAY_CONFIG").ok());
    let config = RelayConfig::load(config_path.as_deref()).inspect_err(|e| {
        error!(code = e.code(), error = %e, "config load failed");
    })?;

    let hub = Hub::with_capacity(config.hub.queue_capacity)?;
    info!(queue_capacity = config.hub.queue_capacity, "broadcast hub ready");

    let binding = Binding::from_patterns(&config.broker.bindings)?;
    let backoff = Backoff::new(Duration::from_millis(config.broker.backoff_base_ms));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut consumers = Vec::new();

    // HTTP ingest: /publish → local broker → hub
    let (broker, source) = LocalBroker::new(INGEST_QUEUE);
    let local = Consumer::new(source, hub.clone(), binding.clone()).with_backoff(backoff);
    let mut broker_status = local.status();
    consumers.push(spawn_consumer(local, shutdown_rx.clone()));

    // RabbitMQ: queue bound to the exchange with every binding pattern
    if config.broker.enabled() {
        let settings = AmqpSettings {
            url: config.broker.url.clone(),
            queue: config.broker.queue.clone(),
            exchange: config.broker.exchange.clone(),
            durable: config.broker.durable,
            patterns: Vec::new(),
        }
        .with_binding(&binding);
        info!(
            queue = %settings.queue,
            exchange = %settings.exchange,
            durable = settings.durable,
            patterns = ?settings.patterns,
            "broker consumer enabled"
        );
        let amqp = Consumer::new(AmqpSource::new(settings), hub.clone(), binding)
            .with_backoff(backoff);
        broker_status = amqp.status();
        consumers.push(spawn_consumer(amqp, shutdown_rx));
    } else {
        warn!("broker.url is empty, only /publish feeds the hub");
    }

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    let stream_path = config.stream.path.clone();
    let state = Arc::new(AppState::new(config, hub.clone(), broker, broker_status));
    let router = app::build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, path = %stream_path, "relay gateway listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(hub))
        .await?;

    // signal consumers to stop
    let _ = shutdown_tx.send(true);
    for task in consumers {
        if let Err(e) = task.await {
            warn!(error = %e, "consumer task panicked");
        }
    }
    info!("relay gateway stopped");
    Ok(())
}

fn spawn_consumer<S>(consumer: Consumer<S>, shutdown: watch::Receiver<bool>) -> JoinHandle<()>
where
    S: MessageSource + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = consumer.run(shutdown).await {
            error!(error = %e, "broker consumer stopped");
        }
    })
}

/// Resolve on Ctrl-C or SIGTERM. The hub is shut down first so every open
/// event stream ends and graceful shutdown is not held up by viewers.
async fn shutdown_signal(hub: Hub) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!(viewers = hub.subscriber_count(), "shutdown requested");
    hub.shutdown();
}
