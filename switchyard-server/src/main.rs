//! Switchyard server binary.
//!
//! Serves the consumer control API over HTTP. Consumers are created and
//! controlled at runtime; nothing is persisted.
//!
//! # Kafka backend
//!
//! ```bash
//! switchyard-server --bootstrap-servers broker-1:9092 --group-id-prefix orders-
//! ```
//!
//! # In-memory backend
//!
//! For demos without a broker:
//!
//! ```bash
//! switchyard-server --backend memory --memory-partitions 6
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::net::SocketAddr;

use clap::{Parser, ValueEnum};
use switchyard_consumer::{GroupIdStrategy, MemoryClientConfig, RegistryConfig};
use switchyard_core::{GroupId, Limits};
use switchyard_kafka::{KafkaClientConfig, OffsetReset};
use switchyard_server::{Backend, ServerConfig};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Broker client backing the consumers.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum BackendKind {
    /// Kafka via librdkafka.
    #[default]
    Kafka,
    /// In-memory clients with simulated assignments.
    Memory,
}

/// Switchyard dynamic consumer server.
#[derive(Parser, Debug)]
#[command(name = "switchyard-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to listen on for HTTP requests.
    #[arg(long, default_value = "127.0.0.1:8080")]
    listen_addr: SocketAddr,

    /// Broker client backend.
    #[arg(long, value_enum, default_value = "kafka")]
    backend: BackendKind,

    /// Comma-separated Kafka broker list.
    #[arg(long, default_value = "localhost:9092")]
    bootstrap_servers: String,

    /// Put every consumer in this shared group instead of one group per listener.
    #[arg(long, conflicts_with = "group_id_prefix")]
    group_id: Option<String>,

    /// Prefix for per-listener group IDs.
    #[arg(long, default_value = "")]
    group_id_prefix: String,

    /// Where groups without committed offsets start reading.
    #[arg(long, default_value = "latest")]
    auto_offset_reset: OffsetReset,

    /// Extra librdkafka property in format `key=value`.
    /// Can be specified multiple times.
    #[arg(long = "consumer-property", value_parser = parse_property)]
    consumer_properties: Vec<(String, String)>,

    /// Maximum number of registered consumers.
    #[arg(long, default_value = "1024")]
    max_consumers: u32,

    /// Partitions assigned to each in-memory consumer.
    #[arg(long, default_value = "3")]
    memory_partitions: u32,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: Level,
}

/// Parses a property in format `key=value`.
fn parse_property(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid property '{s}', expected 'key=value'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err("property key cannot be empty".to_string());
    }
    Ok((key.to_string(), value.to_string()))
}

impl Args {
    fn server_config(&self) -> ServerConfig {
        let group_id_strategy = self.group_id.as_ref().map_or_else(
            || GroupIdStrategy::PerListener {
                prefix: self.group_id_prefix.clone(),
            },
            |group| GroupIdStrategy::Shared(GroupId::new(group.as_str())),
        );
        let registry = RegistryConfig::default()
            .with_limits(Limits::new().with_max_consumers(self.max_consumers))
            .with_group_id_strategy(group_id_strategy);

        let backend = match self.backend {
            BackendKind::Kafka => {
                let mut kafka = KafkaClientConfig::new(self.bootstrap_servers.as_str())
                    .with_auto_offset_reset(self.auto_offset_reset);
                for (key, value) in &self.consumer_properties {
                    kafka = kafka.with_property(key.as_str(), value.as_str());
                }
                Backend::Kafka(kafka)
            }
            BackendKind::Memory => Backend::Memory(
                MemoryClientConfig::default().with_partitions(self.memory_partitions),
            ),
        };

        ServerConfig::new(self.listen_addr)
            .with_registry(registry)
            .with_backend(backend)
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging to stderr.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!(
        listen_addr = %args.listen_addr,
        backend = ?args.backend,
        max_consumers = args.max_consumers,
        "Starting Switchyard server"
    );

    switchyard_server::serve(args.server_config(), shutdown_signal()).await?;
    Ok(())
}
