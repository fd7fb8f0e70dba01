//! ShardKV Server Binary
//!
//! Starts one ShardKV node: a primary or a replica for one shard.

use std::path::PathBuf;

use clap::Parser;
use shardkv::{Config, NodeRole, Server, ShardTable};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::{fmt, EnvFilter};

/// ShardKV Server
#[derive(Parser, Debug)]
#[command(name = "shardkv-server")]
#[command(about = "Sharded, replicated key-value store node")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(long, default_value = "./shardkv_data")]
    db_location: PathBuf,

    /// HTTP listen address (host:port)
    #[arg(long, default_value = "127.0.0.1:8080")]
    http_address: String,

    /// Shard table (JSON)
    #[arg(long, default_value = "sharding.json")]
    config_file: PathBuf,

    /// Name of the shard this node serves
    #[arg(long, default_value = "")]
    shard: String,

    /// Run as a read-only replica
    #[arg(long)]
    replica: bool,

    /// Primary to replicate from (defaults to this shard's table address)
    #[arg(long)]
    primary_address: Option<String>,

    /// MemTable size limit in MB before flush
    #[arg(short = 'm', long, default_value = "64")]
    memtable_mb: usize,
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,shardkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("ShardKV Server v{}", shardkv::VERSION);
    tracing::info!("Data directory: {}", args.db_location.display());
    tracing::info!("Listen address: {}", args.http_address);

    if args.shard.is_empty() {
        tracing::error!("--shard must name an entry of {}", args.config_file.display());
        std::process::exit(1);
    }

    let shards = match ShardTable::from_file(&args.config_file, &args.shard) {
        Ok(shards) => shards,
        Err(e) => {
            tracing::error!("Failed to load shard table: {}", e);
            std::process::exit(1);
        }
    };
    tracing::info!(
        shard = shards.current(),
        shard_count = shards.count(),
        "Loaded shard table"
    );

    let role = if args.replica {
        NodeRole::Replica
    } else {
        NodeRole::Primary
    };

    let mut builder = Config::builder()
        .data_dir(&args.db_location)
        .listen_addr(&args.http_address)
        .role(role)
        .memtable_size_limit(args.memtable_mb * 1024 * 1024);
    if let Some(primary) = &args.primary_address {
        builder = builder.primary_addr(primary);
    }
    let config = builder.build();

    let server = match Server::open(config, shards) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            std::process::exit(1);
        }
    };

    let listen_addr = server.config().listen_addr.clone();
    let listener = match TcpListener::bind(&listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", listen_addr, e);
            if let Err(e) = server.engine().close() {
                tracing::error!("Failed to close engine: {}", e);
            }
            std::process::exit(1);
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl+C, initiating shutdown...");
            let _ = shutdown_tx.send(true);
        }
    });

    if let Err(e) = server.run(listener, shutdown_rx).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
