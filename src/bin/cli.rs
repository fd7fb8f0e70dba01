//! ShardKV CLI Client
//!
//! Command-line interface for interacting with a ShardKV node.

use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use shardkv::network::PeerClient;
use shardkv::Result;

/// ShardKV CLI
#[derive(Parser, Debug)]
#[command(name = "shardkv-cli")]
#[command(about = "CLI for the ShardKV key-value store")]
struct Args {
    /// Server address (any shard; requests are routed)
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Request timeout in milliseconds
    #[arg(long, default_value = "2000")]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete the records this node no longer owns
    Purge,

    /// Show the smallest pending replication entry
    Next,

    /// Acknowledge a replication entry
    Ack {
        /// Sequence number to acknowledge
        sequence: u64,
    },

    /// Show node status
    Health,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match execute(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn execute(args: &Args) -> Result<()> {
    let client = PeerClient::new(Duration::from_millis(args.timeout_ms))?;
    let server = args.server.as_str();

    match &args.command {
        Commands::Get { key } => match client.get(server, key).await? {
            Some(value) => println!("{}", String::from_utf8_lossy(&value)),
            None => println!("(nil)"),
        },
        Commands::Set { key, value } => {
            let response = client.set(server, key, value.clone().into_bytes()).await?;
            match response.sequence {
                Some(sequence) => println!("OK (sequence {})", sequence),
                None => println!("OK"),
            }
        }
        Commands::Purge => {
            let response = client.purge(server).await?;
            println!("purged {}", response.purged);
        }
        Commands::Next => match client.next_replication_entry(server).await? {
            Some(entry) => println!("{} {}", entry.sequence, entry.key),
            None => println!("(empty)"),
        },
        Commands::Ack { sequence } => {
            if client.ack_replication_entry(server, *sequence).await? {
                println!("OK");
            } else {
                println!("(not found)");
            }
        }
        Commands::Health => {
            let health = client.health(server).await?;
            println!("{}", serde_json::to_string_pretty(&health)?);
        }
    }

    Ok(())
}
