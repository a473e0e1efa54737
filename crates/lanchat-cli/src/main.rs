//! LAN Chat CLI
//!
//! Thin wrapper around lanchat-core for command-line usage.
//!
//! ## Usage
//!
//! ```bash
//! # Show this node's identity and a candidate sync port
//! lanchat info
//!
//! # Only run discovery and print peers as they appear
//! lanchat discover
//!
//! # Run a full node; type lines to send them
//! lanchat serve
//!
//! # Two nodes on one machine, announcing straight to each other
//! lanchat serve --identity a --discovery-port 9001 --broadcast-addr 127.0.0.1:9002
//! lanchat serve --identity b --discovery-port 9002 --broadcast-addr 127.0.0.1:9001
//! ```

use std::collections::HashSet;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use lanchat_core::config::{DEFAULT_DISCOVERY_PORT, DEFAULT_MAX_CONCURRENT_SYNCS};
use lanchat_core::{
    choose_port, resolve_identity, run_discovery_only, ChatEngine, Message, NodeConfig, NodeEvent,
    PeerRecord,
};
use tokio::io::AsyncBufReadExt;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};

/// LAN Chat - broadcast discovery and message sharing on the local network
#[derive(Parser)]
#[command(name = "lanchat")]
#[command(version = "0.1.0")]
#[command(about = "LAN Chat - peer discovery and message sharing on the local network")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show node identity and a candidate sync port
    Info {
        /// Use this identity instead of the local IPv4 address
        #[arg(long)]
        identity: Option<String>,
    },

    /// Run discovery only and print peers as they appear
    Discover {
        #[command(flatten)]
        net: NetArgs,
    },

    /// Run a full node: discovery, sync, and an interactive prompt
    Serve {
        #[command(flatten)]
        net: NetArgs,

        /// Sync server port (default: random in 10000..20000)
        #[arg(short, long)]
        port: Option<u16>,

        /// Seconds to wait on one sync round trip
        #[arg(long, default_value_t = 10)]
        sync_timeout_secs: u64,

        /// Maximum concurrent sync pulls
        #[arg(long, default_value_t = DEFAULT_MAX_CONCURRENT_SYNCS)]
        max_syncs: usize,
    },
}

/// Discovery options shared by `discover` and `serve`
#[derive(Args)]
struct NetArgs {
    /// Use this identity instead of the local IPv4 address
    #[arg(long)]
    identity: Option<String>,

    /// UDP port to listen on for announcements
    #[arg(long, default_value_t = DEFAULT_DISCOVERY_PORT)]
    discovery_port: u16,

    /// Where to send announcements
    #[arg(long, default_value = "255.255.255.255:9876")]
    broadcast_addr: SocketAddr,

    /// Seconds between announcements
    #[arg(long, default_value_t = 2)]
    interval_secs: u64,
}

impl NetArgs {
    fn to_config(&self) -> NodeConfig {
        let bind = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, self.discovery_port));
        let mut config = NodeConfig::default()
            .with_discovery(bind, self.broadcast_addr)
            .with_announce_interval(Duration::from_secs(self.interval_secs.max(1)));
        config.identity = self.identity.clone();
        config
    }
}

fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();
}

fn print_message(message: &Message) {
    println!("[{}] {}: {}", message.clock_time(), message.id, message.body);
}

fn print_peer(peer: &PeerRecord) {
    println!("  {}: {}", peer.identity, peer.address);
}

/// Key for "already printed". Ids alone are not enough: a second send in
/// the same second replaces the first under the same id.
fn shown_key(message: &Message) -> (String, String) {
    (message.id.clone(), message.body.clone())
}

/// Messages not printed yet, in display order; marks them as printed.
fn take_unseen(messages: Vec<Message>, shown: &mut HashSet<(String, String)>) -> Vec<Message> {
    messages
        .into_iter()
        .filter(|message| shown.insert(shown_key(message)))
        .collect()
}

fn print_new_messages(engine: &ChatEngine, shown: &mut HashSet<(String, String)>) {
    for message in take_unseen(engine.messages(), shown) {
        print_message(&message);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);
    debug!(verbosity = cli.verbose, "Logging initialized");

    match cli.command {
        Commands::Info { identity } => {
            let config = NodeConfig {
                identity,
                ..NodeConfig::default()
            };
            let identity = resolve_identity(&config).context("Failed to resolve identity")?;

            println!("LAN Chat v0.1.0");
            println!();
            println!("Node:");
            println!("  Identity: {}", identity);
            println!("  Sync port (candidate): {}", choose_port(config.sync_port_range.clone()));
            println!("  Discovery: {} -> {}", config.discovery_bind, config.announce_target);
        }

        Commands::Discover { net } => {
            let config = net.to_config();
            let identity = resolve_identity(&config).context("Failed to resolve identity")?;
            let sync_port = choose_port(config.sync_port_range.clone());

            println!("Discovering peers as {} (announcing port {})", identity, sync_port);
            println!("Press Ctrl+C to stop.");
            println!();

            tokio::select! {
                result = run_discovery_only(config, sync_port, |peer| {
                    println!("Discovered peer:");
                    print_peer(peer);
                }) => result?,
                _ = tokio::signal::ctrl_c() => {
                    println!();
                    println!("Received shutdown signal...");
                }
            }
        }

        Commands::Serve {
            net,
            port,
            sync_timeout_secs,
            max_syncs,
        } => {
            let mut config = net
                .to_config()
                .with_sync_timeout(Duration::from_secs(sync_timeout_secs.max(1)));
            config.sync_port = port;
            config.max_concurrent_syncs = max_syncs;

            println!("Starting LAN Chat...");
            println!();

            let engine = ChatEngine::start(config)
                .await
                .context("Failed to start node")?;
            let mut events = engine.subscribe();
            info!(identity = %engine.identity(), sync = %engine.sync_addr(), "Node ready");

            println!("Node:");
            println!("  Identity: {}", engine.identity());
            println!("  Sync: {}", engine.sync_addr());
            println!("  Discovery: {}", engine.discovery_addr());
            println!();
            println!("Type a message and press Enter to send.");
            println!("Commands: /peers, /messages, /quit");
            println!("{}", "─".repeat(50));

            let mut shown = HashSet::new();

            let stdin = tokio::io::stdin();
            let reader = tokio::io::BufReader::new(stdin);
            let mut lines = reader.lines();

            loop {
                tokio::select! {
                    event = events.recv() => {
                        match event {
                            Ok(NodeEvent::LocalMessage(_)) => print_new_messages(&engine, &mut shown),
                            Ok(event) => {
                                println!("* {}", event);
                                if event.changes_messages() {
                                    print_new_messages(&engine, &mut shown);
                                }
                            }
                            Err(RecvError::Lagged(_)) => print_new_messages(&engine, &mut shown),
                            Err(RecvError::Closed) => break,
                        }
                    }
                    line = lines.next_line() => {
                        match line {
                            Ok(Some(text)) => match text.trim() {
                                "/quit" => break,
                                "/peers" => {
                                    let peers = engine.peers();
                                    println!("Peers ({}):", peers.len());
                                    for peer in &peers {
                                        print_peer(peer);
                                    }
                                }
                                "/messages" => {
                                    println!("{}", "─".repeat(50));
                                    for message in engine.messages() {
                                        shown.insert(shown_key(&message));
                                        print_message(&message);
                                    }
                                    println!("{}", "─".repeat(50));
                                }
                                other => {
                                    // Blank lines are dropped by the store.
                                    engine.submit(other);
                                }
                            },
                            Ok(None) => {
                                // EOF - stdin closed
                                println!();
                                println!("Input closed, exiting...");
                                break;
                            }
                            Err(e) => {
                                eprintln!("Read error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = tokio::signal::ctrl_c() => {
                        println!();
                        println!("Received shutdown signal...");
                        break;
                    }
                }
            }

            println!("Shutting down...");
            engine.shutdown();
            println!("Goodbye.");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lanchat_core::{Identity, MessageStore};

    #[test]
    fn test_replaced_body_under_same_id_is_printed() {
        let store = MessageStore::new(Identity::new("cli-node").unwrap());
        let mut shown = HashSet::new();

        store.append_local_at("first", 42);
        let printed = take_unseen(store.snapshot_for_display(), &mut shown);
        assert_eq!(printed.len(), 1);
        assert_eq!(printed[0].body, "first");

        store.append_local_at("second", 42);
        let printed = take_unseen(store.snapshot_for_display(), &mut shown);
        assert_eq!(printed.len(), 1);
        assert_eq!(printed[0].id, "cli-node#42");
        assert_eq!(printed[0].body, "second");

        assert!(take_unseen(store.snapshot_for_display(), &mut shown).is_empty());
    }
}
