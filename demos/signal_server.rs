//! Signaling server for browser video calls
//!
//! Run with: cargo run --example signal_server [BIND_ADDR] [--keep-history]
//!
//! Examples:
//!   cargo run --example signal_server                    # binds to 0.0.0.0:3000
//!   cargo run --example signal_server localhost          # binds to 127.0.0.1:3000
//!   cargo run --example signal_server 127.0.0.1:3001     # binds to 127.0.0.1:3001
//!   cargo run --example signal_server -- --keep-history  # chat survives empty rooms
//!
//! ## Trying it out
//!
//! With websocat, in two terminals:
//!   websocat ws://localhost:3000
//!   {"event":"join-call","data":"demo"}
//!   {"event":"chat-message","data":{"body":"hello","senderName":"alice"}}

use std::net::SocketAddr;

use huddle::{ChatStore, MemoryChatStore, RoomConfig, ServerConfig, SignalServer};

fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    const DEFAULT_PORT: u16 = 3000;

    // Replace "localhost" with "127.0.0.1"
    let normalized = arg.replace("localhost", "127.0.0.1");

    // Try parsing as SocketAddr first (includes port)
    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    // Try parsing as IP address without port
    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn print_usage() {
    eprintln!("Usage: signal_server [BIND_ADDR] [--keep-history]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR        Address to bind to (default: 0.0.0.0:3000)");
    eprintln!("  --keep-history   Keep chat in memory after a room empties");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  signal_server                     # binds to 0.0.0.0:3000");
    eprintln!("  signal_server localhost           # binds to 127.0.0.1:3000");
    eprintln!("  signal_server localhost:3001      # binds to 127.0.0.1:3001");
    eprintln!("  signal_server 0.0.0.0:3002        # binds to 0.0.0.0:3002");
}

async fn serve<S: ChatStore>(server: SignalServer<S>) {
    println!("Starting signaling server on ws://{}", server.bind_addr());
    println!();

    let result = server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;

    match result {
        Ok(()) => println!("\nShutting down..."),
        Err(e) => eprintln!("Server error: {}", e),
    }

    let stats = server.hub().stats().await;
    println!(
        "Stats: connections={} rooms={} signals={} dropped={} chat={}",
        stats.counters.total_connections,
        stats.counters.rooms_created,
        stats.counters.signals_forwarded,
        stats.counters.signals_dropped,
        stats.counters.chat_messages,
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let keep_history = args.iter().any(|a| a == "--keep-history");

    let bind_addr = match args.iter().find(|a| !a.starts_with("--")) {
        Some(addr_str) => match parse_bind_addr(addr_str) {
            Ok(addr) => addr,
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        None => ServerConfig::default().bind_addr,
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("huddle=debug".parse()?)
                .add_directive("signal_server=debug".parse()?),
        )
        .init();

    let config = ServerConfig::with_addr(bind_addr);

    if keep_history {
        println!("Chat history is kept after rooms empty");
    }

    if keep_history {
        serve(SignalServer::with_store(
            config,
            RoomConfig::default(),
            MemoryChatStore::new(),
        ))
        .await;
    } else {
        serve(SignalServer::new(config)).await;
    }

    Ok(())
}
