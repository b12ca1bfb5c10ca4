//! Log relay demo with a synthetic access-log source
//!
//! Run with: cargo run --example relay_server [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example relay_server                    # binds to 0.0.0.0:3793
//!   cargo run --example relay_server localhost          # binds to 127.0.0.1:3793
//!   cargo run --example relay_server 127.0.0.1:8080     # binds to 127.0.0.1:8080
//!
//! Then open http://localhost:3793/ or:
//!   curl -N http://localhost:3793/event
//!   curl 'http://localhost:3793/msg?msg=hello'

use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Duration;

use bytes::Bytes;
use tokio::net::TcpListener;

use relay_rs::error::SourceError;
use relay_rs::server::config::DEFAULT_PORT;
use relay_rs::source::{Cursor, LogSource, Page, StreamHandle, TailerConfig};
use relay_rs::transport::MemoryTransport;
use relay_rs::{Relay, RelayConfig, ServerConfig};

const PATHS: &[&str] = &["/", "/login", "/api/items", "/api/items/42", "/static/app.js"];
const STATUSES: &[u16] = &[200, 200, 200, 304, 404, 500];

/// Emits a few access-log lines per page, with the odd non-JSON line mixed in
struct SyntheticSource {
    pages: Mutex<u64>,
}

impl SyntheticSource {
    fn new() -> Self {
        Self {
            pages: Mutex::new(0),
        }
    }

    fn line(seq: u64) -> Bytes {
        let path = PATHS[(seq as usize) % PATHS.len()];
        let status = STATUSES[(seq as usize) % STATUSES.len()];
        let line = serde_json::json!({
            "time": format!("2024-03-01T10:{:02}:{:02}Z", (seq / 60) % 60, seq % 60),
            "remoteIP": format!("10.0.0.{}", seq % 250 + 1),
            "host": "www.example.com",
            "requestPath": path,
            "query": "",
            "method": "GET",
            "status": status,
            "userAgent": "curl/8.4.0",
            "referer": "",
            "application": "web",
            "logtype": "access",
        });
        Bytes::from(line.to_string())
    }
}

impl LogSource for SyntheticSource {
    async fn locate_stream(&self, group: &str, prefix: &str) -> Result<StreamHandle, SourceError> {
        Ok(StreamHandle::new(group, format!("{}_synthetic", prefix)))
    }

    async fn fetch_page(
        &self,
        _stream: &StreamHandle,
        cursor: &Cursor,
        limit: usize,
    ) -> Result<Page, SourceError> {
        let mut pages = self
            .pages
            .lock()
            .map_err(|_| SourceError::Unavailable("source state poisoned".into()))?;
        *pages += 1;

        // Every third fetch finds nothing new
        if *pages % 3 == 0 {
            return Ok(Page::new(Vec::new(), cursor.clone()));
        }

        let base = *pages * 10;
        let mut records: Vec<Bytes> = (base..base + 4).map(Self::line).collect();
        records.push(Bytes::from_static(b"level=warn msg=\"upstream slow\""));
        records.truncate(limit);

        Ok(Page::new(records, Cursor::new(format!("f/{}", pages))))
    }
}

fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn print_usage() {
    eprintln!("Usage: relay_server [BIND_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR  Address to listen on (default: 0.0.0.0:{})", DEFAULT_PORT);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let bind_addr = match args.get(1) {
        Some(addr_str) => match parse_bind_addr(addr_str) {
            Ok(addr) => addr,
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        None => SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("relay_rs=debug".parse()?)
                .add_directive("relay_server=debug".parse()?),
        )
        .init();

    let config = RelayConfig::default()
        .tailer(TailerConfig::default().idle_delay(Duration::from_secs(2)))
        .server(ServerConfig::with_addr(bind_addr));

    println!("Starting log relay on {}", bind_addr);
    println!("Viewer: http://{}/", bind_addr);
    println!("Stream: curl -N http://{}/event", bind_addr);
    println!();

    let transport = MemoryTransport::default();
    let listener = TcpListener::bind(bind_addr).await?;

    Relay::new(config)
        .run_until(
            listener,
            SyntheticSource::new(),
            transport.producer(),
            |topic: &str| transport.consumer(topic),
            async {
                let _ = tokio::signal::ctrl_c().await;
                println!("\nShutting down...");
            },
        )
        .await?;

    Ok(())
}
