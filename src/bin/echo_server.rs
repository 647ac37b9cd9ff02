//! Echo Server - contoh consumer di atas reactor
//!
//! Semua logika echo ada di satu default-readable callback; accept,
//! teardown koneksi, dan error handling per-koneksi semuanya urusan
//! reactor.
//!
//! Usage:
//!   cargo run --release --bin echo_server -- [OPTIONS]

use std::io;
use std::net::TcpListener;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

use argus::{CallbackKind, Callbacks, Endpoint, EventCallback, Reactor};

/// Server configuration
struct ServerConfig {
    bind_addr: String,
    verbose: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:7777".to_string(),
            verbose: false,
        }
    }
}

/// Server statistics
struct EchoStats {
    echo_calls: AtomicU64,
    bytes_echoed: AtomicU64,
}

impl EchoStats {
    fn new() -> Self {
        Self {
            echo_calls: AtomicU64::new(0),
            bytes_echoed: AtomicU64::new(0),
        }
    }
}

/// Default-readable callback: baca semua yang tersedia, tulis balik.
///
/// `Ok(0)` berarti peer close dengan rapi - biarkan close path reactor
/// yang deregister. Read/write error di-return dan dicatat di dispatch
/// seam; teardown-nya juga urusan reactor.
fn echo_callback(stats: Arc<EchoStats>) -> EventCallback {
    Arc::new(move |endpoint: &mut Endpoint| -> io::Result<()> {
        let mut buf = [0u8; 4096];
        loop {
            match endpoint.read(&mut buf) {
                Ok(0) => {
                    debug!("peer on fd {} closed", endpoint.raw_fd());
                    return Ok(());
                }
                Ok(n) => {
                    endpoint.write_all(&buf[..n])?;
                    stats.echo_calls.fetch_add(1, Ordering::Relaxed);
                    stats.bytes_echoed.fetch_add(n as u64, Ordering::Relaxed);
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    })
}

fn run_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let reactor = Reactor::new()?;
    let stats = Arc::new(EchoStats::new());

    reactor.set_default(CallbackKind::Readable, echo_callback(stats.clone()));

    let listener = TcpListener::bind(&config.bind_addr)?;
    info!("echo server listening on {}", listener.local_addr()?);
    reactor.register(Endpoint::listener(listener)?, Callbacks::none())?;

    // Stats printer di thread sendiri; reactor loop jalan di main thread
    let handle = reactor.clone();
    let printer_stats = stats.clone();
    std::thread::spawn(move || loop {
        std::thread::sleep(Duration::from_secs(5));
        info!(
            "connections: {}  echoes: {}  echoed: {} KB",
            handle.registered_count().saturating_sub(1),
            printer_stats.echo_calls.load(Ordering::Relaxed),
            printer_stats.bytes_echoed.load(Ordering::Relaxed) / 1024,
        );
    });

    reactor.run();
    Ok(())
}

fn parse_args() -> ServerConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = ServerConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" | "-b" => {
                if i + 1 < args.len() {
                    config.bind_addr = args[i + 1].clone();
                    i += 1;
                }
            }
            "--verbose" | "-v" => {
                config.verbose = true;
            }
            "--help" | "-h" => {
                println!("Echo server on top of the argus reactor\n");
                println!("Usage: echo_server [OPTIONS]\n");
                println!("Options:");
                println!("  -b, --bind <ADDR>  Bind address (default: 0.0.0.0:7777)");
                println!("  -v, --verbose      Verbose output");
                println!("  -h, --help         Show this help");
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    config
}

fn main() {
    let config = parse_args();

    let level = if config.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("failed to set logging subscriber");

    if let Err(e) = run_server(config) {
        eprintln!("echo server error: {}", e);
        std::process::exit(1);
    }
}
