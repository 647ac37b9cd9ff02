//! Echo Client - round-trip latency probe
//!
//! Kirim payload ke echo server, tunggu byte yang sama balik, catat
//! latency per round trip.
//!
//! Usage:
//!   cargo run --release --bin echo_client -- --host 127.0.0.1:7777 --count 1000

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Instant;

struct ClientConfig {
    host: String,
    count: u64,
    payload_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1:7777".to_string(),
            count: 1000,
            payload_size: 64,
        }
    }
}

fn parse_args() -> ClientConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = ClientConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--host" => {
                if i + 1 < args.len() {
                    config.host = args[i + 1].clone();
                    i += 1;
                }
            }
            "--count" => {
                if i + 1 < args.len() {
                    config.count = args[i + 1].parse().unwrap_or(1000);
                    i += 1;
                }
            }
            "--size" => {
                if i + 1 < args.len() {
                    config.payload_size = args[i + 1].parse().unwrap_or(64);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Echo round-trip latency probe\n");
                println!("Usage: echo_client [OPTIONS]\n");
                println!("Options:");
                println!("      --host <ADDR>  Server address (default: 127.0.0.1:7777)");
                println!("      --count <N>    Round trips (default: 1000)");
                println!("      --size <B>     Payload bytes (default: 64)");
                println!("  -h, --help         Show this help");
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    config
}

fn main() -> std::io::Result<()> {
    let config = parse_args();

    let mut stream = TcpStream::connect(&config.host)?;
    stream.set_nodelay(true)?;
    println!("connected to {}", config.host);

    let payload = vec![0xABu8; config.payload_size];
    let mut echo = vec![0u8; config.payload_size];

    let mut min_ns = u64::MAX;
    let mut max_ns = 0u64;
    let mut sum_ns = 0u64;

    let start = Instant::now();
    for _ in 0..config.count {
        let t0 = Instant::now();
        stream.write_all(&payload)?;
        stream.read_exact(&mut echo)?;
        let rtt = t0.elapsed().as_nanos() as u64;

        min_ns = min_ns.min(rtt);
        max_ns = max_ns.max(rtt);
        sum_ns += rtt;
    }
    let elapsed = start.elapsed();

    let avg_ns = sum_ns / config.count.max(1);
    println!("round trips: {}", config.count);
    println!("payload:     {} bytes", config.payload_size);
    println!(
        "latency:     min {:.1} us / avg {:.1} us / max {:.1} us",
        min_ns as f64 / 1000.0,
        avg_ns as f64 / 1000.0,
        max_ns as f64 / 1000.0,
    );
    println!(
        "throughput:  {:.0} round trips/sec",
        config.count as f64 / elapsed.as_secs_f64(),
    );

    Ok(())
}
