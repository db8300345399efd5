//! Binary entrypoint: wires the 8 components into a running server
//! (spec §2 supplement). Grounded on `call_server.rs::start_call_server`
//! for the bind/accept/spawn-per-connection loop, and on `main.rs`'s
//! subscriber setup for logging init — generalized to `EnvFilter` so log
//! verbosity is operator-tunable via `RUST_LOG` instead of the teacher's
//! fixed `INFO` level, since this is a long-running service rather than
//! a one-shot tool.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use speechgate::connection::handle_connection;
use speechgate::decoder::StubDecoder;
use speechgate::session_manager::SessionManager;
use speechgate::vad::{EnergyVad, VadGate};

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let listen_addr: String = std::env::var("GATEWAY_LISTEN_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:7878".to_string());
    let max_sessions: usize = env_or("GATEWAY_MAX_SESSIONS", 256);
    let idle_ttl_secs: u64 = env_or("GATEWAY_IDLE_TTL_SECS", 600);
    let decode_timeout_ms: u64 = env_or("GATEWAY_DECODE_TIMEOUT_MS", 5000);
    let vad_frame_size: usize = env_or("GATEWAY_VAD_FRAME_SIZE", 512);
    // 30s of 16kHz audio unframed before the oldest samples get dropped
    // (spec §5 backpressure). 0 disables the bound entirely.
    let max_buffered_samples: usize = env_or("GATEWAY_MAX_BUFFERED_SAMPLES", 480_000);

    if !speechgate::frame::ALLOWED_FRAME_SIZES.contains(&vad_frame_size) {
        error!(
            configured = vad_frame_size,
            allowed = ?speechgate::frame::ALLOWED_FRAME_SIZES,
            "GATEWAY_VAD_FRAME_SIZE is not an allowed VAD analysis size"
        );
        return Err("invalid GATEWAY_VAD_FRAME_SIZE".into());
    }

    let vad_gate = Arc::new(VadGate::new(EnergyVad::new(), 0.5));
    let decoder = Arc::new(StubDecoder::new());

    let manager = SessionManager::with_max_buffered(
        vad_gate,
        decoder,
        vad_frame_size,
        Duration::from_millis(decode_timeout_ms),
        max_sessions,
        Duration::from_secs(idle_ttl_secs),
        if max_buffered_samples == 0 {
            None
        } else {
            Some(max_buffered_samples)
        },
    );

    let listener = TcpListener::bind(&listen_addr).await?;
    info!(addr = %listen_addr, max_sessions, "speechgate listening");

    loop {
        let (stream, addr) = listener.accept().await?;
        let manager = manager.clone();
        tokio::spawn(async move {
            handle_connection(stream, addr, manager).await;
        });
    }
}
