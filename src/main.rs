//! attune - adaptive control engine for unattended displays
//!
//! Converts noisy per-tick sensor observations (subject distances,
//! hand gestures, presence) into stable display and audio commands.

pub mod engine;
pub mod ipc;
mod sim;

use std::time::{Duration, Instant};

use clap::Parser;
use tracing::{debug, info};

use engine::{Availability, ControlEngine, ControlMode, EngineConfig, TickInput, TickOutput};
use ipc::IpcServer;
use sim::Simulation;

#[derive(Parser, Debug)]
#[command(name = "attune", about = "Adaptive display/audio control engine")]
struct Cli {
    /// Control mode: distance, gesture, or hybrid
    #[arg(long, default_value = "hybrid")]
    mode: String,

    /// Ticks per second
    #[arg(long, default_value_t = 30.0)]
    tick_rate: f64,

    /// Exit after N ticks (testing)
    #[arg(long)]
    exit_after_ticks: Option<u64>,

    /// Drive the engine from the built-in scripted scenario
    #[arg(long)]
    simulate: bool,

    /// IPC socket path (default: $XDG_RUNTIME_DIR/attune-ipc.sock)
    #[arg(long)]
    socket: Option<String>,

    /// Log all IPC messages to stderr
    #[arg(long)]
    ipc_trace: bool,

    /// Show version and exit
    #[arg(long)]
    version: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("attune {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "attune=info".into()),
        )
        .init();

    info!("attune v{} starting", env!("CARGO_PKG_VERSION"));

    let mode = match ControlMode::from_str(&cli.mode) {
        Some(m) => m,
        None => {
            eprintln!("Unknown mode: {}. Use: distance, gesture, or hybrid", cli.mode);
            std::process::exit(1);
        }
    };

    let config = EngineConfig {
        mode,
        ..EngineConfig::default()
    };

    // No hardware probing at tick time: without real sensors attached
    // the actuators run simulated, decided once here.
    let availability = if cli.simulate {
        Availability::Simulated
    } else {
        Availability::Available
    };

    let mut engine = ControlEngine::new(config, availability, availability);

    let socket_path = cli
        .socket
        .map(std::path::PathBuf::from)
        .unwrap_or_else(IpcServer::default_socket_path);
    let mut server = IpcServer::bind(&socket_path)?;
    server.ipc_trace = cli.ipc_trace;

    let tick_interval = Duration::from_secs_f64(1.0 / cli.tick_rate);
    let simulation = Simulation::new();
    let start = Instant::now();
    let mut ticks: u64 = 0;

    loop {
        let now_s = start.elapsed().as_secs_f64();

        let frame = if cli.simulate {
            simulation.frame(now_s)
        } else {
            // Detector integration point: without attached sensors the
            // engine sees an empty room and settles into energy save.
            sim::SimFrame::default()
        };

        let output = engine.tick(TickInput {
            subjects: &frame.subjects,
            gesture: frame.gesture,
            ambient_light: frame.ambient_light,
            background_noise: frame.background_noise,
            now_s,
        });
        broadcast_output(&mut server, &output);

        server.poll(&mut engine);

        ticks += 1;
        if let Some(limit) = cli.exit_after_ticks {
            if ticks >= limit {
                info!(ticks, "tick limit reached, exiting");
                break;
            }
        }
        if server.shutdown_requested {
            info!("shutdown requested over IPC");
            break;
        }

        let next = tick_deadline(start, tick_interval, ticks);
        if let Some(sleep) = next.checked_duration_since(Instant::now()) {
            std::thread::sleep(sleep);
        } else {
            debug!(ticks, "tick overran its interval");
        }
    }

    // Leave the hardware in a neutral state before exiting.
    let final_output = engine.shutdown();
    broadcast_output(&mut server, &final_output);

    Ok(())
}

/// Deadline for the next tick, anchored to the loop start so drift
/// never accumulates. Must stay exact for the full `u64` tick range.
fn tick_deadline(start: Instant, interval: Duration, ticks: u64) -> Instant {
    start + interval.mul_f64(ticks as f64)
}

/// Broadcast this tick's applied commands to IPC subscribers.
fn broadcast_output(server: &mut IpcServer, output: &TickOutput) {
    if let Some(brightness) = output.brightness {
        server.broadcast_event(&format!(
            "(:type :event :event :brightness-applied :value {brightness})"
        ));
    }
    if let Some(volume) = output.volume {
        server.broadcast_event(&format!(
            "(:type :event :event :volume-applied :value {volume:.2})"
        ));
    }
    if let Some(media) = output.media {
        server.broadcast_event(&format!(
            "(:type :event :event :media-command :command :{})",
            media.as_str()
        ));
    }
}
