//! Wardlink Controller CLI
//!
//! Edge controller for in-network clinical deterioration monitoring.

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wardlink_controller::{
    audit::{AuditLog, AuditStats},
    channel::{BlockingInferenceClient, ChannelConfig},
    config::Config,
    heartbeat::HeartbeatScheduler,
    listener::PacketListener,
    watch::{AlertLog, AlertWatcher},
    window::{GateConfig, ImputationEngine, SubmissionGate},
    VERSION,
};

#[derive(Parser)]
#[command(name = "wardlink")]
#[command(author = "Wardlink")]
#[command(version = VERSION)]
#[command(about = "Edge controller for in-network clinical deterioration monitoring", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the controller: assemble windows, impute, submit
    Run {
        /// UDP address to receive punted sensor frames on
        #[arg(long)]
        listen: Option<SocketAddr>,

        /// UDP address of the switch packet-out relay
        #[arg(long)]
        switch: Option<SocketAddr>,

        /// Patient population to heartbeat
        #[arg(long)]
        num_patients: Option<u32>,

        /// Heartbeat interval in seconds
        #[arg(long)]
        heartbeat_interval: Option<u64>,

        /// Window timeout in seconds
        #[arg(long)]
        window_timeout: Option<u64>,

        /// Fixed imputation seed (reproducible imputation)
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Listen for alert frames and log them
    Watch {
        /// UDP address to receive alert frames on
        #[arg(long)]
        listen: Option<SocketAddr>,

        /// Output CSV path for received alerts
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Show configuration and last-session statistics
    Status,

    /// Show configuration
    Config,
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            listen,
            switch,
            num_patients,
            heartbeat_interval,
            window_timeout,
            seed,
        } => {
            cmd_run(listen, switch, num_patients, heartbeat_interval, window_timeout, seed);
        }
        Commands::Watch { listen, output } => {
            cmd_watch(listen, output);
        }
        Commands::Status => {
            cmd_status();
        }
        Commands::Config => {
            cmd_config();
        }
    }
}

fn cmd_run(
    listen: Option<SocketAddr>,
    switch: Option<SocketAddr>,
    num_patients: Option<u32>,
    heartbeat_interval: Option<u64>,
    window_timeout: Option<u64>,
    seed: Option<u64>,
) {
    init_tracing();

    // Load configuration and apply CLI overrides
    let mut config = Config::load().unwrap_or_default();
    if let Some(addr) = listen {
        config.listen_addr = addr;
    }
    if let Some(addr) = switch {
        config.switch_addr = addr;
    }
    if let Some(n) = num_patients {
        config.num_patients = n;
    }
    if let Some(secs) = heartbeat_interval {
        config.heartbeat_interval = Duration::from_secs(secs);
    }
    if let Some(secs) = window_timeout {
        config.window_timeout = Duration::from_secs(secs);
    }
    if let Some(s) = seed {
        config.imputation_seed = Some(s);
    }
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    println!("Wardlink Controller v{VERSION}");
    println!();
    println!("Starting controller...");
    println!("  Sensor ingest: {}", config.listen_addr);
    println!("  Switch relay: {}", config.switch_addr);
    println!("  Patients: {}", config.num_patients);
    println!("  Heartbeat interval: {}s", config.heartbeat_interval.as_secs());
    println!("  Window timeout: {}s", config.window_timeout.as_secs());
    println!("  Imputation log: {:?}", config.log_path);

    // Audit log: truncates the CSV and writes its header
    let audit = match AuditLog::with_files(config.log_path.clone(), config.stats_path()) {
        Ok(log) => Arc::new(log),
        Err(e) => {
            eprintln!("Error opening imputation log: {e}");
            std::process::exit(1);
        }
    };

    // Outbound channel toward the switch
    let sink = match BlockingInferenceClient::new(ChannelConfig::new(config.switch_addr)) {
        Ok(client) => {
            println!("  Instance ID: {}", client.instance_id());
            Arc::new(client)
        }
        Err(e) => {
            eprintln!("Error opening inference channel: {e}");
            std::process::exit(1);
        }
    };

    println!();
    println!("Press Ctrl+C to stop");
    println!();

    // Inbound packet relay
    let mut packet_listener = PacketListener::new(config.listen_addr);
    if let Err(e) = packet_listener.start(audit.clone()) {
        eprintln!("Error starting listener: {e}");
        std::process::exit(1);
    }

    // Heartbeat sweeps feed the same ingest channel as the listener
    let mut scheduler = HeartbeatScheduler::new(
        config.heartbeat_interval,
        config.num_patients,
        packet_listener.sender(),
        sink.clone(),
        audit.clone(),
    );
    scheduler.start();

    let engine = match config.imputation_seed {
        Some(seed) => ImputationEngine::with_seed(config.imputation_ranges.clone(), seed),
        None => ImputationEngine::new(config.imputation_ranges.clone()),
    };
    let mut gate = SubmissionGate::new(
        engine,
        sink,
        audit.clone(),
        GateConfig {
            num_patients: config.num_patients,
            window_timeout: config.window_timeout,
            heartbeat_extends_staleness: config.heartbeat_extends_staleness,
        },
    );

    // Set up Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc_handler(r);

    // Main gate loop: every event, real or heartbeat, flows through here
    let receiver = packet_listener.receiver().clone();
    while running.load(Ordering::SeqCst) {
        match receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(reading) => {
                gate.ingest(reading);
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                eprintln!("Ingest channel closed unexpectedly");
                break;
            }
        }
    }

    // Stop collection
    println!();
    println!("Stopping controller...");
    scheduler.stop();
    packet_listener.stop();

    if let Err(e) = audit.save() {
        eprintln!("Warning: Could not save session stats: {e}");
    }

    println!();
    println!("{}", audit.summary());
}

fn cmd_watch(listen: Option<SocketAddr>, output: Option<PathBuf>) {
    init_tracing();

    let config = Config::load().unwrap_or_default();
    let addr = listen.unwrap_or(config.alert_listen_addr);
    let output = output.unwrap_or(config.alerts_log_path.clone());

    let log = match AlertLog::create(&output) {
        Ok(log) => log,
        Err(e) => {
            eprintln!("Error opening alerts log {output:?}: {e}");
            std::process::exit(1);
        }
    };
    println!("Wardlink Controller v{VERSION} (watch mode)");
    println!("  Alerts log: {output:?}");
    println!();
    println!("Press Ctrl+C to stop");

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc_handler(r);

    let watcher = AlertWatcher::new(addr, log);
    if let Err(e) = watcher.run(running) {
        eprintln!("Watch failed: {e}");
        std::process::exit(1);
    }
}

fn cmd_status() {
    let config = Config::load().unwrap_or_default();

    println!("Wardlink Controller Status");
    println!("==========================");
    println!();

    println!("Configuration:");
    println!("  Sensor ingest: {}", config.listen_addr);
    println!("  Switch relay: {}", config.switch_addr);
    println!("  Patients: {}", config.num_patients);
    println!("  Heartbeat interval: {}s", config.heartbeat_interval.as_secs());
    println!("  Window timeout: {}s", config.window_timeout.as_secs());
    println!(
        "  Heartbeats extend staleness: {}",
        config.heartbeat_extends_staleness
    );
    println!();

    // Show stats of the last (or current) session if available
    let stats_path = config.stats_path();
    if stats_path.exists() {
        match std::fs::read_to_string(&stats_path)
            .ok()
            .and_then(|content| serde_json::from_str::<AuditStats>(&content).ok())
        {
            Some(stats) => {
                println!("Last Session:");
                println!("  Readings received: {}", stats.readings_received);
                println!("  Duplicates ignored: {}", stats.duplicates_ignored);
                println!("  Malformed packets dropped: {}", stats.malformed_dropped);
                println!("  Heartbeats sent: {}", stats.heartbeats_sent);
                println!("  Windows submitted complete: {}", stats.windows_completed);
                println!("  Windows submitted after timeout: {}", stats.windows_forced);
                println!("  Slots imputed: {}", stats.slots_imputed);
            }
            None => println!("Could not parse session stats at {stats_path:?}"),
        }
    } else {
        println!("No previous session data found.");
    }
}

fn cmd_config() {
    let config = Config::load().unwrap_or_default();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");
}

/// Daemon logging; `RUST_LOG` overrides the default level.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
