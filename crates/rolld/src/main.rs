//! Roll Daemon - shared dice roll history and broadcast server
//!
//! This binary runs as a background daemon, evaluating dice expressions
//! for connected clients and broadcasting every result to subscribers.
//!
//! # Usage
//!
//! ```bash
//! # Start the daemon (foreground)
//! rolld start
//!
//! # Start the daemon (background/daemonized)
//! rolld start -d
//!
//! # Stop the daemon
//! rolld stop
//!
//! # Check daemon status
//! rolld status
//!
//! # Start on a custom address
//! ROLLD_ADDR=127.0.0.1:9000 rolld start
//!
//! # Enable debug logging
//! RUST_LOG=rolld=debug rolld start
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: Graceful shutdown

use std::env;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use rolld::history::spawn_history;
use rolld::server::{RollServer, DEFAULT_LISTEN_ADDR};

/// Roll daemon - shared dice roll service
#[derive(Parser, Debug)]
#[command(name = "rolld", version, about)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the daemon
    Start {
        /// Run as a background daemon (fork to background)
        #[arg(short = 'd', long)]
        daemon: bool,
    },
    /// Stop the running daemon
    Stop,
    /// Show daemon status
    Status,
}

/// Returns the path to the PID file.
fn pid_file_path() -> PathBuf {
    let state_dir = dirs::state_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("rolld");
    state_dir.join("rolld.pid")
}

/// Returns the path to the log file.
fn log_file_path() -> PathBuf {
    let state_dir = dirs::state_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("rolld");
    state_dir.join("rolld.log")
}

/// Reads the PID from the PID file, if it exists.
fn read_pid() -> Option<u32> {
    let path = pid_file_path();
    let mut file = File::open(&path).ok()?;
    let mut contents = String::new();
    file.read_to_string(&mut contents).ok()?;
    contents.trim().parse().ok()
}

/// Writes the current PID to the PID file.
fn write_pid() -> Result<()> {
    let path = pid_file_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create state directory")?;
    }
    let mut file = File::create(&path).context("Failed to create PID file")?;
    write!(file, "{}", process::id()).context("Failed to write PID")?;
    Ok(())
}

/// Removes the PID file.
fn remove_pid_file() {
    let path = pid_file_path();
    let _ = fs::remove_file(path);
}

/// Checks if a process with the given PID is running.
fn is_process_running(pid: u32) -> bool {
    // Check if /proc/{pid} exists (Linux-specific but we're already Linux-only)
    PathBuf::from(format!("/proc/{}", pid)).exists()
}

/// Checks if the daemon is already running.
fn is_daemon_running() -> Option<u32> {
    if let Some(pid) = read_pid() {
        if is_process_running(pid) {
            return Some(pid);
        }
        // Stale PID file - remove it
        remove_pid_file();
    }
    None
}

/// Sends SIGTERM to the daemon process.
fn stop_daemon(pid: u32) -> Result<()> {
    #[cfg(unix)]
    {
        // Use kill syscall
        let result = unsafe { libc::kill(pid as i32, libc::SIGTERM) };
        if result != 0 {
            bail!("Failed to send SIGTERM to process {}", pid);
        }
    }
    #[cfg(not(unix))]
    {
        bail!("Stop command is only supported on Unix systems");
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Default to 'start' if no subcommand given
    let command = args.command.unwrap_or(Command::Start { daemon: false });

    match command {
        Command::Start { daemon } => {
            // Check if already running
            if let Some(pid) = is_daemon_running() {
                eprintln!("Daemon is already running (PID {})", pid);
                eprintln!("Use 'rolld stop' to stop it first.");
                process::exit(1);
            }

            if daemon {
                // Daemonize before starting tokio runtime
                daemonize()?;
            }

            // Write PID file
            write_pid()?;

            // Run the async main
            let result = run_daemon();

            // Clean up PID file on exit
            remove_pid_file();

            result
        }
        Command::Stop => {
            if let Some(pid) = is_daemon_running() {
                println!("Stopping daemon (PID {})...", pid);
                stop_daemon(pid)?;

                // Wait for process to exit (up to 5 seconds)
                for _ in 0..50 {
                    if !is_process_running(pid) {
                        println!("Daemon stopped.");
                        return Ok(());
                    }
                    std::thread::sleep(std::time::Duration::from_millis(100));
                }

                eprintln!("Daemon did not stop within 5 seconds.");
                process::exit(1);
            } else {
                println!("Daemon is not running.");
                Ok(())
            }
        }
        Command::Status => {
            if let Some(pid) = is_daemon_running() {
                println!("Daemon is running (PID {})", pid);

                let addr =
                    env::var("ROLLD_ADDR").unwrap_or_else(|_| DEFAULT_LISTEN_ADDR.to_string());
                println!("Address: {}", addr);

                Ok(())
            } else {
                println!("Daemon is not running.");
                process::exit(1);
            }
        }
    }
}

/// Daemonizes the current process.
fn daemonize() -> Result<()> {
    use daemonize::Daemonize;

    let log_path = log_file_path();

    // Ensure log directory exists
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent).context("Failed to create log directory")?;
    }

    let stdout = File::create(&log_path).context("Failed to create log file for stdout")?;
    let stderr = File::create(&log_path).context("Failed to create log file for stderr")?;

    let daemonize = Daemonize::new()
        .working_directory("/")
        .stdout(stdout)
        .stderr(stderr);

    daemonize.start().context("Failed to daemonize")?;

    Ok(())
}

/// Runs the daemon (async entry point).
#[tokio::main]
async fn run_daemon() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("rolld=info".parse()?)
                .add_directive("roll_core=info".parse()?)
                .add_directive("roll_protocol=info".parse()?),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "Roll daemon starting"
    );

    // Get listen address from environment or use default
    let addr = env::var("ROLLD_ADDR").unwrap_or_else(|_| DEFAULT_LISTEN_ADDR.to_string());

    // Create cancellation token for graceful shutdown
    let cancel_token = CancellationToken::new();

    // Setup signal handlers
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    // Spawn the history actor
    let history = spawn_history();
    info!("History actor started");

    // Create and run the server
    let server = RollServer::bind(&addr, history, cancel_token).await?;

    info!(addr = %addr, "Starting server");

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Roll daemon stopped");
    Ok(())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
