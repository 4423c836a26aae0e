//! # wmsync - window manager synchronization barrier
//!
//! Command-line front end:
//! - `sync`: run barriers against the window manager on `$DISPLAY`
//! - `selftest`: start Xvfb and the configured window manager, run one
//!   barrier in a fresh scenario, shut everything down

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use wmsync::config::HarnessConfig;
use wmsync::display::X11Session;
use wmsync::harness::Harness;
use wmsync::ipc::{resolve_socket_path, IpcClient};
use wmsync::sync::Barrier;

#[derive(Parser)]
#[command(name = "wmsync")]
#[command(about = "Synchronization barrier for i3-compatible X11 window managers")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run barriers against the window manager on $DISPLAY
    Sync {
        /// Number of barriers to run
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u32,

        /// Control socket (default: $I3SOCK, $SWAYSOCK, then the root window)
        #[arg(long)]
        socket: Option<PathBuf>,

        /// Completion timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Start Xvfb and the configured window manager, run one barrier
    Selftest,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    if cli.debug {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    info!(
        "📄 wmsync {} ({}, built {})",
        wmsync::VERSION,
        option_env!("GIT_COMMIT").unwrap_or("unknown commit"),
        env!("BUILD_DATE")
    );

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("❌ {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = HarnessConfig::load_or_default(cli.config.as_ref())?;

    match cli.command {
        Command::Sync {
            count,
            socket,
            timeout_ms,
        } => {
            if let Some(ms) = timeout_ms {
                config.sync.timeout_ms = ms;
            }
            config.validate()?;
            sync_running(&config, socket.or(config.wm.socket_path.clone()), count).await
        }
        Command::Selftest => selftest(&config).await,
    }
}

/// Cancel `token` on Ctrl-C
fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("🛑 Interrupted");
            token.cancel();
        }
    });
}

async fn sync_running(config: &HarnessConfig, socket: Option<PathBuf>, count: u32) -> Result<()> {
    let mut session = X11Session::connect(None).context("Failed to connect to $DISPLAY")?;
    let socket_path = resolve_socket_path(socket.as_deref(), &mut session)?;
    let client = IpcClient::connect(&socket_path).await?;

    let cancel = CancellationToken::new();
    cancel_on_interrupt(cancel.clone());

    let mut barrier = Barrier::new(session, client, config.sync.options(), cancel)?;
    let mut total = Duration::ZERO;
    for i in 1..=count {
        let completion = barrier.sync().await?;
        total += completion.elapsed;
        println!(
            "sync {}/{}: window {} token {} in {:?} ({} events skipped)",
            i,
            count,
            completion.request.window,
            completion.request.token,
            completion.elapsed,
            completion.skipped
        );
    }
    if count > 0 {
        info!("📊 {} barriers, mean {:?}", count, total / count);
    }

    barrier.close()?;
    Ok(())
}

async fn selftest(config: &HarnessConfig) -> Result<()> {
    let harness = Harness::start(config).await?;
    cancel_on_interrupt(harness.cancellation().clone());

    let result = async {
        let mut barrier = harness.scenario().await?.barrier()?;
        let completion = barrier.sync().await?;
        println!(
            "selftest passed on {}: window {} token {} in {:?}",
            harness.display_name(),
            completion.request.window,
            completion.request.token,
            completion.elapsed
        );
        barrier.close()?;
        Ok::<_, anyhow::Error>(())
    }
    .await;

    harness.shutdown().await?;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["wmsync", "sync"]).unwrap();
        assert!(!cli.debug);
        assert!(cli.config.is_none());
        match cli.command {
            Command::Sync {
                count,
                socket,
                timeout_ms,
            } => {
                assert_eq!(count, 1);
                assert!(socket.is_none());
                assert!(timeout_ms.is_none());
            }
            Command::Selftest => panic!("expected sync"),
        }
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from([
            "wmsync",
            "--debug",
            "--config",
            "/tmp/wmsync.toml",
            "sync",
            "-n",
            "3",
            "--socket",
            "/tmp/i3.sock",
            "--timeout-ms",
            "250",
        ])
        .unwrap();
        assert!(cli.debug);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/wmsync.toml")));
        match cli.command {
            Command::Sync {
                count,
                socket,
                timeout_ms,
            } => {
                assert_eq!(count, 3);
                assert_eq!(socket, Some(PathBuf::from("/tmp/i3.sock")));
                assert_eq!(timeout_ms, Some(250));
            }
            Command::Selftest => panic!("expected sync"),
        }
    }

    #[test]
    fn test_selftest_subcommand() {
        let cli = Cli::try_parse_from(["wmsync", "selftest"]).unwrap();
        assert!(matches!(cli.command, Command::Selftest));

        let cli = Cli::try_parse_from(["wmsync", "selftest", "--config", "testdata/wmsync.toml"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("testdata/wmsync.toml")));
    }
}
