//! Binary entrypoint for the event gallery server.
//!
//! Delegates all logic to the library crate; no local modules here.

use std::path::PathBuf;
use std::time::SystemTime;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use event_gallery::config::Configuration;
use event_gallery::selection::{self, Policy};
use event_gallery::{scan, web};
use humantime::{format_rfc3339, parse_rfc3339};
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

#[derive(Debug, Parser)]
#[command(
    name = "event-gallery",
    version,
    about = "Live photo gallery backend for a polling display client"
)]
struct Args {
    /// Path to YAML config (built-in defaults when omitted)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,
    /// Override the listen address
    #[arg(long, value_name = "ADDR")]
    bind: Option<std::net::SocketAddr>,
    /// Deterministic RNG seed for shuffle selections
    #[arg(long = "shuffle-seed", value_name = "SEED")]
    shuffle_seed: Option<u64>,
    /// Scan once, print the selection for POLICY as JSON, and exit
    #[arg(long = "dry-run", value_name = "POLICY")]
    dry_run: Option<Policy>,
    /// Offset used with `--dry-run rotation`
    #[arg(long, value_name = "N", default_value_t = 0, allow_hyphen_values = true)]
    offset: i64,
    /// Freeze the scan instant at this RFC 3339 timestamp (dry-run only)
    #[arg(long, value_name = "RFC3339")]
    now: Option<String>,
    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    // RUST_LOG wins; -v only raises the default for this crate.
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("info")
            .add_directive(format!("event_gallery={level}").parse()?)
            .add_directive(format!("tower_http={level}").parse()?),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let Args {
        config,
        bind,
        shuffle_seed,
        dry_run,
        offset,
        now,
        verbose,
    } = Args::parse();
    init_tracing(verbose)?;

    let mut cfg = match &config {
        Some(path) => Configuration::from_yaml_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => Configuration::default(),
    };
    if let Some(addr) = bind {
        cfg.bind_address = addr;
    }
    if shuffle_seed.is_some() {
        cfg.shuffle_seed = shuffle_seed;
    }
    let cfg = cfg.validated().context("invalid configuration values")?;
    tracing::info!(
        "Loaded configuration from {}:\n{:#?}",
        config
            .as_deref()
            .map_or_else(|| "<defaults>".into(), |p| p.display().to_string()),
        cfg
    );

    if let Some(policy) = dry_run {
        let now = match now {
            Some(ts) => parse_rfc3339(&ts).context("failed to parse --now")?,
            None => SystemTime::now(),
        };
        return run_dry_run(&cfg, policy, offset, now).await;
    }

    let cancel = CancellationToken::new();
    spawn_shutdown_watcher(cancel.clone());

    let bind_addr = cfg.bind_address;
    web::serve(web::AppState::new(cfg), bind_addr, cancel).await
}

async fn run_dry_run(
    cfg: &Configuration,
    policy: Policy,
    offset: i64,
    now: SystemTime,
) -> Result<()> {
    tracing::info!(?policy, now = %format_rfc3339(now), "dry run");
    // A dry run is interactive, so scan failures are reported instead of masked.
    let records = scan::scan_directory(cfg, now)
        .await
        .with_context(|| format!("failed to scan {}", cfg.photo_library_path.display()))?;
    let picked = selection::preview(&records, cfg, policy, offset)?;
    let json = serde_json::to_string_pretty(&picked)?;
    println!("{json}");
    Ok(())
}

fn spawn_shutdown_watcher(cancel: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                std::future::pending::<()>().await;
            }
        };
        #[cfg(unix)]
        let terminate = async {
            match signal(SignalKind::terminate()) {
                Ok(mut term) => {
                    term.recv().await;
                }
                Err(err) => {
                    tracing::warn!("failed to register SIGTERM handler: {err}");
                    std::future::pending::<()>().await;
                }
            }
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => tracing::info!("ctrl-c received; initiating shutdown"),
            _ = terminate => tracing::info!("SIGTERM received; initiating shutdown"),
        }
        cancel.cancel();
    });
}
