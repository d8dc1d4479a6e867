use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use peerclock_time::{
    AdjustedClock, SystemClock, TimeConfig, TimeData, TimeDataStatus, WallClock, WarningRegistry,
};
use serde::Serialize;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod handshake;
mod version;

use handshake::parse_line;
use version::{git_commit_hash, PEERCLOCK_VERSION};

/// Node settings resolved from file, environment and command line.
#[derive(Debug, Clone)]
struct AppConfig {
    config_path: Option<PathBuf>,
    time: TimeConfig,
    log_level: String,
    log_format: String,
}

impl AppConfig {
    fn load(matches: &ArgMatches) -> Result<Self> {
        let config_path = match matches.get_one::<String>("config") {
            Some(path) => {
                let path = PathBuf::from(path);
                if !path.exists() {
                    anyhow::bail!(
                        "Configuration file {} not found (specified via --config)",
                        path.display()
                    );
                }
                Some(path)
            }
            None => None,
        };

        let mut time = TimeConfig::load(config_path.as_deref())
            .context("failed to load time configuration")?;
        if let Some(max) = matches.get_one::<i64>("max-time-adjustment") {
            time.max_time_adjustment = *max;
        }

        let log_level = matches
            .get_one::<String>("log-level")
            .cloned()
            .unwrap_or_else(|| "info".to_string());
        let log_format = matches
            .get_one::<String>("log-format")
            .cloned()
            .unwrap_or_else(|| "pretty".to_string());

        Ok(Self {
            config_path,
            time,
            log_level,
            log_format,
        })
    }
}

/// Printed on shutdown.
#[derive(Debug, Serialize)]
struct NodeReport {
    version: &'static str,
    threshold: i64,
    #[serde(flatten)]
    status: TimeDataStatus,
    adjusted_time: i64,
    warning: Option<String>,
}

fn build_cli() -> Command {
    Command::new("peerclock-node")
        .version(PEERCLOCK_VERSION)
        .about("Tracks the local clock offset from peer handshake times")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path (TOML)"),
        )
        .arg(
            Arg::new("max-time-adjustment")
                .long("max-time-adjustment")
                .value_name("SECS")
                .value_parser(value_parser!(i64))
                .allow_negative_numbers(true)
                .help("Largest peer-derived offset accepted, in seconds (negative disables)"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .default_value("info")
                .help("Log level when RUST_LOG is unset"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .value_parser(["pretty", "json"])
                .default_value("pretty")
                .help("Log output format"),
        )
        .arg(
            Arg::new("quiet-report")
                .long("quiet-report")
                .action(ArgAction::SetTrue)
                .help("Do not print the JSON report on shutdown"),
        )
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    Ok(())
}

fn handle_line<C: SystemClock>(time_data: &TimeData<IpAddr>, clock: &C, line: &str) {
    match parse_line(line) {
        Ok(Some(record)) => {
            let sample = time_data.ingest_peer_time(record.peer, record.peer_time, clock);
            debug!(peer = %record.peer, sample, "handshake time received");
        }
        Ok(None) => {}
        Err(err) => warn!("skipping handshake record: {err}"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_cli().get_matches();
    let config = AppConfig::load(&matches)?;
    init_logging(&config)?;

    info!(
        "Starting peerclock node {} ({})",
        PEERCLOCK_VERSION,
        git_commit_hash()
    );
    if let Some(path) = &config.config_path {
        info!("Using configuration file {}", path.display());
    }
    info!("Maximum time adjustment: {} s", config.time.threshold());

    let warnings = Arc::new(WarningRegistry::new());
    let time_data: TimeData<IpAddr> = TimeData::new(config.time, warnings.clone())?;
    let clock = WallClock;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line.context("failed to read handshake feed")? {
                    Some(line) => handle_line(&time_data, &clock, &line),
                    None => {
                        info!("Handshake feed closed");
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down peerclock node");
                break;
            }
        }
    }

    let adjusted = AdjustedClock::new(&clock, &time_data);
    let report = NodeReport {
        version: PEERCLOCK_VERSION,
        threshold: time_data.threshold(),
        status: time_data.status(),
        adjusted_time: adjusted.adjusted_time(),
        warning: warnings.misc_warning(),
    };
    info!(
        "Time offset {:+} s, adjusted time {}",
        report.status.offset, report.adjusted_time
    );

    if !matches.get_flag("quiet-report") {
        let json = serde_json::to_string_pretty(&report).context("failed to encode report")?;
        println!("{json}");
    }

    Ok(())
}
