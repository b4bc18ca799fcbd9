//! kk_reader - pump reports from one K+K source to stdout or a file
//!
//! Usage:
//!   kk_reader -f kk.toml
//!   kk_reader -f kk.toml --connection COM3 --output reports.txt
//!   kk_reader --tcp-log 192.168.1.10:1234 --log-type PHASELOG

use clap::Parser;
use kklib_rs::common::cli::ReaderArgs;
use kklib_rs::common::{init_tracing, setup_shutdown};
use kklib_rs::config::{Config, TcpLogConfig};
use kklib_rs::kk::{KkLibrary, LogType};
use kklib_rs::reader::{Reader, ReaderConfig};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;
    let args = ReaderArgs::parse();

    let mut config = if Path::new(&args.config_file).exists() {
        Config::load(&args.config_file)?
    } else {
        info!(file = %args.config_file, "Config file not found, using defaults");
        Config::default()
    };

    // Command line overrides
    if args.library.library.is_some() {
        config.library.path = args.library.library.clone();
    }
    if args.connection.is_some() {
        config.source.connection = args.connection.clone();
    }
    if args.output.is_some() {
        config.reader.output = args.output.clone();
    }
    if let Some(address) = &args.tcp_log {
        config.tcp_log = Some(tcp_log_override(
            config.tcp_log.take(),
            address,
            args.log_type.as_deref(),
        ));
    }
    config.validate()?;

    let library = match &config.library.path {
        Some(path) => KkLibrary::open(path)?,
        None => KkLibrary::open_default()?,
    };
    let version = library.require_version(config.library.min_version()?)?;
    info!(%version, "Library version accepted");

    let reader_config = ReaderConfig::from_config(&config)?;
    let reader = Reader::new(reader_config, Arc::new(library));

    let (_shutdown_tx, shutdown_rx) = setup_shutdown();
    let summary = reader.run(shutdown_rx).await?;

    info!(
        lines = summary.lines_read,
        errors = summary.read_errors,
        "kk_reader finished"
    );
    Ok(())
}

/// `--tcp-log`/`--log-type` on top of the `[tcp_log]` section
///
/// The log type falls back to the configured one, then to FREQLOG; the time
/// format always comes from the config file.
fn tcp_log_override(
    configured: Option<TcpLogConfig>,
    address: &str,
    log_type: Option<&str>,
) -> TcpLogConfig {
    let (configured_type, time_format) = match configured {
        Some(tcp_log) => (Some(tcp_log.log_type), tcp_log.time_format),
        None => (None, None),
    };
    TcpLogConfig {
        address: address.to_string(),
        log_type: log_type
            .map(str::to_string)
            .or(configured_type)
            .unwrap_or_else(|| LogType::Freq.name().to_string()),
        time_format,
    }
}
