//! Report reader for one K+K source
//!
//! Two-task architecture:
//! - ReadLoop: owns the source and issues every library call (spawn_blocking)
//! - SinkLoop: writes time-stamped lines to stdout or a file (async)
//!
//! Commands from other tasks reach the ReadLoop through a channel, so all
//! calls for the source are serialized on one thread.

use crate::common::{AppError, AppResult, ShutdownReceiver};
use crate::config::{Config, ConfigError, DebugConfig, TcpServerConfig};
use crate::kk::{
    Command, DecimalSeparator, ErrorCode, KkError, KkLibrary, LogType, NszCount, Report, Source,
};
use chrono::{DateTime, SecondsFormat, Utc};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Where lines come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feed {
    /// `Multi_GetReport` on an opened connection
    Reports,
    /// `Multi_GetTcpLog` from a K+K TCP server
    TcpLog {
        address: String,
        log_type: LogType,
        time_format: Option<String>,
    },
}

/// Reader configuration
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Required for [`Feed::Reports`]
    pub connection: Option<String>,
    pub blocking_io: bool,
    pub output_path: Option<String>,
    pub decimal_separator: DecimalSeparator,
    pub nsz: NszCount,
    pub command_limit: u32,
    pub send_7016: bool,
    /// Sent once after the feed is open
    pub commands: Vec<Command>,
    pub debug: DebugConfig,
    pub tcp_server: TcpServerConfig,
    pub feed: Feed,
    pub poll_interval: Duration,
    /// Output file; stdout if `None`
    pub output: Option<PathBuf>,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            connection: None,
            blocking_io: false,
            output_path: None,
            decimal_separator: DecimalSeparator::Point,
            nsz: NszCount::ONE,
            command_limit: 0,
            send_7016: false,
            commands: Vec::new(),
            debug: DebugConfig::default(),
            tcp_server: TcpServerConfig::default(),
            feed: Feed::Reports,
            poll_interval: Duration::from_millis(10),
            output: None,
        }
    }
}

impl ReaderConfig {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let feed = match &config.tcp_log {
            Some(tcp_log) => Feed::TcpLog {
                address: tcp_log.address.clone(),
                log_type: tcp_log.log_type()?,
                time_format: tcp_log.time_format.clone(),
            },
            None => Feed::Reports,
        };
        if feed == Feed::Reports && config.source.connection.is_none() {
            return Err(ConfigError::Invalid(
                "source.connection is required to read reports".to_string(),
            ));
        }

        Ok(Self {
            connection: config.source.connection.clone(),
            blocking_io: config.source.blocking_io,
            output_path: config.source.output_path.clone(),
            decimal_separator: config.source.decimal_separator()?,
            nsz: config.source.nsz()?,
            command_limit: config.source.command_limit,
            send_7016: config.source.send_7016,
            commands: config.source.commands()?,
            debug: config.debug.clone(),
            tcp_server: config.tcp_server.clone(),
            feed,
            poll_interval: config.reader.poll_interval(),
            output: config.reader.output.as_ref().map(PathBuf::from),
        })
    }
}

/// Metrics for monitoring
#[derive(Debug, Default)]
pub struct ReaderMetrics {
    /// Lines handed to the sink
    pub lines_read: AtomicU64,
    /// Lines cut to the library buffer size
    pub lines_truncated: AtomicU64,
    /// Failed read calls
    pub read_errors: AtomicU64,
    /// Commands accepted by the library
    pub commands_sent: AtomicU64,
}

/// Totals reported when the reader stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderSummary {
    pub lines_read: u64,
    pub lines_truncated: u64,
    pub read_errors: u64,
    pub commands_sent: u64,
}

impl ReaderMetrics {
    pub fn summary(&self) -> ReaderSummary {
        ReaderSummary {
            lines_read: self.lines_read.load(Ordering::Relaxed),
            lines_truncated: self.lines_truncated.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            commands_sent: self.commands_sent.load(Ordering::Relaxed),
        }
    }
}

/// One line received from the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLine {
    pub received: DateTime<Utc>,
    pub text: String,
    pub truncated: bool,
}

impl ReportLine {
    /// `<UTC timestamp>\t<text>`, with a trailing marker for truncated text
    pub fn format(&self) -> String {
        let stamp = self.received.to_rfc3339_opts(SecondsFormat::Millis, true);
        if self.truncated {
            format!("{}\t{}\t[truncated]", stamp, self.text)
        } else {
            format!("{}\t{}", stamp, self.text)
        }
    }
}

/// Longest sleep between polls while the same read error repeats
const MAX_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Tracks a run of identical read errors
///
/// The first error of a run is logged; repeats are logged only when their
/// count reaches a power of two. The poll delay doubles per repeat up to
/// [`MAX_ERROR_BACKOFF`].
#[derive(Debug, Default)]
struct ErrorBackoff {
    code: Option<ErrorCode>,
    repeats: u32,
}

impl ErrorBackoff {
    /// Count one failure; returns true if it should be logged
    fn record(&mut self, code: Option<ErrorCode>) -> bool {
        if self.repeats > 0 && self.code == code {
            self.repeats = self.repeats.saturating_add(1);
        } else {
            self.code = code;
            self.repeats = 1;
        }
        self.repeats.is_power_of_two()
    }

    fn delay(&self, base: Duration) -> Duration {
        let shift = self.repeats.saturating_sub(1).min(16);
        base.saturating_mul(1u32 << shift).min(MAX_ERROR_BACKOFF.max(base))
    }

    fn reset(&mut self) {
        self.code = None;
        self.repeats = 0;
    }
}

/// Source state the ReadLoop has to undo on exit
struct Session<'lib> {
    source: Source<'lib>,
    feed_open: bool,
    tcp_log: bool,
    server_started: bool,
    debug_open: bool,
}

impl<'lib> Session<'lib> {
    fn new(source: Source<'lib>, feed: &Feed) -> Self {
        Self {
            source,
            feed_open: false,
            tcp_log: matches!(feed, Feed::TcpLog { .. }),
            server_started: false,
            debug_open: false,
        }
    }

    /// Apply settings, open the feed and send the start-up commands
    fn configure(&mut self, config: &ReaderConfig, metrics: &ReaderMetrics) -> Result<(), KkError> {
        if let Some(path) = &config.output_path {
            self.source.set_output_path(path)?;
        }

        let debug = &config.debug;
        self.source
            .set_debug_flags(debug.report_log, debug.low_level_log)?;
        self.source
            .set_debug_log_limit(debug.log_type, debug.log_size)?;
        if debug.enabled {
            self.source.set_debug(true, debug.dbg_id.as_deref())?;
            self.debug_open = true;
            if let Some(file) = self.source.debug_filename()? {
                info!(file = %file, "Library debug log open");
            }
        }

        self.source.set_decimal_separator(config.decimal_separator)?;
        self.source.set_nsz(config.nsz)?;
        self.source.set_command_limit(config.command_limit)?;
        self.source.set_send_7016(config.send_7016)?;

        match &config.feed {
            Feed::Reports => {
                let connection = config.connection.as_deref().ok_or_else(|| {
                    KkError::invalid_argument("no connection configured for report feed")
                })?;
                self.source.open_connection(connection, config.blocking_io)?;
                info!(source = %self.source.id(), connection, "Connection open");
            }
            Feed::TcpLog {
                address,
                log_type,
                time_format,
            } => {
                match time_format {
                    Some(format) => self.source.open_tcp_log_time(address, *log_type, format)?,
                    None => self.source.open_tcp_log(address, *log_type)?,
                }
                info!(source = %self.source.id(), address = %address, %log_type, "TCP log open");
            }
        }
        self.feed_open = true;

        if config.tcp_server.enabled {
            let port = self.source.start_tcp_server(config.tcp_server.port)?;
            self.server_started = true;
            info!(port, "Local TCP server listening");
        }

        for command in &config.commands {
            self.send(*command, metrics);
        }
        Ok(())
    }

    fn send(&self, command: Command, metrics: &ReaderMetrics) {
        match self.source.send(command) {
            Ok(()) => {
                metrics.commands_sent.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => warn!(%command, error = %e, "Command rejected"),
        }
    }

    fn poll(&self) -> Result<Report, KkError> {
        if self.tcp_log {
            self.source.get_tcp_log()
        } else {
            self.source.get_report()
        }
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if self.server_started {
            if let Err(e) = self.source.stop_tcp_server() {
                warn!(error = %e, "Failed to stop local TCP server");
            }
        }
        if self.feed_open {
            if self.tcp_log {
                self.source.close_tcp_log();
            } else {
                self.source.close_connection();
            }
            debug!(source = %self.source.id(), "Feed closed");
        }
        if self.debug_open {
            if let Err(e) = self.source.set_debug(false, None) {
                warn!(error = %e, "Failed to close library debug log");
            }
        }
    }
}

/// Reader for one K+K source
pub struct Reader {
    config: ReaderConfig,
    library: Arc<KkLibrary>,
    metrics: Arc<ReaderMetrics>,
    command_tx: mpsc::UnboundedSender<Command>,
    command_rx: mpsc::UnboundedReceiver<Command>,
}

impl Reader {
    pub fn new(config: ReaderConfig, library: Arc<KkLibrary>) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        Self {
            config,
            library,
            metrics: Arc::new(ReaderMetrics::default()),
            command_tx,
            command_rx,
        }
    }

    pub fn metrics(&self) -> &Arc<ReaderMetrics> {
        &self.metrics
    }

    /// Queue commands for the source while the reader runs
    pub fn command_sender(&self) -> mpsc::UnboundedSender<Command> {
        self.command_tx.clone()
    }

    /// ReadLoop task - runs in spawn_blocking, owns every call for the source
    fn read_loop(
        library: Arc<KkLibrary>,
        config: ReaderConfig,
        tx: mpsc::UnboundedSender<ReportLine>,
        mut commands: mpsc::UnboundedReceiver<Command>,
        metrics: Arc<ReaderMetrics>,
        shutdown: Arc<AtomicBool>,
    ) -> Result<(), KkError> {
        let source = library.create_source();
        info!(source = %source.id(), "ReadLoop starting");

        let mut session = Session::new(source, &config.feed);
        session.configure(&config, &metrics)?;
        let mut backoff = ErrorBackoff::default();

        loop {
            if shutdown.load(Ordering::Relaxed) {
                info!("ReadLoop received shutdown signal");
                break;
            }

            while let Ok(command) = commands.try_recv() {
                session.send(command, &metrics);
            }

            match session.poll() {
                Ok(Report {
                    text: Some(text),
                    truncated,
                }) => {
                    backoff.reset();
                    metrics.lines_read.fetch_add(1, Ordering::Relaxed);
                    if truncated {
                        metrics.lines_truncated.fetch_add(1, Ordering::Relaxed);
                    }
                    let line = ReportLine {
                        received: Utc::now(),
                        text,
                        truncated,
                    };
                    if tx.send(line).is_err() {
                        warn!("Sink channel closed, stopping read loop");
                        break;
                    }
                }
                Ok(Report { text: None, .. }) => {
                    backoff.reset();
                    std::thread::sleep(config.poll_interval);
                }
                Err(e) => {
                    metrics.read_errors.fetch_add(1, Ordering::Relaxed);
                    match e.code() {
                        // Source ID rejected or device connection closed by the library
                        Some(ErrorCode::ParamError) | Some(ErrorCode::HardwareFault) => {
                            error!(error = %e, "Fatal read error, stopping");
                            return Err(e);
                        }
                        Some(ErrorCode::Reconnected) | Some(ErrorCode::BufferOverflow) => {
                            backoff.reset();
                            warn!(error = %e, "Read warning");
                        }
                        code => {
                            if backoff.record(code) {
                                error!(error = %e, repeats = backoff.repeats, "Read error");
                            } else {
                                debug!(error = %e, repeats = backoff.repeats, "Read error repeated");
                            }
                            std::thread::sleep(backoff.delay(config.poll_interval));
                        }
                    }
                }
            }
        }

        info!("ReadLoop stopped");
        Ok(())
    }

    /// SinkLoop task - writes lines until the ReadLoop drops its sender
    async fn sink_loop<W>(
        mut rx: mpsc::UnboundedReceiver<ReportLine>,
        writer: W,
    ) -> std::io::Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        let mut writer = BufWriter::new(writer);
        let mut written = 0u64;

        while let Some(line) = rx.recv().await {
            writer.write_all(line.format().as_bytes()).await?;
            writer.write_all(b"\n").await?;
            written += 1;

            // Flush once the backlog is drained
            while let Ok(line) = rx.try_recv() {
                writer.write_all(line.format().as_bytes()).await?;
                writer.write_all(b"\n").await?;
                written += 1;
            }
            writer.flush().await?;
        }

        writer.flush().await?;
        debug!(lines = written, "SinkLoop stopped");
        Ok(written)
    }

    async fn open_output(
        path: Option<&Path>,
    ) -> std::io::Result<Box<dyn AsyncWrite + Unpin + Send>> {
        match path {
            Some(path) => {
                let file = tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .await?;
                info!(path = %path.display(), "Writing lines to file");
                Ok(Box::new(file))
            }
            None => Ok(Box::new(tokio::io::stdout())),
        }
    }

    /// Run until shutdown or until the ReadLoop fails
    pub async fn run(self, mut shutdown: ShutdownReceiver) -> AppResult<ReaderSummary> {
        let Reader {
            config,
            library,
            metrics,
            command_tx,
            command_rx,
        } = self;
        // Only senders handed out by command_sender() feed the ReadLoop
        drop(command_tx);

        let writer = Self::open_output(config.output.as_deref()).await?;
        let (line_tx, line_rx) = mpsc::unbounded_channel::<ReportLine>();
        let sink_handle = tokio::spawn(Self::sink_loop(line_rx, writer));

        // Shutdown flag for ReadLoop (it runs in spawn_blocking, can't use async channel)
        let read_shutdown = Arc::new(AtomicBool::new(false));
        let read_shutdown_clone = read_shutdown.clone();
        let read_metrics = metrics.clone();
        let mut read_handle = tokio::task::spawn_blocking(move || {
            Self::read_loop(
                library,
                config,
                line_tx,
                command_rx,
                read_metrics,
                read_shutdown_clone,
            )
        });

        let read_result = tokio::select! {
            _ = shutdown.recv() => {
                info!("Reader received shutdown signal");
                read_shutdown.store(true, Ordering::Relaxed);
                (&mut read_handle).await
            }
            result = &mut read_handle => result,
        };

        let sink_result = sink_handle.await;

        read_result.map_err(|e| AppError::Task(e.to_string()))??;
        sink_result.map_err(|e| AppError::Task(e.to_string()))??;

        let summary = metrics.summary();
        info!(
            lines = summary.lines_read,
            truncated = summary.lines_truncated,
            errors = summary.read_errors,
            commands = summary.commands_sent,
            "Reader stopped"
        );
        Ok(summary)
    }
}
