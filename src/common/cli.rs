//! CLI argument parsing for kklib-rs binaries
//!
//! Shared arguments are embedded with `#[command(flatten)]`.

use clap::Parser;

/// Arguments shared by every binary
#[derive(Parser, Debug, Clone)]
pub struct LibraryArgs {
    /// Path to the vendor library (platform default name if omitted)
    #[arg(short = 'l', long = "library", env = "KK_LIBRARY")]
    pub library: Option<String>,
}

/// Arguments for kk_info (library and device inspection)
#[derive(Parser, Debug, Clone)]
#[command(name = "kk_info", about = "Show KK Library version, host info and devices")]
pub struct InfoArgs {
    #[command(flatten)]
    pub library: LibraryArgs,

    /// Device enumeration: 1 = serial ports, 2 = USB, 3 = both
    #[arg(short = 'e', long = "enum-flags", default_value_t = 3)]
    pub enum_flags: u8,

    /// Open this connection and print device details
    #[arg(short = 'c', long = "connection")]
    pub connection: Option<String>,

    /// Open the connection in blocking I/O mode
    #[arg(long)]
    pub blocking: bool,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

/// Arguments for kk_reader (report pump)
#[derive(Parser, Debug, Clone)]
#[command(name = "kk_reader", about = "Read reports from a K+K source")]
pub struct ReaderArgs {
    /// Path to configuration file
    #[arg(short = 'f', long = "config", default_value = "kk.toml")]
    pub config_file: String,

    #[command(flatten)]
    pub library: LibraryArgs,

    /// Override source.connection
    #[arg(short = 'c', long = "connection")]
    pub connection: Option<String>,

    /// Override reader.output
    #[arg(short = 'o', long = "output")]
    pub output: Option<String>,

    /// Read LOG entries from this K+K TCP server (ip:port) instead of reports
    #[arg(long = "tcp-log")]
    pub tcp_log: Option<String>,

    /// LOG type for --tcp-log (e.g. FREQLOG)
    #[arg(long = "log-type", requires = "tcp_log")]
    pub log_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_args_default() {
        let args = InfoArgs::try_parse_from(["test"]).unwrap();
        assert_eq!(args.enum_flags, 3);
        assert_eq!(args.connection, None);
        assert!(!args.blocking);
        assert!(!args.json);
    }

    #[test]
    fn test_info_args_full() {
        let args = InfoArgs::try_parse_from([
            "test",
            "--library",
            "/opt/kk/lib.so",
            "-e",
            "2",
            "-c",
            "COM3",
            "--blocking",
            "--json",
        ])
        .unwrap();
        assert_eq!(args.library.library.as_deref(), Some("/opt/kk/lib.so"));
        assert_eq!(args.enum_flags, 2);
        assert_eq!(args.connection.as_deref(), Some("COM3"));
        assert!(args.blocking);
        assert!(args.json);
    }

    #[test]
    fn test_reader_args_default() {
        let args = ReaderArgs::try_parse_from(["test"]).unwrap();
        assert_eq!(args.config_file, "kk.toml");
        assert_eq!(args.connection, None);
        assert_eq!(args.output, None);
        assert_eq!(args.tcp_log, None);
    }

    #[test]
    fn test_reader_args_full() {
        let args = ReaderArgs::try_parse_from([
            "test",
            "-f",
            "bench.toml",
            "-c",
            "10.0.0.2:1234",
            "-o",
            "out.txt",
            "--tcp-log",
            "10.0.0.5:1234",
            "--log-type",
            "PHASELOG",
        ])
        .unwrap();
        assert_eq!(args.config_file, "bench.toml");
        assert_eq!(args.connection.as_deref(), Some("10.0.0.2:1234"));
        assert_eq!(args.output.as_deref(), Some("out.txt"));
        assert_eq!(args.tcp_log.as_deref(), Some("10.0.0.5:1234"));
        assert_eq!(args.log_type.as_deref(), Some("PHASELOG"));
    }

    #[test]
    fn test_reader_log_type_requires_tcp_log() {
        assert!(ReaderArgs::try_parse_from(["test", "--log-type", "FREQLOG"]).is_err());
    }
}
