//! Interpreted access to one KK Library source
//!
//! `Source` forwards every call through [`KkLibrary`] exactly once and maps
//! the raw return value onto `Result` following the vendor's documented
//! conventions. Arguments the library would reject are validated up front.

use super::commands::Command;
use super::error::{codes, ErrorCode, KkError};
use super::fhr::{FhrSettings, MAX_CHANNELS};
use super::library::{BufferReply, KkLibrary};
use super::types::{
    DebugLogType, DecimalSeparator, DeviceStartState, EnumFlags, HostInfo, LogType, NszCount,
    Report, SourceId,
};
use tracing::{debug, warn};

/// Interpreted API for one source ID
#[derive(Debug, Clone)]
pub struct Source<'lib> {
    lib: &'lib KkLibrary,
    id: SourceId,
    separator: DecimalSeparator,
}

impl<'lib> Source<'lib> {
    pub fn new(lib: &'lib KkLibrary, id: SourceId) -> Self {
        Self {
            lib,
            id,
            separator: DecimalSeparator::default(),
        }
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn library(&self) -> &'lib KkLibrary {
        self.lib
    }

    /// Separator last set through [`Source::set_decimal_separator`]
    pub fn decimal_separator(&self) -> DecimalSeparator {
        self.separator
    }

    fn invalid_source(&self, raw: i32) -> KkError {
        KkError::status(
            ErrorCode::ParamError,
            raw,
            Some(format!("Invalid parameter source_id: {}", self.id)),
        )
    }

    /// Check the common "10 means unknown source" convention
    fn check_source(&self, raw: i32) -> Result<(), KkError> {
        if raw == codes::INVALID_SOURCE {
            Err(self.invalid_source(raw))
        } else {
            Ok(())
        }
    }

    /// Map a returned error text: "Source-ID ..." is a parameter error
    fn text_error(raw: i32, text: String, otherwise: ErrorCode) -> KkError {
        let code = if text.starts_with(codes::SOURCE_NOT_FOUND_PREFIX) {
            ErrorCode::ParamError
        } else {
            otherwise
        };
        KkError::status(code, raw, Some(text))
    }

    // -------------------------------------------------------------------
    // Enumeration
    // -------------------------------------------------------------------

    /// Serial ports and/or USB device names; empty if none were found
    pub fn enumerate_devices(&self, flags: EnumFlags) -> Result<Vec<String>, KkError> {
        enumerate_devices(self.lib, flags)
    }

    /// Local host name and IPv4 addresses
    pub fn host_and_ips(&self) -> Result<HostInfo, KkError> {
        host_and_ips(self.lib)
    }

    // -------------------------------------------------------------------
    // Paths and debug log
    // -------------------------------------------------------------------

    pub fn output_path(&self) -> Result<String, KkError> {
        let text = self.lib.get_output_path(self.id).unwrap_or_default();
        if text.starts_with(codes::SOURCE_NOT_FOUND_PREFIX) {
            return Err(KkError::status(ErrorCode::ParamError, 0, Some(text)));
        }
        Ok(text)
    }

    pub fn set_output_path(&self, path: &str) -> Result<(), KkError> {
        match self.lib.set_output_path(self.id, path)? {
            None => Ok(()),
            Some(text) => Err(Self::text_error(0, text, ErrorCode::Err)),
        }
    }

    /// Open (`on`) or close the library debug log; `dbg_id` becomes part of the file name
    pub fn set_debug(&self, on: bool, dbg_id: Option<&str>) -> Result<(), KkError> {
        match self.lib.debug(self.id, on, dbg_id)? {
            None => Ok(()),
            Some(text) => Err(Self::text_error(0, text, ErrorCode::Err)),
        }
    }

    /// Current debug log file name, `None` if no log is open
    pub fn debug_filename(&self) -> Result<Option<String>, KkError> {
        match self.lib.debug_get_filename(self.id) {
            Some(text) if text.starts_with(codes::SOURCE_NOT_FOUND_PREFIX) => {
                Err(KkError::status(ErrorCode::ParamError, 0, Some(text)))
            }
            other => Ok(other),
        }
    }

    pub fn set_debug_flags(&self, report_log: bool, low_level_log: bool) -> Result<(), KkError> {
        self.check_source(self.lib.debug_flags(self.id, report_log, low_level_log))
    }

    /// `size` is ignored by the library for [`DebugLogType::Unlimited`]
    pub fn set_debug_log_limit(&self, log_type: DebugLogType, size: u32) -> Result<(), KkError> {
        self.check_source(self.lib.debug_log_limit(self.id, log_type.as_u8(), size))
    }

    // -------------------------------------------------------------------
    // Info queries
    // -------------------------------------------------------------------

    /// Bytes in the receive buffer not read yet
    pub fn buffer_amount(&self) -> i32 {
        self.lib.get_buffer_amount(self.id)
    }

    /// Bytes in the device transmit buffer not sent yet
    pub fn transmit_buffer_amount(&self) -> i32 {
        self.lib.get_transmit_buffer_amount(self.id)
    }

    /// User ID (1..4) assigned by the device, `None` on error
    pub fn user_id(&self) -> Option<u8> {
        match self.lib.get_user_id(self.id) {
            codes::USER_ID_ERROR => None,
            id => Some(id),
        }
    }

    pub fn is_file_device(&self) -> bool {
        self.lib.is_file_device(self.id)
    }

    pub fn is_serial_device(&self) -> bool {
        self.lib.is_serial_device(self.id)
    }

    pub fn firmware_version(&self) -> i32 {
        self.lib.get_firmware_version(self.id)
    }

    pub fn has_fram(&self) -> bool {
        self.lib.has_fram(self.id)
    }

    pub fn device_start_state(&self) -> DeviceStartState {
        DeviceStartState::from_raw(self.lib.get_device_start_state(self.id))
    }

    // -------------------------------------------------------------------
    // Calibration / FHR
    // -------------------------------------------------------------------

    /// Map the shared result convention of the "set data" calls
    fn check_set_data(&self, raw: i32, min_firmware: u32) -> Result<(), KkError> {
        match raw {
            codes::FAILED => {
                let message = if self.is_serial_device() {
                    "Serial connection not supported"
                } else {
                    "Conversion error, set decimal separator!"
                };
                Err(KkError::status(ErrorCode::Err, raw, Some(message.to_string())))
            }
            codes::INVALID_SOURCE => Err(self.invalid_source(raw)),
            codes::NOT_SUPPORTED => Err(KkError::status(
                ErrorCode::NotSupported,
                raw,
                Some(format!(
                    "Feature not supported, needs firmware version {} or higher",
                    min_firmware
                )),
            )),
            _ => Ok(()),
        }
    }

    /// Write NSZ calibration values (ns, one per channel)
    ///
    /// Values are formatted with three decimals and the current separator.
    /// Needs firmware 62 or higher; not supported on serial connections.
    pub fn set_nsz_calibration_data(&self, values: &[f64]) -> Result<(), KkError> {
        if values.is_empty() {
            return Err(KkError::param("Parameter calib_data missing"));
        }
        if values.len() > MAX_CHANNELS {
            return Err(KkError::param(
                "Invalid parameter calib_data: too many channels",
            ));
        }
        let data = values
            .iter()
            .map(|v| self.separator.format_fixed3(*v))
            .collect::<Vec<_>>()
            .join(";");
        let raw = self.lib.set_nsz_calibration_data(self.id, &data)?;
        self.check_set_data(raw, 62)
    }

    /// Ask the device for its FHR settings (answered with a 0x7902 report)
    pub fn request_fhr_settings(&self) -> Result<(), KkError> {
        match self.lib.read_fhr_data(self.id) {
            codes::FAILED => Err(KkError::status(
                ErrorCode::Err,
                codes::FAILED,
                Some("Command failed".to_string()),
            )),
            codes::INVALID_SOURCE => Err(self.invalid_source(codes::INVALID_SOURCE)),
            codes::NOT_SUPPORTED => Err(KkError::status(
                ErrorCode::NotSupported,
                codes::NOT_SUPPORTED,
                Some("Feature not supported, needs firmware version 67 or higher".to_string()),
            )),
            _ => Ok(()),
        }
    }

    /// Write FHR settings; needs firmware 67 or higher
    pub fn set_fhr_settings(&self, settings: &FhrSettings) -> Result<(), KkError> {
        let raw = self.lib.set_fhr_data(self.id, &settings.to_string())?;
        self.check_set_data(raw, 67)
    }

    // -------------------------------------------------------------------
    // Connection
    // -------------------------------------------------------------------

    /// Open a connection (device, K+K server or file); closes any previous one
    pub fn open_connection(&self, connection: &str, blocking_io: bool) -> Result<(), KkError> {
        debug!(source = %self.id, connection, blocking_io, "Opening connection");
        let reply = self.lib.open_connection(self.id, connection, blocking_io)?;
        if reply.status == codes::OK {
            return Ok(());
        }
        let code = if reply.status == codes::INVALID_SOURCE {
            ErrorCode::ParamError
        } else {
            ErrorCode::Err
        };
        Err(KkError::status(code, reply.status, reply.text))
    }

    pub fn close_connection(&self) {
        debug!(source = %self.id, "Closing connection");
        self.lib.close_connection(self.id);
    }

    // -------------------------------------------------------------------
    // Reports
    // -------------------------------------------------------------------

    /// Set the separator the library uses for float conversion
    ///
    /// Also used for formatting calibration values sent by this `Source`.
    pub fn set_decimal_separator(&mut self, separator: DecimalSeparator) -> Result<(), KkError> {
        let raw = self
            .lib
            .set_decimal_separator(self.id, separator.as_char() as u8);
        self.check_source(raw)?;
        self.separator = separator;
        Ok(())
    }

    pub fn set_nsz(&self, nsz: NszCount) -> Result<(), KkError> {
        self.check_source(self.lib.set_nsz(self.id, nsz.get()))
    }

    /// Switch 100 ms timestamps from report 7000 (default) to report 7016
    pub fn set_send_7016(&self, value: bool) -> Result<(), KkError> {
        self.check_source(self.lib.set_send_7016(self.id, value))
    }

    /// Next report from the current connection
    pub fn get_report(&self) -> Result<Report, KkError> {
        let BufferReply { status, text } = self.lib.get_report(self.id);
        let code = match status {
            codes::BUFFER_TOO_SMALL => return Ok(Report { text, truncated: true }),
            codes::FAILED => ErrorCode::Err,
            codes::WRITE_FAILED => ErrorCode::Write,
            codes::SERVER_DOWN => ErrorCode::ServerDown,
            codes::NOT_CONNECTED => ErrorCode::DeviceNotConnected,
            codes::BUFFER_OVERFLOW => ErrorCode::BufferOverflow,
            codes::HARDWARE_FAULT => ErrorCode::HardwareFault,
            codes::INVALID_SOURCE => ErrorCode::ParamError,
            codes::RECONNECTED => ErrorCode::Reconnected,
            _ => return Ok(Report { text, truncated: false }),
        };
        Err(KkError::status(code, status, text))
    }

    // -------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------

    /// Commands queued but not yet sent
    pub fn pending_commands(&self) -> u32 {
        self.lib.get_pending_cmds_count(self.id)
    }

    /// Limit the command waiting queue; 0 means unlimited
    pub fn set_command_limit(&self, limit: u32) -> Result<(), KkError> {
        self.check_source(self.lib.set_command_limit(self.id, limit))
    }

    /// Map the shared convention of call-style functions (1 = success)
    fn check_call(reply: BufferReply) -> Result<(), KkError> {
        let code = match reply.status {
            codes::OK => return Ok(()),
            codes::INVALID_SOURCE => ErrorCode::ParamError,
            codes::CMD_IGNORED => ErrorCode::CmdIgnored,
            _ => ErrorCode::Err,
        };
        Err(KkError::status(code, reply.status, reply.text))
    }

    /// Queue raw command bytes; rejected without connection or when the queue is full
    pub fn send_command(&self, command: &[u8]) -> Result<(), KkError> {
        if command.is_empty() {
            return Err(KkError::param("Invalid parameter command: empty"));
        }
        Self::check_call(self.lib.send_command(self.id, command)?)
    }

    /// Queue one command from the card's command table
    pub fn send(&self, command: Command) -> Result<(), KkError> {
        debug!(source = %self.id, %command, "Sending command");
        self.send_command(&command.to_bytes())
    }

    pub fn remote_login(&self, password: u32) -> Result<(), KkError> {
        Self::check_call(self.lib.remote_login(self.id, password))
    }

    // -------------------------------------------------------------------
    // Local TCP server
    // -------------------------------------------------------------------

    fn check_tcp_server(&self, raw: i32) -> Result<(), KkError> {
        match raw {
            codes::INVALID_SOURCE => Err(self.invalid_source(raw)),
            codes::FAILED => Err(KkError::status(
                ErrorCode::Err,
                raw,
                self.lib.get_tcp_server_error(self.id),
            )),
            _ => Ok(()),
        }
    }

    /// Start the local TCP server; port 0 lets the system choose
    ///
    /// Returns the port the server listens on.
    pub fn start_tcp_server(&self, port: u16) -> Result<u16, KkError> {
        let (raw, port) = self.lib.start_tcp_server(self.id, port);
        self.check_tcp_server(raw)?;
        debug!(source = %self.id, port, "Local TCP server started");
        Ok(port)
    }

    /// Stop the local TCP server, disconnecting all clients
    pub fn stop_tcp_server(&self) -> Result<(), KkError> {
        self.check_tcp_server(self.lib.stop_tcp_server(self.id))?;
        debug!(source = %self.id, "Local TCP server stopped");
        Ok(())
    }

    /// Pass a LOG level entry to clients of the local TCP server
    ///
    /// The library ignores the call if the source has no server.
    pub fn report_tcp_log(&self, data: &str, log_type: LogType) -> Result<(), KkError> {
        self.lib.tcp_report_log(self.id, data, log_type.as_i32())
    }

    // -------------------------------------------------------------------
    // TCP log client
    // -------------------------------------------------------------------

    fn check_open_log(reply: BufferReply) -> Result<(), KkError> {
        if reply.status == codes::OK {
            return Ok(());
        }
        let text = reply.text.unwrap_or_default();
        Err(Self::text_error(reply.status, text, ErrorCode::Err))
    }

    /// Connect to a K+K TCP server (`ip:port`) for LOG level entries
    pub fn open_tcp_log(&self, ip_port: &str, mode: LogType) -> Result<(), KkError> {
        debug!(source = %self.id, ip_port, %mode, "Opening TCP log");
        Self::check_open_log(self.lib.open_tcp_log(self.id, ip_port, mode.name())?)
    }

    /// Like [`Source::open_tcp_log`], with a UTC time stamp format (e.g. `YYYYMMDD HH:NN:SS.ZZZ`)
    pub fn open_tcp_log_time(&self, ip_port: &str, mode: LogType, format: &str) -> Result<(), KkError> {
        debug!(source = %self.id, ip_port, %mode, format, "Opening TCP log with time stamps");
        Self::check_open_log(
            self.lib
                .open_tcp_log_time(self.id, ip_port, mode.name(), format)?,
        )
    }

    /// Connect by numeric log type, with an optional time stamp format
    pub fn open_tcp_log_type(
        &self,
        ip_port: &str,
        log_type: LogType,
        format: Option<&str>,
    ) -> Result<(), KkError> {
        debug!(source = %self.id, ip_port, %log_type, "Opening TCP log by type");
        Self::check_open_log(
            self.lib
                .open_tcp_log_type(self.id, ip_port, log_type.as_i32(), format)?,
        )
    }

    pub fn close_tcp_log(&self) {
        debug!(source = %self.id, "Closing TCP log");
        self.lib.close_tcp_log(self.id);
    }

    /// Next LOG level entry received from the K+K TCP server
    pub fn get_tcp_log(&self) -> Result<Report, KkError> {
        let BufferReply { status, text } = self.lib.get_tcp_log(self.id);
        let code = match status {
            codes::BUFFER_TOO_SMALL => return Ok(Report { text, truncated: true }),
            codes::INVALID_SOURCE => ErrorCode::ParamError,
            codes::SERVER_DOWN => ErrorCode::ServerDown,
            codes::BUFFER_OVERFLOW => ErrorCode::BufferOverflow,
            _ => return Ok(Report { text, truncated: false }),
        };
        Err(KkError::status(code, status, text))
    }

    /// Send `data` to the connected TCP server and return its response
    pub fn send_tcp_data(&self, data: &str) -> Result<Option<String>, KkError> {
        let BufferReply { status, text } = self.lib.tcp_app_data(self.id, data)?;
        let code = match status {
            codes::OK => return Ok(text),
            codes::INVALID_SOURCE => ErrorCode::ParamError,
            codes::SERVER_DOWN => ErrorCode::ServerDown,
            _ => ErrorCode::Err,
        };
        Err(KkError::status(code, status, text))
    }

    // -------------------------------------------------------------------
    // Test data capture
    // -------------------------------------------------------------------

    fn check_capture(&self, raw: i32) -> Result<(), KkError> {
        match raw {
            codes::INVALID_SOURCE => Err(self.invalid_source(raw)),
            codes::NOT_CONNECTED => Err(KkError::status(
                ErrorCode::ParamError,
                raw,
                Some(format!("No connection for source_id: {}", self.id)),
            )),
            _ => Ok(()),
        }
    }

    /// Start writing received bytes to a binary test data file
    pub fn start_save_binary_data(&self, dbg_id: Option<&str>) -> Result<(), KkError> {
        let raw = self.lib.start_save_binary_data(self.id, dbg_id)?;
        self.check_capture(raw)
    }

    pub fn stop_save_binary_data(&self) -> Result<(), KkError> {
        self.check_capture(self.lib.stop_save_binary_data(self.id))
    }

    /// Start writing received reports to a text test data file
    pub fn start_save_report_data(&self, dbg_id: Option<&str>) -> Result<(), KkError> {
        let raw = self.lib.start_save_report_data(self.id, dbg_id)?;
        self.check_source(raw)
    }

    pub fn stop_save_report_data(&self) -> Result<(), KkError> {
        self.check_source(self.lib.stop_save_report_data(self.id))
    }
}

/// Enumerate serial ports and/or USB devices (not tied to a source)
pub fn enumerate_devices(lib: &KkLibrary, flags: EnumFlags) -> Result<Vec<String>, KkError> {
    let reply = lib.enumerate_devices(flags.bits());
    if reply.status == 0 {
        return Ok(split_list(reply.text.as_deref()));
    }
    let code = match reply.status {
        codes::ENUM_SERIAL_FAILED => ErrorCode::EnumSerial,
        codes::ENUM_USB_FAILED => ErrorCode::EnumUsb,
        _ => ErrorCode::EnumSerialUsb,
    };
    let message = lib.get_enumerate_devices_error_msg();
    warn!(
        status = reply.status,
        error = message.as_deref().unwrap_or(""),
        "Device enumeration failed"
    );
    Err(KkError::status(code, reply.status, message))
}

/// Host name and local IPv4 addresses (not tied to a source)
pub fn host_and_ips(lib: &KkLibrary) -> Result<HostInfo, KkError> {
    let reply = lib.get_host_and_ips();
    if reply.status == codes::FAILED {
        // A host name may still have been delivered if only the IP lookup failed
        return Err(match reply.host {
            Some(host) => KkError::HostLookup {
                code: ErrorCode::Err,
                raw: reply.status,
                host,
                message: reply.error,
            },
            None => KkError::status(ErrorCode::Err, reply.status, reply.error),
        });
    }
    // IPs are only meaningful when a host name was delivered
    let ips = match reply.host {
        Some(_) => split_list(reply.ips.as_deref()),
        None => Vec::new(),
    };
    Ok(HostInfo {
        host: reply.host,
        ips,
        truncated: reply.status == codes::BUFFER_TOO_SMALL,
    })
}

fn split_list(text: Option<&str>) -> Vec<String> {
    text.map(|t| {
        t.split(',')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}
