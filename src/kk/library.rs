//! Binding layer for the KK Library
//!
//! One method per exported function, same parameter order, raw results.
//! Nothing here interprets return codes, caches results or retries calls;
//! see [`super::source::Source`] for the vendor's result conventions.

use super::buffer::{c_string, c_string_opt, opt_ptr, string_from_ptr, OutputBuffer};
use super::error::KkError;
use super::ffi::KkApi;
use super::source::Source;
use super::types::{LibraryVersion, SourceId};
use libloading::Library;
use std::fmt;
use std::os::raw::{c_char, c_int};
use std::path::Path;
use tracing::info;

/// Raw result of a call that also fills a text buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferReply {
    /// Value returned by the foreign function
    pub status: i32,
    /// Buffer text up to the first NUL, `None` if the buffer stayed empty
    pub text: Option<String>,
}

impl BufferReply {
    fn new(status: i32, buffer: &OutputBuffer) -> Self {
        Self {
            status,
            text: buffer.text(),
        }
    }
}

/// Raw result of `Multi_GetHostAndIPs`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostReply {
    pub status: i32,
    pub host: Option<String>,
    /// Comma separated IPv4 addresses
    pub ips: Option<String>,
    pub error: Option<String>,
}

/// Library file name the vendor ships for this platform
pub fn default_library_name() -> &'static str {
    if cfg!(windows) {
        if cfg!(target_pointer_width = "64") {
            "KK_Library_64.dll"
        } else {
            "KK_FX80E.dll"
        }
    } else if cfg!(target_pointer_width = "64") {
        "libkk_library_64_cdecl.so"
    } else {
        "libkk_library_32_cdecl.so"
    }
}

/// Loaded KK Library
///
/// The vendor does not document thread safety. Calls that share a
/// [`SourceId`] must be serialized by the caller (e.g. by issuing them all
/// from one thread, or behind a `Mutex`); this type does no locking.
pub struct KkLibrary {
    api: KkApi,
    // Keeps the resolved function pointers valid; dropped after `api`
    _library: Option<Library>,
}

impl KkLibrary {
    /// Load the vendor library from `path` and resolve every entry point
    ///
    /// Fails if the file cannot be loaded or if any export is missing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, KkError> {
        let path = path.as_ref();
        // Safety: loading runs the library's initialisers; the vendor binary
        // is trusted by whoever configured its path.
        let library = unsafe { Library::new(path) }.map_err(|source| KkError::Load {
            path: path.display().to_string(),
            source,
        })?;
        let api = KkApi::resolve(&library)?;

        let lib = Self {
            api,
            _library: Some(library),
        };
        let version = lib.get_dll_version();
        info!(
            path = %path.display(),
            version = version.as_deref().unwrap_or("?"),
            "K+K library loaded"
        );
        Ok(lib)
    }

    /// Load the library by its platform default name (searched by the OS loader)
    pub fn open_default() -> Result<Self, KkError> {
        Self::open(default_library_name())
    }

    /// Build the binding from an explicit function table
    ///
    /// # Safety
    /// Every entry must behave like the export it stands for in kk_library.h:
    /// write at most the documented buffer size (80 bytes for the
    /// `Multi_GetHostAndIPs` outputs, 1024 bytes otherwise) and return null or
    /// a NUL-terminated string that stays valid until the next call.
    pub unsafe fn from_api(api: KkApi) -> Self {
        Self {
            api,
            _library: None,
        }
    }

    /// Parsed library version
    pub fn version(&self) -> Result<LibraryVersion, KkError> {
        self.get_dll_version()
            .ok_or(KkError::MissingVersion)?
            .parse()
    }

    /// Fail unless the library is at least `min`
    pub fn require_version(&self, min: LibraryVersion) -> Result<LibraryVersion, KkError> {
        let found = self.version()?;
        if found < min {
            return Err(KkError::UnsupportedVersion {
                found: found.to_string(),
                required: min.to_string(),
            });
        }
        Ok(found)
    }

    /// Create a new source and wrap it for interpreted calls
    pub fn create_source(&self) -> Source<'_> {
        Source::new(self, self.create_multi_source())
    }

    /// Interpreted access to an existing source
    pub fn source(&self, id: SourceId) -> Source<'_> {
        Source::new(self, id)
    }

    // -------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------

    /// `CreateMultiSource`
    pub fn create_multi_source(&self) -> SourceId {
        SourceId(unsafe { (self.api.create_multi_source)() })
    }

    // -------------------------------------------------------------------
    // Enumeration
    // -------------------------------------------------------------------

    /// `Multi_EnumerateDevices` (names written into a 1024 byte buffer)
    pub fn enumerate_devices(&self, enum_flags: u8) -> BufferReply {
        let mut names = OutputBuffer::report();
        let status = unsafe { (self.api.enumerate_devices)(names.as_mut_ptr(), enum_flags) };
        BufferReply::new(status, &names)
    }

    /// `Multi_GetEnumerateDevicesErrorMsg`
    pub fn get_enumerate_devices_error_msg(&self) -> Option<String> {
        unsafe { string_from_ptr((self.api.get_enumerate_devices_error_msg)()) }
    }

    /// `Multi_GetHostAndIPs` (three 80 byte buffers)
    pub fn get_host_and_ips(&self) -> HostReply {
        let mut host = OutputBuffer::host();
        let mut ips = OutputBuffer::host();
        let mut error = OutputBuffer::host();
        let status = unsafe {
            (self.api.get_host_and_ips)(host.as_mut_ptr(), ips.as_mut_ptr(), error.as_mut_ptr())
        };
        HostReply {
            status,
            host: host.text(),
            ips: ips.text(),
            error: error.text(),
        }
    }

    // -------------------------------------------------------------------
    // Paths
    // -------------------------------------------------------------------

    /// `Multi_GetOutputPath`
    pub fn get_output_path(&self, id: SourceId) -> Option<String> {
        unsafe { string_from_ptr((self.api.get_output_path)(id.0)) }
    }

    /// `Multi_SetOutputPath`; `None` means success, otherwise an error text
    pub fn set_output_path(&self, id: SourceId, path: &str) -> Result<Option<String>, KkError> {
        let path = c_string(path, "Path")?;
        Ok(unsafe { string_from_ptr((self.api.set_output_path)(id.0, mut_ptr(&path))) })
    }

    // -------------------------------------------------------------------
    // Debug protocol
    // -------------------------------------------------------------------

    /// `Multi_Debug`
    pub fn debug(
        &self,
        id: SourceId,
        dbg_on: bool,
        dbg_id: Option<&str>,
    ) -> Result<Option<String>, KkError> {
        let dbg_id = c_string_opt(dbg_id, "DbgID")?;
        Ok(unsafe { string_from_ptr((self.api.debug)(id.0, dbg_on, opt_ptr(&dbg_id))) })
    }

    /// `Multi_DebugFlags`
    pub fn debug_flags(&self, id: SourceId, report_log: bool, low_level_log: bool) -> i32 {
        unsafe { (self.api.debug_flags)(id.0, report_log, low_level_log) }
    }

    /// `Multi_DebugLogLimit`
    pub fn debug_log_limit(&self, id: SourceId, log_type: u8, size: u32) -> i32 {
        unsafe { (self.api.debug_log_limit)(id.0, log_type, size) }
    }

    /// `Multi_DebugGetFilename`
    pub fn debug_get_filename(&self, id: SourceId) -> Option<String> {
        unsafe { string_from_ptr((self.api.debug_get_filename)(id.0)) }
    }

    // -------------------------------------------------------------------
    // Info queries
    // -------------------------------------------------------------------

    /// `Multi_GetDLLVersion`
    pub fn get_dll_version(&self) -> Option<String> {
        unsafe { string_from_ptr((self.api.get_dll_version)()) }
    }

    /// `Multi_GetBufferAmount`
    pub fn get_buffer_amount(&self, id: SourceId) -> i32 {
        unsafe { (self.api.get_buffer_amount)(id.0) }
    }

    /// `Multi_GetTransmitBufferAmount`
    pub fn get_transmit_buffer_amount(&self, id: SourceId) -> i32 {
        unsafe { (self.api.get_transmit_buffer_amount)(id.0) }
    }

    /// `Multi_GetUserID`
    pub fn get_user_id(&self, id: SourceId) -> u8 {
        unsafe { (self.api.get_user_id)(id.0) }
    }

    /// `Multi_IsFileDevice`
    pub fn is_file_device(&self, id: SourceId) -> bool {
        unsafe { (self.api.is_file_device)(id.0) }
    }

    /// `Multi_GetFirmwareVersion`
    pub fn get_firmware_version(&self, id: SourceId) -> i32 {
        unsafe { (self.api.get_firmware_version)(id.0) }
    }

    /// `Multi_HasFRAM`
    pub fn has_fram(&self, id: SourceId) -> bool {
        unsafe { (self.api.has_fram)(id.0) }
    }

    /// `Multi_IsSerialDevice`
    pub fn is_serial_device(&self, id: SourceId) -> bool {
        unsafe { (self.api.is_serial_device)(id.0) }
    }

    /// `Multi_GetDeviceStartState`
    pub fn get_device_start_state(&self, id: SourceId) -> i32 {
        unsafe { (self.api.get_device_start_state)(id.0) }
    }

    // -------------------------------------------------------------------
    // Calibration / FHR
    // -------------------------------------------------------------------

    /// `Multi_SetNSZCalibrationData`
    pub fn set_nsz_calibration_data(&self, id: SourceId, data: &str) -> Result<i32, KkError> {
        let data = c_string(data, "Data")?;
        Ok(unsafe { (self.api.set_nsz_calibration_data)(id.0, mut_ptr(&data)) })
    }

    /// `Multi_ReadFHRData`
    pub fn read_fhr_data(&self, id: SourceId) -> i32 {
        unsafe { (self.api.read_fhr_data)(id.0) }
    }

    /// `Multi_SetFHRData`
    pub fn set_fhr_data(&self, id: SourceId, data: &str) -> Result<i32, KkError> {
        let data = c_string(data, "Data")?;
        Ok(unsafe { (self.api.set_fhr_data)(id.0, mut_ptr(&data)) })
    }

    // -------------------------------------------------------------------
    // Connection
    // -------------------------------------------------------------------

    /// `Multi_OpenConnection`
    ///
    /// The connection string is passed in a 1024 byte buffer; on failure the
    /// library writes its error message into the same buffer.
    pub fn open_connection(
        &self,
        id: SourceId,
        connection: &str,
        blocking_io: bool,
    ) -> Result<BufferReply, KkError> {
        let mut buffer = input_buffer(connection, "Connection")?;
        let status = unsafe { (self.api.open_connection)(id.0, buffer.as_mut_ptr(), blocking_io) };
        Ok(BufferReply::new(status, &buffer))
    }

    /// `Multi_CloseConnection`
    pub fn close_connection(&self, id: SourceId) {
        unsafe { (self.api.close_connection)(id.0) }
    }

    // -------------------------------------------------------------------
    // Reports
    // -------------------------------------------------------------------

    /// `Multi_SetDecimalSeparator`
    pub fn set_decimal_separator(&self, id: SourceId, separator: u8) -> i32 {
        unsafe { (self.api.set_decimal_separator)(id.0, separator as c_char) }
    }

    /// `Multi_SetNSZ`
    pub fn set_nsz(&self, id: SourceId, nsz: i32) -> i32 {
        unsafe { (self.api.set_nsz)(id.0, nsz) }
    }

    /// `Multi_GetReport` (1024 byte buffer)
    pub fn get_report(&self, id: SourceId) -> BufferReply {
        let mut data = OutputBuffer::report();
        let status = unsafe { (self.api.get_report)(id.0, data.as_mut_ptr()) };
        BufferReply::new(status, &data)
    }

    /// `Multi_SetSend7016`
    pub fn set_send_7016(&self, id: SourceId, value: bool) -> i32 {
        unsafe { (self.api.set_send_7016)(id.0, value) }
    }

    // -------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------

    /// `Multi_GetPendingCmdsCount`
    pub fn get_pending_cmds_count(&self, id: SourceId) -> u32 {
        unsafe { (self.api.get_pending_cmds_count)(id.0) }
    }

    /// `Multi_SetCommandLimit`
    pub fn set_command_limit(&self, id: SourceId, limit: u32) -> i32 {
        unsafe { (self.api.set_command_limit)(id.0, limit) }
    }

    /// `Multi_SendCommand`
    ///
    /// Command bytes may contain NULs and may fill the whole 1024 byte buffer;
    /// the length is passed explicitly. The buffer carries the library's error
    /// message on failure.
    pub fn send_command(&self, id: SourceId, command: &[u8]) -> Result<BufferReply, KkError> {
        let mut buffer = OutputBuffer::with_bytes(command)?;
        let len = command.len() as c_int;
        let status = unsafe { (self.api.send_command)(id.0, buffer.as_mut_ptr(), len) };
        Ok(BufferReply::new(status, &buffer))
    }

    /// `Multi_RemoteLogin` (error text in a 1024 byte buffer)
    pub fn remote_login(&self, id: SourceId, password: u32) -> BufferReply {
        let mut err = OutputBuffer::report();
        let status = unsafe { (self.api.remote_login)(id.0, password, err.as_mut_ptr()) };
        BufferReply::new(status, &err)
    }

    // -------------------------------------------------------------------
    // Local TCP server
    // -------------------------------------------------------------------

    /// `Multi_StartTcpServer`; returns the status and the port after the call
    pub fn start_tcp_server(&self, id: SourceId, port: u16) -> (i32, u16) {
        let mut port = port;
        let status = unsafe { (self.api.start_tcp_server)(id.0, &mut port) };
        (status, port)
    }

    /// `Multi_StopTcpServer`
    pub fn stop_tcp_server(&self, id: SourceId) -> i32 {
        unsafe { (self.api.stop_tcp_server)(id.0) }
    }

    /// `Multi_GetTcpServerError`
    pub fn get_tcp_server_error(&self, id: SourceId) -> Option<String> {
        unsafe { string_from_ptr((self.api.get_tcp_server_error)(id.0)) }
    }

    /// `Multi_TcpReportLog`
    pub fn tcp_report_log(&self, id: SourceId, data: &str, log_type: i32) -> Result<(), KkError> {
        let data = c_string(data, "Data")?;
        unsafe { (self.api.tcp_report_log)(id.0, mut_ptr(&data), log_type) };
        Ok(())
    }

    // -------------------------------------------------------------------
    // TCP log client
    // -------------------------------------------------------------------

    /// `Multi_OpenTcpLog`
    pub fn open_tcp_log(&self, id: SourceId, ip_port: &str, mode: &str) -> Result<BufferReply, KkError> {
        let mut buffer = input_buffer(ip_port, "IpPort")?;
        let mode = c_string(mode, "Mode")?;
        let status = unsafe { (self.api.open_tcp_log)(id.0, buffer.as_mut_ptr(), mut_ptr(&mode)) };
        Ok(BufferReply::new(status, &buffer))
    }

    /// `Multi_CloseTcpLog`
    pub fn close_tcp_log(&self, id: SourceId) {
        unsafe { (self.api.close_tcp_log)(id.0) }
    }

    /// `Multi_GetTcpLog` (1024 byte buffer)
    pub fn get_tcp_log(&self, id: SourceId) -> BufferReply {
        let mut data = OutputBuffer::report();
        let status = unsafe { (self.api.get_tcp_log)(id.0, data.as_mut_ptr()) };
        BufferReply::new(status, &data)
    }

    /// `Multi_OpenTcpLogTime`
    pub fn open_tcp_log_time(
        &self,
        id: SourceId,
        ip_port: &str,
        mode: &str,
        format: &str,
    ) -> Result<BufferReply, KkError> {
        let mut buffer = input_buffer(ip_port, "IpPort")?;
        let mode = c_string(mode, "Mode")?;
        let format = c_string(format, "Format")?;
        let status = unsafe {
            (self.api.open_tcp_log_time)(id.0, buffer.as_mut_ptr(), mut_ptr(&mode), mut_ptr(&format))
        };
        Ok(BufferReply::new(status, &buffer))
    }

    /// `Multi_OpenTcpLogType`; `None` format is passed as a null pointer
    pub fn open_tcp_log_type(
        &self,
        id: SourceId,
        ip_port: &str,
        log_type: i32,
        format: Option<&str>,
    ) -> Result<BufferReply, KkError> {
        let mut buffer = input_buffer(ip_port, "IpPort")?;
        let format = c_string_opt(format, "Format")?;
        let status = unsafe {
            (self.api.open_tcp_log_type)(id.0, buffer.as_mut_ptr(), log_type, opt_ptr(&format))
        };
        Ok(BufferReply::new(status, &buffer))
    }

    /// `Multi_TcpAppData`; the response replaces the data in the buffer
    pub fn tcp_app_data(&self, id: SourceId, data: &str) -> Result<BufferReply, KkError> {
        let mut buffer = input_buffer(data, "Data")?;
        let status = unsafe { (self.api.tcp_app_data)(id.0, buffer.as_mut_ptr()) };
        Ok(BufferReply::new(status, &buffer))
    }

    // -------------------------------------------------------------------
    // Test data capture
    // -------------------------------------------------------------------

    /// `Multi_StartSaveBinaryData`
    pub fn start_save_binary_data(&self, id: SourceId, dbg_id: Option<&str>) -> Result<i32, KkError> {
        let dbg_id = c_string_opt(dbg_id, "DbgID")?;
        Ok(unsafe { (self.api.start_save_binary_data)(id.0, opt_ptr(&dbg_id)) })
    }

    /// `Multi_StopSaveBinaryData`
    pub fn stop_save_binary_data(&self, id: SourceId) -> i32 {
        unsafe { (self.api.stop_save_binary_data)(id.0) }
    }

    /// `Multi_StartSaveReportData`
    pub fn start_save_report_data(&self, id: SourceId, dbg_id: Option<&str>) -> Result<i32, KkError> {
        let dbg_id = c_string_opt(dbg_id, "DbgID")?;
        Ok(unsafe { (self.api.start_save_report_data)(id.0, opt_ptr(&dbg_id)) })
    }

    /// `Multi_StopSaveReportData`
    pub fn stop_save_report_data(&self, id: SourceId) -> i32 {
        unsafe { (self.api.stop_save_report_data)(id.0) }
    }
}

impl fmt::Debug for KkLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KkLibrary")
            .field("loaded", &self._library.is_some())
            .finish()
    }
}

/// Text argument copied into a writable 1024 byte buffer
fn input_buffer(value: &str, what: &str) -> Result<OutputBuffer, KkError> {
    if value.as_bytes().contains(&0) {
        return Err(KkError::invalid_argument(format!("{} contains null byte", what)));
    }
    OutputBuffer::with_input(value.as_bytes())
}

/// Read-only string argument declared as `char *` in the header
fn mut_ptr(value: &std::ffi::CString) -> *mut c_char {
    value.as_ptr() as *mut c_char
}
