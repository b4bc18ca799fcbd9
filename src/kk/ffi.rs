//! Raw KK Library entry points
//!
//! Signatures mirror `kk_library.h` (KK Library 19.03.01). The vendor exports
//! stdcall on 32-bit Windows and cdecl everywhere else, which is exactly what
//! `extern "system"` selects.

use super::error::KkError;
use libloading::Library;
use std::os::raw::{c_char, c_int, c_uchar, c_uint, c_ushort};

macro_rules! kk_api {
    ($( $field:ident = $symbol:literal : fn($($arg:ty),*) $(-> $ret:ty)?; )*) => {
        /// Resolved function table of the vendor library
        ///
        /// Every field is a plain function pointer, so the table can also be
        /// assembled by hand (test doubles, statically linked builds).
        #[derive(Clone, Copy)]
        pub struct KkApi {
            $( pub $field: unsafe extern "system" fn($($arg),*) $(-> $ret)?, )*
        }

        /// Exported symbol names, in resolution order
        pub const SYMBOLS: &[&str] = &[$($symbol),*];

        impl KkApi {
            /// Resolve every entry point from a loaded library
            ///
            /// Stops at the first missing export; no partial table is returned.
            pub(crate) fn resolve(library: &Library) -> Result<Self, KkError> {
                Ok(Self {
                    // Safety: the declared types match kk_library.h
                    $( $field: unsafe { resolve_symbol(library, $symbol)? }, )*
                })
            }
        }
    };
}

kk_api! {
    create_multi_source = "CreateMultiSource": fn() -> c_int;

    enumerate_devices = "Multi_EnumerateDevices": fn(*mut c_char, c_uchar) -> c_int;
    get_enumerate_devices_error_msg = "Multi_GetEnumerateDevicesErrorMsg": fn() -> *mut c_char;
    get_host_and_ips = "Multi_GetHostAndIPs": fn(*mut c_char, *mut c_char, *mut c_char) -> c_int;

    get_output_path = "Multi_GetOutputPath": fn(c_int) -> *mut c_char;
    set_output_path = "Multi_SetOutputPath": fn(c_int, *mut c_char) -> *mut c_char;

    debug = "Multi_Debug": fn(c_int, bool, *mut c_char) -> *mut c_char;
    debug_flags = "Multi_DebugFlags": fn(c_int, bool, bool) -> c_int;
    debug_log_limit = "Multi_DebugLogLimit": fn(c_int, c_uchar, c_uint) -> c_int;
    debug_get_filename = "Multi_DebugGetFilename": fn(c_int) -> *mut c_char;

    get_dll_version = "Multi_GetDLLVersion": fn() -> *mut c_char;
    get_buffer_amount = "Multi_GetBufferAmount": fn(c_int) -> c_int;
    get_transmit_buffer_amount = "Multi_GetTransmitBufferAmount": fn(c_int) -> c_int;
    get_user_id = "Multi_GetUserID": fn(c_int) -> c_uchar;
    is_file_device = "Multi_IsFileDevice": fn(c_int) -> bool;
    get_firmware_version = "Multi_GetFirmwareVersion": fn(c_int) -> c_int;
    has_fram = "Multi_HasFRAM": fn(c_int) -> bool;
    is_serial_device = "Multi_IsSerialDevice": fn(c_int) -> bool;
    get_device_start_state = "Multi_GetDeviceStartState": fn(c_int) -> c_int;

    set_nsz_calibration_data = "Multi_SetNSZCalibrationData": fn(c_int, *mut c_char) -> c_int;

    read_fhr_data = "Multi_ReadFHRData": fn(c_int) -> c_int;
    set_fhr_data = "Multi_SetFHRData": fn(c_int, *mut c_char) -> c_int;

    open_connection = "Multi_OpenConnection": fn(c_int, *mut c_char, bool) -> c_int;
    close_connection = "Multi_CloseConnection": fn(c_int);

    set_decimal_separator = "Multi_SetDecimalSeparator": fn(c_int, c_char) -> c_int;
    set_nsz = "Multi_SetNSZ": fn(c_int, c_int) -> c_int;
    get_report = "Multi_GetReport": fn(c_int, *mut c_char) -> c_int;
    set_send_7016 = "Multi_SetSend7016": fn(c_int, bool) -> c_int;

    get_pending_cmds_count = "Multi_GetPendingCmdsCount": fn(c_int) -> c_uint;
    set_command_limit = "Multi_SetCommandLimit": fn(c_int, c_uint) -> c_int;
    send_command = "Multi_SendCommand": fn(c_int, *mut c_char, c_int) -> c_int;
    remote_login = "Multi_RemoteLogin": fn(c_int, c_uint, *mut c_char) -> c_int;

    start_tcp_server = "Multi_StartTcpServer": fn(c_int, *mut c_ushort) -> c_int;
    stop_tcp_server = "Multi_StopTcpServer": fn(c_int) -> c_int;
    get_tcp_server_error = "Multi_GetTcpServerError": fn(c_int) -> *mut c_char;
    tcp_report_log = "Multi_TcpReportLog": fn(c_int, *mut c_char, c_int);

    open_tcp_log = "Multi_OpenTcpLog": fn(c_int, *mut c_char, *mut c_char) -> c_int;
    close_tcp_log = "Multi_CloseTcpLog": fn(c_int);
    get_tcp_log = "Multi_GetTcpLog": fn(c_int, *mut c_char) -> c_int;
    open_tcp_log_time = "Multi_OpenTcpLogTime": fn(c_int, *mut c_char, *mut c_char, *mut c_char) -> c_int;
    open_tcp_log_type = "Multi_OpenTcpLogType": fn(c_int, *mut c_char, c_int, *mut c_char) -> c_int;
    tcp_app_data = "Multi_TcpAppData": fn(c_int, *mut c_char) -> c_int;

    start_save_binary_data = "Multi_StartSaveBinaryData": fn(c_int, *mut c_char) -> c_int;
    stop_save_binary_data = "Multi_StopSaveBinaryData": fn(c_int) -> c_int;
    start_save_report_data = "Multi_StartSaveReportData": fn(c_int, *mut c_char) -> c_int;
    stop_save_report_data = "Multi_StopSaveReportData": fn(c_int) -> c_int;
}

/// Look up one export and copy out the function pointer
///
/// # Safety
/// `T` must be the function pointer type the export actually has.
unsafe fn resolve_symbol<T: Copy>(library: &Library, symbol: &'static str) -> Result<T, KkError> {
    let resolved = library
        .get::<T>(symbol.as_bytes())
        .map_err(|source| KkError::MissingSymbol { symbol, source })?;
    Ok(*resolved)
}
