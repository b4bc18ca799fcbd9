//! Stub function table shared by the integration tests
//!
//! `base_api()` returns a table of benign stubs; tests overwrite the fields
//! they want to observe with their own `extern "system"` functions.

#![allow(dead_code)]

use kklib_rs::kk::{KkApi, KkLibrary};
use std::ffi::CStr;
use std::os::raw::{c_char, c_int, c_uchar, c_uint, c_ushort};

pub const STUB_SOURCE_ID: c_int = 7;
pub static STUB_VERSION: &[u8] = b"19.03.01\0";

/// Copy `text` plus a terminating NUL into a vendor buffer
///
/// # Safety
/// `buffer` must be writable for `text.len() + 1` bytes.
pub unsafe fn write_text(buffer: *mut c_char, text: &[u8]) {
    std::ptr::copy_nonoverlapping(text.as_ptr() as *const c_char, buffer, text.len());
    *buffer.add(text.len()) = 0;
}

/// Read a NUL terminated argument; `None` for a null pointer
///
/// # Safety
/// `ptr` must be null or point to a NUL terminated string.
pub unsafe fn read_text(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        None
    } else {
        Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
    }
}

pub fn static_text(bytes: &'static [u8]) -> *mut c_char {
    bytes.as_ptr() as *mut c_char
}

unsafe extern "system" fn create_multi_source() -> c_int {
    STUB_SOURCE_ID
}
unsafe extern "system" fn enumerate_devices(_names: *mut c_char, _flags: c_uchar) -> c_int {
    0
}
unsafe extern "system" fn null_text() -> *mut c_char {
    std::ptr::null_mut()
}
unsafe extern "system" fn get_host_and_ips(
    _host: *mut c_char,
    _ips: *mut c_char,
    _err: *mut c_char,
) -> c_int {
    1
}
unsafe extern "system" fn id_null_text(_id: c_int) -> *mut c_char {
    std::ptr::null_mut()
}
unsafe extern "system" fn id_text_null_text(_id: c_int, _text: *mut c_char) -> *mut c_char {
    std::ptr::null_mut()
}
unsafe extern "system" fn debug(_id: c_int, _on: bool, _dbg_id: *mut c_char) -> *mut c_char {
    std::ptr::null_mut()
}
unsafe extern "system" fn id_bool_bool(_id: c_int, _a: bool, _b: bool) -> c_int {
    0
}
unsafe extern "system" fn debug_log_limit(_id: c_int, _log_type: c_uchar, _size: c_uint) -> c_int {
    0
}
unsafe extern "system" fn get_dll_version() -> *mut c_char {
    static_text(STUB_VERSION)
}
unsafe extern "system" fn id_zero(_id: c_int) -> c_int {
    0
}
unsafe extern "system" fn id_one(_id: c_int) -> c_int {
    1
}
unsafe extern "system" fn get_user_id(_id: c_int) -> c_uchar {
    1
}
unsafe extern "system" fn id_false(_id: c_int) -> bool {
    false
}
unsafe extern "system" fn get_firmware_version(_id: c_int) -> c_int {
    70
}
unsafe extern "system" fn id_text_one(_id: c_int, _text: *mut c_char) -> c_int {
    1
}
unsafe extern "system" fn open_connection(_id: c_int, _conn: *mut c_char, _blocking: bool) -> c_int {
    1
}
unsafe extern "system" fn id_void(_id: c_int) {}
unsafe extern "system" fn set_decimal_separator(_id: c_int, _sep: c_char) -> c_int {
    0
}
unsafe extern "system" fn set_nsz(_id: c_int, _nsz: c_int) -> c_int {
    0
}
unsafe extern "system" fn set_send_7016(_id: c_int, _value: bool) -> c_int {
    0
}
unsafe extern "system" fn get_pending_cmds_count(_id: c_int) -> c_uint {
    0
}
unsafe extern "system" fn set_command_limit(_id: c_int, _limit: c_uint) -> c_int {
    0
}
unsafe extern "system" fn send_command(_id: c_int, _cmd: *mut c_char, _len: c_int) -> c_int {
    1
}
unsafe extern "system" fn remote_login(_id: c_int, _password: c_uint, _err: *mut c_char) -> c_int {
    1
}
unsafe extern "system" fn start_tcp_server(_id: c_int, _port: *mut c_ushort) -> c_int {
    1
}
unsafe extern "system" fn tcp_report_log(_id: c_int, _data: *mut c_char, _log_type: c_int) {}
unsafe extern "system" fn open_tcp_log(_id: c_int, _ip: *mut c_char, _mode: *mut c_char) -> c_int {
    1
}
unsafe extern "system" fn open_tcp_log_time(
    _id: c_int,
    _ip: *mut c_char,
    _mode: *mut c_char,
    _format: *mut c_char,
) -> c_int {
    1
}
unsafe extern "system" fn open_tcp_log_type(
    _id: c_int,
    _ip: *mut c_char,
    _log_type: c_int,
    _format: *mut c_char,
) -> c_int {
    1
}

/// Binding over a stub table
///
/// Every stub in this crate writes at most the documented buffer sizes and
/// returns null or a static NUL-terminated string.
pub fn library_from(api: KkApi) -> KkLibrary {
    // Safety: see above; stubs honour kk_library.h buffer sizes
    unsafe { KkLibrary::from_api(api) }
}

/// Table where every call succeeds and no report is ever available
pub fn base_api() -> KkApi {
    KkApi {
        create_multi_source,
        enumerate_devices,
        get_enumerate_devices_error_msg: null_text,
        get_host_and_ips,
        get_output_path: id_null_text,
        set_output_path: id_text_null_text,
        debug,
        debug_flags: id_bool_bool,
        debug_log_limit,
        debug_get_filename: id_null_text,
        get_dll_version,
        get_buffer_amount: id_zero,
        get_transmit_buffer_amount: id_zero,
        get_user_id,
        is_file_device: id_false,
        get_firmware_version,
        has_fram: id_false,
        is_serial_device: id_false,
        get_device_start_state: id_one,
        set_nsz_calibration_data: id_text_one,
        read_fhr_data: id_one,
        set_fhr_data: id_text_one,
        open_connection,
        close_connection: id_void,
        set_decimal_separator,
        set_nsz,
        get_report: id_text_one,
        set_send_7016,
        get_pending_cmds_count,
        set_command_limit,
        send_command,
        remote_login,
        start_tcp_server,
        stop_tcp_server: id_one,
        get_tcp_server_error: id_null_text,
        tcp_report_log,
        open_tcp_log,
        close_tcp_log: id_void,
        get_tcp_log: id_text_one,
        open_tcp_log_time,
        open_tcp_log_type,
        tcp_app_data: id_text_one,
        start_save_binary_data: id_text_one,
        stop_save_binary_data: id_zero,
        start_save_report_data: id_text_one,
        stop_save_report_data: id_zero,
    }
}
