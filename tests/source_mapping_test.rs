//! Interpreted layer: vendor return codes mapped onto `ErrorCode`
//!
//! Stubs return the code set by the test and write the configured text
//! into whatever buffer the call passes.

mod common;

use common::{base_api, library_from, read_text, static_text, write_text};
use kklib_rs::kk::{
    EnumFlags, ErrorCode, FhrSettings, KkError, KkLibrary, LogType, Source, SourceId,
};
use kklib_rs::kk::{DecimalSeparator, DeviceStartState};
use std::cell::{Cell, RefCell};
use std::os::raw::{c_char, c_int, c_uchar, c_uint, c_ushort};

thread_local! {
    static RET: Cell<c_int> = const { Cell::new(1) };
    static TEXT: RefCell<Vec<u8>> = const { RefCell::new(Vec::new()) };
    static SERIAL: Cell<bool> = const { Cell::new(false) };
    static USER_ID: Cell<c_uchar> = const { Cell::new(1) };
    static SENT: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

fn set_ret(code: c_int) {
    RET.with(|r| r.set(code));
}

fn set_text(text: &str) {
    TEXT.with(|t| *t.borrow_mut() = text.as_bytes().to_vec());
}

fn ret() -> c_int {
    RET.with(|r| r.get())
}

unsafe fn fill(buffer: *mut c_char) {
    TEXT.with(|t| {
        let text = t.borrow();
        if !text.is_empty() {
            write_text(buffer, &text);
        }
    });
}

unsafe extern "system" fn ret_id(_id: c_int) -> c_int {
    ret()
}
unsafe extern "system" fn ret_id_bool(_id: c_int, _v: bool) -> c_int {
    ret()
}
unsafe extern "system" fn ret_id_bool_bool(_id: c_int, _a: bool, _b: bool) -> c_int {
    ret()
}
unsafe extern "system" fn ret_id_int(_id: c_int, _v: c_int) -> c_int {
    ret()
}
unsafe extern "system" fn ret_id_uint(_id: c_int, _v: c_uint) -> c_int {
    ret()
}
unsafe extern "system" fn ret_separator(_id: c_int, _v: c_char) -> c_int {
    ret()
}
unsafe extern "system" fn ret_log_limit(_id: c_int, _t: c_uchar, _s: c_uint) -> c_int {
    ret()
}
unsafe extern "system" fn ret_fill(_id: c_int, buffer: *mut c_char) -> c_int {
    fill(buffer);
    ret()
}
unsafe extern "system" fn ret_data(_id: c_int, data: *mut c_char) -> c_int {
    if let Some(text) = read_text(data) {
        SENT.with(|s| s.borrow_mut().push(text));
    }
    ret()
}
unsafe extern "system" fn ret_connection(_id: c_int, buffer: *mut c_char, _b: bool) -> c_int {
    fill(buffer);
    ret()
}
unsafe extern "system" fn ret_command(_id: c_int, buffer: *mut c_char, _len: c_int) -> c_int {
    fill(buffer);
    ret()
}
unsafe extern "system" fn ret_login(_id: c_int, _pw: c_uint, err: *mut c_char) -> c_int {
    fill(err);
    ret()
}
unsafe extern "system" fn ret_tcp_log(_id: c_int, buffer: *mut c_char, _mode: *mut c_char) -> c_int {
    fill(buffer);
    ret()
}
unsafe extern "system" fn ret_tcp_server(_id: c_int, port: *mut c_ushort) -> c_int {
    *port = 5000;
    ret()
}
unsafe extern "system" fn server_error(_id: c_int) -> *mut c_char {
    static_text(b"Port in use\0")
}
unsafe extern "system" fn enum_error_msg() -> *mut c_char {
    static_text(b"USB driver missing\0")
}
unsafe extern "system" fn ret_enumerate(names: *mut c_char, _flags: c_uchar) -> c_int {
    fill(names);
    ret()
}
unsafe extern "system" fn ret_host(host: *mut c_char, ips: *mut c_char, err: *mut c_char) -> c_int {
    if ret() == 0 {
        write_text(err, b"gethostname failed");
    } else {
        write_text(host, b"bench-pc");
        write_text(ips, b"10.0.0.2,192.168.1.5");
    }
    ret()
}
unsafe extern "system" fn host_without_ips(
    host: *mut c_char,
    _ips: *mut c_char,
    err: *mut c_char,
) -> c_int {
    write_text(host, b"bench-pc");
    write_text(err, b"no IPv4 address");
    0
}
unsafe extern "system" fn text_source_not_found(_id: c_int, _text: *mut c_char) -> *mut c_char {
    static_text(b"Source-ID 3 not found\0")
}
unsafe extern "system" fn text_failed(_id: c_int, _text: *mut c_char) -> *mut c_char {
    static_text(b"Path not writable\0")
}
unsafe extern "system" fn is_serial(_id: c_int) -> bool {
    SERIAL.with(|s| s.get())
}
unsafe extern "system" fn user_id(_id: c_int) -> c_uchar {
    USER_ID.with(|u| u.get())
}
unsafe extern "system" fn start_state(_id: c_int) -> c_int {
    2
}

fn reset_state() {
    set_ret(1);
    set_text("");
    SERIAL.with(|s| s.set(false));
    USER_ID.with(|u| u.set(1));
    SENT.with(|s| s.borrow_mut().clear());
}

fn stub_library() -> KkLibrary {
    reset_state();
    let mut api = base_api();
    api.enumerate_devices = ret_enumerate;
    api.get_enumerate_devices_error_msg = enum_error_msg;
    api.get_host_and_ips = ret_host;
    api.debug_flags = ret_id_bool_bool;
    api.debug_log_limit = ret_log_limit;
    api.set_nsz_calibration_data = ret_data;
    api.read_fhr_data = ret_id;
    api.set_fhr_data = ret_data;
    api.open_connection = ret_connection;
    api.set_decimal_separator = ret_separator;
    api.set_nsz = ret_id_int;
    api.get_report = ret_fill;
    api.set_send_7016 = ret_id_bool;
    api.set_command_limit = ret_id_uint;
    api.send_command = ret_command;
    api.remote_login = ret_login;
    api.start_tcp_server = ret_tcp_server;
    api.stop_tcp_server = ret_id;
    api.get_tcp_server_error = server_error;
    api.open_tcp_log = ret_tcp_log;
    api.get_tcp_log = ret_fill;
    api.tcp_app_data = ret_fill;
    api.start_save_binary_data = ret_data;
    api.stop_save_binary_data = ret_id;
    api.start_save_report_data = ret_data;
    api.stop_save_report_data = ret_id;
    api.is_serial_device = is_serial;
    api.get_user_id = user_id;
    api.get_device_start_state = start_state;
    library_from(api)
}

fn code_of<T: std::fmt::Debug>(result: Result<T, KkError>) -> ErrorCode {
    result
        .unwrap_err()
        .code()
        .expect("status error carries a code")
}

fn source(lib: &KkLibrary) -> Source<'_> {
    lib.source(SourceId(3))
}

#[test]
fn test_enumerate_devices_mapping() {
    let lib = stub_library();
    set_ret(0);
    set_text("COM1,COM3");
    assert_eq!(
        source(&lib).enumerate_devices(EnumFlags::SerialPorts).unwrap(),
        vec!["COM1", "COM3"]
    );

    set_text("");
    assert!(source(&lib)
        .enumerate_devices(EnumFlags::Usb)
        .unwrap()
        .is_empty());

    set_ret(-2);
    let err = source(&lib).enumerate_devices(EnumFlags::Usb).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::EnumUsb));
    assert_eq!(err.message(), Some("USB driver missing"));

    set_ret(-1);
    assert_eq!(
        code_of(source(&lib).enumerate_devices(EnumFlags::SerialPorts)),
        ErrorCode::EnumSerial
    );
    set_ret(-3);
    assert_eq!(
        code_of(source(&lib).enumerate_devices(EnumFlags::LocalDevices)),
        ErrorCode::EnumSerialUsb
    );
}

#[test]
fn test_host_and_ips_mapping() {
    let lib = stub_library();
    set_ret(1);
    let info = source(&lib).host_and_ips().unwrap();
    assert_eq!(info.host.as_deref(), Some("bench-pc"));
    assert_eq!(info.ips, vec!["10.0.0.2", "192.168.1.5"]);
    assert!(!info.truncated);

    set_ret(6);
    assert!(source(&lib).host_and_ips().unwrap().truncated);

    set_ret(0);
    let err = source(&lib).host_and_ips().unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::Err));
    assert_eq!(err.message(), Some("gethostname failed"));
}

#[test]
fn test_failed_ip_lookup_keeps_host_name() {
    let mut api = base_api();
    api.get_host_and_ips = host_without_ips;
    let lib = library_from(api);

    let err = source(&lib).host_and_ips().unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::Err));
    assert_eq!(err.host(), Some("bench-pc"));
    assert_eq!(err.message(), Some("no IPv4 address"));
}

#[test]
fn test_text_returning_calls() {
    let mut api = base_api();
    api.set_output_path = text_source_not_found;
    let lib = library_from(api);
    assert_eq!(
        code_of(source(&lib).set_output_path("/tmp")),
        ErrorCode::ParamError
    );

    api.set_output_path = text_failed;
    let lib = library_from(api);
    let err = source(&lib).set_output_path("/tmp").unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::Err));
    assert_eq!(err.message(), Some("Path not writable"));

    // Null means success
    let lib = library_from(base_api());
    assert!(source(&lib).set_output_path("/tmp").is_ok());
    assert!(source(&lib).set_debug(true, Some("bench")).is_ok());
    assert_eq!(source(&lib).debug_filename().unwrap(), None);
}

#[test]
fn test_invalid_source_code_is_param_error() {
    let lib = stub_library();
    let src = source(&lib);
    set_ret(10);
    assert_eq!(code_of(src.set_debug_flags(true, true)), ErrorCode::ParamError);
    assert_eq!(
        code_of(src.set_debug_log_limit(Default::default(), 0)),
        ErrorCode::ParamError
    );
    assert_eq!(code_of(src.set_nsz(kklib_rs::kk::NszCount::TWO)), ErrorCode::ParamError);
    assert_eq!(code_of(src.set_send_7016(true)), ErrorCode::ParamError);
    assert_eq!(code_of(src.set_command_limit(4)), ErrorCode::ParamError);
    assert_eq!(code_of(src.stop_save_report_data()), ErrorCode::ParamError);

    set_ret(0);
    assert!(src.set_debug_flags(true, true).is_ok());
    assert!(src.set_command_limit(0).is_ok());
}

#[test]
fn test_decimal_separator_updates_formatting() {
    let lib = stub_library();
    let mut src = source(&lib);
    set_ret(1);
    src.set_decimal_separator(DecimalSeparator::Comma).unwrap();
    assert_eq!(src.decimal_separator(), DecimalSeparator::Comma);

    src.set_nsz_calibration_data(&[1.5, -0.25]).unwrap();
    let sent = SENT.with(|s| s.borrow().clone());
    assert_eq!(sent, vec!["1,500;-0,250"]);

    set_ret(10);
    assert!(src.set_decimal_separator(DecimalSeparator::Point).is_err());
    assert_eq!(src.decimal_separator(), DecimalSeparator::Comma);
}

#[test]
fn test_calibration_data_mapping() {
    let lib = stub_library();
    let src = source(&lib);

    assert_eq!(code_of(src.set_nsz_calibration_data(&[])), ErrorCode::ParamError);
    assert_eq!(
        code_of(src.set_nsz_calibration_data(&[0.0; 25])),
        ErrorCode::ParamError
    );

    set_ret(0);
    SERIAL.with(|s| s.set(true));
    let err = src.set_nsz_calibration_data(&[1.0]).unwrap_err();
    assert_eq!(err.message(), Some("Serial connection not supported"));
    SERIAL.with(|s| s.set(false));
    let err = src.set_nsz_calibration_data(&[1.0]).unwrap_err();
    assert_eq!(err.message(), Some("Conversion error, set decimal separator!"));

    set_ret(12);
    let err = src.set_nsz_calibration_data(&[1.0; 24]).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::NotSupported));
    assert!(err.message().unwrap().contains("62"));
}

#[test]
fn test_fhr_mapping() {
    let lib = stub_library();
    let src = source(&lib);

    set_ret(1);
    assert!(src.request_fhr_settings().is_ok());
    let mut settings = FhrSettings::default();
    settings.channel_mut(0).unwrap().enabled = true;
    src.set_fhr_settings(&settings).unwrap();
    let sent = SENT.with(|s| s.borrow().clone());
    assert_eq!(sent[0].split('/').count(), 24);
    assert!(sent[0].starts_with("0;0;1/"));

    set_ret(0);
    let err = src.request_fhr_settings().unwrap_err();
    assert_eq!(err.message(), Some("Command failed"));

    set_ret(12);
    let err = src.request_fhr_settings().unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::NotSupported));
    assert!(err.message().unwrap().contains("67"));
    let err = src.set_fhr_settings(&settings).unwrap_err();
    assert!(err.message().unwrap().contains("67"));
}

#[test]
fn test_open_connection_mapping() {
    let lib = stub_library();
    let src = source(&lib);

    set_ret(1);
    assert!(src.open_connection("COM1", false).is_ok());

    set_ret(0);
    set_text("Port COM9 does not exist");
    let err = src.open_connection("COM9", false).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::Err));
    assert_eq!(err.message(), Some("Port COM9 does not exist"));

    set_ret(10);
    assert_eq!(code_of(src.open_connection("COM9", false)), ErrorCode::ParamError);
}

#[test]
fn test_get_report_mapping() {
    let lib = stub_library();
    let src = source(&lib);

    set_ret(1);
    set_text("");
    assert!(src.get_report().unwrap().is_empty());

    set_text("7000;2024;1");
    let report = src.get_report().unwrap();
    assert_eq!(report.text.as_deref(), Some("7000;2024;1"));
    assert!(!report.truncated);

    set_ret(6);
    assert!(src.get_report().unwrap().truncated);

    let cases = [
        (0, ErrorCode::Err),
        (3, ErrorCode::Write),
        (4, ErrorCode::ServerDown),
        (7, ErrorCode::DeviceNotConnected),
        (8, ErrorCode::BufferOverflow),
        (9, ErrorCode::HardwareFault),
        (10, ErrorCode::ParamError),
        (13, ErrorCode::Reconnected),
    ];
    set_text("connection lost");
    for (raw, code) in cases {
        set_ret(raw);
        let err = src.get_report().unwrap_err();
        assert_eq!(err.code(), Some(code), "raw {}", raw);
        assert_eq!(err.message(), Some("connection lost"));
    }
}

#[test]
fn test_send_command_and_login_mapping() {
    let lib = stub_library();
    let src = source(&lib);

    assert_eq!(code_of(src.send_command(&[])), ErrorCode::ParamError);

    set_ret(1);
    assert!(src.send_command(&[0x26]).is_ok());
    assert!(src.remote_login(1234).is_ok());

    set_ret(11);
    assert_eq!(code_of(src.send_command(&[0x26])), ErrorCode::CmdIgnored);
    assert_eq!(code_of(src.remote_login(1234)), ErrorCode::CmdIgnored);

    set_ret(10);
    assert_eq!(code_of(src.send_command(&[0x26])), ErrorCode::ParamError);

    set_ret(0);
    set_text("Invalid password");
    let err = src.remote_login(1).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::Err));
    assert_eq!(err.message(), Some("Invalid password"));
}

#[test]
fn test_tcp_server_mapping() {
    let lib = stub_library();
    let src = source(&lib);

    set_ret(1);
    assert_eq!(src.start_tcp_server(0).unwrap(), 5000);
    assert!(src.stop_tcp_server().is_ok());

    set_ret(0);
    let err = src.start_tcp_server(80).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::Err));
    assert_eq!(err.message(), Some("Port in use"));

    set_ret(10);
    assert_eq!(code_of(src.stop_tcp_server()), ErrorCode::ParamError);
}

#[test]
fn test_tcp_log_mapping() {
    let lib = stub_library();
    let src = source(&lib);

    set_ret(1);
    assert!(src.open_tcp_log("10.0.0.5:1234", LogType::Freq).is_ok());

    set_ret(0);
    set_text("Source-ID 3 not found");
    assert_eq!(
        code_of(src.open_tcp_log("10.0.0.5:1234", LogType::Freq)),
        ErrorCode::ParamError
    );
    set_text("Connection refused");
    assert_eq!(
        code_of(src.open_tcp_log("10.0.0.5:1234", LogType::Freq)),
        ErrorCode::Err
    );

    set_ret(6);
    set_text("1;2;3");
    assert!(src.get_tcp_log().unwrap().truncated);
    for (raw, code) in [
        (10, ErrorCode::ParamError),
        (4, ErrorCode::ServerDown),
        (8, ErrorCode::BufferOverflow),
    ] {
        set_ret(raw);
        assert_eq!(code_of(src.get_tcp_log()), code);
    }
}

#[test]
fn test_send_tcp_data_mapping() {
    let lib = stub_library();
    let src = source(&lib);

    set_ret(1);
    set_text("ACK");
    assert_eq!(src.send_tcp_data("hello").unwrap().as_deref(), Some("ACK"));

    set_ret(4);
    assert_eq!(code_of(src.send_tcp_data("hello")), ErrorCode::ServerDown);
    set_ret(10);
    assert_eq!(code_of(src.send_tcp_data("hello")), ErrorCode::ParamError);
    set_ret(2);
    assert_eq!(code_of(src.send_tcp_data("hello")), ErrorCode::Err);
}

#[test]
fn test_save_data_mapping() {
    let lib = stub_library();
    let src = source(&lib);

    set_ret(0);
    assert!(src.start_save_binary_data(None).is_ok());
    assert!(src.stop_save_binary_data().is_ok());
    assert!(src.start_save_report_data(Some("run1")).is_ok());

    set_ret(7);
    let err = src.start_save_binary_data(Some("run1")).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::ParamError));
    assert_eq!(err.message(), Some("No connection for source_id: 3"));

    set_ret(10);
    assert_eq!(code_of(src.stop_save_binary_data()), ErrorCode::ParamError);
}

#[test]
fn test_info_queries() {
    let lib = stub_library();
    let src = source(&lib);

    assert_eq!(src.user_id(), Some(1));
    USER_ID.with(|u| u.set(0xFF));
    assert_eq!(src.user_id(), None);

    assert_eq!(src.device_start_state(), DeviceStartState::WarmStart);
    assert_eq!(src.firmware_version(), 70);
    assert!(!src.has_fram());
    assert_eq!(src.pending_commands(), 0);
}

#[test]
fn test_error_display_carries_code_and_message() {
    let lib = stub_library();
    set_ret(4);
    set_text("server offline");
    let err = source(&lib).get_report().unwrap_err();
    let text = err.to_string();
    assert!(text.contains("raw 4"), "{}", text);
    assert!(text.contains("server offline"), "{}", text);
}
