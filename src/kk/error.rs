//! KK Library error handling
//!
//! Raw return values from the vendor library are plain integers. The binding
//! layer hands them back untouched; `Source` maps them onto [`ErrorCode`] using
//! the conventions documented by the vendor.

use std::fmt;
use thiserror::Error;

/// Result codes reported to callers of the interpreted API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Successful operation
    NoErr,
    /// Operation failed
    Err,
    /// Enumeration of serial ports failed
    EnumSerial,
    /// Enumeration of USB devices failed
    EnumUsb,
    /// Enumeration of serial ports and USB devices failed
    EnumSerialUsb,
    /// Returned text was truncated to the buffer size
    BufferTooSmall,
    /// Data was lost, the application does not read fast enough
    BufferOverflow,
    /// Writing via the current connection failed
    Write,
    /// Connection to the K+K server broke, server is down
    ServerDown,
    /// Connection to the K+K device is interrupted
    DeviceNotConnected,
    /// Device does not send measurement data, connection closed
    HardwareFault,
    /// A parameter has an invalid value (including unknown source IDs)
    ParamError,
    /// Command rejected (no connection or waiting queue full)
    CmdIgnored,
    /// Function not supported by the K+K device
    NotSupported,
    /// An interrupted connection was re-established with data loss
    Reconnected,
}

impl ErrorCode {
    pub fn as_i32(self) -> i32 {
        match self {
            Self::NoErr => 0,
            Self::Err => 1,
            Self::EnumSerial => 2,
            Self::EnumUsb => 3,
            Self::EnumSerialUsb => 4,
            Self::BufferTooSmall => 5,
            Self::BufferOverflow => 6,
            Self::Write => 7,
            Self::ServerDown => 8,
            Self::DeviceNotConnected => 9,
            Self::HardwareFault => 10,
            Self::ParamError => 11,
            Self::CmdIgnored => 12,
            Self::NotSupported => 13,
            Self::Reconnected => 14,
        }
    }

    pub fn from_i32(value: i32) -> Option<Self> {
        let code = match value {
            0 => Self::NoErr,
            1 => Self::Err,
            2 => Self::EnumSerial,
            3 => Self::EnumUsb,
            4 => Self::EnumSerialUsb,
            5 => Self::BufferTooSmall,
            6 => Self::BufferOverflow,
            7 => Self::Write,
            8 => Self::ServerDown,
            9 => Self::DeviceNotConnected,
            10 => Self::HardwareFault,
            11 => Self::ParamError,
            12 => Self::CmdIgnored,
            13 => Self::NotSupported,
            14 => Self::Reconnected,
            _ => return None,
        };
        Some(code)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::NoErr => "KK_NO_ERR",
            Self::Err => "KK_ERR",
            Self::EnumSerial => "KK_ERR_ENUM_SERIAL",
            Self::EnumUsb => "KK_ERR_ENUM_USB",
            Self::EnumSerialUsb => "KK_ERR_ENUM_SERIAL_USB",
            Self::BufferTooSmall => "KK_ERR_BUFFER_TOO_SMALL",
            Self::BufferOverflow => "KK_ERR_BUFFER_OVERFLOW",
            Self::Write => "KK_ERR_WRITE",
            Self::ServerDown => "KK_ERR_SERVER_DOWN",
            Self::DeviceNotConnected => "KK_ERR_DEVICE_NOT_CONNECTED",
            Self::HardwareFault => "KK_HARDWARE_FAULT",
            Self::ParamError => "KK_PARAM_ERROR",
            Self::CmdIgnored => "KK_CMD_IGNORED",
            Self::NotSupported => "KK_ERR_NOT_SUPPORTED",
            Self::Reconnected => "KK_ERR_RECONNECTED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors produced by the binding layer and the interpreted API
#[derive(Debug, Error)]
pub enum KkError {
    /// The vendor binary could not be loaded
    #[error("loading K+K library ({path}) failed: {source}")]
    Load {
        path: String,
        #[source]
        source: libloading::Error,
    },

    /// The vendor binary lacks an expected export
    #[error("K+K library does not export {symbol}: {source}")]
    MissingSymbol {
        symbol: &'static str,
        #[source]
        source: libloading::Error,
    },

    /// An argument could not be marshaled or was rejected before the call
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The vendor library reported a failure
    #[error("KK error {code} (raw {raw}){}", message_suffix(.message))]
    Status {
        code: ErrorCode,
        raw: i32,
        message: Option<String>,
    },

    /// `Multi_GetHostAndIPs` delivered the host name but failed afterwards
    #[error("KK error {code} (raw {raw}) for host {host}{}", message_suffix(.message))]
    HostLookup {
        code: ErrorCode,
        raw: i32,
        host: String,
        message: Option<String>,
    },

    /// The loaded library is older than required
    #[error("invalid K+K library version {found}, needs {required}")]
    UnsupportedVersion { found: String, required: String },

    /// `Multi_GetDLLVersion` returned nothing parseable
    #[error("K+K library did not report a version")]
    MissingVersion,
}

fn message_suffix(message: &Option<String>) -> String {
    match message {
        Some(message) => format!(": {}", message),
        None => String::new(),
    }
}

impl KkError {
    /// Create a status error from a vendor return value
    pub fn status(code: ErrorCode, raw: i32, message: Option<String>) -> Self {
        Self::Status { code, raw, message }
    }

    /// Create a parameter error for an argument rejected before the call
    ///
    /// `raw` is zero because no foreign call was made.
    pub fn param(message: impl Into<String>) -> Self {
        Self::Status {
            code: ErrorCode::ParamError,
            raw: 0,
            message: Some(message.into()),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Result code, if this error came from a status mapping
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Status { code, .. } | Self::HostLookup { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Vendor message attached to a status error
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Status { message, .. } | Self::HostLookup { message, .. } => {
                message.as_deref()
            }
            _ => None,
        }
    }

    /// Host name delivered before a failed host query
    pub fn host(&self) -> Option<&str> {
        match self {
            Self::HostLookup { host, .. } => Some(host),
            _ => None,
        }
    }
}

/// Raw return values used by the vendor library (for pattern matching)
pub mod codes {
    /// Return value of call-style functions on success
    pub const OK: i32 = 1;
    /// Generic failure of call-style functions
    pub const FAILED: i32 = 0;
    /// Enumeration of serial ports failed
    pub const ENUM_SERIAL_FAILED: i32 = -1;
    /// Enumeration of USB devices failed
    pub const ENUM_USB_FAILED: i32 = -2;
    /// Writing via current connection failed
    pub const WRITE_FAILED: i32 = 3;
    /// K+K TCP server is down
    pub const SERVER_DOWN: i32 = 4;
    /// Buffer was too small, text truncated
    pub const BUFFER_TOO_SMALL: i32 = 6;
    /// No connection to the K+K device
    pub const NOT_CONNECTED: i32 = 7;
    /// Data was lost
    pub const BUFFER_OVERFLOW: i32 = 8;
    /// Measurement hardware fault
    pub const HARDWARE_FAULT: i32 = 9;
    /// Unknown source ID or invalid parameter
    pub const INVALID_SOURCE: i32 = 10;
    /// Command rejected
    pub const CMD_IGNORED: i32 = 11;
    /// Feature needs newer firmware
    pub const NOT_SUPPORTED: i32 = 12;
    /// Connection was re-established
    pub const RECONNECTED: i32 = 13;
    /// `Multi_GetUserID` error value
    pub const USER_ID_ERROR: u8 = 0xFF;

    /// Prefix of vendor error strings for unknown source IDs
    pub const SOURCE_NOT_FOUND_PREFIX: &str = "Source-ID ";
}
