//! Typed arguments and results for KK Library calls

use super::error::KkError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Source identifier returned by `CreateMultiSource`
///
/// Opaque to this crate: validity is owned by the vendor library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceId(pub i32);

impl SourceId {
    pub fn raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What `Multi_EnumerateDevices` should look for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumFlags {
    /// Serial ports only
    SerialPorts,
    /// K+K devices found on USB
    Usb,
    /// Serial ports and K+K devices on USB
    LocalDevices,
}

impl EnumFlags {
    pub fn bits(self) -> u8 {
        match self {
            Self::SerialPorts => 1,
            Self::Usb => 2,
            Self::LocalDevices => 3,
        }
    }

    pub fn from_bits(bits: u8) -> Result<Self, KkError> {
        match bits {
            1 => Ok(Self::SerialPorts),
            2 => Ok(Self::Usb),
            3 => Ok(Self::LocalDevices),
            _ => Err(KkError::param("Invalid enum_Flags, must be 1..3")),
        }
    }
}

/// File management of debug log output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebugLogType {
    /// One file, unlimited size, reopen overwrites
    #[default]
    Unlimited,
    /// One file, limited size, oldest output overwritten
    Overwrite,
    /// New time-stamped file whenever the size limit is reached
    CreateNew,
}

impl DebugLogType {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Unlimited => 0,
            Self::Overwrite => 1,
            Self::CreateNew => 2,
        }
    }
}

/// LOG level entry types used by the TCP server and log clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogType {
    Phase,
    Freq,
    PhaseDiff,
    Nsz,
    NszDiff,
    PhasePredecessor,
    User1,
    User2,
}

impl LogType {
    pub const ALL: [LogType; 8] = [
        Self::Phase,
        Self::Freq,
        Self::PhaseDiff,
        Self::Nsz,
        Self::NszDiff,
        Self::PhasePredecessor,
        Self::User1,
        Self::User2,
    ];

    pub fn as_i32(self) -> i32 {
        match self {
            Self::Phase => 0,
            Self::Freq => 1,
            Self::PhaseDiff => 2,
            Self::Nsz => 3,
            Self::NszDiff => 4,
            Self::PhasePredecessor => 5,
            Self::User1 => 6,
            Self::User2 => 7,
        }
    }

    pub fn from_i32(value: i32) -> Result<Self, KkError> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_i32() == value)
            .ok_or_else(|| KkError::param(format!("Invalid parameter log_type: {}", value)))
    }

    /// Mode name understood by `Multi_OpenTcpLog`
    pub fn name(self) -> &'static str {
        match self {
            Self::Phase => "PHASELOG",
            Self::Freq => "FREQLOG",
            Self::PhaseDiff => "PHASEDIFFLOG",
            Self::Nsz => "NSZLOG",
            Self::NszDiff => "NSZDIFFLOG",
            Self::PhasePredecessor => "PHASEPREDECESSORLOG",
            Self::User1 => "USERLOG1",
            Self::User2 => "USERLOG2",
        }
    }
}

impl fmt::Display for LogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LogType {
    type Err = KkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| KkError::param(format!("Invalid parameter mode: {}", s)))
    }
}

/// Decimal separator for float <-> string conversion in the vendor library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecimalSeparator {
    #[default]
    Point,
    Comma,
}

impl DecimalSeparator {
    pub fn as_char(self) -> char {
        match self {
            Self::Point => '.',
            Self::Comma => ',',
        }
    }

    pub fn from_char(c: char) -> Result<Self, KkError> {
        match c {
            '.' => Ok(Self::Point),
            ',' => Ok(Self::Comma),
            other => Err(KkError::param(format!(
                "Invalid parameter separator: {}",
                other
            ))),
        }
    }

    /// Format `value` with three decimals using this separator
    pub fn format_fixed3(self, value: f64) -> String {
        let text = format!("{:.3}", value);
        match self {
            Self::Point => text,
            Self::Comma => text.replace('.', ","),
        }
    }
}

/// Count of NSZ measurements sent by the card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NszCount(i32);

impl NszCount {
    pub const ONE: NszCount = NszCount(1);
    pub const TWO: NszCount = NszCount(2);

    pub fn new(value: i32) -> Result<Self, KkError> {
        match value {
            1 | 2 => Ok(Self(value)),
            other => Err(KkError::param(format!("Invalid parameter aNSZ: {}", other))),
        }
    }

    pub fn get(self) -> i32 {
        self.0
    }
}

/// Device state at application start (`Multi_GetDeviceStartState`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeviceStartState {
    /// Source ID invalid or no time stamp received yet
    Unknown,
    /// Device was restarted
    ColdStart,
    WarmStart,
}

impl DeviceStartState {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => Self::ColdStart,
            2 => Self::WarmStart,
            _ => Self::Unknown,
        }
    }
}

/// Local host name and IPv4 addresses
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HostInfo {
    pub host: Option<String>,
    pub ips: Vec<String>,
    /// At least one string was cut to the 80 byte buffer
    pub truncated: bool,
}

/// One report or log entry read from the library
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    /// `None` when no report was available
    pub text: Option<String>,
    /// Text was cut to the 1024 byte buffer
    pub truncated: bool,
}

impl Report {
    pub fn is_empty(&self) -> bool {
        self.text.is_none()
    }
}

/// Parsed `Multi_GetDLLVersion` string (e.g. "19.03.01")
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LibraryVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl LibraryVersion {
    /// Oldest library release exporting every wrapped function
    pub const MINIMUM: LibraryVersion = LibraryVersion::new(19, 3, 1);

    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl FromStr for LibraryVersion {
    type Err = KkError;

    /// Accepts "major[.minor[.patch]]" optionally followed by a blank and free text
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || KkError::invalid_argument(format!("invalid library version '{}'", s));
        let numeric = s.trim().split(' ').next().ok_or_else(invalid)?;
        let mut parts = numeric.split('.');
        let mut next = |required: bool| -> Result<u32, KkError> {
            match parts.next() {
                Some(p) => p.parse::<u32>().map_err(|_| invalid()),
                None if required => Err(invalid()),
                None => Ok(0),
            }
        };
        let major = next(true)?;
        let minor = next(false)?;
        let patch = next(false)?;
        Ok(Self::new(major, minor, patch))
    }
}

impl fmt::Display for LibraryVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
