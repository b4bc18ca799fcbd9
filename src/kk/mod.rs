//! K+K measuring card library wrapper
//!
//! Runtime bindings for the vendor KK Library: a raw layer mirroring every
//! exported function ([`KkLibrary`]) and an interpreted per-source layer
//! ([`Source`]) mapping vendor return codes onto [`KkError`].

pub mod buffer;
pub mod commands;
pub mod error;
pub mod ffi;
pub mod fhr;
pub mod library;
pub mod source;
pub mod types;

// Re-exports for convenience
pub use commands::Command;
pub use error::{ErrorCode, KkError};
pub use ffi::KkApi;
pub use fhr::{FhrData, FhrSettings};
pub use library::{default_library_name, BufferReply, HostReply, KkLibrary};
pub use source::{enumerate_devices, host_and_ips, Source};
pub use types::{
    DebugLogType, DecimalSeparator, DeviceStartState, EnumFlags, HostInfo, LibraryVersion,
    LogType, NszCount, Report, SourceId,
};
