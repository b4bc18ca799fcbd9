//! Buffers passed across the KK Library boundary
//!
//! The vendor writes NUL-terminated text into caller-allocated buffers of a
//! documented size. Text is only ever read up to the first NUL *inside* the
//! buffer; a buffer filled to the last byte is taken whole.

use super::error::KkError;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;

/// Buffer size for names, reports, connection strings and error messages
pub const REPORT_BUFFER_LEN: usize = 1024;

/// Buffer size for each `Multi_GetHostAndIPs` output
pub const HOST_BUFFER_LEN: usize = 80;

/// Zero-filled, caller-owned output buffer
#[derive(Debug, Clone)]
pub struct OutputBuffer {
    bytes: Vec<u8>,
}

impl OutputBuffer {
    /// Allocate a zeroed buffer of `len` bytes
    pub fn new(len: usize) -> Self {
        Self {
            bytes: vec![0u8; len],
        }
    }

    /// Buffer sized for reports and messages (1024 bytes)
    pub fn report() -> Self {
        Self::new(REPORT_BUFFER_LEN)
    }

    /// Buffer sized for host name / IP list / error text (80 bytes)
    pub fn host() -> Self {
        Self::new(HOST_BUFFER_LEN)
    }

    /// Allocate a report buffer pre-filled with `input`
    ///
    /// Used for calls where the vendor reads an argument from the buffer and
    /// may overwrite it with an error message. A terminating NUL is always
    /// kept inside the buffer.
    pub fn with_input(input: &[u8]) -> Result<Self, KkError> {
        if input.len() >= REPORT_BUFFER_LEN {
            return Err(KkError::invalid_argument(format!(
                "argument of {} bytes leaves no room for the terminating NUL in the {} byte buffer",
                input.len(),
                REPORT_BUFFER_LEN
            )));
        }
        Self::with_bytes(input)
    }

    /// Allocate a report buffer pre-filled with `input`, which may fill it
    ///
    /// For calls that receive the length explicitly and need no terminator.
    pub fn with_bytes(input: &[u8]) -> Result<Self, KkError> {
        if input.len() > REPORT_BUFFER_LEN {
            return Err(KkError::invalid_argument(format!(
                "argument of {} bytes exceeds the {} byte buffer",
                input.len(),
                REPORT_BUFFER_LEN
            )));
        }
        let mut buffer = Self::report();
        buffer.bytes[..input.len()].copy_from_slice(input);
        Ok(buffer)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_mut_ptr(&mut self) -> *mut c_char {
        self.bytes.as_mut_ptr().cast()
    }

    /// Raw contents
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Bytes before the first NUL (or the whole buffer)
    pub fn text_bytes(&self) -> &[u8] {
        let end = self
            .bytes
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.bytes.len());
        &self.bytes[..end]
    }

    /// Decoded text, `None` when the first byte is NUL
    pub fn text(&self) -> Option<String> {
        let bytes = self.text_bytes();
        if bytes.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

/// Owned C string argument
pub fn c_string(value: &str, what: &str) -> Result<CString, KkError> {
    CString::new(value)
        .map_err(|_| KkError::invalid_argument(format!("{} contains null byte", what)))
}

/// Optional C string argument (`None` is passed as a null pointer)
pub fn c_string_opt(value: Option<&str>, what: &str) -> Result<Option<CString>, KkError> {
    value.map(|v| c_string(v, what)).transpose()
}

/// Pointer for an optional C string argument
///
/// The header declares these arguments as `char *`; the vendor only reads them.
pub fn opt_ptr(value: &Option<CString>) -> *mut c_char {
    value
        .as_ref()
        .map_or(std::ptr::null_mut(), |v| v.as_ptr() as *mut c_char)
}

/// Copy a library-owned string into an owned `String`
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string that stays valid
/// for the duration of this call.
pub unsafe fn string_from_ptr(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
}
