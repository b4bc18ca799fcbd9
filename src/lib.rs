//! kklib-rs: runtime bindings for the K+K measuring card library
//!
//! The `kk` module loads the vendor library and exposes every exported
//! function; `reader` pumps reports from one source to a file or stdout.

pub mod common;
pub mod config;
pub mod kk;
pub mod reader;
