//! Common utilities for fezpak.
//!
//! This crate provides the foundational pieces shared by the other fezpak crates:
//!
//! - [`StreamReader`] - Position-tracking little-endian reader over a seekable stream
//! - [`name`] - Archive name decoding and path separator rewriting
//! - [`Error`] - Truncation and I/O errors carrying byte positions

mod error;
mod reader;

pub mod name;

pub use error::{Error, Result};
pub use reader::StreamReader;

/// Re-export memchr for byte searching
pub use memchr;
