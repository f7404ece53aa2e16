//! Archive name handling.
//!
//! Stored names use `\` as the path separator. They are decoded one byte per
//! character (Latin-1) when read, but encoded as UTF-8 when written. For
//! 7-bit names both directions agree; for anything else they do not, and
//! that asymmetry is kept for compatibility with existing archives.

use std::path::{MAIN_SEPARATOR, MAIN_SEPARATOR_STR};

/// The separator used inside archive names.
pub const ARCHIVE_SEPARATOR: char = '\\';

/// Decode raw name bytes, one byte per character.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Rewrite archive separators to the host separator.
pub fn to_host_separators(name: String) -> String {
    if MAIN_SEPARATOR == ARCHIVE_SEPARATOR || memchr::memchr(b'\\', name.as_bytes()).is_none() {
        return name;
    }
    name.replace(ARCHIVE_SEPARATOR, MAIN_SEPARATOR_STR)
}

/// Rewrite host separators to the archive separator.
pub fn to_archive_separators(name: &str) -> String {
    if MAIN_SEPARATOR == ARCHIVE_SEPARATOR {
        return name.to_string();
    }
    name.replace(MAIN_SEPARATOR, "\\")
}

/// Decode a stored name into a host-separated name.
pub fn decode_name(bytes: &[u8]) -> String {
    to_host_separators(decode_latin1(bytes))
}

/// Encode a host-separated name into stored bytes.
pub fn encode_name(name: &str) -> Vec<u8> {
    to_archive_separators(name).into_bytes()
}

/// Split a host-separated name into its non-empty components.
pub fn components(name: &str) -> impl Iterator<Item = &str> {
    name.split(MAIN_SEPARATOR).filter(|c| !c.is_empty())
}
