//! Magic-byte content sniffing for FEZ .pak entries.
//!
//! Archives are usually packed with file extensions stripped. When unpacking
//! or mounting, the extension can be recovered from the first few bytes of
//! each entry's data:
//!
//! - `XNBw...` - compiled XNA asset (`.xnb`)
//! - `OggS` - Ogg container (`.ogg`)
//! - `RIFF....WAVE` - wave audio (`.wav`)
//! - ...and a handful of common image, video and markup formats
//!
//! # Example
//!
//! ```
//! use fezpak_sniff::Sniffer;
//!
//! let sniffer = Sniffer::default();
//! assert_eq!(sniffer.classify(b"GIF89a\x01\x00"), "gif");
//! assert_eq!(sniffer.classify(&[0u8; 16]), "bin");
//! ```

mod rules;
mod sniffer;

pub use rules::{MatchRule, RuleGroup, BUILTIN_GROUPS};
pub use sniffer::Sniffer;

/// Extension used when no rule matches.
pub const DEFAULT_EXTENSION: &str = "bin";
