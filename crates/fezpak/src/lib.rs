//! Fezpak - FEZ .pak archive library.
//!
//! This crate provides a unified interface to the fezpak crates.
//!
//! # Crates
//!
//! - [`fezpak_common`] - Common utilities (stream reading, name decoding)
//! - [`fezpak_sniff`] - Magic-byte content type detection
//! - [`fezpak_format`] - Pak index codec, writers and extraction
//! - [`fezpak_vfs`] - Inode tree and read-only filesystem view
//!
//! # Example
//!
//! ```no_run
//! use fezpak::prelude::*;
//!
//! // Open a pak archive
//! let archive = PakArchive::open("Essentials.pak")?;
//!
//! // Find a file and guess its type
//! if let Some(entry) = archive.find("other textures/fezlogo") {
//!     let data = archive.data(entry);
//!     println!("{} bytes of {}", data.len(), Sniffer::default().sniff_slice(data, 0, data.len()));
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Re-export all sub-crates
pub use fezpak_common as common;
pub use fezpak_format as format;
pub use fezpak_sniff as sniff;
pub use fezpak_vfs as vfs;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use fezpak_format::{
        pack_buffers, pack_files, read_index, unpack, unpack_files, EntryObserver,
        ExtensionPolicy, IndexReader, PackOptions, PakArchive, PakEntry, Selection, Silent,
        UnpackOptions,
    };
    pub use fezpak_sniff::Sniffer;
    pub use fezpak_vfs::{
        BuildOptions, DuplicatePolicy, NodeId, PakFs, PakTree, ReadOnlyFilesystem, TreeBuilder,
    };
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
