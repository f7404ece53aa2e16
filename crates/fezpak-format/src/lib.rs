//! FEZ .pak archive codec.
//!
//! A pak is a flat container with no compression, footer or checksum:
//!
//! ```text
//! archive := entry_count:u32 entry*
//! entry   := name_len:u8 name:[u8; name_len] data_size:u32 data:[u8; data_size]
//! ```
//!
//! Names use `\` as the separator and are usually stored without their file
//! extension. This crate provides:
//!
//! - [`IndexReader`] - lazy, single-pass scanning of the entry headers
//! - [`pack_buffers`] / [`pack_files`] - archive writers
//! - [`extract`] / [`unpack`] - copying entry data back to files
//! - [`PakArchive`] - a memory-mapped archive for random access
//!
//! # Example
//!
//! ```no_run
//! use std::fs::File;
//! use fezpak_format::read_index;
//!
//! let file = File::open("Essentials.pak")?;
//! for entry in read_index(file)? {
//!     let entry = entry?;
//!     println!("{:>10} {:>10} {}", entry.offset(), entry.size(), entry.name());
//! }
//! # Ok::<(), fezpak_format::Error>(())
//! ```

mod archive;
mod entry;
mod error;
mod extract;
mod index;
mod observer;
mod unpack;
mod writer;

pub use archive::PakArchive;
pub use entry::{header_len, PakEntry, HEADER_FIXED_LEN};
pub use error::{Error, Result};
pub use extract::{copy_range_buffered, extract, RangeSource, CHUNK_SIZE};
pub use index::{read_entries, read_index, IndexReader};
pub use observer::{EntryObserver, Silent};
pub use unpack::{
    output_path_for, unpack, unpack_entry, unpack_files, ExtensionPolicy, Selection,
    UnpackOptions,
};
pub use writer::{
    collect_files, pack_buffers, pack_files, stored_name, write_entry_header, PackOptions,
};
