//! Pak archive writers.
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! archive := entry_count:u32 entry*
//! entry   := name_len:u8 name:[u8; name_len] data_size:u32 data:[u8; data_size]
//! ```
//!
//! Names are written with `\` separators and encoded as UTF-8. Entries are
//! always written sorted by name so that output is deterministic.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR_STR};

use byteorder::{LittleEndian, WriteBytesExt};
use fezpak_common::name;
use tracing::debug;
use walkdir::WalkDir;

use crate::extract::{read_chunk, CHUNK_SIZE};
use crate::observer::EntryObserver;
use crate::{Error, Result};

/// Options for [`pack_files`].
#[derive(Debug, Clone, Default)]
pub struct PackOptions {
    /// Drop each file's extension from its stored name.
    pub remove_extension: bool,
    /// File never packed, even when a walked directory contains it.
    ///
    /// Set this to the output archive so it is not packed into itself.
    pub exclude: Option<PathBuf>,
}

/// Write a single entry header: name length, name and data size.
///
/// The encoded name must not exceed 255 bytes.
pub fn write_entry_header<W: Write + ?Sized>(out: &mut W, name: &str, size: u32) -> Result<()> {
    let encoded = name::encode_name(name);
    let len = u8::try_from(encoded.len()).map_err(|_| Error::NameTooLong {
        name: name.to_string(),
        len: encoded.len(),
    })?;

    out.write_u8(len)?;
    out.write_all(&encoded)?;
    out.write_u32::<LittleEndian>(size)?;
    Ok(())
}

fn write_count<W: Write + ?Sized>(out: &mut W, count: usize) -> Result<()> {
    let count = u32::try_from(count).map_err(|_| Error::TooManyEntries(count))?;
    out.write_u32::<LittleEndian>(count)?;
    Ok(())
}

fn data_size(name: &str, len: u64) -> Result<u32> {
    u32::try_from(len).map_err(|_| Error::EntryTooLarge {
        name: name.to_string(),
        size: len,
    })
}

/// Write an archive from in-memory buffers, sorted by name.
///
/// Returns the number of entries written.
pub fn pack_buffers<W, I, K, V>(
    out: &mut W,
    buffers: I,
    observer: &mut dyn EntryObserver,
) -> Result<usize>
where
    W: Write + ?Sized,
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<[u8]>,
{
    let mut buffers: Vec<(K, V)> = buffers.into_iter().collect();
    buffers.sort_by(|a, b| str::cmp(a.0.as_ref(), b.0.as_ref()));

    write_count(out, buffers.len())?;
    for (name, data) in &buffers {
        let name: &str = name.as_ref();
        let data: &[u8] = data.as_ref();
        observer.entry_processed(name);
        write_entry_header(out, name, data_size(name, data.len() as u64)?)?;
        out.write_all(data)?;
    }

    Ok(buffers.len())
}

/// Enumerate the files to pack.
///
/// Directories are walked recursively for regular files (or links to
/// them); plain file arguments are taken as given. Any file that is the
/// same file as `exclude` is skipped. The combined list is sorted by path.
pub fn collect_files<P: AsRef<Path>>(
    inputs: &[P],
    exclude: Option<&Path>,
) -> Result<Vec<PathBuf>> {
    let excluded = exclude.and_then(|path| FileId::of(path).ok());
    let is_excluded = |path: &Path| {
        let skip = excluded
            .as_ref()
            .is_some_and(|excluded| FileId::of(path).is_ok_and(|id| id == *excluded));
        if skip {
            debug!(path = %path.display(), "skipping excluded file");
        }
        skip
    };
    let mut files = Vec::new();

    for input in inputs {
        let input = input.as_ref();
        if !input.is_dir() {
            if !is_excluded(input) {
                files.push(input.to_path_buf());
            }
            continue;
        }

        for entry in WalkDir::new(input).follow_links(false) {
            let entry = entry.map_err(io::Error::from)?;
            let file_type = entry.file_type();
            let is_file = file_type.is_file() || (file_type.is_symlink() && entry.path().is_file());
            if is_file && !is_excluded(entry.path()) {
                files.push(entry.into_path());
            }
        }
    }

    files.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
    Ok(files)
}

/// Identity of a file on disk, independent of the path used to reach it.
#[derive(Debug, PartialEq, Eq)]
struct FileId {
    #[cfg(unix)]
    dev: u64,
    #[cfg(unix)]
    ino: u64,
    #[cfg(not(unix))]
    path: PathBuf,
}

impl FileId {
    #[cfg(unix)]
    fn of(path: &Path) -> io::Result<Self> {
        use std::os::unix::fs::MetadataExt;

        let metadata = fs::metadata(path)?;
        Ok(Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        })
    }

    #[cfg(not(unix))]
    fn of(path: &Path) -> io::Result<Self> {
        Ok(Self {
            path: fs::canonicalize(path)?,
        })
    }
}

/// Name under which a source file is stored.
///
/// `.` and root components are dropped, so packing `./music/intro.ogg`
/// stores `music/intro.ogg` (with host separators until written).
pub fn stored_name(path: &Path, remove_extension: bool) -> String {
    let stripped;
    let path = if remove_extension {
        stripped = path.with_extension("");
        stripped.as_path()
    } else {
        path
    };

    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            Component::ParentDir => Some("..".into()),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => None,
        })
        .collect::<Vec<_>>()
        .join(MAIN_SEPARATOR_STR)
}

/// Write an archive from files and directories on disk.
///
/// Returns the stored names in archive order. A source file that cannot be
/// read aborts packing with its I/O error.
pub fn pack_files<W, P>(
    out: &mut W,
    inputs: &[P],
    options: &PackOptions,
    observer: &mut dyn EntryObserver,
) -> Result<Vec<String>>
where
    W: Write + ?Sized,
    P: AsRef<Path>,
{
    let files = collect_files(inputs, options.exclude.as_deref())?;
    write_count(out, files.len())?;

    let mut names = Vec::with_capacity(files.len());
    let mut buf = vec![0u8; CHUNK_SIZE];
    for path in &files {
        let source = |source| Error::Source {
            path: path.clone(),
            source,
        };

        let file = File::open(path).map_err(source)?;
        let len = file.metadata().map_err(source)?.len();
        let name = stored_name(path, options.remove_extension);
        let size = data_size(&name, len)?;

        observer.entry_processed(&name);
        write_entry_header(out, &name, size)?;

        let copied = copy_source(path, &mut file.take(len), out, &mut buf)?;
        if copied != len {
            return Err(fezpak_common::Error::Truncated {
                what: "source file",
                position: copied,
                needed: len,
                available: copied,
            }
            .into());
        }

        names.push(name);
    }

    Ok(names)
}

/// Copy a source file into the archive.
///
/// Read failures name the source file; write failures are archive I/O.
fn copy_source<R, W>(path: &Path, source: &mut R, out: &mut W, buf: &mut [u8]) -> Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut copied = 0;
    loop {
        let got = read_chunk(source, buf).map_err(|source| Error::Source {
            path: path.to_path_buf(),
            source,
        })?;
        if got == 0 {
            return Ok(copied);
        }
        out.write_all(&buf[..got])?;
        copied += got as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::Silent;
    use crate::read_entries;
    use std::io::Cursor;

    #[test]
    fn test_header_layout() {
        let mut out = Vec::new();
        write_entry_header(&mut out, "ab", 0x0102_0304).unwrap();
        assert_eq!(out, vec![2, b'a', b'b', 0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn test_header_uses_backslash() {
        let mut out = Vec::new();
        let name = ["sfx", "door"].join(MAIN_SEPARATOR_STR);
        write_entry_header(&mut out, &name, 0).unwrap();
        assert_eq!(&out[1..9], b"sfx\\door");
    }

    #[test]
    fn test_name_too_long() {
        let name = "x".repeat(256);
        let err = write_entry_header(&mut Vec::new(), &name, 0).unwrap_err();
        assert!(matches!(err, Error::NameTooLong { len: 256, .. }));

        write_entry_header(&mut Vec::new(), &"x".repeat(255), 0).unwrap();
    }

    #[test]
    fn test_buffers_sorted_and_readable() {
        let mut out = Vec::new();
        let mut seen = Vec::new();
        let count = pack_buffers(
            &mut out,
            vec![("zeta", b"zz".to_vec()), ("alpha", b"a".to_vec())],
            &mut |name: &str| seen.push(name.to_string()),
        )
        .unwrap();

        assert_eq!(count, 2);
        assert_eq!(seen, vec!["alpha", "zeta"]);

        let entries = read_entries(Cursor::new(&out)).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);

        let headers: u64 = entries.iter().map(|e| 1 + e.name().len() as u64 + 4).sum();
        let data: u64 = entries.iter().map(|e| u64::from(e.size())).sum();
        assert_eq!(4 + headers + data, out.len() as u64);
    }

    #[test]
    fn test_empty_buffers() {
        let mut out = Vec::new();
        let none: Vec<(&str, &[u8])> = Vec::new();
        pack_buffers(&mut out, none, &mut Silent).unwrap();
        assert_eq!(out, vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_stored_name() {
        let path = Path::new(".").join("music").join("intro.ogg");
        let sep = MAIN_SEPARATOR_STR;
        assert_eq!(stored_name(&path, false), format!("music{sep}intro.ogg"));
        assert_eq!(stored_name(&path, true), format!("music{sep}intro"));
        assert_eq!(stored_name(Path::new(".hidden"), true), ".hidden");
        assert_eq!(stored_name(Path::new("a.tar.gz"), true), "a.tar");
    }

    #[test]
    fn test_missing_source_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = pack_files(&mut Vec::new(), &[missing], &PackOptions::default(), &mut Silent)
            .unwrap_err();
        assert!(matches!(err, Error::Source { .. }));
    }

    #[test]
    fn test_output_inside_input_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("big.bin"), vec![7u8; 20_000]).unwrap();
        let pak_path = dir.path().join("out.pak");

        let options = PackOptions {
            exclude: Some(pak_path.clone()),
            ..PackOptions::default()
        };
        let mut out = io::BufWriter::new(File::create(&pak_path).unwrap());
        let names = pack_files(&mut out, &[dir.path()], &options, &mut Silent).unwrap();
        out.flush().unwrap();
        drop(out);

        assert_eq!(names.len(), 1);
        assert!(names[0].ends_with("big.bin"));

        let entries = read_entries(File::open(&pak_path).unwrap()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].size(), 20_000);
    }

    #[test]
    fn test_exclude_matches_other_spellings() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a"), b"a").unwrap();
        fs::write(dir.path().join("b"), b"b").unwrap();

        let exclude = dir.path().join(".").join("b");
        let files = collect_files(&[dir.path()], Some(&exclude)).unwrap();
        assert_eq!(files, vec![dir.path().join("a")]);
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "bad sector"))
        }
    }

    #[test]
    fn test_copy_errors_name_the_failing_side() {
        let path = Path::new("source.bin");
        let mut buf = [0u8; 16];

        let err = copy_source(path, &mut &b"data"[..], &mut FailingWriter, &mut buf).unwrap_err();
        assert!(matches!(err, Error::Io(_)));

        let err = copy_source(path, &mut FailingReader, &mut Vec::new(), &mut buf).unwrap_err();
        assert!(matches!(err, Error::Source { ref path, .. } if path == Path::new("source.bin")));
    }
}
