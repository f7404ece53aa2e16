//! Unpacking archives to a directory.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR};

use fezpak_sniff::Sniffer;

use crate::extract::{extract, RangeSource};
use crate::index::read_index;
use crate::observer::EntryObserver;
use crate::{Error, PakEntry, Result};

/// How the extension of an output name is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionPolicy {
    /// Append a fixed suffix (possibly empty) to every stored name.
    Literal(String),
    /// Append `.` plus the extension sniffed from the entry's data.
    Sniff,
}

impl Default for ExtensionPolicy {
    fn default() -> Self {
        ExtensionPolicy::Literal(String::new())
    }
}

impl ExtensionPolicy {
    /// Suffix for an entry, sniffing its data through `source` if needed.
    pub fn suffix_for<S: RangeSource + ?Sized>(
        &self,
        sniffer: &Sniffer,
        source: &mut S,
        entry: &PakEntry,
    ) -> Result<String> {
        match self {
            ExtensionPolicy::Literal(ext) => Ok(ext.clone()),
            ExtensionPolicy::Sniff => {
                let ext = sniffer.sniff(source, entry.offset(), u64::from(entry.size()))?;
                Ok(format!(".{ext}"))
            }
        }
    }
}

/// Options for [`unpack`] and [`unpack_files`].
#[derive(Debug, Clone)]
pub struct UnpackOptions {
    /// Directory that receives the unpacked tree.
    pub out_dir: PathBuf,
    /// Extension handling for output names.
    pub extension: ExtensionPolicy,
}

impl Default for UnpackOptions {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("."),
            extension: ExtensionPolicy::default(),
        }
    }
}

/// Selection of entries by name or directory prefix.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    names: HashSet<String>,
}

impl Selection {
    /// Build a selection, stripping leading and trailing separators.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: names
                .into_iter()
                .map(|n| n.as_ref().trim_matches(MAIN_SEPARATOR).to_string())
                .collect(),
        }
    }

    /// Whether the name, or any leading run of its components, was selected.
    pub fn contains(&self, name: &str) -> bool {
        let mut prefix = String::with_capacity(name.len());
        for component in fezpak_common::name::components(name) {
            if !prefix.is_empty() {
                prefix.push(MAIN_SEPARATOR);
            }
            prefix.push_str(component);
            if self.names.contains(&prefix) {
                return true;
            }
        }
        false
    }

    /// Whether nothing was selected.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Unpack one entry below `options.out_dir`, returning the written path.
pub fn unpack_entry<S: RangeSource + ?Sized>(
    source: &mut S,
    entry: &PakEntry,
    options: &UnpackOptions,
    sniffer: &Sniffer,
    observer: &mut dyn EntryObserver,
) -> Result<PathBuf> {
    let suffix = options.extension.suffix_for(sniffer, source, entry)?;
    let dest = output_path_for(&options.out_dir, entry, &suffix)?;

    observer.entry_processed(&dest.to_string_lossy());
    extract(source, entry.offset(), u64::from(entry.size()), &dest)?;
    Ok(dest)
}

fn unpack_matching<S, F>(
    stream: &mut S,
    options: &UnpackOptions,
    observer: &mut dyn EntryObserver,
    mut wanted: F,
) -> Result<Vec<PathBuf>>
where
    S: RangeSource + ?Sized,
    F: FnMut(&PakEntry) -> bool,
{
    let sniffer = Sniffer::default();
    let mut index = read_index(stream)?;
    let mut written = Vec::new();

    while let Some(entry) = index.next() {
        let entry = entry?;
        if wanted(&entry) {
            written.push(unpack_entry(
                index.get_mut(),
                &entry,
                options,
                &sniffer,
                observer,
            )?);
        }
    }

    Ok(written)
}

/// Unpack every entry of an archive stream.
pub fn unpack<S: RangeSource + ?Sized>(
    stream: &mut S,
    options: &UnpackOptions,
    observer: &mut dyn EntryObserver,
) -> Result<Vec<PathBuf>> {
    unpack_matching(stream, options, observer, |_| true)
}

/// Unpack only the entries matched by `selection`.
pub fn unpack_files<S: RangeSource + ?Sized>(
    stream: &mut S,
    selection: &Selection,
    options: &UnpackOptions,
    observer: &mut dyn EntryObserver,
) -> Result<Vec<PathBuf>> {
    unpack_matching(stream, options, observer, |entry| {
        selection.contains(entry.name())
    })
}

/// Output path for an entry below `out_dir` with `suffix` appended.
///
/// Fails with [`Error::UnsafePath`] unless the result names a file strictly
/// inside `out_dir`: names with `..`, root or prefix components are
/// rejected, as is a name that resolves to `out_dir` itself.
pub fn output_path_for(out_dir: &Path, entry: &PakEntry, suffix: &str) -> Result<PathBuf> {
    let mut dest = out_dir.join(entry.output_path()).into_os_string();
    dest.push(suffix);
    let dest = PathBuf::from(dest);

    let inside = dest.strip_prefix(out_dir).is_ok_and(|relative| {
        relative.components().next().is_some()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
    });
    if !inside {
        return Err(Error::UnsafePath {
            name: entry.name().to_string(),
            path: dest,
        });
    }

    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::Silent;
    use crate::writer::pack_buffers;
    use std::fs;
    use std::io::Cursor;
    use std::path::MAIN_SEPARATOR_STR;

    fn host(parts: &[&str]) -> String {
        parts.join(MAIN_SEPARATOR_STR)
    }

    fn sample() -> Vec<u8> {
        let mut out = Vec::new();
        pack_buffers(
            &mut out,
            vec![
                (host(&["music", "intro"]), b"OggS\0\x02rest".to_vec()),
                (host(&["music", "outro"]), b"OggS\0\x02more".to_vec()),
                (host(&["sky", "day"]), vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]),
                ("readme".to_string(), b"plain".to_vec()),
            ],
            &mut Silent,
        )
        .unwrap();
        out
    }

    #[test]
    fn test_selection_prefixes() {
        let selection = Selection::new([format!("music{MAIN_SEPARATOR}"), "readme".into()]);
        assert!(selection.contains(&host(&["music", "intro"])));
        assert!(selection.contains("readme"));
        assert!(!selection.contains(&host(&["sky", "day"])));
        assert!(!selection.contains("musicbox"));
    }

    #[test]
    fn test_unpack_all_with_literal_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let options = UnpackOptions {
            out_dir: dir.path().to_path_buf(),
            extension: ExtensionPolicy::Literal(".dat".into()),
        };
        let mut seen = 0;
        let written = unpack(
            &mut Cursor::new(sample()),
            &options,
            &mut |_: &str| seen += 1,
        )
        .unwrap();

        assert_eq!(written.len(), 4);
        assert_eq!(seen, 4);
        assert_eq!(fs::read(dir.path().join("readme.dat")).unwrap(), b"plain");
        assert_eq!(
            fs::read(dir.path().join("music").join("outro.dat")).unwrap(),
            b"OggS\0\x02more"
        );
    }

    #[test]
    fn test_unpack_selected_with_sniffing() {
        let dir = tempfile::tempdir().unwrap();
        let options = UnpackOptions {
            out_dir: dir.path().to_path_buf(),
            extension: ExtensionPolicy::Sniff,
        };
        let selection = Selection::new(["sky", "readme"]);
        let written =
            unpack_files(&mut Cursor::new(sample()), &selection, &options, &mut Silent).unwrap();

        assert_eq!(
            written,
            vec![
                dir.path().join("readme.bin"),
                dir.path().join("sky").join("day.png"),
            ]
        );
        assert!(!dir.path().join("music").exists());
    }

    #[test]
    fn test_output_path_for() {
        let entry = PakEntry::new(host(&["a", "b"]), 0, 0);
        assert_eq!(
            output_path_for(Path::new("out"), &entry, ".xnb").unwrap(),
            Path::new("out").join("a").join("b.xnb")
        );
    }

    #[test]
    fn test_output_path_rejects_escapes() {
        let out = Path::new("out");
        for name in [
            host(&["..", "..", "escaped"]),
            host(&["a", "..", "..", "b"]),
            ".".to_string(),
            String::new(),
        ] {
            let entry = PakEntry::new(name, 0, 0);
            let err = output_path_for(out, &entry, "").unwrap_err();
            assert!(matches!(err, Error::UnsafePath { .. }), "{err}");
        }

        // "." plus a "." suffix spells ".."
        let entry = PakEntry::new(".", 0, 0);
        assert!(output_path_for(out, &entry, ".").is_err());
    }

    #[test]
    fn test_unpack_refuses_parent_components() {
        let root = tempfile::tempdir().unwrap();
        let out_dir = root.path().join("a").join("b");
        let mut data = Vec::new();
        pack_buffers(
            &mut data,
            vec![(host(&["..", "..", "escaped"]), b"gotcha".to_vec())],
            &mut Silent,
        )
        .unwrap();

        let options = UnpackOptions {
            out_dir: out_dir.clone(),
            extension: ExtensionPolicy::default(),
        };
        let err = unpack(&mut Cursor::new(data), &options, &mut Silent).unwrap_err();

        assert!(matches!(err, Error::UnsafePath { .. }));
        assert!(!root.path().join("escaped").exists());
        assert!(!out_dir.exists());
    }
}
