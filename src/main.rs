//! Fezpak CLI - Command-line tool for FEZ .pak archives.
//!
//! This is the main entry point for the fezpak command-line application.

use std::cmp::Ordering;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Seek, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use glob::{MatchOptions, Pattern};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use fezpak::prelude::*;
use fezpak::vfs::{FileAttr, FileKind};

/// Fezpak - pack, unpack and list FEZ .pak archives
#[derive(Parser)]
#[command(name = "fezpak")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Print every processed entry name and enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Separate printed names with NUL bytes instead of newlines
    #[arg(short = '0', long = "print0", global = true)]
    print0: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pack files and directories into an archive
    #[command(visible_alias = "c")]
    Pack {
        /// Remove file name extensions
        #[arg(short = 'X', long)]
        remove_extension: bool,

        /// Archive to create
        #[arg(env = "FEZPAK_ARCHIVE")]
        archive: PathBuf,

        /// Files and directories to pack (default: current directory)
        files: Vec<PathBuf>,
    },

    /// Unpack an archive
    #[command(visible_alias = "x")]
    Unpack {
        /// Add extension to names of unpacked files
        #[arg(short = 'x', long, value_name = "EXT", default_value = "")]
        extension: String,

        /// Add an extension guessed from each file's content
        #[arg(short, long, conflicts_with = "extension")]
        guess_extension: bool,

        /// Directory to write unpacked files
        #[arg(short = 'C', long, env = "FEZPAK_DIR", default_value = ".")]
        dir: PathBuf,

        /// Archive to unpack
        #[arg(env = "FEZPAK_ARCHIVE")]
        archive: PathBuf,

        /// Files and directories to unpack (default: everything)
        files: Vec<String>,
    },

    /// List archive contents
    #[command(visible_alias = "l")]
    List {
        /// Print human readable file sizes
        #[arg(short = 'u', long)]
        human_readable: bool,

        /// Print file offsets and sizes
        #[arg(short, long)]
        details: bool,

        /// Sort keys: size|s, -size|S, offset|o, -offset|O, name|n, -name|N (comma separated)
        #[arg(short, long)]
        sort: Option<SortSpec>,

        /// Add extension to file names
        #[arg(short = 'x', long, value_name = "EXT", default_value = "")]
        extension: String,

        /// Add an extension guessed from each file's content
        #[arg(short, long, conflicts_with = "extension")]
        guess_extension: bool,

        /// Only list names matching this glob pattern
        #[arg(short, long)]
        filter: Option<String>,

        /// Archive to list
        #[arg(env = "FEZPAK_ARCHIVE")]
        archive: PathBuf,
    },

    /// Print the inode tree the archive projects to
    #[command(visible_alias = "t")]
    Tree {
        /// Fail on duplicate names instead of renaming them
        #[arg(long)]
        strict: bool,

        /// Add an extension guessed from each file's content
        #[arg(short, long)]
        guess_extension: bool,

        /// Archive to inspect
        #[arg(env = "FEZPAK_ARCHIVE")]
        archive: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let delim = if cli.print0 { '\0' } else { '\n' };

    match cli.command {
        Commands::Pack {
            remove_extension,
            archive,
            files,
        } => {
            cmd_pack(&archive, files, remove_extension, cli.verbose, delim)?;
        }
        Commands::Unpack {
            extension,
            guess_extension,
            dir,
            archive,
            files,
        } => {
            let options = UnpackOptions {
                out_dir: dir,
                extension: extension_policy(extension, guess_extension),
            };
            cmd_unpack(&archive, &files, &options, cli.verbose, delim)?;
        }
        Commands::List {
            human_readable,
            details,
            sort,
            extension,
            guess_extension,
            filter,
            archive,
        } => {
            let listing = Listing {
                details,
                human_readable,
                sort,
                extension: extension_policy(extension, guess_extension),
                filter: filter
                    .as_deref()
                    .map(Pattern::new)
                    .transpose()
                    .context("Invalid filter pattern")?,
                delim,
            };
            cmd_list(&archive, &listing)?;
        }
        Commands::Tree {
            strict,
            guess_extension,
            archive,
        } => {
            let options = BuildOptions {
                duplicates: if strict {
                    DuplicatePolicy::Strict
                } else {
                    DuplicatePolicy::Lenient
                },
                guess_extensions: guess_extension,
            };
            cmd_tree(&archive, &options)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn extension_policy(extension: String, guess: bool) -> ExtensionPolicy {
    if guess {
        ExtensionPolicy::Sniff
    } else {
        ExtensionPolicy::Literal(extension)
    }
}

/// Reports processed entries: names on stdout when verbose, a progress bar
/// otherwise.
struct Progress {
    bar: Option<ProgressBar>,
    delim: char,
}

impl Progress {
    fn new(verbose: bool, delim: char, len: Option<u64>) -> Result<Self> {
        if verbose {
            return Ok(Self { bar: None, delim });
        }

        let bar = match len {
            Some(len) => {
                let bar = ProgressBar::new(len);
                bar.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {wide_msg}")?
                        .progress_chars("#>-"),
                );
                bar
            }
            None => {
                let bar = ProgressBar::new_spinner();
                bar.set_style(
                    ProgressStyle::default_spinner()
                        .template("{spinner:.green} [{elapsed_precise}] {pos} entries {wide_msg}")?,
                );
                bar
            }
        };

        Ok(Self {
            bar: Some(bar),
            delim,
        })
    }

    fn finish(&self, message: String) {
        if let Some(bar) = &self.bar {
            bar.finish_with_message(message);
        }
    }
}

impl EntryObserver for Progress {
    fn entry_processed(&mut self, name: &str) {
        match &self.bar {
            Some(bar) => {
                bar.set_message(name.to_string());
                bar.inc(1);
            }
            None => print!("{}{}", name, self.delim),
        }
    }
}

fn cmd_pack(
    archive: &Path,
    files: Vec<PathBuf>,
    remove_extension: bool,
    verbose: bool,
    delim: char,
) -> Result<()> {
    let inputs = if files.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        files
    };

    let start = Instant::now();
    let file = File::create(archive)
        .with_context(|| format!("Failed to create archive {}", archive.display()))?;
    let mut out = BufWriter::new(file);
    let mut progress = Progress::new(verbose, delim, None)?;

    let names = pack_files(
        &mut out,
        &inputs,
        &PackOptions {
            remove_extension,
            exclude: Some(archive.to_path_buf()),
        },
        &mut progress,
    )
    .context("Failed to pack archive")?;
    out.flush().context("Failed to write archive")?;

    progress.finish(format!("Packed {} entries", names.len()));
    debug!(entries = names.len(), elapsed = ?start.elapsed(), "pack finished");

    Ok(())
}

fn cmd_unpack(
    archive: &Path,
    files: &[String],
    options: &UnpackOptions,
    verbose: bool,
    delim: char,
) -> Result<()> {
    let mut file = File::open(archive)
        .with_context(|| format!("Failed to open archive {}", archive.display()))?;
    let declared = read_index(&mut file)
        .context("Failed to read archive index")?
        .declared_count();
    file.rewind()?;

    let start = Instant::now();
    let mut progress = Progress::new(verbose, delim, Some(u64::from(declared)))?;

    let written = if files.is_empty() {
        unpack(&mut file, options, &mut progress)
    } else {
        unpack_files(&mut file, &Selection::new(files), options, &mut progress)
    }
    .context("Failed to unpack archive")?;

    progress.finish(format!("Unpacked {} entries", written.len()));
    debug!(entries = written.len(), elapsed = ?start.elapsed(), "unpack finished");

    Ok(())
}

/// Listing configuration.
struct Listing {
    details: bool,
    human_readable: bool,
    sort: Option<SortSpec>,
    extension: ExtensionPolicy,
    filter: Option<Pattern>,
    delim: char,
}

impl Listing {
    fn matches(&self, entry: &PakEntry) -> bool {
        const OPTIONS: MatchOptions = MatchOptions {
            case_sensitive: false,
            require_literal_separator: false,
            require_literal_leading_dot: false,
        };
        self.filter
            .as_ref()
            .map_or(true, |pattern| pattern.matches_with(entry.name(), OPTIONS))
    }

    fn write_header<W: Write>(&self, out: &mut W) -> io::Result<()> {
        if self.details {
            write!(out, "    Offset       Size Name{}", self.delim)?;
        }
        Ok(())
    }

    fn write_row<W: Write>(&self, out: &mut W, entry: &PakEntry, suffix: &str) -> io::Result<()> {
        if self.details {
            let size = if self.human_readable {
                human_size(u64::from(entry.size()))
            } else {
                entry.size().to_string()
            };
            write!(
                out,
                "{:>10} {:>10} {}{}{}",
                entry.offset(),
                size,
                entry.name(),
                suffix,
                self.delim
            )
        } else {
            write!(out, "{}{}{}", entry.name(), suffix, self.delim)
        }
    }
}

fn cmd_list(archive: &Path, listing: &Listing) -> Result<()> {
    let file = File::open(archive)
        .with_context(|| format!("Failed to open archive {}", archive.display()))?;
    let mut index = read_index(BufReader::new(file)).context("Failed to read archive index")?;
    let sniffer = Sniffer::default();

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    listing.write_header(&mut out)?;

    let mut rows = Vec::new();
    while let Some(entry) = index.next() {
        let entry = entry.context("Failed to read archive index")?;
        if !listing.matches(&entry) {
            continue;
        }

        let suffix = listing
            .extension
            .suffix_for(&sniffer, index.get_mut(), &entry)
            .with_context(|| format!("Failed to read {}", entry.name()))?;

        if listing.sort.is_some() {
            rows.push((entry, suffix));
        } else {
            listing.write_row(&mut out, &entry, &suffix)?;
        }
    }

    if let Some(sort) = &listing.sort {
        rows.sort_by(|a, b| sort.compare(&a.0, &b.0));
        for (entry, suffix) in &rows {
            listing.write_row(&mut out, entry, suffix)?;
        }
    }

    out.flush()?;
    Ok(())
}

fn cmd_tree(archive: &Path, options: &BuildOptions) -> Result<()> {
    let start = Instant::now();
    let fs = PakFs::open_archive(archive, options)
        .with_context(|| format!("Failed to open archive {}", archive.display()))?;
    debug!(inodes = fs.tree().node_count(), elapsed = ?start.elapsed(), "tree built");

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    let root = fs.getattr(NodeId::ROOT_INODE)?;
    write_tree_line(&mut out, &root, "/", 0)?;
    write_tree(&fs, &mut out, NodeId::ROOT_INODE, 1)?;

    let tree = fs.tree();
    writeln!(
        out,
        "\n{} directories, {} files",
        tree.directory_count() - 1,
        tree.file_count()
    )?;
    out.flush()?;

    fs.destroy();
    Ok(())
}

fn write_tree<W: Write>(fs: &PakFs, out: &mut W, ino: u64, depth: usize) -> Result<()> {
    let fh = fs.opendir(ino)?;
    for entry in fs.readdir(fh, 0)? {
        write_tree_line(out, &entry.attr, entry.name, depth)?;
        if entry.attr.kind == FileKind::Directory {
            write_tree(fs, out, entry.ino(), depth + 1)?;
        }
    }
    fs.releasedir(fh)?;
    Ok(())
}

fn write_tree_line<W: Write>(
    out: &mut W,
    attr: &FileAttr,
    name: &str,
    depth: usize,
) -> io::Result<()> {
    let slash = if attr.kind == FileKind::Directory && depth > 0 {
        "/"
    } else {
        ""
    };
    writeln!(
        out,
        "{:>8} {:>10} {}{}{}",
        attr.ino,
        attr.size,
        "  ".repeat(depth),
        name,
        slash
    )
}

/// A listing sort field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SortField {
    Size,
    Offset,
    Name,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SortKey {
    field: SortField,
    descending: bool,
}

impl SortKey {
    fn compare(&self, lhs: &PakEntry, rhs: &PakEntry) -> Ordering {
        let ordering = match self.field {
            SortField::Size => lhs.size().cmp(&rhs.size()),
            SortField::Offset => lhs.offset().cmp(&rhs.offset()),
            SortField::Name => lhs.name().cmp(rhs.name()),
        };
        if self.descending {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let key = match s {
            "s" => "size",
            "S" => "-size",
            "o" => "offset",
            "O" => "-offset",
            "n" => "name",
            "N" => "-name",
            other => other,
        };

        let (descending, field) = match key.strip_prefix('-') {
            Some(field) => (true, field),
            None => (false, key),
        };
        let field = match field {
            "size" => SortField::Size,
            "offset" => SortField::Offset,
            "name" => SortField::Name,
            _ => return Err(format!("unknown sort key: {key}")),
        };

        Ok(Self { field, descending })
    }
}

/// Comma-separated sort keys; ties on one key fall through to the next.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SortSpec(Vec<SortKey>);

impl SortSpec {
    fn compare(&self, lhs: &PakEntry, rhs: &PakEntry) -> Ordering {
        self.0
            .iter()
            .map(|key| key.compare(lhs, rhs))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl FromStr for SortSpec {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.split(',')
            .map(str::parse::<SortKey>)
            .collect::<std::result::Result<_, _>>()
            .map(SortSpec)
    }
}

/// Format a byte count with a 1024-based unit and one decimal.
fn human_size(size: u64) -> String {
    const UNITS: [&str; 8] = ["K", "M", "G", "T", "P", "E", "Z", "Y"];

    if size < 1024 {
        return size.to_string();
    }

    let mut value = size as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let text = format!("{value:.1}");
    let text = text.strip_suffix(".0").unwrap_or(&text);
    format!("{}{}", text, UNITS[unit])
}
