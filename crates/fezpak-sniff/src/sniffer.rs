//! Content type sniffer.

use std::io::{Read, Seek, SeekFrom};

use fezpak_common::Result;

use crate::rules::{RuleGroup, BUILTIN_GROUPS};
use crate::DEFAULT_EXTENSION;

/// Maps the leading bytes of an entry to a file extension.
///
/// The same matcher serves both seekable streams ([`sniff`](Self::sniff))
/// and already-mapped bytes ([`sniff_slice`](Self::sniff_slice)).
#[derive(Debug, Clone)]
pub struct Sniffer {
    groups: &'static [RuleGroup],
    default_extension: &'static str,
    max_span: usize,
}

impl Sniffer {
    /// Create a sniffer over a custom rule table.
    pub fn new(groups: &'static [RuleGroup], default_extension: &'static str) -> Self {
        let max_span = groups.iter().map(RuleGroup::span).max().unwrap_or(0);
        Self {
            groups,
            default_extension,
            max_span,
        }
    }

    /// The number of bytes needed to evaluate every rule.
    #[inline]
    pub fn max_span(&self) -> usize {
        self.max_span
    }

    /// The extension returned when nothing matches.
    #[inline]
    pub fn default_extension(&self) -> &'static str {
        self.default_extension
    }

    /// Classify a buffer. The first matching group wins.
    pub fn classify(&self, buf: &[u8]) -> &'static str {
        self.groups
            .iter()
            .find(|group| group.matches(buf))
            .map_or(self.default_extension, |group| group.extension)
    }

    /// Sniff `size` bytes of entry data starting at `offset` in a stream.
    ///
    /// Reads at most `min(max_span, size)` bytes. A stream that ends early is
    /// classified on whatever was read.
    pub fn sniff<R: Read + Seek + ?Sized>(
        &self,
        reader: &mut R,
        offset: u64,
        size: u64,
    ) -> Result<&'static str> {
        let wanted = (self.max_span as u64).min(size);
        let mut buf = Vec::with_capacity(wanted as usize);

        reader.seek(SeekFrom::Start(offset))?;
        reader.take(wanted).read_to_end(&mut buf)?;

        Ok(self.classify(&buf))
    }

    /// Sniff entry data that is already in memory.
    pub fn sniff_slice(&self, data: &[u8], offset: usize, size: usize) -> &'static str {
        let start = offset.min(data.len());
        let end = offset
            .saturating_add(self.max_span.min(size))
            .min(data.len());
        self.classify(&data[start..end])
    }
}

impl Default for Sniffer {
    fn default() -> Self {
        Self::new(BUILTIN_GROUPS, DEFAULT_EXTENSION)
    }
}
