//! Magic-byte match rules and the built-in rule table.

/// A single magic-byte test against the start of a buffer.
///
/// Matches when the bytes at `[offset, offset + magic.len())`, ANDed with
/// `mask` when one is present, equal `magic`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchRule {
    magic: &'static [u8],
    offset: usize,
    mask: Option<&'static [u8]>,
}

impl MatchRule {
    /// A rule matching `magic` at the start of the buffer.
    pub const fn new(magic: &'static [u8]) -> Self {
        Self {
            magic,
            offset: 0,
            mask: None,
        }
    }

    /// A rule matching `magic` at `offset`.
    pub const fn at(offset: usize, magic: &'static [u8]) -> Self {
        Self {
            magic,
            offset,
            mask: None,
        }
    }

    /// A rule matching `magic` at `offset` after masking the candidate bytes.
    ///
    /// Mask bytes past the end of `mask` count as `0xFF`.
    pub const fn masked(offset: usize, magic: &'static [u8], mask: &'static [u8]) -> Self {
        Self {
            magic,
            offset,
            mask: Some(mask),
        }
    }

    /// Number of leading bytes a buffer needs for this rule to be decidable.
    #[inline]
    pub const fn span(&self) -> usize {
        self.offset + self.magic.len()
    }

    /// Test the rule against a buffer.
    pub fn matches(&self, buf: &[u8]) -> bool {
        let Some(candidate) = buf.get(self.offset..self.span()) else {
            return false;
        };

        match self.mask {
            None => candidate == self.magic,
            Some(mask) => candidate
                .iter()
                .zip(self.magic)
                .enumerate()
                .all(|(i, (&b, &m))| b & mask.get(i).copied().unwrap_or(0xFF) == m),
        }
    }
}

/// An extension together with the rules that identify it.
#[derive(Debug, Clone, Copy)]
pub struct RuleGroup {
    /// Extension without the leading dot.
    pub extension: &'static str,
    /// Any matching rule selects this group.
    pub rules: &'static [MatchRule],
}

impl RuleGroup {
    /// Check whether any rule in the group matches.
    #[inline]
    pub fn matches(&self, buf: &[u8]) -> bool {
        self.rules.iter().any(|rule| rule.matches(buf))
    }

    /// Largest span over the group's rules.
    pub fn span(&self) -> usize {
        self.rules.iter().map(MatchRule::span).max().unwrap_or(0)
    }
}

const RIFF_MASK: &[u8] = &[0xFF, 0xFF, 0xFF, 0xFF, 0, 0, 0, 0, 0xFF, 0xFF, 0xFF, 0xFF];

/// Built-in groups in priority order.
///
/// Compiled game assets come first, then common audio/video/image
/// containers, then generic markup.
pub static BUILTIN_GROUPS: &[RuleGroup] = &[
    RuleGroup {
        extension: "xnb",
        rules: &[MatchRule::new(b"XNB")],
    },
    RuleGroup {
        extension: "fxc",
        rules: &[MatchRule::new(&[0x01, 0x09, 0xFF, 0xFE])],
    },
    RuleGroup {
        extension: "ogg",
        rules: &[MatchRule::new(b"OggS")],
    },
    RuleGroup {
        extension: "wav",
        rules: &[MatchRule::masked(0, b"RIFF\0\0\0\0WAVE", RIFF_MASK)],
    },
    RuleGroup {
        extension: "avi",
        rules: &[MatchRule::masked(0, b"RIFF\0\0\0\0AVI ", RIFF_MASK)],
    },
    RuleGroup {
        extension: "png",
        rules: &[MatchRule::new(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A])],
    },
    RuleGroup {
        extension: "gif",
        rules: &[MatchRule::new(b"GIF87a"), MatchRule::new(b"GIF89a")],
    },
    RuleGroup {
        extension: "jpg",
        rules: &[MatchRule::new(&[0xFF, 0xD8, 0xFF])],
    },
    RuleGroup {
        extension: "bmp",
        rules: &[MatchRule::new(b"BM")],
    },
    RuleGroup {
        extension: "flac",
        rules: &[MatchRule::new(b"fLaC")],
    },
    RuleGroup {
        extension: "mp3",
        rules: &[
            MatchRule::new(b"ID3"),
            // MPEG audio frame sync: eleven set bits
            MatchRule::masked(0, &[0xFF, 0xE0], &[0xFF, 0xE0]),
        ],
    },
    RuleGroup {
        extension: "mp4",
        rules: &[MatchRule::at(4, b"ftyp")],
    },
    RuleGroup {
        extension: "webm",
        rules: &[MatchRule::new(&[0x1A, 0x45, 0xDF, 0xA3])],
    },
    RuleGroup {
        extension: "xml",
        rules: &[
            MatchRule::new(b"<?xml"),
            MatchRule::new(&[0xEF, 0xBB, 0xBF, b'<', b'?', b'x', b'm', b'l']),
        ],
    },
];
