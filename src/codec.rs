//! Domain pattern encoding.
//!
//! A [`DomainPattern`] pairs the domain baked into an artifact with the domain
//! it should be rewritten to. Each storage encoding gets its own
//! [`EncodedPattern`]; the two byte sequences in an encoded pattern always have
//! the same length, which is what makes in-place rewriting safe.

use std::fmt;
use thiserror::Error;
use tracing::warn;

/// Domain compiled into the shipped client and server.
pub const ORIGINAL_DOMAIN: &str = "hytale.com";

/// Replacement used when the requested target cannot be encoded safely.
pub const DEFAULT_TARGET_DOMAIN: &str = "sanasol.ws";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("target domain {target:?} has {target_len} characters, original {original:?} has {original_len}")]
    LengthMismatch {
        original: String,
        target: String,
        original_len: usize,
        target_len: usize,
    },

    #[error("domain {0:?} contains non-ASCII characters")]
    NonAscii(String),

    #[error("domain must not be empty")]
    Empty,
}

/// Storage encoding of a domain inside an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// Two bytes per character, little-endian code units.
    ///
    /// Used by the ahead-of-time compiled native client.
    Wide,
    /// One byte per character.
    ///
    /// Used by class files and text entries in the server archive.
    Narrow,
}

impl Encoding {
    pub const ALL: [Encoding; 2] = [Encoding::Wide, Encoding::Narrow];

    /// Bytes per encoded character.
    pub const fn unit_len(self) -> usize {
        match self {
            Encoding::Wide => 2,
            Encoding::Narrow => 1,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Encoding::Wide => "UTF-16LE",
            Encoding::Narrow => "ASCII",
        }
    }

    /// Encode an ASCII string.
    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            Encoding::Wide => text
                .bytes()
                .flat_map(|b| u16::from(b).to_le_bytes())
                .collect(),
            Encoding::Narrow => text.as_bytes().to_vec(),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An original/target domain pair of equal length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainPattern {
    original: String,
    target: String,
}

impl DomainPattern {
    /// Pair `original` with `target`, refusing pairs that cannot be rewritten
    /// in place.
    pub fn new(original: impl Into<String>, target: impl Into<String>) -> Result<Self, CodecError> {
        let original = original.into();
        let target = target.into();

        for domain in [&original, &target] {
            if domain.is_empty() {
                return Err(CodecError::Empty);
            }
            if !domain.is_ascii() {
                return Err(CodecError::NonAscii(domain.clone()));
            }
        }

        if original.len() != target.len() {
            return Err(CodecError::LengthMismatch {
                original_len: original.len(),
                target_len: target.len(),
                original,
                target,
            });
        }

        Ok(Self { original, target })
    }

    /// Pattern rewriting [`ORIGINAL_DOMAIN`] to `target`.
    ///
    /// An empty or unusable target falls back to [`DEFAULT_TARGET_DOMAIN`].
    pub fn for_target(target: &str) -> Self {
        let default = || Self {
            original: ORIGINAL_DOMAIN.to_string(),
            target: DEFAULT_TARGET_DOMAIN.to_string(),
        };

        if target.is_empty() {
            return default();
        }

        match Self::new(ORIGINAL_DOMAIN, target) {
            Ok(pattern) => pattern,
            Err(err) => {
                warn!(
                    "{err}; using default target {:?}",
                    DEFAULT_TARGET_DOMAIN
                );
                default()
            }
        }
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Character count shared by both domains.
    pub fn char_len(&self) -> usize {
        self.original.len()
    }

    pub fn encode(&self, encoding: Encoding) -> EncodedPattern {
        EncodedPattern {
            encoding,
            search: encoding.encode(&self.original),
            replacement: encoding.encode(&self.target),
        }
    }

    /// One encoded pattern per supported encoding.
    pub fn encodings(&self) -> Vec<EncodedPattern> {
        Encoding::ALL.iter().map(|&e| self.encode(e)).collect()
    }
}

impl fmt::Display for DomainPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.original, self.target)
    }
}

/// Search and replacement bytes for one encoding.
///
/// Only constructible through [`DomainPattern::encode`], so both sides are
/// always the same length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPattern {
    encoding: Encoding,
    search: Vec<u8>,
    replacement: Vec<u8>,
}

impl EncodedPattern {
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn search(&self) -> &[u8] {
        &self.search
    }

    pub fn replacement(&self) -> &[u8] {
        &self.replacement
    }

    pub fn len(&self) -> usize {
        self.search.len()
    }

    pub fn is_empty(&self) -> bool {
        self.search.is_empty()
    }

    /// The same pattern with search and replacement swapped.
    pub fn reversed(&self) -> Self {
        Self {
            encoding: self.encoding,
            search: self.replacement.clone(),
            replacement: self.search.clone(),
        }
    }

    /// Wide pattern split into all-but-last characters plus the last
    /// character's low byte.
    ///
    /// Returns `None` for narrow patterns. A single-character pattern has an
    /// empty prefix.
    pub fn partial(&self) -> Option<PartialPattern> {
        if self.encoding != Encoding::Wide || self.search.len() < 2 {
            return None;
        }
        let split = self.search.len() - 2;
        Some(PartialPattern {
            search_prefix: self.search[..split].to_vec(),
            replacement_prefix: self.replacement[..split].to_vec(),
            search_last: self.search[split],
            replacement_last: self.replacement[split],
        })
    }
}

/// Wide pattern minus its final character.
///
/// The scanner matches `search_prefix` and then compares one trailing byte
/// against `search_last`. The final character occupies the same position in
/// both domains, so it can be checked and overwritten independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialPattern {
    pub search_prefix: Vec<u8>,
    pub replacement_prefix: Vec<u8>,
    pub search_last: u8,
    pub replacement_last: u8,
}

impl PartialPattern {
    /// Bytes consumed by a match: the prefix plus the checked trailing byte.
    pub fn match_len(&self) -> usize {
        self.search_prefix.len() + 1
    }
}
