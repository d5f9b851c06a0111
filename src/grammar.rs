//! Key Grammar
//!
//! Conservative character and length rules shared by store names, sections, keys
//! and composite (flattened) keys. Anything that passes is safe both as a store key
//! and as an identifier in a source file.

use std::fmt;
use thiserror::Error;

/// Shortest legal identifier.
pub const MIN_LEN: usize = 2;

/// Longest legal identifier in the short tier.
pub const SHORT_MAX_LEN: usize = 64;

/// Longest legal identifier in the long tier.
pub const LONG_MAX_LEN: usize = 128;

const STANDARD_EXTRAS: &[char] = &['-', '.', '_'];
const EXTENDED_EXTRAS: &[char] = &['-', '.', '_', '(', ')', ':', '[', ']'];

/// What an identifier names; used only to make errors readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentKind {
    StoreName,
    Section,
    Key,
    CompositeKey,
}

impl fmt::Display for IdentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            IdentKind::StoreName => "store name",
            IdentKind::Section => "section",
            IdentKind::Key => "key",
            IdentKind::CompositeKey => "composite key",
        };
        f.write_str(label)
    }
}

/// Grammar violations.
///
/// Length problems are kept apart from character problems so operators know
/// whether to shorten a name or rename it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    #[error("{kind} '{value}' is too short ({len} characters, minimum {min})")]
    TooShort {
        kind: IdentKind,
        value: String,
        len: usize,
        min: usize,
    },

    #[error("{kind} '{value}' is too long ({len} characters, maximum {max})")]
    TooLong {
        kind: IdentKind,
        value: String,
        len: usize,
        max: usize,
    },

    #[error("{kind} '{value}' may only contain ASCII letters, digits and '{allowed}'")]
    Malformed {
        kind: IdentKind,
        value: String,
        allowed: String,
    },

    #[error("composite key for [{section}] {key} is too long: {len} characters, maximum {max}")]
    CompositeTooLong {
        section: String,
        key: String,
        len: usize,
        max: usize,
    },

    #[error("composite key '{composite}' for [{section}] {key} is malformed")]
    CompositeMalformed {
        section: String,
        key: String,
        composite: String,
    },
}

impl GrammarError {
    /// True for the length-exceeded variants.
    pub fn is_too_long(&self) -> bool {
        matches!(
            self,
            GrammarError::TooLong { .. } | GrammarError::CompositeTooLong { .. }
        )
    }
}

/// Length tier selected per store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthTier {
    #[default]
    Short,
    Long,
}

impl LengthTier {
    pub fn max_len(self) -> usize {
        match self {
            LengthTier::Short => SHORT_MAX_LEN,
            LengthTier::Long => LONG_MAX_LEN,
        }
    }
}

/// Allow-listed punctuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharClass {
    /// `-`, `.`, `_`
    Standard,
    /// Standard plus `(`, `)`, `:`, `[`, `]`
    Extended,
}

impl CharClass {
    fn extras(self) -> &'static [char] {
        match self {
            CharClass::Standard => STANDARD_EXTRAS,
            CharClass::Extended => EXTENDED_EXTRAS,
        }
    }

    pub fn allows(self, c: char) -> bool {
        c.is_ascii_alphanumeric() || self.extras().contains(&c)
    }
}

/// A length tier combined with a character class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyGrammar {
    tier: LengthTier,
    class: CharClass,
}

impl KeyGrammar {
    pub const fn new(tier: LengthTier, class: CharClass) -> Self {
        Self { tier, class }
    }

    /// Grammar for store names and sections.
    pub const fn standard(tier: LengthTier) -> Self {
        Self::new(tier, CharClass::Standard)
    }

    /// Grammar for keys and composite keys.
    pub const fn extended(tier: LengthTier) -> Self {
        Self::new(tier, CharClass::Extended)
    }

    pub fn max_len(&self) -> usize {
        self.tier.max_len()
    }

    pub fn class(&self) -> CharClass {
        self.class
    }

    pub fn validate(&self, s: &str) -> bool {
        self.check(IdentKind::Key, s).is_ok()
    }

    /// Validate `s`, reporting the first violation found. Length is checked
    /// before characters.
    pub fn check(&self, kind: IdentKind, s: &str) -> Result<(), GrammarError> {
        let len = s.chars().count();
        if len < MIN_LEN {
            return Err(GrammarError::TooShort {
                kind,
                value: s.to_string(),
                len,
                min: MIN_LEN,
            });
        }
        if len > self.max_len() {
            return Err(GrammarError::TooLong {
                kind,
                value: s.to_string(),
                len,
                max: self.max_len(),
            });
        }
        if !s.chars().all(|c| self.class.allows(c)) {
            return Err(GrammarError::Malformed {
                kind,
                value: s.to_string(),
                allowed: self.class.extras().iter().collect(),
            });
        }
        Ok(())
    }

    /// Rewrite every allow-listed punctuation character to `_` and validate
    /// the result.
    pub fn key_convert(&self, kind: IdentKind, s: &str) -> Result<String, GrammarError> {
        let converted: String = s
            .chars()
            .map(|c| {
                if self.class.extras().contains(&c) {
                    '_'
                } else {
                    c
                }
            })
            .collect();
        self.check(kind, &converted)?;
        Ok(converted)
    }
}
