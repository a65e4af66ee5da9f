//! IRC case-mapping functions.
//!
//! Servers advertise how nick and channel names fold case via the
//! `CASEMAPPING` ISUPPORT token. The tracker normalizes every key it stores
//! with the mapping currently in effect.

use std::fmt;

/// A server-advertised case mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaseMapping {
    /// Only `A-Z` fold to `a-z`.
    Ascii,
    /// `A-Z` plus `[]\~` fold to `{}|^`.
    #[default]
    Rfc1459,
    /// `A-Z` plus `[]\` fold to `{}|` (`~` is left alone).
    StrictRfc1459,
}

impl CaseMapping {
    /// Parse a `CASEMAPPING` token value.
    ///
    /// Unknown mappings (e.g. `rfc7613`) return `None`; callers keep the
    /// previous mapping.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "ascii" => Some(Self::Ascii),
            "rfc1459" => Some(Self::Rfc1459),
            "strict-rfc1459" => Some(Self::StrictRfc1459),
            _ => None,
        }
    }

    /// Token value as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ascii => "ascii",
            Self::Rfc1459 => "rfc1459",
            Self::StrictRfc1459 => "strict-rfc1459",
        }
    }

    /// Fold a single character.
    #[inline]
    pub fn lower_char(&self, c: char) -> char {
        match (self, c) {
            (_, 'A'..='Z') => c.to_ascii_lowercase(),
            (Self::Rfc1459 | Self::StrictRfc1459, '[') => '{',
            (Self::Rfc1459 | Self::StrictRfc1459, ']') => '}',
            (Self::Rfc1459 | Self::StrictRfc1459, '\\') => '|',
            (Self::Rfc1459, '~') => '^',
            _ => c,
        }
    }

    /// Fold a whole name.
    pub fn to_lower(&self, s: &str) -> String {
        s.chars().map(|c| self.lower_char(c)).collect()
    }

    /// Case-insensitive comparison under this mapping.
    pub fn names_eq(&self, a: &str, b: &str) -> bool {
        a.len() == b.len()
            && a
                .chars()
                .zip(b.chars())
                .all(|(ca, cb)| self.lower_char(ca) == self.lower_char(cb))
    }
}

impl fmt::Display for CaseMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
