//! Symbolic indices classified by orbital space and spin.

use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt;
use std::ops::{BitAnd, BitOr, Not};

use serde::{Deserialize, Serialize};


// ================
// Error definition
// ================

/// Error raised when a textual index, tensor, term or expression cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WickParseError(pub String);

impl fmt::Display for WickParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Wick parsing error: {}", self.0)
    }
}

impl Error for WickParseError {}

// ==================
// Struct definitions
// ==================

/// A bitmask classifying the orbital space and the spin of an index.
///
/// The orbital-space bits are [`Self::INACTIVE`], [`Self::ACTIVE`] and [`Self::EXTERNAL`]; an
/// index carrying several of them ranges over the union of the corresponding spaces. An index
/// carrying no bits at all ([`Self::NONE`]) is unconstrained.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct IndexTypes(u8);

impl IndexTypes {
    pub const NONE: Self = Self(0);
    pub const INACTIVE: Self = Self(1);
    pub const ACTIVE: Self = Self(2);
    pub const EXTERNAL: Self = Self(4);
    pub const ALPHA: Self = Self(8);
    pub const BETA: Self = Self(16);

    /// Mask selecting the orbital-space bits.
    pub const SPACE: Self = Self(7);

    /// The three orbital spaces in the order in which multi-space indices are case-split.
    pub const SPACES: [Self; 3] = [Self::INACTIVE, Self::ACTIVE, Self::EXTERNAL];

    /// Returns the raw bits.
    pub fn bits(&self) -> u8 {
        self.0
    }

    /// Returns `true` if no bits are set.
    pub fn is_none(&self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if `self` and `other` share at least one bit.
    pub fn intersects(&self, other: Self) -> bool {
        !(*self & other).is_none()
    }

    /// Returns the orbital-space part of the bitmask.
    pub fn space(&self) -> Self {
        *self & Self::SPACE
    }

    /// Intersects two classifications, treating [`Self::NONE`] as unconstrained.
    pub fn meet(self, other: Self) -> Self {
        if self.is_none() {
            other
        } else if other.is_none() {
            self
        } else {
            self & other
        }
    }

    /// Returns `true` unless both classifications are non-trivial and disjoint.
    pub fn is_compatible_with(&self, other: Self) -> bool {
        self.is_none() || other.is_none() || self.intersects(other)
    }

    /// Parses a type tag such as `I`, `EA` or `Ia`.
    ///
    /// # Arguments
    ///
    /// * `tag` - The tag, made of the letters `I`, `A`, `E` for the orbital spaces, `a`, `b` for
    /// the spins, or the single letter `N` for an unconstrained index.
    ///
    /// # Returns
    ///
    /// The parsed bitmask, or an error for an unknown letter.
    pub fn from_tag(tag: &str) -> Result<Self, WickParseError> {
        tag.chars().try_fold(Self::NONE, |acc, c| match c {
            'N' => Ok(acc),
            'I' => Ok(acc | Self::INACTIVE),
            'A' => Ok(acc | Self::ACTIVE),
            'E' => Ok(acc | Self::EXTERNAL),
            'a' => Ok(acc | Self::ALPHA),
            'b' => Ok(acc | Self::BETA),
            _ => Err(WickParseError(format!(
                "unknown index type letter `{c}` in tag `{tag}`"
            ))),
        })
    }
}

impl BitOr for IndexTypes {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl BitAnd for IndexTypes {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        Self(self.0 & rhs.0)
    }
}

impl Not for IndexTypes {
    type Output = Self;

    fn not(self) -> Self::Output {
        Self(!self.0)
    }
}

impl fmt::Display for IndexTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            return write!(f, "N");
        }
        let letters = [
            (Self::EXTERNAL, 'E'),
            (Self::INACTIVE, 'I'),
            (Self::ACTIVE, 'A'),
            (Self::ALPHA, 'a'),
            (Self::BETA, 'b'),
        ];
        letters
            .iter()
            .filter(|(bit, _)| self.intersects(*bit))
            .try_for_each(|(_, c)| write!(f, "{c}"))
    }
}

/// A symbolic index.
///
/// Indices are ordered first by their classification and then by their name, which is the
/// order used for canonical forms and for set storage.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Index {
    types: IndexTypes,
    name: String,
}

/// A map from a classification to the set of (untyped) indices carrying it.
pub type IndexTypeMap = BTreeMap<IndexTypes, BTreeSet<Index>>;

impl Index {
    /// Creates an index with a given name and classification.
    pub fn new(name: &str, types: IndexTypes) -> Self {
        Self {
            types,
            name: name.to_string(),
        }
    }

    /// Creates an unclassified index.
    pub fn untyped(name: &str) -> Self {
        Self::new(name, IndexTypes::NONE)
    }

    /// Creates the canonical dummy index with integer label `label`. The label is rendered as
    /// a single character counting up from `0`.
    pub fn dummy_label(label: usize, types: IndexTypes) -> Self {
        let name = u32::try_from(label)
            .ok()
            .and_then(|l| char::from_u32('0' as u32 + l))
            .map(String::from)
            .unwrap_or_else(|| format!("#{label}"));
        Self { types, name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn types(&self) -> IndexTypes {
        self.types
    }

    pub fn has_types(&self) -> bool {
        !self.types.is_none()
    }

    /// Returns `true` if the name of this index is a single character.
    pub fn is_short(&self) -> bool {
        self.name.chars().count() == 1
    }

    pub fn without_types(&self) -> Self {
        Self::untyped(&self.name)
    }

    pub fn with_types(&self, types: IndexTypes) -> Self {
        Self::new(&self.name, types)
    }

    /// Returns a copy of this index whose first character has been advanced by `offset` code
    /// points, or `None` if that does not give a valid character.
    pub fn shifted(&self, offset: u32) -> Option<Self> {
        let mut chars = self.name.chars();
        let first = chars.next()?;
        let shifted = char::from_u32(first as u32 + offset)?;
        Some(Self {
            types: self.types,
            name: std::iter::once(shifted).chain(chars).collect(),
        })
    }

    /// Splits a textual list of indices.
    ///
    /// If the text contains whitespace, it is split on whitespace and commas; otherwise every
    /// character other than a comma is an index on its own.
    pub fn parse(text: &str) -> Vec<Self> {
        if text.chars().any(char::is_whitespace) {
            text.split(|c: char| c.is_whitespace() || c == ',')
                .filter(|s| !s.is_empty())
                .map(Self::untyped)
                .collect()
        } else {
            text.chars()
                .filter(|&c| c != ',')
                .map(|c| Self::untyped(&c.to_string()))
                .collect()
        }
    }

    /// Overlays classifications onto indices by membership in `type_map`. An index receives the
    /// union of the classifications of all sets it belongs to.
    pub fn add_types(indices: Vec<Self>, type_map: &IndexTypeMap) -> Vec<Self> {
        indices
            .into_iter()
            .map(|idx| {
                let key = idx.without_types();
                let types = type_map
                    .iter()
                    .filter(|(_, members)| members.contains(&key))
                    .fold(idx.types, |acc, (types, _)| acc | *types);
                idx.with_types(types)
            })
            .collect()
    }

    pub fn parse_with_types(text: &str, type_map: &IndexTypeMap) -> Vec<Self> {
        Self::add_types(Self::parse(text), type_map)
    }

    pub fn parse_set(text: &str) -> BTreeSet<Self> {
        Self::parse(text).into_iter().collect()
    }

    pub fn parse_set_with_types(text: &str, type_map: &IndexTypeMap) -> BTreeSet<Self> {
        Self::parse_with_types(text, type_map).into_iter().collect()
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
