//! File attribute flags
//!
//! Attributes are carried as a set of named flags rather than a raw bit mask so
//! that snapshots taken on different platforms compare by name. The mapping
//! between flags, their platform bit values and their names lives in a single
//! constant table; the case-insensitive name index over it is built once on
//! first use and shared read-only for the life of the process.

use crate::{Error, Result};
use once_cell::sync::Lazy;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

/// A single named file attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AttributeFlag {
    /// File cannot be written
    ReadOnly,
    /// File is hidden from ordinary listings
    Hidden,
    /// File belongs to the operating system
    System,
    /// Entry is a directory
    Directory,
    /// File is marked for backup
    Archive,
    /// Entry is a device
    Device,
    /// No other attributes are set
    Normal,
    /// File is used for temporary storage
    Temporary,
    /// File is sparse
    SparseFile,
    /// Entry is a reparse point or symbolic link
    ReparsePoint,
    /// File is compressed by the file system
    Compressed,
    /// File data is not immediately available
    Offline,
    /// File is excluded from content indexing
    NotContentIndexed,
    /// File is encrypted
    Encrypted,
}

/// Flag, platform bit value and canonical name, in bit order
pub const ATTRIBUTE_TABLE: [(AttributeFlag, u32, &str); 14] = [
    (AttributeFlag::ReadOnly, 0x0001, "ReadOnly"),
    (AttributeFlag::Hidden, 0x0002, "Hidden"),
    (AttributeFlag::System, 0x0004, "System"),
    (AttributeFlag::Directory, 0x0010, "Directory"),
    (AttributeFlag::Archive, 0x0020, "Archive"),
    (AttributeFlag::Device, 0x0040, "Device"),
    (AttributeFlag::Normal, 0x0080, "Normal"),
    (AttributeFlag::Temporary, 0x0100, "Temporary"),
    (AttributeFlag::SparseFile, 0x0200, "SparseFile"),
    (AttributeFlag::ReparsePoint, 0x0400, "ReparsePoint"),
    (AttributeFlag::Compressed, 0x0800, "Compressed"),
    (AttributeFlag::Offline, 0x1000, "Offline"),
    (AttributeFlag::NotContentIndexed, 0x2000, "NotContentIndexed"),
    (AttributeFlag::Encrypted, 0x4000, "Encrypted"),
];

static FLAGS_BY_NAME: Lazy<HashMap<String, AttributeFlag>> = Lazy::new(|| {
    ATTRIBUTE_TABLE
        .iter()
        .map(|(flag, _, name)| (name.to_lowercase(), *flag))
        .collect()
});

impl AttributeFlag {
    /// Canonical name of the flag
    pub fn name(self) -> &'static str {
        ATTRIBUTE_TABLE[self.index()].2
    }

    /// Platform bit value of the flag
    pub fn bits(self) -> u32 {
        ATTRIBUTE_TABLE[self.index()].1
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for AttributeFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AttributeFlag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        FLAGS_BY_NAME
            .get(&s.trim().to_lowercase())
            .copied()
            .ok_or_else(|| Error::serialization(format!("unknown attribute flag '{}'", s.trim())))
    }
}

/// Set of attribute flags attached to an inventory record
///
/// Renders as the comma separated flag names in bit order, e.g.
/// `"ReadOnly, Archive"`; that string is what snapshots compare.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "String", into = "String")
)]
pub struct AttributeFlags(BTreeSet<AttributeFlag>);

impl AttributeFlags {
    /// Create an empty flag set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a flag set from individual flags
    pub fn from_flags(flags: impl IntoIterator<Item = AttributeFlag>) -> Self {
        Self(flags.into_iter().collect())
    }

    /// Decode a platform attribute bit mask; unknown bits are ignored
    pub fn from_bits(bits: u32) -> Self {
        Self(
            ATTRIBUTE_TABLE
                .iter()
                .filter(|(_, bit, _)| bits & bit != 0)
                .map(|(flag, _, _)| *flag)
                .collect(),
        )
    }

    /// Encode the set as a platform attribute bit mask
    pub fn bits(&self) -> u32 {
        self.0.iter().fold(0, |acc, flag| acc | flag.bits())
    }

    /// Add a flag to the set
    pub fn insert(&mut self, flag: AttributeFlag) {
        self.0.insert(flag);
    }

    /// Add a flag, builder style
    pub fn with(mut self, flag: AttributeFlag) -> Self {
        self.0.insert(flag);
        self
    }

    /// Check whether the set contains a flag
    pub fn contains(&self, flag: AttributeFlag) -> bool {
        self.0.contains(&flag)
    }

    /// Check whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the flags in bit order
    pub fn iter(&self) -> impl Iterator<Item = AttributeFlag> + '_ {
        self.0.iter().copied()
    }
}

impl fmt::Display for AttributeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, flag) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(flag.name())?;
        }
        Ok(())
    }
}

impl FromStr for AttributeFlags {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(AttributeFlag::from_str)
            .collect::<Result<BTreeSet<_>>>()
            .map(Self)
    }
}

impl TryFrom<String> for AttributeFlags {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<AttributeFlags> for String {
    fn from(flags: AttributeFlags) -> Self {
        flags.to_string()
    }
}

impl FromIterator<AttributeFlag> for AttributeFlags {
    fn from_iter<I: IntoIterator<Item = AttributeFlag>>(iter: I) -> Self {
        Self::from_flags(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_table_matches_enum_order() {
        for (index, (flag, _, name)) in ATTRIBUTE_TABLE.iter().enumerate() {
            assert_eq!(flag.index(), index);
            assert_eq!(flag.name(), *name);
        }
    }

    #[test]
    fn test_display_in_bit_order() {
        let flags = AttributeFlags::from_flags([AttributeFlag::Archive, AttributeFlag::ReadOnly]);
        assert_eq!(flags.to_string(), "ReadOnly, Archive");
        assert_eq!(AttributeFlags::new().to_string(), "");
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        let flags: AttributeFlags = "archive,  HIDDEN".parse().unwrap();
        assert!(flags.contains(AttributeFlag::Archive));
        assert!(flags.contains(AttributeFlag::Hidden));
        assert_eq!(flags.to_string(), "Hidden, Archive");
    }

    #[test]
    fn test_parse_rejects_unknown_names() {
        assert!("Archive, Sparkly".parse::<AttributeFlags>().is_err());
    }

    #[test]
    fn test_from_bits_ignores_unknown_bits() {
        let flags = AttributeFlags::from_bits(0x0021 | 0x8_0000);
        assert_eq!(flags.to_string(), "ReadOnly, Archive");
        assert_eq!(flags.bits(), 0x0021);
    }

    proptest! {
        #[test]
        fn test_bits_round_trip(bits in 0u32..0x8000) {
            let flags = AttributeFlags::from_bits(bits);
            prop_assert_eq!(AttributeFlags::from_bits(flags.bits()), flags.clone());
            prop_assert_eq!(flags.to_string().parse::<AttributeFlags>().unwrap(), flags);
        }
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serializes_as_string() {
        let flags = AttributeFlags::from_flags([AttributeFlag::Hidden]);
        let json = serde_json::to_string(&flags).unwrap();
        assert_eq!(json, "\"Hidden\"");
        let back: AttributeFlags = serde_json::from_str(&json).unwrap();
        assert_eq!(back, flags);
    }
}
