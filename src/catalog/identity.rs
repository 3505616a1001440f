use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Partition alphabet, in lookup order. `_` holds every key that does not
/// start with an ASCII letter.
pub const PARTITION_ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz_";

/// Stable identifier for a technology record (e.g., `WordPress`).
#[derive(Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TechKey(pub String);

impl TechKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The partition this key is expected to live in.
    pub fn home_partition(&self) -> PartitionLetter {
        self.0
            .chars()
            .next()
            .map(|c| c.to_ascii_lowercase())
            .and_then(PartitionLetter::new)
            .unwrap_or(PartitionLetter::OTHER)
    }
}

impl fmt::Display for TechKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TechKey {
    fn from(value: &str) -> Self {
        TechKey(value.to_string())
    }
}

/// Identifier for a category.
///
/// The category document spells keys as JSON object keys (`"1"`) while
/// technology records list them as numbers (`"cats": [1]`). Both normalize to
/// the decimal string form so the two sides compare equal.
#[derive(Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct CategoryKey(pub String);

impl CategoryKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CategoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CategoryKey {
    fn from(value: &str) -> Self {
        CategoryKey(value.to_string())
    }
}

// Numeric keys go back out as numbers so re-serialized records keep the
// `"cats": [1, 6]` shape of the source documents.
impl Serialize for CategoryKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self.0.parse::<u64>() {
            Ok(number) if number.to_string() == self.0 => serializer.serialize_u64(number),
            _ => serializer.serialize_str(&self.0),
        }
    }
}

impl<'de> Deserialize<'de> for CategoryKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct CategoryKeyVisitor;

        impl Visitor<'_> for CategoryKeyVisitor {
            type Value = CategoryKey;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a category key as string or integer")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<CategoryKey, E> {
                Ok(CategoryKey(value.to_string()))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<CategoryKey, E> {
                Ok(CategoryKey(value.to_string()))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<CategoryKey, E> {
                Ok(CategoryKey(value.to_string()))
            }
        }

        deserializer.deserialize_any(CategoryKeyVisitor)
    }
}

/// One letter-keyed shard of the technology dataset.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PartitionLetter(char);

impl PartitionLetter {
    pub const OTHER: PartitionLetter = PartitionLetter('_');

    /// Returns `None` for characters outside [`PARTITION_ALPHABET`].
    pub fn new(letter: char) -> Option<Self> {
        PARTITION_ALPHABET
            .contains(letter)
            .then_some(PartitionLetter(letter))
    }

    /// All 27 partitions in lookup order.
    pub fn all() -> impl Iterator<Item = PartitionLetter> {
        PARTITION_ALPHABET.chars().map(PartitionLetter)
    }

    pub fn as_char(self) -> char {
        self.0
    }

    /// Document name the partition is stored under, e.g. `a.json`.
    pub fn document_name(self) -> String {
        format!("{}.json", self.0)
    }
}

impl fmt::Display for PartitionLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for PartitionLetter {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}
