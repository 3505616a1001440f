//! Technology taxonomy wiring.
//!
//! This module wraps the dataset documents (`categories.json` plus the letter
//! partitions) so the CLI can load one immutable snapshot and query it.
//! Types here mirror the document fields; callers use `TechnologyIndex` for
//! lookups and a `DocumentSource` to say where the documents live.

pub mod identity;
pub mod index;
pub mod model;
pub mod source;

pub use identity::{CategoryKey, PARTITION_ALPHABET, PartitionLetter, TechKey};
pub use index::{Partition, TechnologyIndex};
pub use model::{
    Category, CategoryDocument, Implication, PartitionDocument, SIGNAL_FIELDS, Technology,
    parse_category_document, parse_partition_document,
};
pub use source::{CATEGORY_DOCUMENT, DirectorySource, DocumentSource, HttpSource};
