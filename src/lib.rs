//! Shared library for the stackatlas technology browser.
//!
//! The crate loads a static technology taxonomy (a category document plus
//! letter-partitioned technology documents) into an immutable
//! [`TechnologyIndex`] and exposes views over it: the category list,
//! per-category technology cards, and the implication graph in both
//! directions. The `atlas` binary is a thin CLI over these functions.

pub mod catalog;
pub mod config;
pub mod render;
pub mod validation;

pub use catalog::{
    CATEGORY_DOCUMENT, Category, CategoryKey, DirectorySource, DocumentSource, HttpSource,
    Implication, PARTITION_ALPHABET, Partition, PartitionLetter, SIGNAL_FIELDS, TechKey,
    Technology, TechnologyIndex,
};
pub use config::{DATA_ENV, DataLocation, resolve_data_location};
pub use render::{
    CategoryEntry, CategoryList, CategoryPage, ImpliedByList, TechnologyCard, TechnologyDetail,
};
pub use validation::{Finding, Severity, has_errors, validate_dataset};

use anyhow::Result;

/// Resolve the dataset location and load the index in one step.
pub fn load_index(explicit: Option<&str>) -> Result<TechnologyIndex> {
    let location = resolve_data_location(explicit)?;
    let source = location.open()?;
    TechnologyIndex::load(source.as_ref())
}
