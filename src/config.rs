//! Dataset location discovery.
//!
//! Search order: an explicit `--data` value, then `STACKATLAS_DATA`, then a
//! walk upwards from the working directory looking for
//! `technologies/categories.json`. Values that look like URLs select the HTTP
//! source; anything else must be a directory holding `categories.json` (or a
//! `technologies/` child that does).

use crate::catalog::{CATEGORY_DOCUMENT, DirectorySource, DocumentSource, HttpSource};
use anyhow::{Result, bail};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming the dataset directory or base URL.
pub const DATA_ENV: &str = "STACKATLAS_DATA";

const DATASET_DIR: &str = "technologies";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataLocation {
    Directory(PathBuf),
    Url(String),
}

impl DataLocation {
    /// Interpret a user-supplied location.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            bail!("empty dataset location");
        }
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            return Ok(DataLocation::Url(trimmed.to_string()));
        }
        let path = PathBuf::from(trimmed);
        match dataset_dir_at(&path) {
            Some(dir) => Ok(DataLocation::Directory(dir)),
            None => bail!(
                "{} does not contain {CATEGORY_DOCUMENT} (directly or under {DATASET_DIR}/)",
                path.display()
            ),
        }
    }

    /// Build the document source for this location.
    pub fn open(&self) -> Result<Box<dyn DocumentSource>> {
        Ok(match self {
            DataLocation::Directory(dir) => Box::new(DirectorySource::new(dir.clone())),
            DataLocation::Url(url) => Box::new(HttpSource::new(url)?),
        })
    }
}

/// Resolve the dataset location from the CLI flag, the environment, or the
/// working directory. Failure is fatal for the CLI: nothing can be browsed.
pub fn resolve_data_location(explicit: Option<&str>) -> Result<DataLocation> {
    let env_value = env::var(DATA_ENV).ok();
    let cwd = env::current_dir().ok();
    resolve_with(explicit, env_value.as_deref(), cwd.as_deref())
}

fn resolve_with(
    explicit: Option<&str>,
    env_value: Option<&str>,
    start: Option<&Path>,
) -> Result<DataLocation> {
    if let Some(raw) = explicit {
        return DataLocation::parse(raw);
    }

    if let Some(raw) = env_value.filter(|v| !v.trim().is_empty()) {
        return DataLocation::parse(raw);
    }

    if let Some(dir) = start.and_then(search_upwards) {
        return Ok(DataLocation::Directory(dir));
    }

    bail!(
        "Unable to locate a technology dataset. Pass --data or set {DATA_ENV} to a directory containing {CATEGORY_DOCUMENT}."
    );
}

fn is_dataset_dir(candidate: &Path) -> bool {
    candidate.join(CATEGORY_DOCUMENT).is_file()
}

fn dataset_dir_at(candidate: &Path) -> Option<PathBuf> {
    if is_dataset_dir(candidate) {
        return Some(candidate.to_path_buf());
    }
    let nested = candidate.join(DATASET_DIR);
    is_dataset_dir(&nested).then_some(nested)
}

fn search_upwards(start: &Path) -> Option<PathBuf> {
    let mut dir = fs::canonicalize(start).ok()?;
    loop {
        let nested = dir.join(DATASET_DIR);
        if is_dataset_dir(&nested) {
            return Some(nested);
        }
        if !dir.pop() {
            break;
        }
    }
    None
}
