//! Where taxonomy documents come from.
//!
//! A source only knows how to fetch a named document (`categories.json`,
//! `a.json`, ...) as raw bytes. Parsing and the failure policy live in the
//! index, so every source behaves the same way under partial outages.

use anyhow::{Context, Result, bail};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the category document inside a dataset.
pub const CATEGORY_DOCUMENT: &str = "categories.json";

/// Fetches dataset documents by name.
///
/// Implementations must be shareable across the partition fan-out workers.
pub trait DocumentSource: Send + Sync {
    fn fetch(&self, name: &str) -> Result<Vec<u8>>;

    /// Human-readable location used in log lines and error messages.
    fn describe(&self) -> String;
}

/// Dataset stored as a directory of JSON files.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl DocumentSource for DirectorySource {
    fn fetch(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.root.join(name);
        if !path.is_file() {
            bail!("document not found: {}", path.display());
        }
        debug!(path = %path.display(), "reading document");
        fs::read(&path).with_context(|| format!("reading {}", path.display()))
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

/// Dataset served over HTTP(S) under a base URL.
pub struct HttpSource {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpSource {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("stackatlas/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url_for(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name)
    }
}

impl DocumentSource for HttpSource {
    fn fetch(&self, name: &str) -> Result<Vec<u8>> {
        let url = self.url_for(name);
        debug!(%url, "fetching document");
        let response = self
            .client
            .get(&url)
            .send()
            .with_context(|| format!("requesting {url}"))?;
        let status = response.status();
        if !status.is_success() {
            bail!("{url} returned HTTP {status}");
        }
        let body = response
            .bytes()
            .with_context(|| format!("reading body of {url}"))?;
        Ok(body.to_vec())
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}
