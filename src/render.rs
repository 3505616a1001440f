//! Views over the technology index.
//!
//! Each view is a plain serializable struct (emitted as-is under `--json`)
//! with a `Display` impl for the terminal. Views are the only place index
//! records are shaped for people; the index itself stays presentation-free.

use crate::catalog::{CategoryKey, TechKey, Technology, TechnologyIndex};
use anyhow::Result;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

const EMPTY_CATEGORY: &str = "No technologies found in this category.";
const CARD_INDENT: &str = "    ";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
/// One row of the category list.
pub struct CategoryEntry {
    pub key: CategoryKey,
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryList {
    pub categories: Vec<CategoryEntry>,
}

#[derive(Debug, Clone, Serialize)]
/// Summary card for one technology inside a category page.
pub struct TechnologyCard {
    pub key: TechKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub implies: Vec<TechKey>,
    pub implied_by: Vec<TechKey>,
    pub signals: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryPage {
    pub key: CategoryKey,
    pub name: String,
    pub technologies: Vec<TechnologyCard>,
}

#[derive(Debug, Clone, Serialize)]
/// Full record view reached by following an implication link.
pub struct TechnologyDetail {
    pub key: TechKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub record: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImpliedByList {
    pub key: TechKey,
    pub implied_by: Vec<TechKey>,
}

/// The sorted category list with per-category technology counts.
pub fn category_list(index: &TechnologyIndex) -> CategoryList {
    CategoryList {
        categories: index
            .categories()
            .iter()
            .map(|(key, category)| CategoryEntry {
                key: key.clone(),
                name: category.name.clone(),
                count: index.category_count(key),
            })
            .collect(),
    }
}

/// Cards for every technology in a category. Unknown categories produce an
/// empty page titled with the raw key.
pub fn category_page(index: &TechnologyIndex, key: &CategoryKey) -> CategoryPage {
    let name = index
        .category(key)
        .map(|category| category.name.clone())
        .unwrap_or_else(|| key.to_string());
    CategoryPage {
        key: key.clone(),
        name,
        technologies: index
            .technologies_in(key)
            .iter()
            .map(|tech| technology_card(index, tech))
            .collect(),
    }
}

pub fn technology_card(index: &TechnologyIndex, tech: &Arc<Technology>) -> TechnologyCard {
    TechnologyCard {
        key: tech.key.clone(),
        website: tech.website.clone().filter(|url| !url.is_empty()),
        description: tech.description().map(str::to_string),
        implies: tech.implied_keys().cloned().collect(),
        implied_by: implied_by_keys(index, &tech.key),
        signals: tech.detection_signals(),
    }
}

/// Detail view for a key, or `None` when no partition holds it.
pub fn technology_detail(index: &TechnologyIndex, key: &TechKey) -> Result<Option<TechnologyDetail>> {
    let Some(tech) = index.find(key) else {
        return Ok(None);
    };
    Ok(Some(TechnologyDetail {
        key: tech.key.clone(),
        description: tech.description().map(str::to_string),
        record: tech.to_json()?,
    }))
}

pub fn implied_by_list(index: &TechnologyIndex, key: &TechKey) -> ImpliedByList {
    ImpliedByList {
        key: key.clone(),
        implied_by: implied_by_keys(index, key),
    }
}

fn implied_by_keys(index: &TechnologyIndex, key: &TechKey) -> Vec<TechKey> {
    index
        .implied_by(key)
        .map(|keys| keys.iter().cloned().collect())
        .unwrap_or_default()
}

fn join_keys(keys: &[TechKey]) -> String {
    keys.iter()
        .map(TechKey::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn write_indented(f: &mut fmt::Formatter<'_>, block: &str) -> fmt::Result {
    for line in block.lines() {
        writeln!(f, "{CARD_INDENT}{line}")?;
    }
    Ok(())
}

impl fmt::Display for CategoryList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Categories")?;
        for entry in &self.categories {
            writeln!(f, "  [{}] {} ({})", entry.key, entry.name, entry.count)?;
        }
        Ok(())
    }
}

impl fmt::Display for TechnologyCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  {}", self.key)?;
        if let Some(website) = &self.website {
            writeln!(f, "{CARD_INDENT}{website}")?;
        }
        if let Some(description) = &self.description {
            writeln!(f, "{CARD_INDENT}{description}")?;
        }
        if !self.implies.is_empty() {
            writeln!(f, "{CARD_INDENT}Implies: {}", join_keys(&self.implies))?;
        }
        if !self.implied_by.is_empty() {
            writeln!(f, "{CARD_INDENT}Implied by: {}", join_keys(&self.implied_by))?;
        }
        if !self.signals.is_empty() {
            let pretty = serde_json::to_string_pretty(&self.signals).map_err(|_| fmt::Error)?;
            write_indented(f, &pretty)?;
        }
        Ok(())
    }
}

impl fmt::Display for CategoryPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Technologies in {}", self.name)?;
        if self.technologies.is_empty() {
            return writeln!(f, "  {EMPTY_CATEGORY}");
        }
        for (idx, card) in self.technologies.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{card}")?;
        }
        Ok(())
    }
}

impl fmt::Display for TechnologyDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.key)?;
        if let Some(description) = &self.description {
            writeln!(f, "{description}")?;
        }
        let pretty = serde_json::to_string_pretty(&self.record).map_err(|_| fmt::Error)?;
        writeln!(f, "{pretty}")
    }
}

impl fmt::Display for ImpliedByList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.implied_by.is_empty() {
            return writeln!(f, "Nothing implies {}.", self.key);
        }
        writeln!(f, "Implied by: {}", join_keys(&self.implied_by))
    }
}
