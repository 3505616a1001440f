//! Deserializable representation of the taxonomy documents.
//!
//! `categories.json` maps category keys to [`Category`] entries; each partition
//! document (`a.json` … `_.json`) maps technology keys to [`Technology`]
//! records. Only the fields the browser reads are typed. Everything else on a
//! technology (detection signals, icons, pricing, ...) is kept verbatim in
//! [`Technology::fields`] so detail views can show the record as written.

use crate::catalog::identity::{CategoryKey, TechKey};
use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Fields that carry detection signals, in display order.
pub const SIGNAL_FIELDS: &[&str] = &[
    "xhr",
    "dom",
    "html",
    "text",
    "scripts",
    "css",
    "robots",
    "magento",
    "meta",
    "headers",
    "dns",
    "certIssuer",
    "cookies",
    "scriptSrc",
    "js",
];

const IMPLICATION_TAG_SEPARATOR: &str = "\\;";

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
/// Category entry from `categories.json`.
///
/// Only `name` is read; `priority`, `groups` and anything else are kept
/// verbatim in `fields`.
pub struct Category {
    pub name: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
/// One technology record.
///
/// `key` is not part of the record body; it is filled from the enclosing
/// partition document when the partition is parsed.
pub struct Technology {
    #[serde(skip)]
    pub key: TechKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cats: Vec<CategoryKey>,
    #[serde(
        default,
        deserialize_with = "deserialize_implies",
        serialize_with = "serialize_implies",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub implies: Vec<Implication>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Technology {
    /// Description text, falling back to the capitalized `Description`
    /// spelling some datasets use.
    pub fn description(&self) -> Option<&str> {
        self.description
            .as_deref()
            .or_else(|| self.fields.get("Description").and_then(Value::as_str))
            .filter(|text| !text.is_empty())
    }

    /// Detection-signal fields that are present and not falsy, in
    /// [`SIGNAL_FIELDS`] order.
    pub fn detection_signals(&self) -> Map<String, Value> {
        let mut signals = Map::new();
        for field in SIGNAL_FIELDS {
            if let Some(value) = self.fields.get(*field) {
                if is_truthy(value) {
                    signals.insert((*field).to_string(), value.clone());
                }
            }
        }
        signals
    }

    /// Targets of this record's `implies` edges.
    pub fn implied_keys(&self) -> impl Iterator<Item = &TechKey> {
        self.implies.iter().map(|implication| &implication.target)
    }

    /// The full record as JSON, with `key` first.
    pub fn to_json(&self) -> Result<Value> {
        let mut object = Map::new();
        object.insert("key".to_string(), Value::String(self.key.0.clone()));
        if let Value::Object(body) =
            serde_json::to_value(self).with_context(|| format!("serializing {}", self.key))?
        {
            object.extend(body);
        }
        Ok(Value::Object(object))
    }
}

/// Falsy in the sense the dataset authors use: `null`, `false`, `0`, `""`.
/// Empty arrays and objects still count as present.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// One `implies` edge, e.g. `PHP\;confidence:50`.
pub struct Implication {
    pub target: TechKey,
    pub confidence: Option<u8>,
    pub version: Option<String>,
    pub raw: String,
}

impl Implication {
    /// Split an `implies` entry into its target key and `\;`-separated tags.
    ///
    /// Unknown tags are ignored; a confidence outside 0..=100 is dropped.
    pub fn parse(raw: &str) -> Self {
        let mut parts = raw.split(IMPLICATION_TAG_SEPARATOR);
        let target = parts.next().unwrap_or_default().trim();
        let mut confidence = None;
        let mut version = None;
        for tag in parts {
            let Some((name, value)) = tag.split_once(':') else {
                continue;
            };
            match name.trim() {
                "confidence" => {
                    confidence = value.trim().parse::<u8>().ok().filter(|c| *c <= 100);
                }
                "version" => version = Some(value.trim().to_string()),
                _ => {}
            }
        }
        Implication {
            target: TechKey(target.to_string()),
            confidence,
            version,
            raw: raw.to_string(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn deserialize_implies<'de, D>(deserializer: D) -> Result<Vec<Implication>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<OneOrMany>::deserialize(deserializer)?;
    Ok(match raw {
        None => Vec::new(),
        Some(OneOrMany::One(entry)) => vec![Implication::parse(&entry)],
        Some(OneOrMany::Many(entries)) => entries.iter().map(|e| Implication::parse(e)).collect(),
    })
}

// A single edge goes back out as a bare string, matching how the documents
// usually spell it.
fn serialize_implies<S>(implies: &[Implication], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match implies {
        [single] => serializer.serialize_str(&single.raw),
        many => serializer.collect_seq(many.iter().map(|implication| &implication.raw)),
    }
}

/// Category document, unsorted.
pub type CategoryDocument = BTreeMap<CategoryKey, Category>;

/// Parsed partition document with keys filled in.
pub type PartitionDocument = BTreeMap<TechKey, Arc<Technology>>;

/// Parse `categories.json`.
pub fn parse_category_document(bytes: &[u8]) -> Result<CategoryDocument> {
    let document: CategoryDocument =
        serde_json::from_slice(bytes).context("parsing category document")?;
    Ok(document)
}

/// Parse one partition document and stamp each record with its key.
pub fn parse_partition_document(bytes: &[u8]) -> Result<PartitionDocument> {
    let raw: BTreeMap<TechKey, Technology> =
        serde_json::from_slice(bytes).context("parsing partition document")?;
    Ok(raw
        .into_iter()
        .map(|(key, mut tech)| {
            tech.key = key.clone();
            (key, Arc::new(tech))
        })
        .collect())
}
