//! Dataset checks that the loader itself deliberately skips.
//!
//! Loading is tolerant: bad partitions become empty and dangling references
//! resolve to nothing. `validate_dataset` is the strict counterpart for
//! dataset authors. It checks each document against the bundled JSON Schemas,
//! checks that keys sit in the right letter partition, and cross-checks `cats`
//! and `implies` references. It reports everything it finds rather than
//! stopping at the first problem.

use crate::catalog::{
    CATEGORY_DOCUMENT, CategoryDocument, DocumentSource, Partition, PartitionLetter, TechKey,
    TechnologyIndex, parse_category_document, parse_partition_document,
};
use anyhow::{Context, Result, anyhow};
use jsonschema::JSONSchema;
use rayon::prelude::*;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use tracing::debug;

const CATEGORIES_SCHEMA: &str = include_str!("../schema/categories.schema.json");
const TECHNOLOGIES_SCHEMA: &str = include_str!("../schema/technologies.schema.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// One validation result.
pub struct Finding {
    pub severity: Severity,
    pub document: String,
    pub message: String,
}

impl Finding {
    fn error(document: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            document: document.into(),
            message: message.into(),
        }
    }

    fn warning(document: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            document: document.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}: {}",
            self.severity.as_str(),
            self.document,
            self.message
        )
    }
}

/// Compiled copies of the bundled document schemas.
pub struct DatasetSchemas {
    categories: JSONSchema,
    technologies: JSONSchema,
}

impl DatasetSchemas {
    pub fn bundled() -> Result<Self> {
        Ok(Self {
            categories: compile_schema("categories.schema.json", CATEGORIES_SCHEMA)?,
            technologies: compile_schema("technologies.schema.json", TECHNOLOGIES_SCHEMA)?,
        })
    }
}

fn compile_schema(name: &str, raw: &str) -> Result<JSONSchema> {
    let schema: Value =
        serde_json::from_str(raw).with_context(|| format!("parsing bundled schema {name}"))?;
    JSONSchema::compile(&schema).map_err(|err| anyhow!("compiling bundled schema {name}: {err}"))
}

fn schema_violations(schema: &JSONSchema, instance: &Value) -> Vec<String> {
    match schema.validate(instance) {
        Ok(()) => Vec::new(),
        Err(errors) => errors
            .map(|err| {
                let path = err.instance_path.to_string();
                let location = if path.is_empty() { "(root)" } else { path.as_str() };
                format!("{location}: {err}")
            })
            .collect(),
    }
}

/// Result of checking one partition; the parsed documents feed the
/// cross-reference pass.
struct PartitionCheck {
    findings: Vec<Finding>,
    partition: Partition,
}

/// Validate every document reachable through `source`.
///
/// Returns `Err` only when the bundled schemas cannot be compiled; dataset
/// problems, including an unreadable category document, are findings.
pub fn validate_dataset<S>(source: &S) -> Result<Vec<Finding>>
where
    S: DocumentSource + ?Sized,
{
    let schemas = DatasetSchemas::bundled()?;
    let mut findings = Vec::new();

    let categories = check_categories(source, &schemas, &mut findings);

    let letters: Vec<PartitionLetter> = PartitionLetter::all().collect();
    let checks: Vec<PartitionCheck> = letters
        .par_iter()
        .map(|letter| check_partition(source, &schemas, *letter))
        .collect();

    let mut partitions = Vec::with_capacity(checks.len());
    for check in checks {
        findings.extend(check.findings);
        partitions.push(check.partition);
    }

    let index = TechnologyIndex::build(categories.clone().unwrap_or_default(), partitions);
    findings.extend(cross_references(&index, categories.as_ref()));

    debug!(findings = findings.len(), "dataset validation finished");
    Ok(findings)
}

fn check_categories<S>(
    source: &S,
    schemas: &DatasetSchemas,
    findings: &mut Vec<Finding>,
) -> Option<CategoryDocument>
where
    S: DocumentSource + ?Sized,
{
    let bytes = match source.fetch(CATEGORY_DOCUMENT) {
        Ok(bytes) => bytes,
        Err(err) => {
            findings.push(Finding::error(CATEGORY_DOCUMENT, format!("{err:#}")));
            return None;
        }
    };
    let value: Value = match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(err) => {
            findings.push(Finding::error(CATEGORY_DOCUMENT, format!("invalid JSON: {err}")));
            return None;
        }
    };
    let violations = schema_violations(&schemas.categories, &value);
    let valid = violations.is_empty();
    findings.extend(
        violations
            .into_iter()
            .map(|message| Finding::error(CATEGORY_DOCUMENT, message)),
    );
    if !valid {
        return None;
    }
    match parse_category_document(&bytes) {
        Ok(document) => Some(document),
        Err(err) => {
            findings.push(Finding::error(CATEGORY_DOCUMENT, format!("{err:#}")));
            None
        }
    }
}

fn check_partition<S>(source: &S, schemas: &DatasetSchemas, letter: PartitionLetter) -> PartitionCheck
where
    S: DocumentSource + ?Sized,
{
    let name = letter.document_name();
    let mut findings = Vec::new();

    let bytes = match source.fetch(&name) {
        Ok(bytes) => bytes,
        Err(err) => {
            // The loader survives a missing partition, so this is not fatal.
            findings.push(Finding::warning(&name, format!("{err:#}")));
            return PartitionCheck {
                findings,
                partition: Partition::failed(letter, format!("{err:#}")),
            };
        }
    };

    let value: Value = match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(err) => {
            findings.push(Finding::error(&name, format!("invalid JSON: {err}")));
            return PartitionCheck {
                findings,
                partition: Partition::failed(letter, err.to_string()),
            };
        }
    };

    findings.extend(
        schema_violations(&schemas.technologies, &value)
            .into_iter()
            .map(|message| Finding::error(&name, message)),
    );

    if let Some(records) = value.as_object() {
        for key in records.keys() {
            let home = TechKey(key.clone()).home_partition();
            if home != letter {
                findings.push(Finding::warning(
                    &name,
                    format!("{key} belongs in {}", home.document_name()),
                ));
            }
        }
    }

    let partition = match parse_partition_document(&bytes) {
        Ok(records) => Partition::loaded(letter, records),
        Err(err) => {
            findings.push(Finding::error(&name, format!("{err:#}")));
            Partition::failed(letter, format!("{err:#}"))
        }
    };

    PartitionCheck {
        findings,
        partition,
    }
}

fn cross_references(index: &TechnologyIndex, categories: Option<&CategoryDocument>) -> Vec<Finding> {
    let mut findings = Vec::new();
    for tech in index.technologies() {
        let document = tech.key.home_partition().document_name();
        if let Some(categories) = categories {
            for cat in &tech.cats {
                if !categories.contains_key(cat) {
                    findings.push(Finding::warning(
                        &document,
                        format!("{} references unknown category {cat}", tech.key),
                    ));
                }
            }
        }
        for implication in &tech.implies {
            if index.find(&implication.target).is_none() {
                findings.push(Finding::warning(
                    &document,
                    format!(
                        "{} implies unknown technology {}",
                        tech.key, implication.target
                    ),
                ));
            }
        }
    }
    findings
}

/// True when any finding is an error.
pub fn has_errors(findings: &[Finding]) -> bool {
    findings
        .iter()
        .any(|finding| finding.severity == Severity::Error)
}
