//! The technology index: every lookup the browser makes goes through here.
//!
//! The index is built once from the category document plus the 27 letter
//! partitions and never mutated afterwards. Building is two-phase: records are
//! accumulated into the category and reverse-implication maps, then each
//! category list is sorted by key, so the result does not depend on the order
//! partitions finished loading.
//!
//! A partition that cannot be fetched or parsed is kept as an empty slot with
//! the failure recorded; the rest of the index is unaffected. Only the category
//! document is mandatory.

use crate::catalog::identity::{CategoryKey, PartitionLetter, TechKey};
use crate::catalog::model::{
    Category, CategoryDocument, PartitionDocument, Technology, parse_category_document,
    parse_partition_document,
};
use crate::catalog::source::{CATEGORY_DOCUMENT, DocumentSource};
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
/// One letter shard, possibly empty because its load failed.
pub struct Partition {
    letter: PartitionLetter,
    records: PartitionDocument,
    failure: Option<String>,
}

impl Partition {
    pub fn loaded(letter: PartitionLetter, records: PartitionDocument) -> Self {
        Self {
            letter,
            records,
            failure: None,
        }
    }

    /// An empty stand-in for a partition that could not be loaded.
    pub fn failed(letter: PartitionLetter, reason: impl Into<String>) -> Self {
        Self {
            letter,
            records: PartitionDocument::new(),
            failure: Some(reason.into()),
        }
    }

    pub fn letter(&self) -> PartitionLetter {
        self.letter
    }

    pub fn records(&self) -> &PartitionDocument {
        &self.records
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug)]
/// Immutable lookup structure over a loaded taxonomy.
pub struct TechnologyIndex {
    categories: Vec<(CategoryKey, Category)>,
    partitions: Vec<Partition>,
    by_category: BTreeMap<CategoryKey, Vec<Arc<Technology>>>,
    implied_by: BTreeMap<TechKey, BTreeSet<TechKey>>,
}

impl TechnologyIndex {
    /// Fetch the category document, fan out over all partitions, and build.
    ///
    /// Fails only when the category document cannot be loaded. Partition
    /// failures are logged and leave that partition empty.
    pub fn load<S>(source: &S) -> Result<Self>
    where
        S: DocumentSource + ?Sized,
    {
        let bytes = source
            .fetch(CATEGORY_DOCUMENT)
            .with_context(|| format!("loading {CATEGORY_DOCUMENT} from {}", source.describe()))?;
        let categories = parse_category_document(&bytes)
            .with_context(|| format!("{CATEGORY_DOCUMENT} from {}", source.describe()))?;

        let letters: Vec<PartitionLetter> = PartitionLetter::all().collect();
        let partitions: Vec<Partition> = letters
            .par_iter()
            .map(|letter| load_partition(source, *letter))
            .collect();

        let index = Self::build(categories, partitions);
        info!(
            source = %source.describe(),
            categories = index.categories.len(),
            technologies = index.technology_count(),
            failed_partitions = index.failed_partitions().count(),
            "technology index built"
        );
        Ok(index)
    }

    /// Build from documents that are already in memory.
    ///
    /// `partitions` may arrive in any order; lookups scan them in alphabet
    /// order regardless.
    pub fn build(categories: CategoryDocument, mut partitions: Vec<Partition>) -> Self {
        let mut categories: Vec<(CategoryKey, Category)> = categories.into_iter().collect();
        categories.sort_by(|(a_key, a), (b_key, b)| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a_key.cmp(b_key))
        });

        partitions.sort_by_key(Partition::letter);

        let mut by_category: BTreeMap<CategoryKey, Vec<Arc<Technology>>> = BTreeMap::new();
        let mut implied_by: BTreeMap<TechKey, BTreeSet<TechKey>> = BTreeMap::new();
        for partition in &partitions {
            for tech in partition.records.values() {
                let cats: BTreeSet<&CategoryKey> = tech.cats.iter().collect();
                for cat in cats {
                    by_category
                        .entry(cat.clone())
                        .or_default()
                        .push(Arc::clone(tech));
                }
                for target in tech.implied_keys() {
                    implied_by
                        .entry(target.clone())
                        .or_default()
                        .insert(tech.key.clone());
                }
            }
        }

        // Second phase: ordering is only meaningful once every partition is in.
        for techs in by_category.values_mut() {
            techs.sort_by(|a, b| {
                a.key
                    .as_str()
                    .to_lowercase()
                    .cmp(&b.key.as_str().to_lowercase())
                    .then_with(|| a.key.cmp(&b.key))
            });
        }

        Self {
            categories,
            partitions,
            by_category,
            implied_by,
        }
    }

    /// Categories sorted by display name, case-insensitive.
    pub fn categories(&self) -> &[(CategoryKey, Category)] {
        &self.categories
    }

    pub fn category(&self, key: &CategoryKey) -> Option<&Category> {
        self.categories
            .iter()
            .find(|(candidate, _)| candidate == key)
            .map(|(_, category)| category)
    }

    /// Resolve user input to a category: exact key first, then a
    /// case-insensitive name match.
    pub fn resolve_category(&self, query: &str) -> Option<(&CategoryKey, &Category)> {
        let query = query.trim();
        self.categories
            .iter()
            .find(|(key, _)| key.as_str() == query)
            .or_else(|| {
                let folded = query.to_lowercase();
                self.categories
                    .iter()
                    .find(|(_, category)| category.name.to_lowercase() == folded)
            })
            .map(|(key, category)| (key, category))
    }

    /// Technologies in a category, sorted by key (case-insensitive). Unknown
    /// categories are empty.
    pub fn technologies_in(&self, key: &CategoryKey) -> &[Arc<Technology>] {
        self.by_category
            .get(key)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn category_count(&self, key: &CategoryKey) -> usize {
        self.technologies_in(key).len()
    }

    /// Keys of the technologies whose `implies` points at `key`.
    pub fn implied_by(&self, key: &TechKey) -> Option<&BTreeSet<TechKey>> {
        self.implied_by.get(key)
    }

    /// First record with this key, scanning partitions in alphabet order.
    pub fn find(&self, key: &TechKey) -> Option<Arc<Technology>> {
        self.partitions
            .iter()
            .find_map(|partition| partition.records.get(key))
            .cloned()
    }

    pub fn partition(&self, letter: PartitionLetter) -> Option<&Partition> {
        self.partitions
            .iter()
            .find(|partition| partition.letter == letter)
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    /// Partitions whose load failed, with the recorded reason.
    pub fn failed_partitions(&self) -> impl Iterator<Item = (PartitionLetter, &str)> {
        self.partitions
            .iter()
            .filter_map(|partition| Some((partition.letter, partition.failure()?)))
    }

    pub fn technology_count(&self) -> usize {
        self.partitions.iter().map(Partition::len).sum()
    }

    /// All records in partition order.
    pub fn technologies(&self) -> impl Iterator<Item = &Arc<Technology>> {
        self.partitions
            .iter()
            .flat_map(|partition| partition.records.values())
    }
}

fn load_partition<S>(source: &S, letter: PartitionLetter) -> Partition
where
    S: DocumentSource + ?Sized,
{
    let name = letter.document_name();
    match source
        .fetch(&name)
        .and_then(|bytes| parse_partition_document(&bytes))
    {
        Ok(records) => {
            debug!(partition = %letter, records = records.len(), "partition loaded");
            Partition::loaded(letter, records)
        }
        Err(err) => {
            warn!(
                partition = %letter,
                source = %source.describe(),
                "error loading {name}: {err:#}"
            );
            Partition::failed(letter, format!("{err:#}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use serde_json::{Value, json};
    use std::collections::HashMap;

    /// In-memory dataset; documents not listed fail to fetch.
    struct FixtureSource {
        documents: HashMap<String, Vec<u8>>,
    }

    impl FixtureSource {
        fn new(categories: Value, partitions: &[(char, Value)]) -> Self {
            let mut documents = HashMap::new();
            documents.insert(
                CATEGORY_DOCUMENT.to_string(),
                serde_json::to_vec(&categories).unwrap(),
            );
            for (letter, doc) in partitions {
                documents.insert(format!("{letter}.json"), serde_json::to_vec(doc).unwrap());
            }
            Self { documents }
        }

        fn with_raw(mut self, name: &str, bytes: &[u8]) -> Self {
            self.documents.insert(name.to_string(), bytes.to_vec());
            self
        }
    }

    impl DocumentSource for FixtureSource {
        fn fetch(&self, name: &str) -> Result<Vec<u8>> {
            match self.documents.get(name) {
                Some(bytes) => Ok(bytes.clone()),
                None => bail!("no fixture for {name}"),
            }
        }

        fn describe(&self) -> String {
            "fixture".to_string()
        }
    }

    fn keys(techs: &[Arc<Technology>]) -> Vec<&str> {
        techs.iter().map(|tech| tech.key.as_str()).collect()
    }

    #[test]
    fn categories_sort_by_name_case_insensitively() {
        let source = FixtureSource::new(
            json!({"c1": {"name": "Z"}, "c2": {"name": "A"}, "c3": {"name": "b"}}),
            &[],
        );
        let index = TechnologyIndex::load(&source).unwrap();
        let order: Vec<&str> = index
            .categories()
            .iter()
            .map(|(key, _)| key.as_str())
            .collect();
        assert_eq!(order, vec!["c2", "c3", "c1"]);
    }

    #[test]
    fn builds_category_and_implication_maps() {
        let source = FixtureSource::new(
            json!({"c1": {"name": "Z"}, "c2": {"name": "A"}}),
            &[('w', json!({"wp": {"cats": ["c1"], "implies": "php"}}))],
        );
        let index = TechnologyIndex::load(&source).unwrap();
        assert_eq!(keys(index.technologies_in(&CategoryKey::from("c1"))), vec!["wp"]);
        let implied = index.implied_by(&TechKey::from("php")).unwrap();
        assert_eq!(
            implied.iter().map(TechKey::as_str).collect::<Vec<_>>(),
            vec!["wp"]
        );
        assert!(index.technologies_in(&CategoryKey::from("c2")).is_empty());
    }

    #[test]
    fn category_lists_are_sorted_across_partitions() {
        let source = FixtureSource::new(
            json!({"1": {"name": "CMS"}}),
            &[
                ('z', json!({"Zope": {"cats": [1]}})),
                ('d', json!({"Drupal": {"cats": [1]}, "Django CMS": {"cats": ["1"]}})),
                ('_', json!({"1C-Bitrix": {"cats": [1, 1]}})),
            ],
        );
        let index = TechnologyIndex::load(&source).unwrap();
        assert_eq!(
            keys(index.technologies_in(&CategoryKey::from("1"))),
            vec!["1C-Bitrix", "Django CMS", "Drupal", "Zope"]
        );
        assert_eq!(index.category_count(&CategoryKey::from("1")), 4);
    }

    #[test]
    fn category_lists_ignore_key_case() {
        let source = FixtureSource::new(
            json!({"59": {"name": "JavaScript libraries"}}),
            &[
                ('z', json!({"Zepto": {"cats": [59]}})),
                ('j', json!({"jQuery": {"cats": [59]}})),
                ('m', json!({"MooTools": {"cats": [59]}, "mootools": {"cats": [59]}})),
            ],
        );
        let index = TechnologyIndex::load(&source).unwrap();
        assert_eq!(
            keys(index.technologies_in(&CategoryKey::from("59"))),
            vec!["jQuery", "MooTools", "mootools", "Zepto"]
        );
    }

    #[test]
    fn loose_category_fields_do_not_fail_the_load() {
        let source = FixtureSource::new(
            json!({"1": {"name": "CMS", "priority": -1, "groups": [1.5]}}),
            &[('w', json!({"WordPress": {"cats": [1]}}))],
        );
        let index = TechnologyIndex::load(&source).unwrap();
        assert_eq!(index.category(&CategoryKey::from("1")).unwrap().name, "CMS");
        assert_eq!(keys(index.technologies_in(&CategoryKey::from("1"))), vec!["WordPress"]);
    }

    #[test]
    fn reverse_implications_collect_every_source() {
        let source = FixtureSource::new(
            json!({}),
            &[
                ('w', json!({"WordPress": {"implies": ["PHP", "MySQL"]}})),
                ('d', json!({"Drupal": {"implies": "PHP\\;confidence:50"}})),
                ('l', json!({"Laravel": {"implies": ["PHP"]}})),
            ],
        );
        let index = TechnologyIndex::load(&source).unwrap();
        let php: Vec<&str> = index
            .implied_by(&TechKey::from("PHP"))
            .unwrap()
            .iter()
            .map(TechKey::as_str)
            .collect();
        assert_eq!(php, vec!["Drupal", "Laravel", "WordPress"]);
        assert!(index.implied_by(&TechKey::from("WordPress")).is_none());
    }

    #[test]
    fn failed_partitions_are_empty_and_recorded() {
        let source = FixtureSource::new(
            json!({"1": {"name": "CMS"}}),
            &[('w', json!({"WordPress": {"cats": [1], "implies": "PHP"}}))],
        )
        .with_raw("p.json", b"{ not json");
        let index = TechnologyIndex::load(&source).unwrap();

        let broken = index.partition(PartitionLetter::new('p').unwrap()).unwrap();
        assert!(broken.is_empty());
        assert!(broken.failure().unwrap().contains("parsing partition document"));

        // 25 missing fixtures plus the malformed one.
        assert_eq!(index.failed_partitions().count(), 26);
        assert_eq!(index.technology_count(), 1);
        assert_eq!(index.category_count(&CategoryKey::from("1")), 1);
    }

    #[test]
    fn missing_category_document_is_an_error() {
        let mut source = FixtureSource::new(json!({}), &[]);
        source.documents.remove(CATEGORY_DOCUMENT);
        let err = TechnologyIndex::load(&source).expect_err("categories are mandatory");
        assert!(format!("{err:#}").contains(CATEGORY_DOCUMENT));
    }

    #[test]
    fn find_scans_partitions_in_alphabet_order() {
        let source = FixtureSource::new(
            json!({}),
            &[
                ('z', json!({"Shared": {"website": "https://z.example"}})),
                ('b', json!({"Shared": {"website": "https://b.example"}})),
            ],
        );
        let index = TechnologyIndex::load(&source).unwrap();
        let found = index.find(&TechKey::from("Shared")).unwrap();
        assert_eq!(found.website.as_deref(), Some("https://b.example"));
        assert!(index.find(&TechKey::from("Missing")).is_none());
    }

    #[test]
    fn dangling_references_are_tolerated() {
        let source = FixtureSource::new(
            json!({"1": {"name": "CMS"}}),
            &[('g', json!({"Ghost": {"cats": [99], "implies": "Node.js"}}))],
        );
        let index = TechnologyIndex::load(&source).unwrap();
        assert_eq!(index.category_count(&CategoryKey::from("99")), 1);
        assert!(index.category(&CategoryKey::from("99")).is_none());
        assert!(index.find(&TechKey::from("Node.js")).is_none());
        assert!(index.implied_by(&TechKey::from("Node.js")).is_some());
    }

    #[test]
    fn resolve_category_matches_key_then_name() {
        let source = FixtureSource::new(
            json!({"1": {"name": "CMS"}, "6": {"name": "Ecommerce"}}),
            &[],
        );
        let index = TechnologyIndex::load(&source).unwrap();
        assert_eq!(index.resolve_category("6").unwrap().1.name, "Ecommerce");
        assert_eq!(index.resolve_category("cms").unwrap().0.as_str(), "1");
        assert!(index.resolve_category("Analytics").is_none());
    }

    #[test]
    fn resolve_category_folds_non_ascii_names() {
        let source = FixtureSource::new(json!({"12": {"name": "Éditeurs"}}), &[]);
        let index = TechnologyIndex::load(&source).unwrap();
        assert_eq!(index.resolve_category("ÉDITEURS").unwrap().0.as_str(), "12");
        assert_eq!(index.resolve_category(" éditeurs ").unwrap().0.as_str(), "12");
    }

    #[test]
    fn build_accepts_partitions_out_of_order() {
        let b = PartitionLetter::new('b').unwrap();
        let a = PartitionLetter::new('a').unwrap();
        let doc = |key: &str| {
            let mut body = serde_json::Map::new();
            body.insert(key.to_string(), json!({"cats": [1]}));
            let bytes = serde_json::to_vec(&body).unwrap();
            parse_partition_document(&bytes).unwrap()
        };
        let index = TechnologyIndex::build(
            CategoryDocument::new(),
            vec![Partition::loaded(b, doc("Bootstrap")), Partition::loaded(a, doc("Angular"))],
        );
        let letters: Vec<char> = index
            .partitions()
            .iter()
            .map(|p| p.letter().as_char())
            .collect();
        assert_eq!(letters, vec!['a', 'b']);
        assert_eq!(
            keys(index.technologies_in(&CategoryKey::from("1"))),
            vec!["Angular", "Bootstrap"]
        );
    }
}
