//! Item Registry: resolves identifiers and patterns to on-disk items.
//!
//! The registry scans the repository once when opened and serves every
//! lookup from that snapshot. The only mutation afterwards is the build
//! state of items it builds.

mod error;
mod scan;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use kimrun_build::{BuildState, Builder};
use tracing::{debug, info, instrument};

pub use error::{RegistryError, Result};

use crate::domain::{Identifier, Item, ItemKind, Lineage};
use crate::obs;

const GLOB_CHARS: [char; 3] = ['*', '?', '['];

/// Whether `query` should be treated as a glob pattern.
pub fn is_pattern(query: &str) -> bool {
    query.contains(GLOB_CHARS)
}

/// Keep only the maximum-version member of each lineage.
pub fn freshest(items: impl IntoIterator<Item = Item>) -> Vec<Item> {
    let mut by_lineage: BTreeMap<Lineage, Item> = BTreeMap::new();
    for item in items {
        match by_lineage.get(&item.id.lineage()) {
            Some(kept) if kept.id.version() >= item.id.version() => {}
            _ => {
                by_lineage.insert(item.id.lineage(), item);
            }
        }
    }
    let mut fresh: Vec<Item> = by_lineage.into_values().collect();
    fresh.sort_by(|a, b| a.id.cmp(&b.id));
    fresh
}

pub struct Registry {
    root: PathBuf,
    builder: Arc<dyn Builder>,
    items: BTreeMap<String, Item>,
}

impl Registry {
    /// Scan the repository rooted at `root`.
    pub fn open(root: impl AsRef<Path>, builder: Arc<dyn Builder>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let items = scan::scan_repository(&root)?;
        info!(root = %root.display(), items = items.len(), "repository scanned");
        Ok(Self {
            root,
            builder,
            items,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Exact lookup by canonical identifier.
    pub fn get(&self, id: &Identifier) -> Option<&Item> {
        self.items.get(&id.format())
    }

    /// Every item of `kind`, sorted. With `fresh_only`, one per lineage.
    pub fn all_of_kind(&self, kind: ItemKind, fresh_only: bool) -> Vec<Item> {
        let all = self
            .items
            .values()
            .filter(|item| item.kind() == kind)
            .cloned();
        if fresh_only {
            freshest(all)
        } else {
            all.collect()
        }
    }

    /// Resolve an identifier or glob pattern.
    ///
    /// Patterns match formatted identifiers across every storage area. A
    /// reference without a version resolves to the freshest member of its
    /// lineage; one without a name matches any name.
    pub fn resolve(&self, query: &str) -> Result<Vec<Item>> {
        let query = query.trim();
        let found: Vec<Item> = if is_pattern(query) {
            let pattern =
                glob::Pattern::new(query).map_err(|e| RegistryError::InvalidPattern {
                    pattern: query.to_string(),
                    reason: e.to_string(),
                })?;
            self.items
                .iter()
                .filter(|(formatted, _)| pattern.matches(formatted))
                .map(|(_, item)| item.clone())
                .collect()
        } else {
            let (wanted, explicit_version) = Identifier::parse_query(query)?;
            let candidates = self
                .items
                .values()
                .filter(|item| wanted.refers_to(&item.id))
                .cloned();
            if explicit_version {
                candidates
                    .filter(|item| item.id.version() == wanted.version())
                    .collect()
            } else {
                freshest(candidates)
            }
        };

        if found.is_empty() {
            return Err(RegistryError::ItemNotFound(query.to_string()));
        }
        debug!(query = %query, matched = found.len(), "resolved");
        Ok(found)
    }

    /// Locate the driver `item` declares, preferring the exact version and
    /// otherwise the freshest member of the driver's lineage.
    pub fn driver_of(&self, item: &Item) -> Option<&Item> {
        let declared = item.metadata.driver.as_ref()?;
        if let Some(exact) = self.get(declared) {
            return Some(exact);
        }
        self.items
            .values()
            .filter(|candidate| declared.refers_to(&candidate.id))
            .max_by(|a, b| a.id.version().cmp(b.id.version()))
    }

    /// Build an item, its driver first. Failures are recorded on the cached
    /// item and returned; they are never retried.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub async fn build(&mut self, id: &Identifier) -> Result<Item> {
        let item = self
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::ItemNotFound(id.format()))?;

        if let Some(declared) = &item.metadata.driver {
            let driver = self
                .driver_of(&item)
                .cloned()
                .ok_or_else(|| RegistryError::DriverMissing {
                    id: item.id.format(),
                    driver: declared.format(),
                })?;
            self.build_one(&driver).await?;
        }

        self.build_one(&item).await
    }

    async fn build_one(&mut self, item: &Item) -> Result<Item> {
        let started = Instant::now();
        let outcome = self.builder.build(&item.build_request()).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let key = item.id.format();
        match outcome {
            Ok(outcome) => {
                let fresh = matches!(outcome, kimrun_build::BuildOutcome::Built(_));
                obs::emit_build_finished(&key, duration_ms, fresh, true);
                self.set_state(&key, BuildState::Built);
                let mut built = item.clone();
                built.build_state = BuildState::Built;
                Ok(built)
            }
            Err(e) => {
                obs::emit_build_finished(&key, duration_ms, true, false);
                self.set_state(&key, BuildState::BuildFailed);
                Err(e.into())
            }
        }
    }

    fn set_state(&mut self, key: &str, state: BuildState) {
        if let Some(cached) = self.items.get_mut(key) {
            cached.build_state = state;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::METADATA_FILE;
    use kimrun_build::fakes::RecordingBuilder;
    use std::fs;
    use tempfile::TempDir;

    fn add_item(root: &Path, id: &str, metadata: &str) {
        let id_parsed = Identifier::parse(id).unwrap();
        let dir = root.join(id_parsed.kind().storage_dir()).join(id);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(METADATA_FILE), metadata).unwrap();
    }

    fn repo() -> TempDir {
        let tmp = TempDir::new().unwrap();
        add_item(tmp.path(), "LJ__MO_000000000001_000", r#"{"species":["Ar"]}"#);
        add_item(tmp.path(), "LJ__MO_000000000001_002", r#"{"species":["Ar"]}"#);
        add_item(tmp.path(), "LJ__MO_000000000001_001", r#"{"species":["Ar"]}"#);
        add_item(tmp.path(), "EAM__MO_000000000002_000", "{}");
        add_item(tmp.path(), "Lattice__TD_000000000003_000", "{}");
        add_item(
            tmp.path(),
            "Lattice_Al__TE_000000000004_000",
            r#"{"driver":"Lattice__TD_000000000003_000"}"#,
        );
        tmp
    }

    fn open(root: &Path) -> (Registry, Arc<RecordingBuilder>) {
        let builder = Arc::new(RecordingBuilder::new());
        let registry = Registry::open(root, builder.clone()).unwrap();
        (registry, builder)
    }

    #[test]
    fn test_scan_skips_invalid_entries() {
        let tmp = repo();
        fs::create_dir_all(tmp.path().join("models").join("not-an-id")).unwrap();
        fs::write(tmp.path().join("models").join("README"), "x").unwrap();
        let (registry, _) = open(tmp.path());
        assert_eq!(registry.len(), 6);
    }

    #[test]
    fn test_invalid_metadata_is_an_error() {
        let tmp = repo();
        add_item(tmp.path(), "Broken__MO_000000000009_000", "{not json");
        let err = Registry::open(tmp.path(), Arc::new(RecordingBuilder::new())).err();
        assert!(matches!(err, Some(RegistryError::InvalidMetadata { .. })));
    }

    #[test]
    fn test_missing_metadata_is_empty() {
        let tmp = repo();
        fs::create_dir_all(tmp.path().join("models").join("Bare__MO_000000000010_000")).unwrap();
        let (registry, _) = open(tmp.path());
        let item = &registry.resolve("Bare__MO_000000000010_000").unwrap()[0];
        assert!(item.metadata.species.is_empty());
    }

    #[test]
    fn test_all_of_kind_fresh_only() {
        let tmp = repo();
        let (registry, _) = open(tmp.path());

        let all = registry.all_of_kind(ItemKind::Model, false);
        assert_eq!(all.len(), 4);

        let fresh = registry.all_of_kind(ItemKind::Model, true);
        let ids: Vec<String> = fresh.iter().map(|i| i.id.format()).collect();
        assert_eq!(
            ids,
            vec!["EAM__MO_000000000002_000", "LJ__MO_000000000001_002"]
        );
    }

    #[test]
    fn test_resolve_unversioned_picks_freshest() {
        let tmp = repo();
        let (registry, _) = open(tmp.path());
        let found = registry.resolve("LJ__MO_000000000001").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id.version(), "002");

        let unnamed = registry.resolve("MO_000000000001_001").unwrap();
        assert_eq!(unnamed[0].id.format(), "LJ__MO_000000000001_001");
    }

    #[test]
    fn test_resolve_pattern() {
        let tmp = repo();
        let (registry, _) = open(tmp.path());
        let found = registry.resolve("LJ__MO_*").unwrap();
        assert_eq!(found.len(), 3);
        assert!(registry.resolve("Nothing__*").is_err());
    }

    #[test]
    fn test_resolve_errors() {
        let tmp = repo();
        let (registry, _) = open(tmp.path());
        assert!(matches!(
            registry.resolve("MO_12"),
            Err(RegistryError::Identifier(_))
        ));
        assert!(matches!(
            registry.resolve("MO_999999999999"),
            Err(RegistryError::ItemNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_build_builds_driver_first() {
        let tmp = repo();
        let (mut registry, builder) = open(tmp.path());
        let id = Identifier::parse("Lattice_Al__TE_000000000004_000").unwrap();

        let built = registry.build(&id).await.unwrap();
        assert!(built.is_built());
        assert_eq!(
            builder.requests(),
            vec![
                "Lattice__TD_000000000003_000".to_string(),
                "Lattice_Al__TE_000000000004_000".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_build_failure_marks_item() {
        let tmp = repo();
        let builder = Arc::new(RecordingBuilder::new().fail_on("EAM__MO_000000000002_000"));
        let mut registry = Registry::open(tmp.path(), builder).unwrap();
        let id = Identifier::parse("EAM__MO_000000000002_000").unwrap();

        let err = registry.build(&id).await.unwrap_err();
        assert!(matches!(err, RegistryError::Build(_)));
        assert_eq!(
            registry.get(&id).unwrap().build_state,
            BuildState::BuildFailed
        );
    }
}
