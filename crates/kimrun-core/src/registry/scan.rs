//! Walking the storage areas of a repository.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use kimrun_build::stamp;
use tracing::{debug, warn};

use super::error::{RegistryError, Result};
use crate::domain::{Identifier, Item, ItemKind, ItemMetadata, METADATA_FILE};

/// Load every item under `root`, keyed by formatted identifier.
///
/// Areas are visited in [`ItemKind::ALL`] order and entries in name order,
/// so when one item is reachable from several areas the first sighting wins.
pub(crate) fn scan_repository(root: &Path) -> Result<BTreeMap<String, Item>> {
    let mut items = BTreeMap::new();

    for area_kind in ItemKind::ALL {
        let area = root.join(area_kind.storage_dir());
        if !area.is_dir() {
            continue;
        }

        let mut names: Vec<String> = fs::read_dir(&area)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        names.sort();

        for name in names {
            let path = area.join(&name);
            if !path.is_dir() {
                continue;
            }
            let id = match Identifier::parse(&name) {
                Ok(id) => id,
                Err(e) => {
                    debug!(area = %area_kind.storage_dir(), entry = %name, error = %e, "skipping entry");
                    continue;
                }
            };
            let key = id.format();
            if items.contains_key(&key) {
                debug!(id = %key, area = %area_kind.storage_dir(), "already registered");
                continue;
            }
            if id.kind() != area_kind {
                debug!(id = %key, area = %area_kind.storage_dir(), "item stored outside its own area");
            }

            let item = load_item(id, &path)?;
            items.insert(key, item);
        }
    }

    Ok(items)
}

fn load_item(id: Identifier, path: &Path) -> Result<Item> {
    let metadata_path = path.join(METADATA_FILE);
    let metadata = if metadata_path.is_file() {
        let text = fs::read_to_string(&metadata_path)?;
        ItemMetadata::from_json(&text).map_err(|e| RegistryError::InvalidMetadata {
            id: id.format(),
            reason: e.to_string(),
        })?
    } else {
        warn!(id = %id, "no {} found, using empty metadata", METADATA_FILE);
        ItemMetadata::default()
    };

    let mut item = Item::new(id, path, metadata);
    item.build_state = stamp::build_state(path);
    Ok(item)
}
