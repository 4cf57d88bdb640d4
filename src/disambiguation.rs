//! Duplicate-name disambiguation
//!
//! Names that would produce the same file or folder get sequential suffixes, so the
//! output of a rerun is stable and nothing overwrites anything else. Unique names get no
//! suffix; when duplicates exist, the first one gets "1".

use crate::config::ExportConfig;
use crate::naming;
use crate::types::{BoardSummary, Card, List};
use std::collections::HashMap;

/// Something that is written to disk under a name that may collide
pub trait Nameable {
    /// The display name
    fn name(&self) -> &str;

    /// Whether the entity is archived
    fn is_archived(&self) -> bool;

    /// The name as it will appear on disk, before numbering or suffixes
    fn usable_name(&self, config: &ExportConfig) -> String;

    /// Extra key component limiting collisions to a container (e.g. the owning list)
    fn scope(&self) -> &str {
        ""
    }
}

impl Nameable for Card {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_archived(&self) -> bool {
        self.closed
    }

    fn usable_name(&self, config: &ExportConfig) -> String {
        naming::usable_card_name(&self.name, config)
    }

    fn scope(&self) -> &str {
        &self.id_list
    }
}

impl Nameable for List {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_archived(&self) -> bool {
        self.closed
    }

    fn usable_name(&self, config: &ExportConfig) -> String {
        naming::usable_list_name(&self.name, config)
    }
}

impl Nameable for BoardSummary {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_archived(&self) -> bool {
        false
    }

    fn usable_name(&self, config: &ExportConfig) -> String {
        naming::usable_board_name(&self.name, config)
    }
}

/// Collision key of an entity
///
/// Lowercase usable name plus scope, plus the archived state when archived and open
/// entities live in separate folders.
pub fn collision_key<T: Nameable>(entity: &T, config: &ExportConfig) -> String {
    let mut key = entity.usable_name(config).to_lowercase();
    key.push('\u{0}');
    key.push_str(entity.scope());
    if config.scope_duplicates_by_archived {
        key.push_str(if entity.is_archived() {
            "\u{0}archived"
        } else {
            "\u{0}open"
        });
    }
    key
}

/// Compute a suffix per entity, index-aligned with `entities`
///
/// Every entity sharing a key gets its 1-based occurrence number in input order; an entity
/// whose key is unique gets an empty suffix.
pub fn compute_suffixes<T, F>(entities: &[T], key_fn: F) -> Vec<String>
where
    F: Fn(&T) -> String,
{
    let keys: Vec<String> = entities.iter().map(key_fn).collect();
    let mut seen: HashMap<&str, usize> = HashMap::new();

    let mut suffixes: Vec<String> = keys
        .iter()
        .map(|key| {
            let count = seen.entry(key.as_str()).or_insert(0);
            *count += 1;
            count.to_string()
        })
        .collect();

    for (suffix, key) in suffixes.iter_mut().zip(&keys) {
        if seen.get(key.as_str()) == Some(&1) {
            suffix.clear();
        }
    }

    suffixes
}

/// Suffixes for any nameable entities, using [`collision_key`]
pub fn suffixes_for<T: Nameable>(entities: &[T], config: &ExportConfig) -> Vec<String> {
    compute_suffixes(entities, |entity| collision_key(entity, config))
}
