//! Bounded autosave list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::recipe::Recipe;
use crate::storage::{LocalStorage, AUTOSAVE_SLOT};

/// Maximum number of autosaved recipes kept.
pub const AUTOSAVE_CAPACITY: usize = 10;

/// Point-in-time snapshot of an in-progress recipe.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedRecipeEntry {
    pub id: String,
    pub name: String,
    pub version: String,
    pub last_modified: DateTime<Utc>,
    pub recipe: Recipe,
}

impl SavedRecipeEntry {
    fn new(id: String, recipe: &Recipe, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: recipe.name.clone(),
            version: recipe.version.clone(),
            last_modified: now,
            recipe: recipe.clone(),
        }
    }
}

/// Autosave store over the `autosave` storage slot.
///
/// Every operation absorbs persistence faults: the in-memory recipe stays the
/// durable copy until a write succeeds.
pub struct AutosaveStore {
    storage: Arc<LocalStorage>,
    clock: Arc<dyn Clock>,
}

impl AutosaveStore {
    pub fn new(storage: Arc<LocalStorage>, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    /// Saved entries, most recent first. Missing or corrupt data reads as empty.
    pub fn list(&self) -> Vec<SavedRecipeEntry> {
        match self.storage.get::<Vec<SavedRecipeEntry>>(AUTOSAVE_SLOT) {
            Ok(Some(entries)) => entries,
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("Failed to read autosaved recipes: {:#}", e);
                Vec::new()
            }
        }
    }

    /// Look up one entry by id.
    pub fn get(&self, id: &str) -> Option<SavedRecipeEntry> {
        self.list().into_iter().find(|entry| entry.id == id)
    }

    /// Save a recipe and return the id of its entry.
    ///
    /// With `existing_id` the entry is replaced in place (or re-inserted at
    /// the front if it is gone). Without one, any entry of the same name is
    /// dropped and a fresh entry goes to the front.
    pub fn save(&self, recipe: &Recipe, existing_id: Option<&str>) -> String {
        let mut entries = self.list();
        let now = self.clock.now();

        let id = match existing_id {
            Some(id) => {
                let entry = SavedRecipeEntry::new(id.to_string(), recipe, now);
                match entries.iter().position(|e| e.id == id) {
                    Some(pos) => entries[pos] = entry,
                    None => entries.insert(0, entry),
                }
                id.to_string()
            }
            None => {
                let id = Uuid::new_v4().to_string();
                entries.retain(|e| e.name != recipe.name);
                entries.insert(0, SavedRecipeEntry::new(id.clone(), recipe, now));
                id
            }
        };

        evict_to_capacity(&mut entries);

        match self.storage.set(AUTOSAVE_SLOT, &entries) {
            Ok(()) => debug!("Autosaved '{}' as {}", recipe.name, id),
            Err(e) => warn!("Autosave of '{}' failed: {:#}", recipe.name, e),
        }

        id
    }

    /// Remove an entry. Unknown ids are ignored.
    pub fn delete(&self, id: &str) {
        let mut entries = self.list();
        let before = entries.len();
        entries.retain(|e| e.id != id);
        if entries.len() == before {
            return;
        }

        if let Err(e) = self.storage.set(AUTOSAVE_SLOT, &entries) {
            warn!("Failed to delete autosave {}: {:#}", id, e);
        }
    }
}

fn evict_to_capacity(entries: &mut Vec<SavedRecipeEntry>) {
    while entries.len() > AUTOSAVE_CAPACITY {
        let oldest = entries
            .iter()
            .enumerate()
            .min_by_key(|(_, e)| e.last_modified)
            .map(|(idx, _)| idx);
        match oldest {
            Some(idx) => {
                let evicted = entries.remove(idx);
                debug!("Evicted autosave '{}' ({})", evicted.name, evicted.id);
            }
            None => break,
        }
    }
}

/// Human-readable age of an autosave.
pub fn age_label(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(timestamp);
    let minutes = elapsed.num_minutes();
    let hours = elapsed.num_hours();
    let days = elapsed.num_days();

    if minutes < 1 {
        "Just now".to_string()
    } else if minutes < 60 {
        format!("{} minute{} ago", minutes, plural(minutes))
    } else if hours < 24 {
        format!("{} hour{} ago", hours, plural(hours))
    } else {
        format!("{} day{} ago", days, plural(days))
    }
}

fn plural(n: i64) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{Duration, TimeZone};
    use tempfile::{tempdir, TempDir};

    fn store_with_clock() -> (TempDir, Arc<ManualClock>, AutosaveStore) {
        let tmp = tempdir().unwrap();
        let storage = Arc::new(LocalStorage::new(tmp.path()).unwrap());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap(),
        ));
        let store = AutosaveStore::new(storage, clock.clone());
        (tmp, clock, store)
    }

    #[test]
    fn test_empty_store_lists_nothing() {
        let (_tmp, _clock, store) = store_with_clock();
        assert!(store.list().is_empty());
    }

    #[test]
    fn test_capacity_evicts_least_recently_modified() {
        let (_tmp, clock, store) = store_with_clock();

        for i in 0..11 {
            store.save(&Recipe::new(format!("tool{}", i), "1.0"), None);
            clock.advance(Duration::minutes(1));
        }

        let entries = store.list();
        assert_eq!(entries.len(), AUTOSAVE_CAPACITY);
        assert!(entries.iter().all(|e| e.name != "tool0"));
        assert_eq!(entries[0].name, "tool10");
    }

    #[test]
    fn test_save_with_existing_id_keeps_size() {
        let (_tmp, clock, store) = store_with_clock();
        let first = store.save(&Recipe::new("alpha", "1.0"), None);
        store.save(&Recipe::new("beta", "1.0"), None);
        clock.advance(Duration::minutes(5));

        let id = store.save(&Recipe::new("alpha", "2.0"), Some(&first));
        assert_eq!(id, first);

        let entries = store.list();
        assert_eq!(entries.len(), 2);
        let alpha = entries.iter().find(|e| e.id == first).unwrap();
        assert_eq!(alpha.version, "2.0");
        // replaced in place, beta stays in front
        assert_eq!(entries[0].name, "beta");
    }

    #[test]
    fn test_unknown_existing_id_reinserts_at_front() {
        let (_tmp, _clock, store) = store_with_clock();
        store.save(&Recipe::new("alpha", "1.0"), None);
        let id = store.save(&Recipe::new("beta", "1.0"), Some("vanished"));
        assert_eq!(id, "vanished");
        assert_eq!(store.list()[0].id, "vanished");
    }

    #[test]
    fn test_save_without_id_replaces_same_name() {
        let (_tmp, _clock, store) = store_with_clock();
        store.save(&Recipe::new("alpha", "1.0"), None);
        store.save(&Recipe::new("alpha", "1.1"), None);

        let entries = store.list();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].version, "1.1");
    }

    #[test]
    fn test_delete_is_idempotent() {
        let (_tmp, _clock, store) = store_with_clock();
        let id = store.save(&Recipe::new("alpha", "1.0"), None);
        store.delete(&id);
        store.delete(&id);
        assert!(store.list().is_empty());
        assert!(store.get(&id).is_none());
    }

    #[test]
    fn test_corrupt_slot_reads_empty_and_recovers() {
        let (tmp, _clock, store) = store_with_clock();
        std::fs::write(tmp.path().join("autosave.json"), "[{\"id\":").unwrap();
        assert!(store.list().is_empty());

        store.save(&Recipe::new("alpha", "1.0"), None);
        assert_eq!(store.list().len(), 1);
    }

    #[test]
    fn test_age_label_buckets() {
        let now = Utc.with_ymd_and_hms(2026, 1, 2, 12, 0, 0).unwrap();
        assert_eq!(age_label(now - Duration::seconds(30), now), "Just now");
        assert_eq!(age_label(now - Duration::minutes(1), now), "1 minute ago");
        assert_eq!(age_label(now - Duration::minutes(45), now), "45 minutes ago");
        assert_eq!(age_label(now - Duration::hours(3), now), "3 hours ago");
        assert_eq!(age_label(now - Duration::days(1), now), "1 day ago");
        assert_eq!(age_label(now - Duration::days(9), now), "9 days ago");
    }
}
