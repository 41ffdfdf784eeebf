//! TTL cache of the remote recipe listing.
//!
//! Listing recipes takes a recursive tree walk against a rate-limited API, so
//! the result is kept for a day. When a refresh fails, the expired snapshot
//! is served instead of an error; only a cold cache lets the failure through.

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, OnceLock};
use tracing::{debug, info, warn};

use super::github::RepositoryApi;
use super::links::{download_url, web_url};
use super::types::{CacheStatus, RemoteFileDescriptor, RepoCoordinates, RepositorySnapshot};
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::recipe::Recipe;
use crate::storage::{LocalStorage, SNAPSHOT_SLOT};

/// How long a fetched snapshot is served without refreshing.
pub const SNAPSHOT_TTL_HOURS: i64 = 24;

fn recipe_path_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^recipes/[^/]+/build\.yaml$").expect("recipe path pattern is valid")
    })
}

/// Persisted form of the single cache slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CachedSnapshot {
    coordinates: RepoCoordinates,
    snapshot: RepositorySnapshot,
    expires_at: DateTime<Utc>,
}

/// Process-wide cache of one repository snapshot.
pub struct RepositoryCache {
    api: Arc<dyn RepositoryApi>,
    storage: Arc<LocalStorage>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    entry: Mutex<Option<CachedSnapshot>>,
}

impl RepositoryCache {
    /// Create the cache, picking up a snapshot persisted by an earlier run.
    pub fn new(
        api: Arc<dyn RepositoryApi>,
        storage: Arc<LocalStorage>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let entry = match storage.get::<CachedSnapshot>(SNAPSHOT_SLOT) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Ignoring unreadable repository snapshot: {:#}", e);
                None
            }
        };

        Self {
            api,
            storage,
            clock,
            ttl: Duration::hours(SNAPSHOT_TTL_HOURS),
            entry: Mutex::new(entry),
        }
    }

    fn cached_for(&self, coords: &RepoCoordinates) -> Option<CachedSnapshot> {
        self.lock_entry()
            .as_ref()
            .filter(|entry| &entry.coordinates == coords)
            .cloned()
    }

    fn lock_entry(&self) -> std::sync::MutexGuard<'_, Option<CachedSnapshot>> {
        self.entry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot for `coords`: cached while fresh, refetched otherwise, stale
    /// on refetch failure.
    pub async fn get_snapshot(&self, coords: &RepoCoordinates) -> Result<RepositorySnapshot> {
        let now = self.clock.now();
        let cached = self.cached_for(coords);

        if let Some(entry) = &cached {
            if now < entry.expires_at {
                debug!("Using cached snapshot for {} (expires {})", coords, entry.expires_at);
                return Ok(entry.snapshot.clone());
            }
        }

        match self.fetch_snapshot(coords, now).await {
            Ok(snapshot) => {
                let entry = CachedSnapshot {
                    coordinates: coords.clone(),
                    snapshot: snapshot.clone(),
                    expires_at: now + self.ttl,
                };
                if let Err(e) = self.storage.set(SNAPSHOT_SLOT, &entry) {
                    warn!("Failed to persist repository snapshot: {:#}", e);
                }
                *self.lock_entry() = Some(entry);
                info!("Fetched {} recipes from {}", snapshot.recipes.len(), coords);
                Ok(snapshot)
            }
            Err(e) => match cached {
                Some(entry) => {
                    warn!(
                        "Refreshing {} failed, serving snapshot that expired at {}: {:#}",
                        coords, entry.expires_at, e
                    );
                    Ok(entry.snapshot)
                }
                None => Err(Error::TransientFetchFailure(format!("{:#}", e))),
            },
        }
    }

    async fn fetch_snapshot(
        &self,
        coords: &RepoCoordinates,
        now: DateTime<Utc>,
    ) -> anyhow::Result<RepositorySnapshot> {
        let (repository, tree) = tokio::try_join!(
            self.api.latest_commit(coords),
            self.api.recursive_tree(coords)
        )?;

        let recipes = tree
            .into_iter()
            .filter(|entry| entry.kind == "blob" && recipe_path_pattern().is_match(&entry.path))
            .map(|entry| RemoteFileDescriptor {
                html_url: web_url(coords, &entry.path),
                download_url: download_url(coords, &entry.path),
                path: entry.path,
                sha: entry.sha,
            })
            .collect();

        Ok(RepositorySnapshot {
            recipes,
            repository,
            fetched_at: now,
        })
    }

    /// Drop the cached snapshot unconditionally.
    pub fn invalidate(&self) {
        *self.lock_entry() = None;
        if let Err(e) = self.storage.remove(SNAPSHOT_SLOT) {
            warn!("Failed to remove persisted snapshot: {:#}", e);
        }
        debug!("Repository snapshot cache invalidated");
    }

    pub fn cache_status(&self) -> CacheStatus {
        let now = self.clock.now();
        let entry = self.lock_entry();
        match entry.as_ref() {
            Some(entry) => CacheStatus {
                is_valid: now < entry.expires_at,
                expires_at: Some(entry.expires_at),
                coordinates: Some(entry.coordinates.clone()),
            },
            None => CacheStatus {
                is_valid: false,
                expires_at: None,
                coordinates: None,
            },
        }
    }

    /// Download one recipe's text.
    pub async fn fetch_recipe_text(
        &self,
        coords: &RepoCoordinates,
        descriptor: &RemoteFileDescriptor,
    ) -> Result<String> {
        self.api
            .raw_file(coords, &coords.branch, &descriptor.path)
            .await
            .map_err(|e| Error::TransientFetchFailure(format!("{:#}", e)))
    }

    /// Download and parse one recipe.
    pub async fn fetch_recipe(
        &self,
        coords: &RepoCoordinates,
        descriptor: &RemoteFileDescriptor,
    ) -> Result<(Recipe, String)> {
        let text = self.fetch_recipe_text(coords, descriptor).await?;
        let recipe = Recipe::from_yaml(&text)?;
        Ok((recipe, text))
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::super::types::{RepositoryInfo, TreeEntry};
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// In-memory repository host with call counters.
    #[derive(Default)]
    pub struct FakeRepositoryApi {
        pub files: Mutex<HashMap<String, String>>,
        pub tree_calls: AtomicUsize,
        pub commit_calls: AtomicUsize,
        pub raw_calls: AtomicUsize,
        pub offline: AtomicBool,
    }

    impl FakeRepositoryApi {
        pub fn with_files(files: &[(&str, &str)]) -> Self {
            let api = Self::default();
            {
                let mut map = api.files.lock().unwrap();
                for (path, content) in files {
                    map.insert(path.to_string(), content.to_string());
                }
            }
            api
        }

        pub fn set_offline(&self, offline: bool) {
            self.offline.store(offline, Ordering::SeqCst);
        }

        fn check_online(&self) -> anyhow::Result<()> {
            if self.offline.load(Ordering::SeqCst) {
                anyhow::bail!("network unreachable");
            }
            Ok(())
        }
    }

    #[async_trait]
    impl RepositoryApi for FakeRepositoryApi {
        async fn latest_commit(&self, _coords: &RepoCoordinates) -> anyhow::Result<RepositoryInfo> {
            self.commit_calls.fetch_add(1, Ordering::SeqCst);
            self.check_online()?;
            Ok(RepositoryInfo {
                message: "Update recipes".into(),
                author: "ci".into(),
                date: None,
                sha: "c0ffee".into(),
            })
        }

        async fn recursive_tree(
            &self,
            _coords: &RepoCoordinates,
        ) -> anyhow::Result<Vec<TreeEntry>> {
            self.tree_calls.fetch_add(1, Ordering::SeqCst);
            self.check_online()?;
            let files = self.files.lock().unwrap();
            let mut entries: Vec<TreeEntry> = files
                .keys()
                .map(|path| TreeEntry {
                    path: path.clone(),
                    kind: "blob".into(),
                    sha: format!("sha-{}", path.len()),
                })
                .collect();
            entries.sort_by(|a, b| a.path.cmp(&b.path));
            Ok(entries)
        }

        async fn raw_file(
            &self,
            _coords: &RepoCoordinates,
            _git_ref: &str,
            path: &str,
        ) -> anyhow::Result<String> {
            self.raw_calls.fetch_add(1, Ordering::SeqCst);
            self.check_online()?;
            self.files
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("404 for {}", path))
        }
    }
}
