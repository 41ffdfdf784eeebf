//! Debounced autosave writes.
//!
//! A burst of edits produces one write: each `schedule` call replaces the
//! pending recipe and restarts the debounce window.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

use super::store::AutosaveStore;
use crate::recipe::Recipe;

/// Default debounce window
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(1);

#[derive(Default)]
struct WriterState {
    pending: Option<Recipe>,
    task: Option<JoinHandle<()>>,
    /// Entry id the next write replaces.
    current_id: Option<String>,
}

/// Coalescing writer in front of an [`AutosaveStore`].
pub struct AutosaveWriter {
    store: Arc<AutosaveStore>,
    delay: Duration,
    state: Arc<Mutex<WriterState>>,
}

impl AutosaveWriter {
    pub fn new(store: Arc<AutosaveStore>, delay: Duration) -> Self {
        Self {
            store,
            delay,
            state: Arc::new(Mutex::new(WriterState::default())),
        }
    }

    /// Queue a write, cancelling any write that has not fired yet.
    pub fn schedule(&self, recipe: Recipe) {
        let mut state = lock(&self.state);
        if let Some(task) = state.task.take() {
            task.abort();
        }
        state.pending = Some(recipe);

        let store = self.store.clone();
        let shared = self.state.clone();
        let delay = self.delay;
        state.task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            fire(&store, &shared);
        }));
    }

    /// Write the pending recipe now. Returns the entry id if anything was written.
    pub fn flush(&self) -> Option<String> {
        {
            let mut state = lock(&self.state);
            if let Some(task) = state.task.take() {
                task.abort();
            }
        }
        fire(&self.store, &self.state)
    }

    /// Id of the entry the writer is currently updating.
    pub fn current_id(&self) -> Option<String> {
        lock(&self.state).current_id.clone()
    }

    /// Point the writer at another entry (or none, for a new recipe).
    /// Drops any pending write.
    pub fn set_current_id(&self, id: Option<String>) {
        let mut state = lock(&self.state);
        if let Some(task) = state.task.take() {
            task.abort();
        }
        state.pending = None;
        state.current_id = id;
    }
}

fn fire(store: &AutosaveStore, state: &Mutex<WriterState>) -> Option<String> {
    let (recipe, current_id) = {
        let mut state = lock(state);
        (state.pending.take()?, state.current_id.clone())
    };

    let id = store.save(&recipe, current_id.as_deref());
    debug!("Debounced autosave wrote '{}' ({})", recipe.name, id);
    lock(state).current_id = Some(id.clone());
    Some(id)
}

fn lock(state: &Mutex<WriterState>) -> std::sync::MutexGuard<'_, WriterState> {
    // A panic while holding the lock leaves plain data behind; keep using it.
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::storage::LocalStorage;
    use tempfile::{tempdir, TempDir};

    fn writer() -> (TempDir, Arc<AutosaveStore>, AutosaveWriter) {
        let tmp = tempdir().unwrap();
        let storage = Arc::new(LocalStorage::new(tmp.path()).unwrap());
        let store = Arc::new(AutosaveStore::new(storage, Arc::new(SystemClock)));
        let writer = AutosaveWriter::new(store.clone(), Duration::from_millis(500));
        (tmp, store, writer)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_coalesces_to_last_write() {
        let (_tmp, store, writer) = writer();

        for version in ["1.0", "1.1", "1.2"] {
            writer.schedule(Recipe::new("tool", version));
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(store.list().is_empty());

        tokio::time::sleep(Duration::from_secs(1)).await;

        let entries = store.list();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].version, "1.2");
        assert!(lock(&writer.state).pending.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_successive_writes_reuse_entry() {
        let (_tmp, store, writer) = writer();

        writer.schedule(Recipe::new("tool", "1.0"));
        tokio::time::sleep(Duration::from_secs(1)).await;
        let id = writer.current_id().unwrap();

        writer.schedule(Recipe::new("tool-renamed", "1.0"));
        tokio::time::sleep(Duration::from_secs(1)).await;

        let entries = store.list();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, id);
        assert_eq!(entries[0].name, "tool-renamed");
    }

    #[tokio::test]
    async fn test_flush_writes_immediately() {
        let (_tmp, store, writer) = writer();
        writer.schedule(Recipe::new("tool", "2.0"));

        let id = writer.flush().unwrap();
        assert_eq!(store.list()[0].id, id);
        assert!(writer.flush().is_none());
    }

    #[tokio::test]
    async fn test_set_current_id_drops_pending() {
        let (_tmp, store, writer) = writer();
        writer.schedule(Recipe::new("tool", "2.0"));
        writer.set_current_id(None);
        assert!(writer.flush().is_none());
        assert!(store.list().is_empty());
    }
}
