//! Autosave of in-progress recipes.
//!
//! Recipes being edited are snapshotted into a bounded, most-recent-first
//! list kept in local storage. Writes go through a debounced writer so
//! rapid edits cost one write.

mod store;
mod writer;

pub use store::{age_label, AutosaveStore};
pub use writer::{AutosaveWriter, DEFAULT_DEBOUNCE};
