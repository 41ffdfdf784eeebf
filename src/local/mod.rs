//! Local directory access for recipe repositories.
//!
//! The bridge reads and writes recipes inside one user-granted checkout of
//! the recipe repository and supplies its builder script as an override for
//! the build sandbox.

mod bridge;
mod picker;
#[cfg(test)]
mod tests;

pub use bridge::{LocalDirectoryBridge, LocalRecipeHandle, BUILDER_SCRIPT_PATH};
pub use picker::FixedDirectoryPicker;

#[cfg(test)]
pub(crate) use picker::DirectoryPicker;
