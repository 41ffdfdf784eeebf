mod authoring;
mod autosave;
mod cache;
mod edit;
mod generate;
mod local;
mod publish;
mod recipes;

pub use authoring::{run_download, run_hash, run_license, run_new};
pub use autosave::run_autosave;
pub use cache::run_cache;
pub use edit::{run_edit, EditRequest};
pub use generate::{run_generate, GenerateRequest};
pub use local::run_local;
pub use publish::run_publish_url;
pub use recipes::{run_recipes, run_show};
