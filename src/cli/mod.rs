mod args;

pub use args::{AutosaveAction, CacheAction, Cli, Commands, LocalAction, RecipeSource};
