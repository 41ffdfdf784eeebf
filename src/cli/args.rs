use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::build::Architecture;

/// Recipe bridge - browse, edit and generate container recipes
#[derive(Parser, Debug)]
#[command(name = "recipe-bridge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Owner of the recipe repository
    #[arg(long, env = "RECIPE_BRIDGE_OWNER", default_value = "neurodesk", global = true)]
    pub owner: String,

    /// Name of the recipe repository
    #[arg(long, env = "RECIPE_BRIDGE_REPO", default_value = "neurocontainers", global = true)]
    pub repo: String,

    /// Branch recipes are read from
    #[arg(long, env = "RECIPE_BRIDGE_BRANCH", default_value = "main", global = true)]
    pub branch: String,

    /// Directory for cached data and the build sandbox. Defaults to ~/.recipe-bridge
    #[arg(long, env = "RECIPE_BRIDGE_CACHE_DIR", global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Python interpreter used to run the generator
    #[arg(long, env = "RECIPE_BRIDGE_PYTHON", default_value = "python3", global = true)]
    pub python: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List recipes published in the remote repository
    Recipes {
        /// Drop the cached listing and fetch it again
        #[arg(long)]
        refresh: bool,
    },
    /// Print a published recipe in canonical form
    Show { name: String },
    /// Work with a local checkout of the recipe repository
    Local {
        /// Root of the checkout
        #[arg(long, env = "RECIPE_BRIDGE_LOCAL_ROOT")]
        root: PathBuf,

        #[command(subcommand)]
        action: LocalAction,
    },
    /// Inspect autosaved recipes
    Autosave {
        #[command(subcommand)]
        action: AutosaveAction,
    },
    /// Generate a Dockerfile for a recipe (no container is built)
    Generate {
        name: String,

        /// Read the recipe and builder script from a local checkout
        #[arg(long)]
        local_root: Option<PathBuf>,

        /// Target architecture (x86_64 or aarch64)
        #[arg(long, default_value = "x86_64")]
        arch: Architecture,

        /// Generate even if the recipe does not list the architecture
        #[arg(long)]
        ignore_architecture: bool,

        /// Parallelism hint for the generator
        #[arg(long)]
        jobs: Option<u32>,

        /// Generator option as KEY=VALUE (repeatable)
        #[arg(long = "option", value_parser = parse_key_value)]
        options: Vec<(String, String)>,

        /// Write Dockerfile and README.md under this directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
    /// Load a recipe, apply field changes and report its publish state
    Edit {
        /// Recipe name, or the autosave id with `--from autosave`
        target: String,

        /// Where the recipe comes from
        #[arg(long, value_enum, default_value = "remote")]
        from: RecipeSource,

        /// Version for `--from new`
        #[arg(long, default_value = "0.0.1")]
        version: String,

        /// Local checkout to load from or save into
        #[arg(long, env = "RECIPE_BRIDGE_LOCAL_ROOT")]
        local_root: Option<PathBuf>,

        /// Field change as KEY=VALUE; dotted keys reach nested fields and
        /// VALUE is parsed as YAML (repeatable)
        #[arg(long = "set", value_parser = parse_key_value)]
        sets: Vec<(String, String)>,

        /// Write the edited recipe into the local checkout
        #[arg(long, requires = "local_root")]
        save_local: bool,

        /// Export the edited recipe into this directory instead of printing it
        #[arg(long)]
        export: Option<PathBuf>,

        /// Open the publish URL in a browser
        #[arg(long)]
        open: bool,
    },
    /// Scaffold a new recipe with the generator
    New {
        name: String,

        #[arg(long, default_value = "0.0.1")]
        version: String,
    },
    /// Check an SPDX license identifier against the generator's list
    License { spdx: String },
    /// Fetch a URL through the generator's download cache
    Download {
        url: String,

        /// Only check that the download is reachable
        #[arg(long)]
        check_only: bool,
    },
    /// Print the generator's hash of a YAML or JSON value
    Hash { value: String },
    /// Print the URL for publishing a recipe to the remote repository
    PublishUrl {
        name: String,

        /// Open the URL in a browser
        #[arg(long)]
        open: bool,
    },
    /// Manage the cached repository listing
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

/// Origin of the recipe an `edit` works on.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecipeSource {
    Remote,
    Local,
    Autosave,
    New,
}

#[derive(Subcommand, Debug)]
pub enum LocalAction {
    /// Show the checkout and whether it overrides the builder script
    Status,
    /// List recipes in the checkout
    List,
    /// Print one local recipe
    Show { name: String },
    /// Print a file from a recipe's directory
    Aux { name: String, path: String },
}

#[derive(Subcommand, Debug)]
pub enum AutosaveAction {
    /// List autosaved recipes, most recent first
    List,
    /// Print one autosaved recipe
    Show { id: String },
    /// Delete an autosaved recipe
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Show whether the cached listing is still fresh
    Status,
    /// Drop the cached listing
    Clear,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    if key.is_empty() {
        return Err(format!("empty key in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}
