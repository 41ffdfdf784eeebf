use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;

use crate::autosave::DEFAULT_DEBOUNCE;
use crate::cli::Cli;
use crate::remote::RepoCoordinates;
use crate::storage::LocalStorage;

/// Resolved settings for one run.
#[derive(Debug, Clone)]
pub struct Config {
    pub coords: RepoCoordinates,
    /// Directory for persisted slots and the sandbox.
    pub cache_dir: PathBuf,
    /// Interpreter that runs the generator.
    pub python: String,
    /// Directory handed to the local bridge when it asks for one.
    pub local_root: Option<PathBuf>,
    pub autosave_debounce: Duration,
}

impl Config {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let cache_dir = match &cli.cache_dir {
            Some(dir) => dir.clone(),
            None => LocalStorage::default_dir()?,
        };

        Ok(Self {
            coords: RepoCoordinates::new(&cli.owner, &cli.repo, &cli.branch),
            cache_dir,
            python: cli.python.clone(),
            local_root: None,
            autosave_debounce: DEFAULT_DEBOUNCE,
        })
    }

    pub fn with_local_root(mut self, root: Option<PathBuf>) -> Self {
        self.local_root = root;
        self
    }

    pub fn sandbox_dir(&self) -> PathBuf {
        self.cache_dir.join("sandbox")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_from_cli_defaults() {
        let cli =
            Cli::try_parse_from(["recipe-bridge", "--cache-dir", "/tmp/rb", "recipes"]).unwrap();
        let config = Config::from_cli(&cli).unwrap();

        assert_eq!(config.cache_dir, PathBuf::from("/tmp/rb"));
        assert_eq!(config.sandbox_dir(), PathBuf::from("/tmp/rb/sandbox"));
        assert_eq!(config.coords.branch, "main");
        assert!(config.local_root.is_none());

        let config = config.with_local_root(Some(PathBuf::from("/src/recipes")));
        assert_eq!(config.local_root, Some(PathBuf::from("/src/recipes")));
    }

    #[test]
    fn test_repository_flags() {
        let cli = Cli::try_parse_from([
            "recipe-bridge",
            "--owner",
            "me",
            "--repo",
            "fork",
            "--branch",
            "dev",
            "--cache-dir",
            "/tmp/rb",
            "recipes",
        ])
        .unwrap();
        let config = Config::from_cli(&cli).unwrap();
        assert_eq!(config.coords, RepoCoordinates::new("me", "fork", "dev"));
    }
}
