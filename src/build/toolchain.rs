//! Builder toolchain: which generator script the sandbox runs, and the data
//! files it needs next to it.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::future::try_join_all;
use tracing::{debug, info};

use super::sandbox::Sandbox;
use crate::local::{LocalDirectoryBridge, BUILDER_SCRIPT_PATH};
use crate::remote::{RepoCoordinates, RepositoryApi};

/// Ref the remote toolchain is fetched from.
pub const TOOLCHAIN_REF: &str = "main";

/// Data files the generator reads, fetched remotely in both modes.
pub const TOOLCHAIN_DATA_FILES: &[&str] =
    &["builder/licenses.json", "macros/openrecon/neurodocker.yaml"];

/// Virtual directory the repository files are staged under.
pub const REPO_ROOT: &str = "/repo";

/// Supplier of a locally maintained builder script.
#[async_trait]
pub trait BuilderScriptSource: Send + Sync {
    async fn builder_override_script(&self) -> Option<String>;
}

#[async_trait]
impl BuilderScriptSource for LocalDirectoryBridge {
    async fn builder_override_script(&self) -> Option<String> {
        self.get_builder_override_script().await
    }
}

/// Where the generator script comes from. Chosen once, at provisioning.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolchainSource {
    Remote { git_ref: String },
    LocalOverride { script: String },
}

impl ToolchainSource {
    pub async fn resolve(local: Option<&dyn BuilderScriptSource>) -> Self {
        if let Some(source) = local {
            if let Some(script) = source.builder_override_script().await {
                return ToolchainSource::LocalOverride { script };
            }
        }
        ToolchainSource::Remote {
            git_ref: TOOLCHAIN_REF.to_string(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ToolchainSource::Remote { .. } => "remote",
            ToolchainSource::LocalOverride { .. } => "local override",
        }
    }

    /// Stage the toolchain into the sandbox under `/repo`.
    ///
    /// All remote files are fetched before anything is written, so a failed
    /// fetch stages nothing.
    pub async fn stage(
        &self,
        api: &dyn RepositoryApi,
        coords: &RepoCoordinates,
        sandbox: &dyn Sandbox,
    ) -> Result<()> {
        let (git_ref, mut paths) = match self {
            ToolchainSource::Remote { git_ref } => (git_ref.as_str(), vec![BUILDER_SCRIPT_PATH]),
            ToolchainSource::LocalOverride { .. } => (TOOLCHAIN_REF, Vec::new()),
        };
        paths.extend_from_slice(TOOLCHAIN_DATA_FILES);

        let fetches = paths.iter().map(|path| async move {
            let text = api
                .raw_file(coords, git_ref, path)
                .await
                .with_context(|| format!("Failed to fetch toolchain file {}", path))?;
            debug!("Fetched {} ({} bytes)", path, text.len());
            Ok::<_, anyhow::Error>((*path, text))
        });
        let files = try_join_all(fetches).await?;

        if let ToolchainSource::LocalOverride { script } = self {
            sandbox
                .write_file(&repo_path(BUILDER_SCRIPT_PATH), script.as_bytes())
                .await?;
        }
        for (path, text) in &files {
            sandbox.write_file(&repo_path(path), text.as_bytes()).await?;
        }

        info!("Staged {} toolchain ({} remote files)", self.label(), files.len());
        Ok(())
    }
}

pub fn repo_path(relative: &str) -> String {
    format!("{}/{}", REPO_ROOT, relative)
}
