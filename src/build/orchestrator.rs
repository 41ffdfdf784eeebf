//! Build orchestrator.
//!
//! Provisions the sandbox once per process (packages, then toolchain) and
//! runs generator calls against it one at a time. Concurrent callers that
//! arrive during provisioning wait for the same run. A failed provisioning
//! is final: every later call reports it.

use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tokio::sync::{MutexGuard, OnceCell};
use tracing::{debug, error, info, warn};

use super::sandbox::Sandbox;
use super::toolchain::{BuilderScriptSource, ToolchainSource};
use super::types::{
    BuildResult, GenerateOptions, Generation, GeneratorOutcome, OrchestratorState,
};
use crate::error::{Error, Result};
use crate::recipe::Recipe;
use crate::remote::{RepoCoordinates, RepositoryApi};

/// Interpreter packages the generator imports.
pub const REQUIRED_PACKAGES: &[&str] = &["pyyaml", "neurodocker"];

/// Default virtual directory for generated build contexts.
pub const DEFAULT_OUTPUT_DIR: &str = "/tmp/build";

pub struct BuildOrchestrator {
    sandbox: Arc<dyn Sandbox>,
    api: Arc<dyn RepositoryApi>,
    coords: RepoCoordinates,
    local: Option<Arc<dyn BuilderScriptSource>>,
    provisioned: OnceCell<std::result::Result<ToolchainSource, String>>,
    state: Mutex<OrchestratorState>,
    calls: tokio::sync::Mutex<()>,
}

impl BuildOrchestrator {
    pub fn new(
        sandbox: Arc<dyn Sandbox>,
        api: Arc<dyn RepositoryApi>,
        coords: RepoCoordinates,
        local: Option<Arc<dyn BuilderScriptSource>>,
    ) -> Self {
        Self {
            sandbox,
            api,
            coords,
            local,
            provisioned: OnceCell::new(),
            state: Mutex::new(OrchestratorState::Uninitialized),
            calls: tokio::sync::Mutex::new(()),
        }
    }

    pub fn state(&self) -> OrchestratorState {
        self.lock_state().clone()
    }

    /// Toolchain chosen at provisioning, if provisioning succeeded.
    pub fn toolchain(&self) -> Option<ToolchainSource> {
        self.provisioned.get().and_then(|r| r.as_ref().ok()).cloned()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, OrchestratorState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, state: OrchestratorState) {
        debug!("Orchestrator state: {:?}", state);
        *self.lock_state() = state;
    }

    /// Provision on first use; later calls return the recorded outcome.
    pub async fn ensure_ready(&self) -> Result<()> {
        let outcome = self
            .provisioned
            .get_or_init(|| async {
                match self.provision().await {
                    Ok(source) => {
                        self.set_state(OrchestratorState::Ready);
                        Ok(source)
                    }
                    Err(e) => {
                        let message = format!("{:#}", e);
                        error!("Sandbox provisioning failed: {}", message);
                        self.set_state(OrchestratorState::Failed(message.clone()));
                        Err(message)
                    }
                }
            })
            .await;

        outcome
            .as_ref()
            .map(|_| ())
            .map_err(|message| Error::SandboxProvisioningFailure(message.clone()))
    }

    async fn provision(&self) -> anyhow::Result<ToolchainSource> {
        self.set_state(OrchestratorState::Provisioning);
        info!("Provisioning build sandbox");

        self.sandbox.install_packages(REQUIRED_PACKAGES).await?;

        let source = ToolchainSource::resolve(self.local.as_deref()).await;
        source
            .stage(self.api.as_ref(), &self.coords, self.sandbox.as_ref())
            .await?;

        info!("Build sandbox ready ({} toolchain)", source.label());
        Ok(source)
    }

    /// Take the sandbox exclusively. Generator calls and the reads of their
    /// output must happen under the same guard, or a concurrent call can
    /// overwrite the output in between.
    async fn lock_sandbox(&self) -> Result<MutexGuard<'_, ()>> {
        self.ensure_ready().await?;
        Ok(self.calls.lock().await)
    }

    async fn invoke(&self, _held: &MutexGuard<'_, ()>, name: &str, args: Value) -> Result<Value> {
        self.set_state(OrchestratorState::Generating);
        let result = self.sandbox.invoke(name, args).await;
        self.set_state(OrchestratorState::Ready);

        result.map_err(|e| Error::SandboxFailure(format!("{}: {:#}", name, e)))
    }

    async fn read_back(&self, _held: &MutexGuard<'_, ()>, path: &str) -> anyhow::Result<String> {
        self.sandbox.read_text(path).await
    }

    /// Run one generator call whose result is self-contained.
    async fn call(&self, name: &str, args: Value) -> Result<Value> {
        let held = self.lock_sandbox().await?;
        self.invoke(&held, name, args).await
    }

    /// Generate build artifacts without building the container.
    ///
    /// The recipe is not modified; an empty `readme_url` is stripped from
    /// the copy handed to the generator.
    pub async fn generate(
        &self,
        recipe: &Recipe,
        output_dir: &str,
        options: &GenerateOptions,
    ) -> Result<Generation> {
        let mut staged = recipe.clone();
        staged.strip_empty_readme_url();
        let description = serde_json::to_value(&staged)
            .map_err(|e| Error::SerializationFailure(e.to_string()))?;

        let args = json!({
            "recipe": description,
            "output_dir": output_dir,
            "architecture": options.architecture.as_str(),
            "ignore_architecture": options.ignore_architecture,
            "max_parallel_jobs": options.max_parallel_jobs,
            "options": options.options,
            "check_only": true,
        });

        let held = self.lock_sandbox().await?;
        let value = self.invoke(&held, "generate", args).await?;
        let outcome: GeneratorOutcome = serde_json::from_value(value).map_err(|e| {
            Error::SandboxFailure(format!("unexpected generator response: {}", e))
        })?;

        let report = match outcome {
            GeneratorOutcome::Rejected(detail) => {
                warn!("Generator rejected '{}': {}", recipe.name, detail);
                return Ok(Generation::Rejected { detail });
            }
            GeneratorOutcome::Built(report) => report,
        };

        let dockerfile_path = format!("{}/Dockerfile", report.build_directory);
        let dockerfile = self
            .read_back(&held, &dockerfile_path)
            .await
            .map_err(|e| Error::SandboxFailure(format!("{:#}", e)))?;

        let readme_path = format!("{}/README.md", report.build_directory);
        let readme = match self.read_back(&held, &readme_path).await {
            Ok(text) => Some(text),
            Err(e) => {
                debug!("No readme in {}: {:#}", report.build_directory, e);
                None
            }
        };

        info!("Generated {} for {}", report.tag, options.architecture);
        Ok(Generation::Built(BuildResult {
            name: report.name,
            version: report.version,
            tag: report.tag,
            build_directory: report.build_directory,
            dockerfile,
            readme,
            deploy_bins: report.deploy_bins,
            deploy_path: report.deploy_path,
        }))
    }

    /// Scaffold a new recipe with the generator and return its text.
    pub async fn init_new_recipe_template(&self, name: &str, version: &str) -> Result<String> {
        let output_dir = format!("/recipe/{}", name);
        let held = self.lock_sandbox().await?;
        let value = self
            .invoke(
                &held,
                "init_template",
                json!({ "name": name, "version": version, "output_dir": output_dir }),
            )
            .await?;
        let path = expect_str(&value, "init_template")?;
        self.read_back(&held, path)
            .await
            .map_err(|e| Error::SandboxFailure(format!("{:#}", e)))
    }

    /// Whether the generator knows the SPDX identifier.
    pub async fn validate_license(&self, spdx: &str) -> Result<bool> {
        let value = self
            .call("validate_license", json!({ "license": spdx }))
            .await?;
        value.as_bool().ok_or_else(|| {
            Error::SandboxFailure(format!("validate_license returned {}", value))
        })
    }

    /// Download through the generator's content-addressed cache; returns the
    /// virtual path of the cached file.
    pub async fn download_with_cache(&self, url: &str, check_only: bool) -> Result<String> {
        let value = self
            .call(
                "download_with_cache",
                json!({ "url": url, "check_only": check_only }),
            )
            .await?;
        expect_str(&value, "download_with_cache").map(str::to_string)
    }

    /// The generator's canonical hash of a value.
    pub async fn hash(&self, value: &Value) -> Result<String> {
        let result = self.call("hash", json!({ "value": value })).await?;
        expect_str(&result, "hash").map(str::to_string)
    }
}

fn expect_str<'a>(value: &'a Value, call: &str) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| Error::SandboxFailure(format!("{} returned {}", call, value)))
}
