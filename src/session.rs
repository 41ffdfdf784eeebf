//! Editing session.
//!
//! [`Services`] holds the process-scoped components (repository cache,
//! autosave store, local bridge, build orchestrator), created once and
//! shared. An [`EditingSession`] owns the one recipe being edited and routes
//! it between those services.

use anyhow::Result as AnyResult;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::autosave::{AutosaveStore, AutosaveWriter};
use crate::build::{
    BuildOrchestrator, BuilderScriptSource, GenerateOptions, Generation, ProcessSandbox, Sandbox,
};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::drift::DriftDetector;
use crate::error::{Error, Result};
use crate::local::{FixedDirectoryPicker, LocalDirectoryBridge, LocalRecipeHandle};
use crate::recipe::Recipe;
use crate::remote::{publish_url, GitHubClient, RepoCoordinates, RepositoryApi, RepositoryCache};
use crate::storage::LocalStorage;

/// Process-scoped services.
#[derive(Clone)]
pub struct Services {
    pub coords: RepoCoordinates,
    pub cache: Arc<RepositoryCache>,
    pub autosave: Arc<AutosaveStore>,
    pub local: Arc<LocalDirectoryBridge>,
    pub orchestrator: Arc<BuildOrchestrator>,
}

impl Services {
    pub fn from_config(config: &Config) -> AnyResult<Self> {
        let storage = Arc::new(LocalStorage::new(&config.cache_dir)?);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let api: Arc<dyn RepositoryApi> = Arc::new(GitHubClient::new()?);

        let local = Arc::new(LocalDirectoryBridge::new(Arc::new(FixedDirectoryPicker::new(
            config.local_root.clone(),
        ))));
        let sandbox = Arc::new(ProcessSandbox::new(&config.python, config.sandbox_dir()));

        Ok(Self::assemble(
            config.coords.clone(),
            api,
            storage,
            clock,
            local,
            sandbox,
        ))
    }

    /// Wire the services from their parts.
    pub fn assemble(
        coords: RepoCoordinates,
        api: Arc<dyn RepositoryApi>,
        storage: Arc<LocalStorage>,
        clock: Arc<dyn Clock>,
        local: Arc<LocalDirectoryBridge>,
        sandbox: Arc<dyn Sandbox>,
    ) -> Self {
        let script_source: Arc<dyn BuilderScriptSource> = local.clone();
        let orchestrator = Arc::new(BuildOrchestrator::new(
            sandbox,
            api.clone(),
            coords.clone(),
            Some(script_source),
        ));

        Self {
            cache: Arc::new(RepositoryCache::new(api, storage.clone(), clock.clone())),
            autosave: Arc::new(AutosaveStore::new(storage, clock)),
            coords,
            local,
            orchestrator,
        }
    }
}

/// Where the recipe being edited came from.
#[derive(Debug, Clone, PartialEq)]
pub enum RecipeOrigin {
    Remote,
    Local,
    Autosave { id: String },
    New,
}

pub struct EditingSession {
    services: Services,
    writer: AutosaveWriter,
    drift: DriftDetector,
    recipe: Option<Recipe>,
    origin: Option<RecipeOrigin>,
    /// Handle the recipe was read through, when it came from the local directory.
    local_handle: Option<LocalRecipeHandle>,
}

impl EditingSession {
    pub fn new(services: Services, autosave_debounce: Duration) -> Self {
        let writer = AutosaveWriter::new(services.autosave.clone(), autosave_debounce);
        Self {
            services,
            writer,
            drift: DriftDetector::new(),
            recipe: None,
            origin: None,
            local_handle: None,
        }
    }

    pub fn recipe(&self) -> Option<&Recipe> {
        self.recipe.as_ref()
    }

    pub fn origin(&self) -> Option<&RecipeOrigin> {
        self.origin.as_ref()
    }

    pub fn drift(&self) -> &DriftDetector {
        &self.drift
    }

    fn current(&self) -> Result<&Recipe> {
        self.recipe.as_ref().ok_or(Error::NoActiveRecipe)
    }

    fn replace_recipe(
        &mut self,
        recipe: Recipe,
        origin: RecipeOrigin,
        autosave_id: Option<String>,
    ) {
        debug!("Editing '{}' from {:?}", recipe.name, origin);
        self.writer.set_current_id(autosave_id);
        self.local_handle = None;
        self.recipe = Some(recipe);
        self.origin = Some(origin);
    }

    /// Load a published recipe; its text becomes the drift baseline.
    pub async fn load_remote(&mut self, name: &str) -> Result<&Recipe> {
        let coords = &self.services.coords;
        let snapshot = self.services.cache.get_snapshot(coords).await?;
        let descriptor = snapshot
            .find(name)
            .ok_or_else(|| Error::RecipeNotFound(name.to_string()))?;
        let (recipe, text) = self.services.cache.fetch_recipe(coords, descriptor).await?;

        self.drift.reset_baseline();
        self.drift.check_published(&recipe.name, &snapshot.recipes);
        self.drift.record_published_baseline(&text);

        info!("Loaded '{}' from {}", recipe.name, coords);
        self.replace_recipe(recipe, RecipeOrigin::Remote, None);
        self.current()
    }

    /// Load a recipe from the open local directory.
    pub async fn load_local(&mut self, name: &str) -> Result<&Recipe> {
        let handle = self
            .services
            .local
            .read_recipe(name)
            .await?
            .ok_or_else(|| Error::RecipeNotFound(name.to_string()))?;
        let recipe = Recipe::from_yaml(&handle.content)?;

        self.track_published(&recipe).await;
        self.replace_recipe(recipe, RecipeOrigin::Local, None);
        self.local_handle = Some(handle);
        self.current()
    }

    /// Resume an autosaved recipe; later autosaves update the same entry.
    pub async fn load_autosave(&mut self, id: &str) -> Result<&Recipe> {
        let entry = self
            .services
            .autosave
            .get(id)
            .ok_or_else(|| Error::RecipeNotFound(id.to_string()))?;

        self.track_published(&entry.recipe).await;
        self.replace_recipe(
            entry.recipe,
            RecipeOrigin::Autosave { id: entry.id.clone() },
            Some(entry.id),
        );
        self.current()
    }

    /// Start a fresh, unpublished recipe.
    pub fn new_recipe(&mut self, name: &str, version: &str) {
        self.drift.reset_baseline();
        self.replace_recipe(Recipe::new(name, version), RecipeOrigin::New, None);
    }

    /// Record the published baseline for a recipe that came from elsewhere.
    /// Remote faults only cost the modification marker.
    async fn track_published(&mut self, recipe: &Recipe) {
        self.drift.reset_baseline();
        let coords = &self.services.coords;

        let snapshot = match self.services.cache.get_snapshot(coords).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Cannot check whether '{}' is published: {}", recipe.name, e);
                return;
            }
        };
        if !self.drift.check_published(&recipe.name, &snapshot.recipes) {
            return;
        }
        let Some(descriptor) = snapshot.find(&recipe.name) else {
            return;
        };
        match self.services.cache.fetch_recipe_text(coords, descriptor).await {
            Ok(text) => self.drift.record_published_baseline(&text),
            Err(e) => warn!("Cannot load published '{}': {}", recipe.name, e),
        }
    }

    /// Apply an edit and queue an autosave.
    pub fn edit<F>(&mut self, change: F) -> Result<()>
    where
        F: FnOnce(&mut Recipe),
    {
        let recipe = self.recipe.as_mut().ok_or(Error::NoActiveRecipe)?;
        change(recipe);
        self.writer.schedule(recipe.clone());
        Ok(())
    }

    /// Set one field by dotted key and queue an autosave. A value that does
    /// not fit the recipe leaves it unchanged.
    pub fn set_field(&mut self, key: &str, value: &str) -> Result<()> {
        let mut updated = self.current()?.clone();
        updated.set_field(key, value)?;
        self.edit(|recipe| *recipe = updated)
    }

    /// Write any pending autosave now.
    pub fn flush_autosave(&self) -> Option<String> {
        self.writer.flush()
    }

    pub fn autosave_id(&self) -> Option<String> {
        self.writer.current_id()
    }

    pub fn is_modified(&self) -> bool {
        self.recipe
            .as_ref()
            .is_some_and(|recipe| self.drift.is_modified(recipe))
    }

    /// Save the recipe into the open local directory. A recipe read from
    /// that directory is written back through its handle, which fails once
    /// the grant it came from is gone.
    pub async fn save_local(&mut self) -> Result<LocalRecipeHandle> {
        let recipe = self.current()?;
        let text = recipe.to_yaml()?;
        let local = &self.services.local;
        let handle = match &self.local_handle {
            Some(handle) if handle.name == recipe.name => {
                local.write_with_handle(handle, &text).await?
            }
            _ => local.write_recipe(&recipe.name, &text).await?,
        };
        self.local_handle = Some(handle.clone());
        Ok(handle)
    }

    /// Export file name and canonical text.
    pub fn export(&self) -> Result<(String, String)> {
        let recipe = self.current()?;
        Ok((recipe.export_file_name(), recipe.to_yaml()?))
    }

    pub async fn generate(
        &self,
        output_dir: &str,
        options: &GenerateOptions,
    ) -> Result<Generation> {
        let recipe = self.current()?;
        self.services
            .orchestrator
            .generate(recipe, output_dir, options)
            .await
    }

    /// Where to publish the recipe: edit if it already exists remotely,
    /// create otherwise.
    pub fn publish_url(&self) -> AnyResult<Url> {
        let recipe = self.current()?;
        publish_url(&self.services.coords, &recipe.name, self.drift.is_published())
    }
}
