//! Local directory bridge.
//!
//! At most one directory grant is live. Every handle carries the generation
//! of the grant that issued it; opening another directory or closing the
//! current one bumps the generation and strands all older handles.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::picker::DirectoryPicker;
use crate::error::{Error, Result};
use crate::recipe::{RECIPES_DIR, RECIPE_FILE_NAME};

/// Builder script every valid repository carries.
pub const BUILDER_SCRIPT_PATH: &str = "builder/build.py";

/// Entries that usually sit at the root of a recipe repository.
pub const REPOSITORY_MARKERS: &[&str] = &[".github", "README.md", "LICENSE", "macros"];

/// Marker count below which the layout is reported as unusual.
const MIN_MARKERS: usize = 2;

/// Opaque reference to a recipe's container directory under one grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryHandle {
    generation: u64,
    path: PathBuf,
}

impl DirectoryHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A recipe read from (or written to) the open directory.
#[derive(Debug, Clone)]
pub struct LocalRecipeHandle {
    /// Path relative to the root, always `recipes/<name>/build.yaml`
    pub path: String,
    pub name: String,
    pub content: String,
    pub directory: DirectoryHandle,
}

/// Result of a successful directory grant.
#[derive(Debug, Clone)]
pub struct RootGrant {
    pub root: PathBuf,
    pub generation: u64,
    /// Soft layout warnings; the grant is usable regardless.
    pub warnings: Vec<String>,
}

/// Snapshot of the bridge state for display.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeStatus {
    pub root: Option<PathBuf>,
    pub cached_recipes: usize,
}

struct OpenRoot {
    root: PathBuf,
    generation: u64,
    handles: HashMap<String, LocalRecipeHandle>,
}

enum BridgeState {
    Closed,
    Open(OpenRoot),
}

pub struct LocalDirectoryBridge {
    picker: Arc<dyn DirectoryPicker>,
    state: RwLock<BridgeState>,
    generation: AtomicU64,
}

impl LocalDirectoryBridge {
    pub fn new(picker: Arc<dyn DirectoryPicker>) -> Self {
        Self {
            picker,
            state: RwLock::new(BridgeState::Closed),
            generation: AtomicU64::new(0),
        }
    }

    /// Request a directory grant and validate the repository layout.
    ///
    /// A declined request leaves the current grant alone. Once a directory
    /// is granted the previous grant is gone, even if validation then fails.
    pub async fn open_root(&self) -> Result<RootGrant> {
        let root = self.picker.pick_directory().await?;

        let mut state = self.state.write().await;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *state = BridgeState::Closed;

        let warnings = validate_repository(&root).await?;
        for warning in &warnings {
            warn!("{}", warning);
        }

        info!("Opened local recipe repository {}", root.display());
        *state = BridgeState::Open(OpenRoot {
            root: root.clone(),
            generation,
            handles: HashMap::new(),
        });

        Ok(RootGrant {
            root,
            generation,
            warnings,
        })
    }

    /// Drop the grant and every cached handle.
    pub async fn close_root(&self) {
        let mut state = self.state.write().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let BridgeState::Open(open) = &*state {
            debug!("Closing local repository {}", open.root.display());
        }
        *state = BridgeState::Closed;
    }

    pub async fn status(&self) -> BridgeStatus {
        match &*self.state.read().await {
            BridgeState::Closed => BridgeStatus {
                root: None,
                cached_recipes: 0,
            },
            BridgeState::Open(open) => BridgeStatus {
                root: Some(open.root.clone()),
                cached_recipes: open.handles.len(),
            },
        }
    }

    /// Whether `handle` was issued under the live grant.
    pub async fn is_handle_live(&self, handle: &LocalRecipeHandle) -> bool {
        match &*self.state.read().await {
            BridgeState::Open(open) => open.generation == handle.directory.generation,
            BridgeState::Closed => false,
        }
    }

    async fn open_root_info(&self) -> Result<(PathBuf, u64)> {
        match &*self.state.read().await {
            BridgeState::Open(open) => Ok((open.root.clone(), open.generation)),
            BridgeState::Closed => Err(Error::NoDirectoryOpen),
        }
    }

    async fn cache_handles(&self, handles: &[LocalRecipeHandle]) {
        let mut state = self.state.write().await;
        if let BridgeState::Open(open) = &mut *state {
            for handle in handles {
                // Results of IO that straddled a grant change are dropped.
                if handle.directory.generation == open.generation {
                    open.handles.insert(handle.name.clone(), handle.clone());
                }
            }
        }
    }

    /// Enumerate `recipes/*/build.yaml`, skipping directories without one.
    pub async fn list_recipes(&self) -> Result<Vec<LocalRecipeHandle>> {
        let (root, generation) = self.open_root_info().await?;
        let recipes_dir = root.join(RECIPES_DIR);

        let mut entries = tokio::fs::read_dir(&recipes_dir).await?;
        let mut handles = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let is_dir = match entry.file_type().await {
                Ok(kind) => kind.is_dir(),
                Err(e) => {
                    warn!("Cannot inspect {}: {}", entry.path().display(), e);
                    continue;
                }
            };
            if !is_dir {
                continue;
            }

            let name = entry.file_name().to_string_lossy().to_string();
            match load_handle(&root, &name, generation).await {
                Ok(handle) => handles.push(handle),
                Err(e) => warn!(
                    "Skipping recipes/{}: no readable {} ({})",
                    name, RECIPE_FILE_NAME, e
                ),
            }
        }

        handles.sort_by(|a, b| a.name.cmp(&b.name));
        debug!("Found {} local recipes", handles.len());
        self.cache_handles(&handles).await;
        Ok(handles)
    }

    /// Read one recipe, cache first. `None` if it does not exist locally.
    pub async fn read_recipe(&self, name: &str) -> Result<Option<LocalRecipeHandle>> {
        let (root, generation) = match &*self.state.read().await {
            BridgeState::Closed => return Err(Error::NoDirectoryOpen),
            BridgeState::Open(open) => {
                if let Some(handle) = open.handles.get(name) {
                    return Ok(Some(handle.clone()));
                }
                (open.root.clone(), open.generation)
            }
        };

        if !is_plain_segment(name) {
            return Ok(None);
        }

        match load_handle(&root, name, generation).await {
            Ok(handle) => {
                self.cache_handles(std::slice::from_ref(&handle)).await;
                Ok(Some(handle))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Write `recipes/<name>/build.yaml`, creating the directory if needed.
    pub async fn write_recipe(&self, name: &str, content: &str) -> Result<LocalRecipeHandle> {
        if !is_plain_segment(name) {
            return Err(Error::Io(std::io::Error::new(
                ErrorKind::InvalidInput,
                format!("'{}' is not a valid recipe name", name),
            )));
        }

        let (root, generation) = self.open_root_info().await?;
        let container = root.join(RECIPES_DIR).join(name);
        ensure_not_symlink(&container).await?;
        tokio::fs::create_dir_all(&container).await?;

        let file_path = container.join(RECIPE_FILE_NAME);
        ensure_not_symlink(&file_path).await?;
        write_exclusive(&file_path, content).await?;
        info!("Saved recipe to {}", file_path.display());

        let handle = LocalRecipeHandle {
            path: relative_recipe_path(name),
            name: name.to_string(),
            content: content.to_string(),
            directory: DirectoryHandle {
                generation,
                path: container,
            },
        };
        self.cache_handles(std::slice::from_ref(&handle)).await;
        Ok(handle)
    }

    /// Write through a previously issued handle.
    pub async fn write_with_handle(
        &self,
        handle: &LocalRecipeHandle,
        content: &str,
    ) -> Result<LocalRecipeHandle> {
        if !self.is_handle_live(handle).await {
            return Err(Error::StaleHandle(handle.name.clone()));
        }
        self.write_recipe(&handle.name, content).await
    }

    /// Read a file relative to the recipe's own directory.
    ///
    /// Each segment is looked up by name; `..`, symlinks and anything that
    /// is not a plain name resolve to `None`.
    pub async fn read_auxiliary_file(&self, name: &str, relative_path: &str) -> Option<String> {
        let (root, _) = self.open_root_info().await.ok()?;
        if !is_plain_segment(name) {
            return None;
        }

        let mut current = root.join(RECIPES_DIR).join(name);
        let segments: Vec<&str> = relative_path
            .split(['/', '\\'])
            .filter(|s| !s.is_empty() && *s != ".")
            .collect();
        let (file_name, dirs) = segments.split_last()?;

        for segment in dirs {
            if !is_plain_segment(segment) {
                debug!("Rejected auxiliary path segment '{}' in {}", segment, relative_path);
                return None;
            }
            current.push(segment);
            let meta = tokio::fs::symlink_metadata(&current).await.ok()?;
            if !meta.is_dir() {
                return None;
            }
        }

        if !is_plain_segment(file_name) {
            debug!("Rejected auxiliary file name '{}'", file_name);
            return None;
        }
        current.push(file_name);
        let meta = tokio::fs::symlink_metadata(&current).await.ok()?;
        if !meta.is_file() {
            return None;
        }
        tokio::fs::read_to_string(&current).await.ok()
    }

    /// Builder script of the open repository, if readable.
    pub async fn get_builder_override_script(&self) -> Option<String> {
        let (root, _) = self.open_root_info().await.ok()?;
        match tokio::fs::read_to_string(root.join(BUILDER_SCRIPT_PATH)).await {
            Ok(script) => Some(script),
            Err(e) => {
                warn!("Cannot read local builder script: {}", e);
                None
            }
        }
    }
}

async fn validate_repository(root: &Path) -> Result<Vec<String>> {
    if !is_dir(&root.join(RECIPES_DIR)).await {
        return Err(Error::InvalidRepository(format!(
            "{} has no '{}' directory; select a checkout of the recipe repository",
            root.display(),
            RECIPES_DIR
        )));
    }

    let mut markers = 0;
    for marker in REPOSITORY_MARKERS {
        if tokio::fs::symlink_metadata(root.join(marker)).await.is_ok() {
            markers += 1;
        }
    }

    if !is_file(&root.join(BUILDER_SCRIPT_PATH)).await {
        let message = if markers >= MIN_MARKERS {
            format!(
                "{} looks like a recipe repository, but {} is missing; the checkout predates the builder layout, pull the latest changes",
                root.display(),
                BUILDER_SCRIPT_PATH
            )
        } else {
            format!(
                "{} is not a recipe repository ({} is missing)",
                root.display(),
                BUILDER_SCRIPT_PATH
            )
        };
        return Err(Error::InvalidRepository(message));
    }

    let mut warnings = Vec::new();
    if markers < MIN_MARKERS {
        warnings.push(format!(
            "Only {} of the usual repository entries ({}) found in {}",
            markers,
            REPOSITORY_MARKERS.join(", "),
            root.display()
        ));
    }
    Ok(warnings)
}

async fn load_handle(
    root: &Path,
    name: &str,
    generation: u64,
) -> std::io::Result<LocalRecipeHandle> {
    let container = root.join(RECIPES_DIR).join(name);
    let file_path = container.join(RECIPE_FILE_NAME);
    for path in [&container, &file_path] {
        if tokio::fs::symlink_metadata(path).await?.file_type().is_symlink() {
            return Err(std::io::Error::new(
                ErrorKind::NotFound,
                format!("{} is a symbolic link", path.display()),
            ));
        }
    }
    let content = tokio::fs::read_to_string(&file_path).await?;
    Ok(LocalRecipeHandle {
        path: relative_recipe_path(name),
        name: name.to_string(),
        content,
        directory: DirectoryHandle {
            generation,
            path: container,
        },
    })
}

/// Truncate-then-write; the file is closed when it drops on every path.
async fn write_exclusive(path: &Path, content: &str) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .await?;
    file.write_all(content.as_bytes()).await?;
    file.flush().await?;
    file.sync_all().await
}

/// Refuse to write through a symlink; a missing path is fine.
async fn ensure_not_symlink(path: &Path) -> std::io::Result<()> {
    match tokio::fs::symlink_metadata(path).await {
        Ok(meta) if meta.file_type().is_symlink() => Err(std::io::Error::new(
            ErrorKind::InvalidInput,
            format!("{} is a symbolic link", path.display()),
        )),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn relative_recipe_path(name: &str) -> String {
    format!("{}/{}/{}", RECIPES_DIR, name, RECIPE_FILE_NAME)
}

fn is_plain_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(['/', '\\', ':', '\0'])
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok_and(|m| m.is_dir())
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok_and(|m| m.is_file())
}
