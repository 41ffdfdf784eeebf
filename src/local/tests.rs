//! Tests for the local directory bridge.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use super::bridge::BridgeStatus;
use super::*;
use crate::error::{Error, Result};

/// Picker whose answer can be changed between grants.
struct ScriptedPicker {
    answer: Mutex<Option<Result<PathBuf>>>,
}

impl ScriptedPicker {
    fn granting(path: &Path) -> Arc<Self> {
        Arc::new(Self {
            answer: Mutex::new(Some(Ok(path.to_path_buf()))),
        })
    }

    fn answer_next(&self, answer: Result<PathBuf>) {
        *self.answer.lock().unwrap() = Some(answer);
    }
}

#[async_trait]
impl DirectoryPicker for ScriptedPicker {
    async fn pick_directory(&self) -> Result<PathBuf> {
        self.answer
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Err(Error::PermissionDenied("dismissed".into())))
    }
}

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// A repository checkout with two recipes and one recipe-less directory.
fn repository() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write(root, "builder/build.py", "# builder\n");
    write(root, "README.md", "# recipes\n");
    fs::create_dir_all(root.join(".github")).unwrap();
    write(root, "recipes/alpha/build.yaml", "name: alpha\nversion: '1.0'\n");
    write(root, "recipes/alpha/files/notes/license.txt", "MIT\n");
    write(root, "recipes/beta/build.yaml", "name: beta\nversion: '2.0'\n");
    fs::create_dir_all(root.join("recipes/empty")).unwrap();
    write(root, "secret.txt", "outside\n");
    tmp
}

async fn open(tmp: &TempDir) -> LocalDirectoryBridge {
    let bridge = LocalDirectoryBridge::new(ScriptedPicker::granting(tmp.path()));
    bridge.open_root().await.unwrap();
    bridge
}

#[tokio::test]
async fn test_open_valid_repository() {
    let tmp = repository();
    let bridge = LocalDirectoryBridge::new(ScriptedPicker::granting(tmp.path()));
    let grant = bridge.open_root().await.unwrap();

    assert_eq!(grant.root, tmp.path());
    assert!(grant.warnings.is_empty());
    assert_eq!(bridge.status().await.root.as_deref(), Some(tmp.path()));
}

#[tokio::test]
async fn test_missing_recipes_dir_is_invalid() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "builder/build.py", "# builder\n");

    let bridge = LocalDirectoryBridge::new(ScriptedPicker::granting(tmp.path()));
    let err = bridge.open_root().await.unwrap_err();
    assert!(matches!(err, Error::InvalidRepository(_)));
    assert!(bridge.status().await.root.is_none());
}

#[tokio::test]
async fn test_missing_builder_distinguishes_outdated_checkout() {
    let tmp = repository();
    fs::remove_file(tmp.path().join("builder/build.py")).unwrap();

    let bridge = LocalDirectoryBridge::new(ScriptedPicker::granting(tmp.path()));
    match bridge.open_root().await.unwrap_err() {
        Error::InvalidRepository(msg) => assert!(msg.contains("predates")),
        other => panic!("unexpected error: {other}"),
    }

    let bare = TempDir::new().unwrap();
    fs::create_dir_all(bare.path().join("recipes")).unwrap();
    let bridge = LocalDirectoryBridge::new(ScriptedPicker::granting(bare.path()));
    match bridge.open_root().await.unwrap_err() {
        Error::InvalidRepository(msg) => assert!(msg.contains("is not a recipe repository")),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_few_markers_is_only_a_warning() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "builder/build.py", "# builder\n");
    fs::create_dir_all(tmp.path().join("recipes")).unwrap();

    let bridge = LocalDirectoryBridge::new(ScriptedPicker::granting(tmp.path()));
    let grant = bridge.open_root().await.unwrap();
    assert_eq!(grant.warnings.len(), 1);
}

#[tokio::test]
async fn test_picker_errors_pass_through() {
    let tmp = repository();
    let picker = ScriptedPicker::granting(tmp.path());
    let bridge = LocalDirectoryBridge::new(picker.clone());
    bridge.open_root().await.unwrap();

    picker.answer_next(Err(Error::InsecureContext("no TLS".into())));
    let err = bridge.open_root().await.unwrap_err();
    assert!(matches!(err, Error::InsecureContext(_)));

    // a declined request keeps the current grant
    assert!(bridge.status().await.root.is_some());

    let err = bridge.open_root().await.unwrap_err();
    assert!(matches!(err, Error::PermissionDenied(_)));
}

#[tokio::test]
async fn test_list_skips_directories_without_recipe() {
    let tmp = repository();
    let bridge = open(&tmp).await;

    let handles = bridge.list_recipes().await.unwrap();
    let names: Vec<&str> = handles.iter().map(|h| h.name.as_str()).collect();
    assert_eq!(names, vec!["alpha", "beta"]);
    assert_eq!(handles[0].path, "recipes/alpha/build.yaml");
    assert_eq!(bridge.status().await.cached_recipes, 2);
}

#[tokio::test]
async fn test_read_recipe_cache_and_fallback() {
    let tmp = repository();
    let bridge = open(&tmp).await;

    let beta = bridge.read_recipe("beta").await.unwrap().unwrap();
    assert!(beta.content.contains("beta"));
    assert!(bridge.read_recipe("missing").await.unwrap().is_none());
    assert!(bridge.read_recipe("empty").await.unwrap().is_none());
    assert!(bridge.read_recipe("../secret.txt").await.unwrap().is_none());
}

#[tokio::test]
async fn test_operations_require_open_root() {
    let bridge = LocalDirectoryBridge::new(Arc::new(FixedDirectoryPicker::new(None)));
    assert!(matches!(
        bridge.list_recipes().await.unwrap_err(),
        Error::NoDirectoryOpen
    ));
    assert!(bridge.read_auxiliary_file("alpha", "x").await.is_none());
    assert!(bridge.get_builder_override_script().await.is_none());
}

#[tokio::test]
async fn test_write_creates_container_and_truncates() {
    let tmp = repository();
    let bridge = open(&tmp).await;

    bridge
        .write_recipe("gamma", "name: gamma\nversion: '1.0'\nlong: xxxxxxxxxxxxxxxx\n")
        .await
        .unwrap();
    let handle = bridge
        .write_recipe("gamma", "name: gamma\nversion: '1.1'\n")
        .await
        .unwrap();

    let on_disk = fs::read_to_string(tmp.path().join("recipes/gamma/build.yaml")).unwrap();
    assert_eq!(on_disk, "name: gamma\nversion: '1.1'\n");
    assert_eq!(handle.path, "recipes/gamma/build.yaml");
    assert_eq!(
        bridge.read_recipe("gamma").await.unwrap().unwrap().content,
        on_disk
    );
}

#[tokio::test]
async fn test_write_rejects_path_like_names() {
    let tmp = repository();
    let bridge = open(&tmp).await;
    assert!(bridge.write_recipe("../escape", "x").await.is_err());
    assert!(!tmp.path().join("escape").exists());
}

#[tokio::test]
async fn test_auxiliary_file_stays_in_container() {
    let tmp = repository();
    let bridge = open(&tmp).await;

    assert_eq!(
        bridge
            .read_auxiliary_file("alpha", "files/notes/license.txt")
            .await
            .as_deref(),
        Some("MIT\n")
    );
    assert_eq!(
        bridge
            .read_auxiliary_file("alpha", "./files//notes/license.txt")
            .await
            .as_deref(),
        Some("MIT\n")
    );

    for escape in [
        "../beta/build.yaml",
        "../../secret.txt",
        "files/../../../secret.txt",
        "..\\..\\secret.txt",
        "files/..",
    ] {
        assert!(
            bridge.read_auxiliary_file("alpha", escape).await.is_none(),
            "{escape} escaped the container"
        );
    }
    assert!(bridge.read_auxiliary_file("alpha", "files").await.is_none());
}

#[cfg(unix)]
#[tokio::test]
async fn test_auxiliary_file_ignores_symlinks() {
    let tmp = repository();
    std::os::unix::fs::symlink(
        tmp.path().join("secret.txt"),
        tmp.path().join("recipes/alpha/link.txt"),
    )
    .unwrap();
    let bridge = open(&tmp).await;
    assert!(bridge.read_auxiliary_file("alpha", "link.txt").await.is_none());
}

#[cfg(unix)]
#[tokio::test]
async fn test_recipe_io_ignores_symlinked_containers() {
    let tmp = repository();
    let outside = TempDir::new().unwrap();
    write(outside.path(), "build.yaml", "name: outside\nversion: '9'\n");
    std::os::unix::fs::symlink(outside.path(), tmp.path().join("recipes/linked")).unwrap();
    std::os::unix::fs::symlink(
        tmp.path().join("secret.txt"),
        tmp.path().join("recipes/empty/build.yaml"),
    )
    .unwrap();
    let bridge = open(&tmp).await;

    assert!(bridge.read_recipe("linked").await.unwrap().is_none());
    assert!(bridge.read_recipe("empty").await.unwrap().is_none());
    let names: Vec<String> = bridge
        .list_recipes()
        .await
        .unwrap()
        .into_iter()
        .map(|h| h.name)
        .collect();
    assert_eq!(names, vec!["alpha", "beta"]);

    assert!(matches!(
        bridge.write_recipe("linked", "name: linked\n").await.unwrap_err(),
        Error::Io(_)
    ));
    assert!(matches!(
        bridge.write_recipe("empty", "name: empty\n").await.unwrap_err(),
        Error::Io(_)
    ));
    assert_eq!(
        fs::read_to_string(outside.path().join("build.yaml")).unwrap(),
        "name: outside\nversion: '9'\n"
    );
    assert_eq!(
        fs::read_to_string(tmp.path().join("secret.txt")).unwrap(),
        "outside\n"
    );
}

#[tokio::test]
async fn test_new_grant_invalidates_handles() {
    let first = repository();
    let second = repository();
    let picker = ScriptedPicker::granting(first.path());
    let bridge = LocalDirectoryBridge::new(picker.clone());
    bridge.open_root().await.unwrap();

    let handle = bridge.read_recipe("alpha").await.unwrap().unwrap();
    assert!(bridge.is_handle_live(&handle).await);

    picker.answer_next(Ok(second.path().to_path_buf()));
    bridge.open_root().await.unwrap();

    assert!(!bridge.is_handle_live(&handle).await);
    assert_eq!(bridge.status().await.cached_recipes, 0);
    let err = bridge.write_with_handle(&handle, "name: alpha\n").await.unwrap_err();
    assert!(matches!(err, Error::StaleHandle(_)));

    let fresh = bridge.read_recipe("alpha").await.unwrap().unwrap();
    assert_eq!(fresh.directory.path(), second.path().join("recipes/alpha"));
    bridge.write_with_handle(&fresh, "name: alpha\nversion: '3'\n").await.unwrap();
}

#[tokio::test]
async fn test_close_clears_state() {
    let tmp = repository();
    let bridge = open(&tmp).await;
    let handle = bridge.read_recipe("alpha").await.unwrap().unwrap();

    bridge.close_root().await;
    assert!(!bridge.is_handle_live(&handle).await);
    assert_eq!(
        bridge.status().await,
        BridgeStatus {
            root: None,
            cached_recipes: 0
        }
    );
    assert!(matches!(
        bridge.read_recipe("alpha").await.unwrap_err(),
        Error::NoDirectoryOpen
    ));
}

#[tokio::test]
async fn test_builder_override_script() {
    let tmp = repository();
    let bridge = open(&tmp).await;
    assert_eq!(
        bridge.get_builder_override_script().await.as_deref(),
        Some("# builder\n")
    );
}
