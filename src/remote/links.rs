//! Browser-facing URLs derived from repository paths.

use anyhow::{Context, Result};
use url::Url;

use super::github::{DEFAULT_RAW_BASE, DEFAULT_WEB_BASE};
use super::types::RepoCoordinates;
use crate::recipe::{RECIPES_DIR, RECIPE_FILE_NAME};

/// Page showing a file on the repository host.
pub fn web_url(coords: &RepoCoordinates, path: &str) -> String {
    format!(
        "{}{}/{}/blob/{}/{}",
        DEFAULT_WEB_BASE, coords.owner, coords.repo, coords.branch, path
    )
}

/// Direct download location of a file.
pub fn download_url(coords: &RepoCoordinates, path: &str) -> String {
    format!(
        "{}{}/{}/{}/{}",
        DEFAULT_RAW_BASE, coords.owner, coords.repo, coords.branch, path
    )
}

/// URL that opens the host's editor for publishing a recipe.
///
/// An existing recipe gets the "edit file" page; a new one gets the "new
/// file" page inside `recipes/<name>/` with the file name prefilled.
pub fn publish_url(coords: &RepoCoordinates, name: &str, existing: bool) -> Result<Url> {
    let base = Url::parse(DEFAULT_WEB_BASE).context("Invalid web base URL")?;
    let name = name.trim();
    if name.is_empty() || name.contains('/') {
        anyhow::bail!("Recipe name '{}' cannot be published", name);
    }

    if existing {
        let path = format!(
            "{}/{}/edit/{}/{}/{}/{}",
            coords.owner, coords.repo, coords.branch, RECIPES_DIR, name, RECIPE_FILE_NAME
        );
        return base.join(&path).context("Failed to build edit URL");
    }

    let path = format!(
        "{}/{}/new/{}/{}/{}",
        coords.owner, coords.repo, coords.branch, RECIPES_DIR, name
    );
    let mut url = base.join(&path).context("Failed to build new-file URL")?;
    url.query_pairs_mut().append_pair("filename", RECIPE_FILE_NAME);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coords() -> RepoCoordinates {
        RepoCoordinates::new("neurodesk", "neurocontainers", "main")
    }

    #[test]
    fn test_web_and_download_urls() {
        let path = "recipes/fsl/build.yaml";
        assert_eq!(
            web_url(&coords(), path),
            "https://github.com/neurodesk/neurocontainers/blob/main/recipes/fsl/build.yaml"
        );
        assert_eq!(
            download_url(&coords(), path),
            "https://raw.githubusercontent.com/neurodesk/neurocontainers/main/recipes/fsl/build.yaml"
        );
    }

    #[test]
    fn test_publish_url_for_existing_recipe() {
        let url = publish_url(&coords(), "fsl", true).unwrap();
        assert_eq!(
            url.as_str(),
            "https://github.com/neurodesk/neurocontainers/edit/main/recipes/fsl/build.yaml"
        );
    }

    #[test]
    fn test_publish_url_for_new_recipe() {
        let url = publish_url(&coords(), "newtool", false).unwrap();
        assert_eq!(url.path(), "/neurodesk/neurocontainers/new/main/recipes/newtool");
        assert_eq!(url.query(), Some("filename=build.yaml"));
    }

    #[test]
    fn test_publish_url_rejects_path_names() {
        assert!(publish_url(&coords(), "../etc", false).is_err());
        assert!(publish_url(&coords(), " ", true).is_err());
    }
}
