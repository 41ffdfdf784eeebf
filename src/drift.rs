//! Publish drift: has the recipe in memory moved away from what was last
//! seen published?

use tracing::{debug, warn};

use crate::recipe::{normalize, try_normalize_recipe, Recipe};
use crate::remote::RemoteFileDescriptor;

#[derive(Debug, Default)]
pub struct DriftDetector {
    published: bool,
    baseline: Option<String>,
}

impl DriftDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the recipe as published if any remote descriptor carries its
    /// name (case-insensitive).
    pub fn check_published(&mut self, name: &str, remote: &[RemoteFileDescriptor]) -> bool {
        let wanted = name.to_lowercase();
        self.published = remote
            .iter()
            .filter_map(|d| d.recipe_name())
            .any(|candidate| candidate.to_lowercase() == wanted);
        debug!("Recipe '{}' published: {}", name, self.published);
        self.published
    }

    /// Store the canonical form of the published text.
    pub fn record_published_baseline(&mut self, raw_text: &str) {
        self.baseline = Some(normalize(raw_text));
    }

    pub fn is_modified(&self, current: &Recipe) -> bool {
        let Some(baseline) = self.baseline.as_deref() else {
            return false;
        };
        if !self.published {
            return false;
        }

        match try_normalize_recipe(current) {
            Ok(text) => text != baseline,
            Err(e) => {
                warn!("Cannot compare '{}' with its published form: {}", current.name, e);
                false
            }
        }
    }

    pub fn reset_baseline(&mut self) {
        self.published = false;
        self.baseline = None;
    }

    pub fn is_published(&self) -> bool {
        self.published
    }

    pub fn has_baseline(&self) -> bool {
        self.baseline.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PUBLISHED: &str = "version: '1.0'\nname: exampletool\narchitectures: [x86_64]\nbuild:\n  kind: neurodocker\n";

    fn descriptor(path: &str) -> RemoteFileDescriptor {
        RemoteFileDescriptor {
            path: path.to_string(),
            sha: "abc".to_string(),
            html_url: String::new(),
            download_url: String::new(),
        }
    }

    fn published_detector() -> DriftDetector {
        let mut drift = DriftDetector::new();
        assert!(drift.check_published(
            "ExampleTool",
            &[
                descriptor("recipes/other/build.yaml"),
                descriptor("recipes/exampletool/build.yaml"),
            ],
        ));
        drift.record_published_baseline(PUBLISHED);
        drift
    }

    #[test]
    fn test_check_published_matches_directory_name() {
        let mut drift = DriftDetector::new();
        assert!(!drift.check_published("tool", &[descriptor("recipes/toolbox/build.yaml")]));
        assert!(!drift.is_published());
        assert!(drift.check_published("TOOLBOX", &[descriptor("recipes/toolbox/build.yaml")]));
    }

    #[test]
    fn test_edit_and_undo() {
        let drift = published_detector();
        let mut recipe = Recipe::from_yaml(PUBLISHED).unwrap();
        assert!(!drift.is_modified(&recipe));

        recipe.version = "1.1".to_string();
        assert!(drift.is_modified(&recipe));

        recipe.version = "1.0".to_string();
        assert!(!drift.is_modified(&recipe));
    }

    #[test]
    fn test_unpublished_is_never_modified() {
        let mut drift = DriftDetector::new();
        drift.record_published_baseline(PUBLISHED);
        let mut recipe = Recipe::from_yaml(PUBLISHED).unwrap();
        recipe.version = "9".to_string();
        assert!(!drift.is_modified(&recipe));
    }

    #[test]
    fn test_no_baseline_is_never_modified() {
        let mut drift = DriftDetector::new();
        drift.check_published("exampletool", &[descriptor("recipes/exampletool/build.yaml")]);
        assert!(!drift.is_modified(&Recipe::new("exampletool", "2")));
    }

    #[test]
    fn test_reset_clears_state() {
        let mut drift = published_detector();
        drift.reset_baseline();
        assert!(!drift.is_published());
        assert!(!drift.has_baseline());
        assert!(!drift.is_modified(&Recipe::new("exampletool", "2")));
    }
}
