//! Recipe model.
//!
//! Only the fields this crate reads or rewrites are typed; everything else a
//! recipe carries is kept verbatim in [`Recipe::extra`] so a load/save cycle
//! never drops content.

mod normalize;

pub use normalize::{normalize, try_normalize_recipe};

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};

/// File name of a recipe inside its container directory.
pub const RECIPE_FILE_NAME: &str = "build.yaml";

/// Top-level directory holding one subdirectory per recipe.
pub const RECIPES_DIR: &str = "recipes";

/// Structured description of a container build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub name: String,

    #[serde(deserialize_with = "string_or_number")]
    pub version: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub architectures: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readme: Option<String>,

    /// External readme location. An empty value must never shadow `readme`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readme_url: Option<String>,

    /// Build directives, passed through to the generator untouched.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub build: serde_json::Value,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Recipe {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            architectures: Vec::new(),
            readme: None,
            readme_url: None,
            build: serde_json::Value::Null,
            extra: BTreeMap::new(),
        }
    }

    /// Parse recipe YAML.
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml_ng::from_str(text).map_err(|e| Error::SerializationFailure(e.to_string()))
    }

    /// Canonical YAML form, as used for export and comparison.
    pub fn to_yaml(&self) -> Result<String> {
        try_normalize_recipe(self)
    }

    /// File name for the exported download.
    pub fn export_file_name(&self) -> String {
        let name = self.name.trim();
        if name.is_empty() {
            "recipe.yaml".to_string()
        } else {
            format!("{}.yaml", name)
        }
    }

    /// Set a field by dotted key (`build.kind`), parsing `value` as YAML.
    /// Intermediate maps are created as needed.
    pub fn set_field(&mut self, key: &str, value: &str) -> Result<()> {
        let segments: Vec<&str> = key.split('.').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(Error::SerializationFailure(format!("invalid field '{}'", key)));
        }
        let parsed: serde_json::Value = serde_yaml_ng::from_str(value)
            .map_err(|e| Error::SerializationFailure(format!("{}: {}", key, e)))?;

        let mut document = serde_json::to_value(&*self)
            .map_err(|e| Error::SerializationFailure(e.to_string()))?;
        let (last, parents) = segments
            .split_last()
            .ok_or_else(|| Error::SerializationFailure(format!("invalid field '{}'", key)))?;

        let mut target = &mut document;
        for segment in parents {
            if !target.get(*segment).is_some_and(serde_json::Value::is_object) {
                target[*segment] = serde_json::Value::Object(Default::default());
            }
            target = &mut target[*segment];
        }
        target[*last] = parsed;

        *self = serde_json::from_value(document)
            .map_err(|e| Error::SerializationFailure(format!("{}: {}", key, e)))?;
        Ok(())
    }

    /// Drop an empty or whitespace-only `readme_url` so it cannot
    /// suppress inline readme content.
    pub fn strip_empty_readme_url(&mut self) {
        if self
            .readme_url
            .as_deref()
            .is_some_and(|url| url.trim().is_empty())
        {
            self.readme_url = None;
        }
    }
}

/// Versions are written both quoted and bare in the wild (`"1.0"` vs `1.0`).
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    struct VersionVisitor;

    impl<'de> Visitor<'de> for VersionVisitor {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a version string or number")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<String, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<String, E> {
            // Debug keeps the trailing ".0" of "1.0"
            Ok(format!("{:?}", v))
        }
    }

    deserializer.deserialize_any(VersionVisitor)
}
